//! Page Renderer - Recursive Widget Composition
//!
//! Pure string templating: no I/O, no escaping, no shared state.
//! A page renders fully or not at all.

use thiserror::Error;

use crate::page::{prop_text, PageProps, WidgetConfigNode};
use crate::templates::{WidgetDefinition, WidgetLibrary};

/// Root area placeholder of a page template.
pub const ROOT_AREA_MARKER: &str = "{{ renderWidgets }}";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("Widget definition not found: {0}")]
    MissingWidgetDefinition(String),
}

/// `{{ <name> }}`
pub fn prop_marker(name: &str) -> String {
    format!("{{{{ {} }}}}", name)
}

/// `{{ renderWidgets.<area> }}`
pub fn area_marker(area: &str) -> String {
    format!("{{{{ renderWidgets.{} }}}}", area)
}

/// `{{ page.<name> }}`
pub fn page_prop_marker(name: &str) -> String {
    format!("{{{{ page.{} }}}}", name)
}

/// Renders configuration trees against a fixed widget library.
#[derive(Debug, Clone, Copy)]
pub struct Renderer<'a> {
    library: &'a WidgetLibrary,
}

impl<'a> Renderer<'a> {
    pub fn new(library: &'a WidgetLibrary) -> Self {
        Self { library }
    }

    /// Render a full page document.
    pub fn render_page(
        &self,
        page_template: &str,
        page_props: &PageProps,
        root_configuration: &[WidgetConfigNode],
    ) -> Result<String, RenderError> {
        let widgets = self.render_widgets(root_configuration)?;
        let mut body = page_template.replace(ROOT_AREA_MARKER, &widgets);

        for (name, value) in page_props {
            body = body.replace(&page_prop_marker(name), &prop_text(value));
        }

        Ok(body)
    }

    /// Render a sequence of nodes and concatenate them in authored order.
    pub fn render_widgets(&self, nodes: &[WidgetConfigNode]) -> Result<String, RenderError> {
        let mut out = String::new();
        for node in nodes {
            out.push_str(&self.render_widget(node)?);
        }
        Ok(out)
    }

    /// Render one node and, recursively, its areas.
    pub fn render_widget(&self, node: &WidgetConfigNode) -> Result<String, RenderError> {
        let def = self.definition(&node.widget_slug)?;
        let mut html = def.html.clone();

        for name in &def.declared_props {
            let value = node.props.get(name).map(String::as_str).unwrap_or("");
            html = html.replace(&prop_marker(name), value);
        }

        // Areas without a placeholder are still rendered so that a missing
        // definition anywhere in the tree fails the page.
        if let Some(areas) = &node.areas {
            for (area, children) in areas {
                let rendered = self.render_widgets(children)?;
                html = html.replace(&area_marker(area), &rendered);
            }
        }

        Ok(html)
    }

    fn definition(&self, slug: &str) -> Result<&'a WidgetDefinition, RenderError> {
        self.library
            .get(slug)
            .ok_or_else(|| RenderError::MissingWidgetDefinition(slug.to_string()))
    }
}

/// Render `root_configuration` into `page_template` using `library`.
pub fn render(
    page_template: &str,
    page_props: &PageProps,
    root_configuration: &[WidgetConfigNode],
    library: &WidgetLibrary,
) -> Result<String, RenderError> {
    Renderer::new(library).render_page(page_template, page_props, root_configuration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn library() -> WidgetLibrary {
        [
            WidgetDefinition::new("hero", "<h1>{{ title }}</h1>").with_props(["title"]),
            WidgetDefinition::new("text", "<p>{{ body }}</p>").with_props(["body"]),
            WidgetDefinition::new(
                "section",
                "<section><h2>{{ heading }}</h2>{{ renderWidgets.main }}</section>",
            )
            .with_props(["heading"]),
            WidgetDefinition::new(
                "columns",
                "<div>{{ renderWidgets.left }}|{{ renderWidgets.right }}</div>",
            ),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_markers() {
        assert_eq!(prop_marker("title"), "{{ title }}");
        assert_eq!(area_marker("main"), "{{ renderWidgets.main }}");
        assert_eq!(page_prop_marker("title"), "{{ page.title }}");
    }

    #[test]
    fn test_repeated_prop_replaced_everywhere() {
        let library: WidgetLibrary =
            [WidgetDefinition::new("twice", "<b>{{ t }}</b><i>{{ t }}</i>").with_props(["t"])]
                .into_iter()
                .collect();
        let node = WidgetConfigNode::new("twice").with_prop("t", "Hi");
        let html = Renderer::new(&library).render_widget(&node).unwrap();
        assert_eq!(html, "<b>Hi</b><i>Hi</i>");
    }

    #[test]
    fn test_missing_prop_becomes_empty() {
        let library = library();
        let html = Renderer::new(&library)
            .render_widget(&WidgetConfigNode::new("hero"))
            .unwrap();
        assert_eq!(html, "<h1></h1>");
    }

    #[test]
    fn test_undeclared_props_ignored_and_placeholders_kept() {
        let library: WidgetLibrary =
            [WidgetDefinition::new("w", "{{ a }}-{{ b }}").with_props(["a"])]
                .into_iter()
                .collect();
        let node = WidgetConfigNode::new("w")
            .with_prop("a", "1")
            .with_prop("b", "2");
        let html = Renderer::new(&library).render_widget(&node).unwrap();
        assert_eq!(html, "1-{{ b }}");
    }

    #[test]
    fn test_nested_areas_recurse() {
        let library = library();
        let node = WidgetConfigNode::new("section")
            .with_prop("heading", "Outer")
            .with_area(
                "main",
                vec![
                    WidgetConfigNode::new("section")
                        .with_prop("heading", "Inner")
                        .with_area(
                            "main",
                            vec![WidgetConfigNode::new("text").with_prop("body", "deep")],
                        ),
                    WidgetConfigNode::new("hero").with_prop("title", "after"),
                ],
            );
        let html = Renderer::new(&library).render_widget(&node).unwrap();
        assert_eq!(
            html,
            "<section><h2>Outer</h2>\
             <section><h2>Inner</h2><p>deep</p></section>\
             <h1>after</h1></section>"
        );
    }

    #[test]
    fn test_multiple_areas() {
        let library = library();
        let node = WidgetConfigNode::new("columns")
            .with_area("right", vec![WidgetConfigNode::new("text").with_prop("body", "R")])
            .with_area("left", vec![WidgetConfigNode::new("text").with_prop("body", "L")]);
        let html = Renderer::new(&library).render_widget(&node).unwrap();
        assert_eq!(html, "<div><p>L</p>|<p>R</p></div>");
    }

    #[test]
    fn test_inert_area_dropped() {
        let library = library();
        let node = WidgetConfigNode::new("hero")
            .with_prop("title", "T")
            .with_area("sidebar", vec![WidgetConfigNode::new("text").with_prop("body", "lost")]);
        let html = Renderer::new(&library).render_widget(&node).unwrap();
        assert_eq!(html, "<h1>T</h1>");
    }

    #[test]
    fn test_missing_definition_in_inert_area_still_fails() {
        let library = library();
        let node = WidgetConfigNode::new("hero")
            .with_area("sidebar", vec![WidgetConfigNode::new("ghost")]);
        let err = Renderer::new(&library).render_widget(&node).unwrap_err();
        assert_eq!(err, RenderError::MissingWidgetDefinition("ghost".into()));
    }

    #[test]
    fn test_page_props_replaced_globally() {
        let library = library();
        let mut props = PageProps::new();
        props.insert("title".into(), "Home".into());
        let html = render(
            "<title>{{ page.title }}</title>{{ renderWidgets }}<footer>{{ page.title }}</footer>",
            &props,
            &[WidgetConfigNode::new("text").with_prop("body", "x")],
            &library,
        )
        .unwrap();
        assert_eq!(html, "<title>Home</title><p>x</p><footer>Home</footer>");
    }

    #[test]
    fn test_page_props_applied_in_authored_order() {
        let props: PageProps =
            serde_json::from_str(r#"{"heading": "{{ page.site }} news", "site": "Acme"}"#).unwrap();
        let html = render(
            "<h1>{{ page.heading }}</h1>{{ renderWidgets }}",
            &props,
            &[],
            &WidgetLibrary::new(),
        )
        .unwrap();
        assert_eq!(html, "<h1>Acme news</h1>");

        let reversed: PageProps =
            serde_json::from_str(r#"{"site": "Acme", "heading": "{{ page.site }} news"}"#).unwrap();
        let html = render("{{ page.heading }}", &reversed, &[], &WidgetLibrary::new()).unwrap();
        assert_eq!(html, "{{ page.site }} news");
    }

    #[test]
    fn test_empty_configuration() {
        let html = render(
            "<html>{{ renderWidgets }}</html>",
            &PageProps::new(),
            &[],
            &WidgetLibrary::new(),
        )
        .unwrap();
        assert_eq!(html, "<html></html>");
    }
}
