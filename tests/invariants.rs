//! Render Invariant Tests
//!
//! These tests pin down the renderer's contract: ordering, global
//! substitution, recursion, and all-or-nothing failure.

use pagewright_core::{
    render, PageProps, RenderError, Renderer, WidgetConfigNode, WidgetDefinition, WidgetLibrary,
};
use pretty_assertions::assert_eq;

const PAGE: &str = "<html>{{ renderWidgets }}</html>";

fn create_library() -> WidgetLibrary {
    [
        WidgetDefinition::new("hero", "<h1>{{ title }}</h1>").with_props(["title"]),
        WidgetDefinition::new("text", "<p>{{ body }}</p>").with_props(["body"]),
        WidgetDefinition::new(
            "container",
            "<div class=\"{{ class }}\">{{ renderWidgets.main }}</div>",
        )
        .with_props(["class"]),
    ]
    .into_iter()
    .collect()
}

fn no_props() -> PageProps {
    PageProps::new()
}

#[test]
fn invariant_end_to_end_scenario() {
    let library: WidgetLibrary =
        [WidgetDefinition::new("hero", "<h1>{{ title }}</h1>").with_props(["title"])]
            .into_iter()
            .collect();
    let config = vec![WidgetConfigNode::new("hero").with_prop("title", "Welcome")];

    let html = render(PAGE, &no_props(), &config, &library).unwrap();
    assert_eq!(html, "<html><h1>Welcome</h1></html>");
}

#[test]
fn invariant_render_is_deterministic() {
    let library = create_library();
    let config = vec![
        WidgetConfigNode::new("container")
            .with_prop("class", "wrap")
            .with_area(
                "main",
                vec![
                    WidgetConfigNode::new("hero").with_prop("title", "A"),
                    WidgetConfigNode::new("text").with_prop("body", "B"),
                ],
            ),
        WidgetConfigNode::new("text").with_prop("body", "C"),
    ];

    let first = render(PAGE, &no_props(), &config, &library).unwrap();
    for _ in 0..10 {
        assert_eq!(render(PAGE, &no_props(), &config, &library).unwrap(), first);
    }
}

#[test]
fn invariant_every_occurrence_substituted() {
    let library: WidgetLibrary =
        [WidgetDefinition::new("w", "<b>{{ t }}</b><i>{{ t }}</i>").with_props(["t"])]
            .into_iter()
            .collect();
    let node = WidgetConfigNode::new("w").with_prop("t", "Hi");

    assert_eq!(
        Renderer::new(&library).render_widget(&node).unwrap(),
        "<b>Hi</b><i>Hi</i>"
    );
}

#[test]
fn invariant_order_preserved() {
    let library = create_library();
    let a = WidgetConfigNode::new("hero").with_prop("title", "A");
    let b = WidgetConfigNode::new("text").with_prop("body", "B");
    let renderer = Renderer::new(&library);

    let combined = renderer.render_widgets(&[a.clone(), b.clone()]).unwrap();
    let expected = renderer.render_widget(&a).unwrap() + &renderer.render_widget(&b).unwrap();
    assert_eq!(combined, expected);

    let reversed = renderer.render_widgets(&[b, a]).unwrap();
    assert_eq!(reversed, "<p>B</p><h1>A</h1>");
}

#[test]
fn invariant_nested_areas_fully_rendered() {
    let library = create_library();
    let config = vec![WidgetConfigNode::new("container")
        .with_prop("class", "outer")
        .with_area(
            "main",
            vec![WidgetConfigNode::new("container")
                .with_prop("class", "inner")
                .with_area("main", vec![WidgetConfigNode::new("hero").with_prop("title", "Deep")])],
        )];

    let html = render(PAGE, &no_props(), &config, &library).unwrap();
    assert_eq!(
        html,
        "<html><div class=\"outer\"><div class=\"inner\"><h1>Deep</h1></div></div></html>"
    );
}

#[test]
fn invariant_missing_declared_prop_is_empty() {
    let library = create_library();
    let html = render(PAGE, &no_props(), &[WidgetConfigNode::new("hero")], &library).unwrap();
    assert!(!html.contains("{{ title }}"));
    assert_eq!(html, "<html><h1></h1></html>");
}

#[test]
fn invariant_unknown_widget_fails_whole_render() {
    let result = render(
        PAGE,
        &no_props(),
        &[WidgetConfigNode::new("ghost")],
        &WidgetLibrary::new(),
    );
    assert_eq!(
        result,
        Err(RenderError::MissingWidgetDefinition("ghost".to_string()))
    );
}

#[test]
fn invariant_unknown_widget_deep_in_tree_fails() {
    let library = create_library();
    let config = vec![
        WidgetConfigNode::new("hero").with_prop("title", "fine"),
        WidgetConfigNode::new("container").with_area("main", vec![WidgetConfigNode::new("ghost")]),
    ];
    let err = render(PAGE, &no_props(), &config, &library).unwrap_err();
    assert!(err.to_string().contains("ghost"));
}

#[test]
fn invariant_values_not_escaped() {
    let library = create_library();
    let config = vec![WidgetConfigNode::new("text").with_prop("body", "<script>x()</script> & co")];
    let html = render(PAGE, &no_props(), &config, &library).unwrap();
    assert_eq!(html, "<html><p><script>x()</script> & co</p></html>");
}

#[test]
fn invariant_page_props_substituted_after_widgets() {
    let library: WidgetLibrary =
        [WidgetDefinition::new("brand", "<span>{{ page.site }}</span>")]
            .into_iter()
            .collect();
    let mut props = PageProps::new();
    props.insert("site".into(), "Acme".into());

    let html = render(
        "<title>{{ page.site }}</title>{{ renderWidgets }}",
        &props,
        &[WidgetConfigNode::new("brand")],
        &library,
    )
    .unwrap();
    assert_eq!(html, "<title>Acme</title><span>Acme</span>");
}

#[test]
fn invariant_configuration_json_shape() {
    let config: Vec<WidgetConfigNode> = serde_json::from_str(
        r#"[{"widget": "container", "props": {"class": "c"},
             "areas": {"main": [{"widget": "hero", "props": {"title": "T"}}]}}]"#,
    )
    .unwrap();
    let html = render(PAGE, &no_props(), &config, &create_library()).unwrap();
    assert_eq!(html, "<html><div class=\"c\"><h1>T</h1></div></html>");
}
