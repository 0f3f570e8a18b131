//! Lint System - Rule/Policy Separation
//!
//! Rules inspect a page before it renders and produce structured findings.
//! Policy decides whether findings block a publish.
//!
//! Rendering itself never changes behavior based on findings: an area with
//! no placeholder is still computed and dropped, a placeholder nobody fills
//! still leaks into the output. The lint is where those are made visible.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::page::{PageProps, WidgetConfigNode};
use crate::render::{area_marker, ROOT_AREA_MARKER};
use crate::templates::{WidgetDefinition, WidgetLibrary};

/// Any `{{ name }}` marker with the canonical single-space padding.
static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{ ([^{}\s]+) \}\}").unwrap());

const AREA_PREFIX: &str = "renderWidgets.";
const PAGE_PREFIX: &str = "page.";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// What to do with findings when publishing.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    /// Warnings and errors block the publish.
    Block,
    /// Log at WARN and continue.
    #[default]
    Warn,
    /// Log at DEBUG and continue.
    Log,
}

impl FromStr for FailureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "block" => Ok(Self::Block),
            "warn" => Ok(Self::Warn),
            "log" => Ok(Self::Log),
            other => Err(format!("unknown failure mode '{}', expected block|warn|log", other)),
        }
    }
}

impl fmt::Display for FailureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Block => "block",
            Self::Warn => "warn",
            Self::Log => "log",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LintFinding {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    /// Location in the configuration tree, e.g. `configuration[0].areas.main[1]`.
    /// `None` for page-level findings.
    pub path: Option<String>,
    pub remediation: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LintReport {
    pub valid: bool,
    pub findings: Vec<LintFinding>,
}

impl LintReport {
    fn from_findings(findings: Vec<LintFinding>) -> Self {
        let valid = !findings.iter().any(|f| f.severity == Severity::Error);
        Self { valid, findings }
    }

    pub fn has_errors(&self) -> bool {
        !self.valid
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }

    pub fn by_rule<'a>(&'a self, rule: &'a str) -> impl Iterator<Item = &'a LintFinding> + 'a {
        self.findings.iter().filter(move |f| f.rule == rule)
    }

    /// Whether `mode` forbids publishing with these findings.
    pub fn blocks(&self, mode: FailureMode) -> bool {
        match mode {
            FailureMode::Block => self.findings.iter().any(|f| f.severity >= Severity::Warning),
            FailureMode::Warn | FailureMode::Log => self.has_errors(),
        }
    }

    /// Emit findings as tracing events according to `mode`.
    pub fn log(&self, slug: &str, mode: FailureMode) {
        for finding in &self.findings {
            let path = finding.path.as_deref().unwrap_or("page");
            match (mode, finding.severity) {
                (FailureMode::Log, _) | (_, Severity::Info) => debug!(
                    slug,
                    rule = %finding.rule,
                    path,
                    "{}", finding.message
                ),
                _ => warn!(
                    slug,
                    rule = %finding.rule,
                    path,
                    "{}", finding.message
                ),
            }
        }
    }
}

/// Input handed to node-level rules.
pub struct NodeContext<'a> {
    pub node: &'a WidgetConfigNode,
    pub definition: Option<&'a WidgetDefinition>,
    pub page_props: &'a PageProps,
    pub path: &'a str,
}

/// Lint rule trait - produces findings
pub trait LintRule {
    fn name(&self) -> &'static str;

    fn check_node(&self, _ctx: &NodeContext<'_>) -> Vec<LintFinding> {
        vec![]
    }

    fn check_page(
        &self,
        _page_template: &str,
        _page_props: &PageProps,
    ) -> Vec<LintFinding> {
        vec![]
    }
}

fn finding(
    rule: &dyn LintRule,
    severity: Severity,
    message: String,
    path: Option<&str>,
    remediation: &str,
) -> LintFinding {
    LintFinding {
        rule: rule.name().to_string(),
        severity,
        message,
        path: path.map(str::to_string),
        remediation: vec![remediation.to_string()],
    }
}

/// Distinct placeholder names in `html`, in first-seen order.
pub fn placeholder_names(html: &str) -> Vec<&str> {
    let mut seen = BTreeSet::new();
    PLACEHOLDER_RE
        .captures_iter(html)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .filter(|name| seen.insert(*name))
        .collect()
}

// --- Concrete Rules ---

pub struct MissingWidgetRule;

impl LintRule for MissingWidgetRule {
    fn name(&self) -> &'static str { "missing_widget" }

    fn check_node(&self, ctx: &NodeContext<'_>) -> Vec<LintFinding> {
        if ctx.definition.is_some() {
            return vec![];
        }
        vec![finding(
            self,
            Severity::Error,
            format!("Widget '{}' is not in the widget library", ctx.node.widget_slug),
            Some(ctx.path),
            "Import the widget definition or remove the node",
        )]
    }
}

pub struct InertAreaRule;

impl LintRule for InertAreaRule {
    fn name(&self) -> &'static str { "inert_area" }

    fn check_node(&self, ctx: &NodeContext<'_>) -> Vec<LintFinding> {
        let (Some(def), Some(areas)) = (ctx.definition, &ctx.node.areas) else {
            return vec![];
        };
        areas
            .iter()
            .filter(|(area, _)| !def.html.contains(&area_marker(area)))
            .map(|(area, children)| {
                finding(
                    self,
                    Severity::Warning,
                    format!(
                        "Area '{}' of widget '{}' has no placeholder; \
                         {} child widget(s) will not appear",
                        area,
                        def.slug,
                        children.len()
                    ),
                    Some(ctx.path),
                    "Add the area placeholder to the widget html or move the children",
                )
            })
            .collect()
    }
}

pub struct UnresolvedPlaceholderRule;

impl LintRule for UnresolvedPlaceholderRule {
    fn name(&self) -> &'static str { "unresolved_placeholder" }

    fn check_node(&self, ctx: &NodeContext<'_>) -> Vec<LintFinding> {
        let Some(def) = ctx.definition else {
            return vec![];
        };
        placeholder_names(&def.html)
            .into_iter()
            .filter(|name| !resolved_in_widget(name, def, ctx))
            .map(|name| {
                let remediation = if name.starts_with(PAGE_PREFIX) {
                    "Set the property on the page"
                } else {
                    "Declare the property or configure the area"
                };
                finding(
                    self,
                    Severity::Warning,
                    format!(
                        "Placeholder '{{{{ {} }}}}' in widget '{}' is never filled",
                        name, def.slug
                    ),
                    Some(ctx.path),
                    remediation,
                )
            })
            .collect()
    }

    fn check_page(
        &self,
        page_template: &str,
        page_props: &PageProps,
    ) -> Vec<LintFinding> {
        placeholder_names(page_template)
            .into_iter()
            .filter_map(|name| name.strip_prefix(PAGE_PREFIX))
            .filter(|prop| !page_props.contains_key(*prop))
            .map(|prop| {
                finding(
                    self,
                    Severity::Warning,
                    format!("Page property '{}' is used by the template but not set", prop),
                    None,
                    "Set the property on the page",
                )
            })
            .collect()
    }
}

fn resolved_in_widget(name: &str, def: &WidgetDefinition, ctx: &NodeContext<'_>) -> bool {
    if def.declares(name) {
        return true;
    }
    if let Some(prop) = name.strip_prefix(PAGE_PREFIX) {
        return ctx.page_props.contains_key(prop);
    }
    match name.strip_prefix(AREA_PREFIX) {
        Some(area) => ctx.node.areas.as_ref().is_some_and(|a| a.contains_key(area)),
        None => false,
    }
}

pub struct UndeclaredPropRule;

impl LintRule for UndeclaredPropRule {
    fn name(&self) -> &'static str { "undeclared_prop" }

    fn check_node(&self, ctx: &NodeContext<'_>) -> Vec<LintFinding> {
        let Some(def) = ctx.definition else {
            return vec![];
        };
        ctx.node
            .props
            .keys()
            .filter(|prop| !def.declares(prop))
            .map(|prop| {
                finding(
                    self,
                    Severity::Info,
                    format!(
                        "Property '{}' is not declared by widget '{}' and is ignored",
                        prop, def.slug
                    ),
                    Some(ctx.path),
                    "Remove the property or declare it on the widget",
                )
            })
            .collect()
    }
}

pub struct RootPlaceholderRule;

impl LintRule for RootPlaceholderRule {
    fn name(&self) -> &'static str { "root_placeholder" }

    fn check_page(
        &self,
        page_template: &str,
        _page_props: &PageProps,
    ) -> Vec<LintFinding> {
        let count = page_template.matches(ROOT_AREA_MARKER).count();
        if count == 1 {
            return vec![];
        }
        let message = if count == 0 {
            format!(
                "Page template has no {} placeholder; page widgets will not appear",
                ROOT_AREA_MARKER
            )
        } else {
            format!(
                "Page template has {} {} placeholders; widgets will repeat",
                count, ROOT_AREA_MARKER
            )
        };
        vec![finding(
            self,
            Severity::Warning,
            message,
            None,
            "Keep exactly one root placeholder in the page template",
        )]
    }
}

/// Linter orchestrates rules over a whole page
pub struct Linter {
    rules: Vec<Box<dyn LintRule + Send + Sync>>,
}

impl Linter {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(MissingWidgetRule),
                Box::new(InertAreaRule),
                Box::new(UnresolvedPlaceholderRule),
                Box::new(UndeclaredPropRule),
                Box::new(RootPlaceholderRule),
            ],
        }
    }

    pub fn lint(
        &self,
        page_template: &str,
        page_props: &PageProps,
        configuration: &[WidgetConfigNode],
        library: &WidgetLibrary,
    ) -> LintReport {
        let mut findings = vec![];

        for rule in &self.rules {
            findings.extend(rule.check_page(page_template, page_props));
        }
        self.lint_nodes(configuration, "configuration", library, page_props, &mut findings);

        LintReport::from_findings(findings)
    }

    fn lint_nodes(
        &self,
        nodes: &[WidgetConfigNode],
        prefix: &str,
        library: &WidgetLibrary,
        page_props: &PageProps,
        findings: &mut Vec<LintFinding>,
    ) {
        for (i, node) in nodes.iter().enumerate() {
            let path = format!("{}[{}]", prefix, i);
            let ctx = NodeContext {
                node,
                definition: library.get(&node.widget_slug),
                page_props,
                path: &path,
            };
            for rule in &self.rules {
                findings.extend(rule.check_node(&ctx));
            }
            if let Some(areas) = &node.areas {
                for (area, children) in areas {
                    let child_prefix = format!("{}.areas.{}", path, area);
                    self.lint_nodes(children, &child_prefix, library, page_props, findings);
                }
            }
        }
    }
}

impl Default for Linter {
    fn default() -> Self {
        Self::new()
    }
}

/// Lint a page with the default rule set.
pub fn lint(
    page_template: &str,
    page_props: &PageProps,
    configuration: &[WidgetConfigNode],
    library: &WidgetLibrary,
) -> LintReport {
    Linter::new().lint(page_template, page_props, configuration, library)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "<html>{{ renderWidgets }}</html>";

    fn library() -> WidgetLibrary {
        [
            WidgetDefinition::new("hero", "<h1>{{ title }}</h1>").with_props(["title"]),
            WidgetDefinition::new("section", "<section>{{ renderWidgets.main }}</section>"),
            WidgetDefinition::new("leaky", "<p>{{ body }}{{ footnote }}{{ page.title }}</p>")
                .with_props(["body"]),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_clean_page() {
        let config = vec![WidgetConfigNode::new("section")
            .with_area("main", vec![WidgetConfigNode::new("hero").with_prop("title", "Hi")])];
        let report = lint(PAGE, &PageProps::new(), &config, &library());
        assert!(report.valid);
        assert!(report.findings.is_empty(), "{:?}", report.findings);
    }

    #[test]
    fn test_missing_widget_is_error_with_path() {
        let config = vec![WidgetConfigNode::new("section")
            .with_area(
                "main",
                vec![WidgetConfigNode::new("hero"), WidgetConfigNode::new("ghost")],
            )];
        let report = lint(PAGE, &PageProps::new(), &config, &library());
        assert!(!report.valid);
        let missing: Vec<_> = report.by_rule("missing_widget").collect();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].path.as_deref(), Some("configuration[0].areas.main[1]"));
    }

    #[test]
    fn test_inert_area_warned() {
        let config = vec![WidgetConfigNode::new("hero")
            .with_area("sidebar", vec![WidgetConfigNode::new("hero")])];
        let report = lint(PAGE, &PageProps::new(), &config, &library());
        assert!(report.valid);
        let inert: Vec<_> = report.by_rule("inert_area").collect();
        assert_eq!(inert.len(), 1);
        assert_eq!(inert[0].severity, Severity::Warning);
        assert!(inert[0].message.contains("sidebar"));
    }

    #[test]
    fn test_unresolved_placeholders() {
        let config = vec![WidgetConfigNode::new("leaky"), WidgetConfigNode::new("section")];
        let report = lint(PAGE, &PageProps::new(), &config, &library());
        let unresolved: Vec<_> = report.by_rule("unresolved_placeholder").collect();
        assert_eq!(unresolved.len(), 3);
        assert!(unresolved[0].message.contains("footnote"));
        assert!(unresolved[1].message.contains("page.title"));
        assert!(unresolved[2].message.contains("renderWidgets.main"));
    }

    #[test]
    fn test_page_marker_in_widget_needs_page_prop() {
        let library: WidgetLibrary =
            [WidgetDefinition::new("brand", "<span>{{ page.site }}</span>")]
                .into_iter()
                .collect();
        let config = vec![WidgetConfigNode::new("brand")];

        let report = lint(PAGE, &PageProps::new(), &config, &library);
        let unresolved: Vec<_> = report.by_rule("unresolved_placeholder").collect();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].path.as_deref(), Some("configuration[0]"));

        let mut props = PageProps::new();
        props.insert("site".into(), "Acme".into());
        assert!(lint(PAGE, &props, &config, &library).findings.is_empty());
    }

    #[test]
    fn test_unset_page_prop() {
        let template = "<title>{{ page.title }}</title>{{ renderWidgets }}";
        let report = lint(template, &PageProps::new(), &[], &library());
        assert_eq!(report.by_rule("unresolved_placeholder").count(), 1);
    }

    #[test]
    fn test_undeclared_prop_is_info() {
        let config = vec![WidgetConfigNode::new("hero").with_prop("colour", "red")];
        let report = lint(PAGE, &PageProps::new(), &config, &library());
        assert_eq!(report.count(Severity::Info), 1);
        assert!(!report.blocks(FailureMode::Block));
    }

    #[test]
    fn test_root_placeholder_count() {
        let report = lint("<html></html>", &PageProps::new(), &[], &library());
        assert_eq!(report.by_rule("root_placeholder").count(), 1);
        let template = "{{ renderWidgets }}{{ renderWidgets }}";
        let report = lint(template, &PageProps::new(), &[], &library());
        assert!(report.by_rule("root_placeholder").next().unwrap().message.contains("2"));
    }

    #[test]
    fn test_policy() {
        let config = vec![WidgetConfigNode::new("hero")
            .with_area("sidebar", vec![WidgetConfigNode::new("hero")])];
        let report = lint(PAGE, &PageProps::new(), &config, &library());
        assert!(report.blocks(FailureMode::Block));
        assert!(!report.blocks(FailureMode::Warn));
        assert!(!report.blocks(FailureMode::Log));
    }

    #[test]
    fn test_failure_mode_parse() {
        assert_eq!("Block".parse::<FailureMode>().unwrap(), FailureMode::Block);
        assert_eq!(" log ".parse::<FailureMode>().unwrap(), FailureMode::Log);
        assert!("strict".parse::<FailureMode>().is_err());
    }

    #[test]
    fn test_placeholder_names_distinct() {
        let names = placeholder_names("{{ a }}{{ b }}{{ a }}{{a}}{{ renderWidgets.x }}");
        assert_eq!(names, vec!["a", "b", "renderWidgets.x"]);
    }
}
