//! Page Model - Records and Widget Configuration Trees

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::BTreeMap;

pub type Slug = String;

/// Template used when a stored page predates the `template` attribute.
pub const DEFAULT_PAGE_TEMPLATE: &str = "main";

/// Slug whose published document lands at the bucket root.
pub const INDEX_SLUG: &str = "index";

pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Page-level properties in authored order. Substitution follows this order,
/// so a value may itself contain a later `{{ page.<name> }}` marker.
pub type PageProps = Map<String, Value>;

/// Text substituted for a page property value. Non-string values render as JSON.
pub fn prop_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s),
        other => Cow::Owned(other.to_string()),
    }
}

/// One node of a page's widget configuration tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetConfigNode {
    #[serde(rename = "widget", alias = "widgetSlug")]
    pub widget_slug: Slug,
    #[serde(default)]
    pub props: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub areas: Option<BTreeMap<String, Vec<WidgetConfigNode>>>,
}

impl WidgetConfigNode {
    pub fn new(widget_slug: impl Into<Slug>) -> Self {
        Self {
            widget_slug: widget_slug.into(),
            ..Self::default()
        }
    }

    pub fn with_prop(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.props.insert(name.into(), value.into());
        self
    }

    pub fn with_area(mut self, name: impl Into<String>, children: Vec<WidgetConfigNode>) -> Self {
        self.areas
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), children);
        self
    }
}

/// A page as stored in the pages table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    pub slug: Slug,
    pub name: String,
    #[serde(default = "default_template")]
    pub template: String,
    #[serde(default)]
    pub configuration: Vec<WidgetConfigNode>,
    #[serde(default)]
    pub props: PageProps,
}

fn default_template() -> String {
    DEFAULT_PAGE_TEMPLATE.to_string()
}

impl PageRecord {
    /// Object key the rendered page is published under.
    pub fn publish_key(&self) -> String {
        publish_key(&self.slug)
    }
}

/// Listing projection of a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSummary {
    pub name: String,
    pub slug: Slug,
}

pub fn publish_key(slug: &str) -> String {
    if slug == INDEX_SLUG {
        "index.html".to_string()
    } else {
        format!("{}/index.html", slug)
    }
}

/// Object key of a named page template in the definitions bucket.
pub fn page_template_key(template: &str) -> String {
    format!("{}PageTemplate.html", template)
}
