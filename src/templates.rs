//! Template System - Widget Definitions and the Widget Library

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::page::Slug;

/// A reusable widget: an HTML fragment plus the property names it substitutes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetDefinition {
    pub slug: Slug,
    #[serde(default)]
    pub name: String,
    pub html: String,
    /// Declaration order drives substitution order.
    #[serde(default)]
    pub declared_props: Vec<String>,
}

impl WidgetDefinition {
    pub fn new(slug: impl Into<Slug>, html: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            name: String::new(),
            html: html.into(),
            declared_props: vec![],
        }
    }

    pub fn with_props<I, S>(mut self, props: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.declared_props = props.into_iter().map(Into::into).collect();
        self
    }

    /// Build a definition from a stored record and its resolved HTML fragment.
    pub fn from_record(record: &WidgetRecord, html: String) -> Self {
        Self {
            slug: record.slug.clone(),
            name: record.name.clone(),
            html,
            declared_props: record.declared_props(),
        }
    }

    pub fn declares(&self, prop: &str) -> bool {
        self.declared_props.iter().any(|p| p == prop)
    }
}

/// A widget as stored in the widgets table.
///
/// `html` is an object key into the definitions bucket for stored rows, and
/// the inline fragment for widget files loaded from disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetRecord {
    pub slug: Slug,
    pub name: String,
    #[serde(default)]
    pub preview_image: Option<String>,
    pub html: String,
    /// Keys are the declared property names; values are editor metadata.
    #[serde(default)]
    pub props: Map<String, Value>,
    #[serde(default = "empty_object")]
    pub layout: Value,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl WidgetRecord {
    pub fn declared_props(&self) -> Vec<String> {
        self.props.keys().cloned().collect()
    }

    pub fn summary(&self) -> WidgetSummary {
        WidgetSummary {
            name: self.name.clone(),
            slug: self.slug.clone(),
            preview_image: self.preview_image.clone(),
        }
    }
}

/// Listing projection of a widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetSummary {
    pub name: String,
    pub slug: Slug,
    #[serde(default)]
    pub preview_image: Option<String>,
}

/// Widget detail returned to editors: everything except the HTML location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetDetail {
    pub name: String,
    pub slug: Slug,
    pub preview_image: Option<String>,
    pub props: Map<String, Value>,
    pub layout: Value,
}

impl From<WidgetRecord> for WidgetDetail {
    fn from(record: WidgetRecord) -> Self {
        Self {
            name: record.name,
            slug: record.slug,
            preview_image: record.preview_image,
            props: record.props,
            layout: record.layout,
        }
    }
}

/// A page template as stored in the page-templates table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageTemplateRecord {
    pub slug: Slug,
    pub name: String,
    pub html: String,
    #[serde(default)]
    pub props: Map<String, Value>,
}

/// Widget library - the definitions a render may reference, by slug
#[derive(Debug, Clone, Default)]
pub struct WidgetLibrary {
    widgets: HashMap<Slug, WidgetDefinition>,
}

impl WidgetLibrary {
    pub fn new() -> Self {
        Self { widgets: HashMap::new() }
    }

    /// Load every `*.json` widget file in `dir`, each holding a
    /// [`WidgetRecord`] with an inline `html` fragment.
    ///
    /// Unreadable or malformed files are skipped with a warning.
    pub fn load_from_dir(dir: &Path) -> Result<Self, std::io::Error> {
        let mut library = Self::new();
        if !dir.exists() {
            return Ok(library);
        }
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().map_or(true, |e| e != "json") {
                continue;
            }
            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable widget file");
                    continue;
                }
            };
            match serde_json::from_str::<WidgetRecord>(&content) {
                Ok(record) => {
                    debug!(slug = %record.slug, "Loaded widget");
                    let html = record.html.clone();
                    library.register(WidgetDefinition::from_record(&record, html));
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping malformed widget file");
                }
            }
        }
        Ok(library)
    }

    pub fn get(&self, slug: &str) -> Option<&WidgetDefinition> {
        self.widgets.get(slug)
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.widgets.contains_key(slug)
    }

    /// All definitions, ordered by slug.
    pub fn list(&self) -> Vec<&WidgetDefinition> {
        let mut widgets: Vec<_> = self.widgets.values().collect();
        widgets.sort_by(|a, b| a.slug.cmp(&b.slug));
        widgets
    }

    pub fn register(&mut self, widget: WidgetDefinition) {
        self.widgets.insert(widget.slug.clone(), widget);
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }
}

impl FromIterator<WidgetDefinition> for WidgetLibrary {
    fn from_iter<I: IntoIterator<Item = WidgetDefinition>>(iter: I) -> Self {
        let mut library = Self::new();
        for widget in iter {
            library.register(widget);
        }
        library
    }
}
