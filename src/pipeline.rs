//! Publish Pipeline - Single Entry Point for Rendering Stored Pages
//!
//! Every input is resolved before the renderer runs: the page record, the
//! deduplicated widget definitions with their HTML, and the page template.
//! A page publishes fully or not at all.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ServiceConfig;
use crate::hashing::{compute_render_hash, content_hash};
use crate::page::{page_template_key, PageRecord, WidgetConfigNode, HTML_CONTENT_TYPE};
use crate::render::{RenderError, Renderer};
use crate::store::{KeyValueStore, ObjectStore, StoreError};
use crate::templates::{WidgetDefinition, WidgetLibrary, WidgetRecord};
use crate::validation::{LintReport, Linter};
use crate::ENGINE_VERSION;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Page not found: {0}")]
    MissingPageRecord(String),

    #[error("Page template not found: {0}")]
    MissingTemplate(String),

    #[error("Widget definitions not found: {}", .0.join(", "))]
    MissingWidgetDefinitions(Vec<String>),

    #[error("Render failed: {0}")]
    Render(#[from] RenderError),

    #[error("Lint blocked publish of '{slug}': {summary}")]
    LintBlocked { slug: String, summary: String },

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A page rendered but not yet written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedPage {
    pub slug: String,
    pub template: String,
    pub html: String,
    pub render_hash: String,
    pub lint: LintReport,
}

/// Record of a completed publish.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReceipt {
    pub id: String,
    pub slug: String,
    pub bucket: String,
    pub key: String,
    pub content_hash: String,
    pub render_hash: String,
    pub engine_version: String,
    pub published_at: DateTime<Utc>,
    pub lint: LintReport,
}

/// Widget slugs referenced anywhere in `configuration`, depth first, each
/// node before its areas, first occurrence kept.
pub fn collect_widget_slugs(configuration: &[WidgetConfigNode]) -> Vec<String> {
    fn walk<'a>(nodes: &'a [WidgetConfigNode], seen: &mut HashSet<&'a str>, out: &mut Vec<String>) {
        for node in nodes {
            if seen.insert(node.widget_slug.as_str()) {
                out.push(node.widget_slug.clone());
            }
            if let Some(areas) = &node.areas {
                for children in areas.values() {
                    walk(children, seen, out);
                }
            }
        }
    }

    let mut seen = HashSet::new();
    let mut out = vec![];
    walk(configuration, &mut seen, &mut out);
    out
}

/// The publish pipeline - resolves, lints, renders and writes pages
pub struct PublishPipeline {
    config: ServiceConfig,
    tables: Arc<dyn KeyValueStore>,
    objects: Arc<dyn ObjectStore>,
    linter: Linter,
}

impl PublishPipeline {
    pub fn new(
        config: ServiceConfig,
        tables: Arc<dyn KeyValueStore>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            config,
            tables,
            objects,
            linter: Linter::new(),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Fetch a page record by slug.
    pub fn load_page(&self, slug: &str) -> Result<PageRecord, PipelineError> {
        let item = self
            .tables
            .get(&self.config.pages_table, slug)?
            .ok_or_else(|| PipelineError::MissingPageRecord(slug.to_string()))?;
        Ok(serde_json::from_value(item.into())?)
    }

    /// Fetch the widget records for `slugs` and resolve their HTML.
    ///
    /// Fails listing every slug the widgets table did not return.
    pub fn load_library(&self, slugs: &[String]) -> Result<WidgetLibrary, PipelineError> {
        if slugs.is_empty() {
            return Ok(WidgetLibrary::new());
        }

        let items = self.tables.batch_get(&self.config.widgets_table, slugs)?;
        let records = items
            .into_iter()
            .map(|item| serde_json::from_value::<WidgetRecord>(item.into()))
            .collect::<Result<Vec<_>, _>>()?;

        let returned: HashSet<&str> = records.iter().map(|r| r.slug.as_str()).collect();
        let missing: Vec<String> = slugs
            .iter()
            .filter(|s| !returned.contains(s.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::MissingWidgetDefinitions(missing));
        }

        let definitions = records
            .par_iter()
            .map(|record| self.fetch_widget_html(record))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(definitions.into_iter().collect())
    }

    fn fetch_widget_html(&self, record: &WidgetRecord) -> Result<WidgetDefinition, PipelineError> {
        let html = self
            .objects
            .get_text(&self.config.definitions_bucket, &record.html)?;
        debug!(slug = %record.slug, key = %record.html, "Fetched widget html");
        Ok(WidgetDefinition::from_record(record, html))
    }

    /// Fetch `<template>PageTemplate.html` from the definitions bucket.
    pub fn fetch_page_template(&self, template: &str) -> Result<String, PipelineError> {
        let key = page_template_key(template);
        match self.objects.get_text(&self.config.definitions_bucket, &key) {
            Ok(body) => Ok(body),
            Err(e) if e.is_not_found() => Err(PipelineError::MissingTemplate(template.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve, lint and render a page without writing it.
    pub fn preview(&self, slug: &str) -> Result<RenderedPage, PipelineError> {
        let page = self.load_page(slug)?;
        self.render_record(&page)
    }

    /// Resolve, lint and render an already loaded page record.
    pub fn render_record(&self, page: &PageRecord) -> Result<RenderedPage, PipelineError> {
        let slugs = collect_widget_slugs(&page.configuration);
        debug!(slug = %page.slug, widgets = slugs.len(), "Resolving widgets");

        let library = self.load_library(&slugs)?;
        let page_template = self.fetch_page_template(&page.template)?;

        let mode = self.config.lint_failure_mode;
        let lint = self
            .linter
            .lint(&page_template, &page.props, &page.configuration, &library);
        lint.log(&page.slug, mode);
        if lint.blocks(mode) {
            let summary = lint
                .findings
                .iter()
                .map(|f| format!("{}: {}", f.rule, f.message))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(PipelineError::LintBlocked {
                slug: page.slug.clone(),
                summary,
            });
        }

        let html = Renderer::new(&library).render_page(
            &page_template,
            &page.props,
            &page.configuration,
        )?;

        let render_hash = compute_render_hash(
            &page.slug,
            &page_template,
            page,
            &library.list(),
            ENGINE_VERSION,
        )?;

        Ok(RenderedPage {
            slug: page.slug.clone(),
            template: page.template.clone(),
            html,
            render_hash,
            lint,
        })
    }

    /// Render a page and write it to the target site bucket.
    pub fn publish(&self, slug: &str) -> Result<PublishReceipt, PipelineError> {
        let page = self.load_page(slug)?;
        let rendered = self.render_record(&page)?;
        let key = page.publish_key();
        let bucket = &self.config.target_site_bucket;

        let hash = content_hash(&rendered.html);
        self.objects
            .put(bucket, &key, rendered.html.into_bytes(), HTML_CONTENT_TYPE)?;

        info!(slug, bucket = %bucket, key = %key, hash = %hash, "Published page");

        Ok(PublishReceipt {
            id: Uuid::new_v4().to_string(),
            slug: page.slug,
            bucket: bucket.clone(),
            key,
            content_hash: hash,
            render_hash: rendered.render_hash,
            engine_version: ENGINE_VERSION.to_string(),
            published_at: Utc::now(),
            lint: rendered.lint,
        })
    }
}
