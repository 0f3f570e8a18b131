//! Pagewright Core - Static Page Constructor
//!
//! Pages are trees of widget configurations. Publishing resolves every
//! widget a page references, renders the tree into the page template by
//! placeholder substitution, and writes the HTML to a site bucket.
//!
//! # Placeholders
//! - `{{ name }}` - widget property
//! - `{{ renderWidgets.area }}` - rendered children of a widget area
//! - `{{ renderWidgets }}` - the page's root widget sequence
//! - `{{ page.name }}` - page property

pub mod config;
pub mod handlers;
pub mod hashing;
pub mod page;
pub mod pipeline;
pub mod render;
pub mod store;
pub mod templates;
pub mod validation;

pub use config::{ConfigError, ServiceConfig};
pub use handlers::{CmsService, HandlerError, Request, Response};
pub use hashing::{canonical_json, compute_render_hash, content_hash};
pub use page::{PageProps, PageRecord, PageSummary, WidgetConfigNode};
pub use pipeline::{
    collect_widget_slugs, PipelineError, PublishPipeline, PublishReceipt, RenderedPage,
};
pub use render::{render, RenderError, Renderer};
pub use store::{KeyValueStore, ObjectStore, StoreError};
pub use templates::{WidgetDefinition, WidgetLibrary, WidgetRecord};
pub use validation::{lint, FailureMode, LintFinding, LintReport, Linter, Severity};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
