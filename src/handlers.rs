//! Request handlers for page and widget management.
//!
//! Handlers are transport agnostic: they take a [`Request`] carrying query
//! parameters and an optional JSON body, and return a [`Response`] with a
//! status code, headers and body. Every response allows any origin.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

use crate::config::ServiceConfig;
use crate::page::{PageRecord, PageSummary};
use crate::pipeline::{PipelineError, PublishPipeline, PublishReceipt};
use crate::store::{validate_key, Item, KeyValueStore, ObjectStore, StoreError};
use crate::templates::{PageTemplateRecord, WidgetDetail, WidgetRecord, WidgetSummary};

pub const CORS_HEADER: &str = "Access-Control-Allow-Origin";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    #[serde(default)]
    pub query_string_parameters: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_string_parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Non-empty `slug` query parameter.
    fn slug(&self) -> Result<&str, HandlerError> {
        self.query_string_parameters
            .get("slug")
            .map(String::as_str)
            .filter(|s| !s.is_empty())
            .ok_or(HandlerError::MissingSlug)
    }

    fn json_body<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        let body = self.body.as_deref().unwrap_or_default();
        serde_json::from_str(body).map_err(|e| HandlerError::MalformedPayload(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl Response {
    pub fn new(status_code: u16, body: impl Into<String>) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(CORS_HEADER.to_string(), "*".to_string());
        Self {
            status_code,
            headers,
            body: body.into(),
        }
    }

    pub fn ok_json(value: &impl Serialize) -> Result<Self, HandlerError> {
        Ok(Self::new(200, serde_json::to_string(value)?))
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Parse the body as JSON.
    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Missing 'slug' query parameter")]
    MissingSlug,

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HandlerError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MissingSlug
            | Self::MalformedPayload(_)
            | Self::Store(StoreError::InvalidKey { .. })
            | Self::Pipeline(PipelineError::Store(StoreError::InvalidKey { .. })) => 400,
            Self::NotFound(_) => 404,
            Self::Pipeline(
                PipelineError::MissingPageRecord(_) | PipelineError::MissingTemplate(_),
            ) => 404,
            Self::Pipeline(_) | Self::Store(_) | Self::Serialization(_) => 500,
        }
    }

    pub fn into_response(self) -> Response {
        let status = self.status_code();
        if status >= 500 {
            error!(status, error = %self, "Handler failed");
        }
        Response::new(status, json!({ "error": self.to_string() }).to_string())
    }
}

fn respond(result: Result<Response, HandlerError>) -> Response {
    result.unwrap_or_else(HandlerError::into_response)
}

fn to_item<T: Serialize>(value: &T) -> Result<Item, HandlerError> {
    match serde_json::to_value(value)? {
        Value::Object(item) => Ok(item),
        _ => Err(HandlerError::MalformedPayload("expected a JSON object".into())),
    }
}

fn from_item<T: DeserializeOwned>(item: Item) -> Result<T, HandlerError> {
    Ok(serde_json::from_value(Value::Object(item))?)
}

/// Page and widget management service with injected stores
pub struct CmsService {
    config: ServiceConfig,
    tables: Arc<dyn KeyValueStore>,
    pipeline: PublishPipeline,
}

impl CmsService {
    pub fn new(
        config: ServiceConfig,
        tables: Arc<dyn KeyValueStore>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        let pipeline = PublishPipeline::new(config.clone(), Arc::clone(&tables), objects);
        Self {
            config,
            tables,
            pipeline,
        }
    }

    pub fn pipeline(&self) -> &PublishPipeline {
        &self.pipeline
    }

    /// `GET ?slug` - a single page with defaults applied.
    pub fn get_page(&self, request: &Request) -> Response {
        respond(self.try_get_page(request))
    }

    fn try_get_page(&self, request: &Request) -> Result<Response, HandlerError> {
        let slug = request.slug()?;
        let item = self
            .tables
            .get(&self.config.pages_table, slug)?
            .ok_or_else(|| HandlerError::NotFound(slug.to_string()))?;
        let page: PageRecord = from_item(item)?;
        Response::ok_json(&page)
    }

    /// `POST` page JSON - create or replace a page; echoes the stored page.
    pub fn save_page(&self, request: &Request) -> Response {
        respond(self.try_save_page(request))
    }

    fn try_save_page(&self, request: &Request) -> Result<Response, HandlerError> {
        let page: PageRecord = request.json_body()?;
        if page.slug.is_empty() {
            return Err(HandlerError::MalformedPayload("page slug must not be empty".into()));
        }
        // Slugs become object keys on publish.
        validate_key(&page.slug)?;
        self.tables.put(&self.config.pages_table, to_item(&page)?)?;
        info!(slug = %page.slug, "Saved page");
        Response::ok_json(&page)
    }

    /// `GET` - name and slug of every page.
    pub fn list_pages(&self, _request: &Request) -> Response {
        respond(self.try_list_pages())
    }

    fn try_list_pages(&self) -> Result<Response, HandlerError> {
        let pages = self
            .tables
            .scan(&self.config.pages_table, &["name", "slug"])?
            .into_iter()
            .map(from_item::<PageSummary>)
            .collect::<Result<Vec<_>, _>>()?;
        Response::ok_json(&pages)
    }

    /// `GET ?slug` - a widget's editor-facing definition.
    pub fn get_widget(&self, request: &Request) -> Response {
        respond(self.try_get_widget(request))
    }

    fn try_get_widget(&self, request: &Request) -> Result<Response, HandlerError> {
        let slug = request.slug()?;
        let item = self
            .tables
            .get(&self.config.widgets_table, slug)?
            .ok_or_else(|| HandlerError::NotFound(slug.to_string()))?;
        let widget: WidgetRecord = from_item(item)?;
        Response::ok_json(&WidgetDetail::from(widget))
    }

    /// `GET` - name, slug and preview image of every widget.
    pub fn list_widgets(&self, _request: &Request) -> Response {
        respond(self.try_list_widgets())
    }

    fn try_list_widgets(&self) -> Result<Response, HandlerError> {
        let widgets = self
            .tables
            .scan(&self.config.widgets_table, &["name", "slug", "previewImage"])?
            .into_iter()
            .map(from_item::<WidgetSummary>)
            .collect::<Result<Vec<_>, _>>()?;
        Response::ok_json(&widgets)
    }

    /// `POST [widget]` - bulk create or replace widget records.
    pub fn import_widgets(&self, request: &Request) -> Response {
        respond(self.try_import_widgets(request))
    }

    fn try_import_widgets(&self, request: &Request) -> Result<Response, HandlerError> {
        let widgets: Vec<WidgetRecord> = request.json_body()?;
        let items = widgets.iter().map(to_item).collect::<Result<Vec<_>, _>>()?;
        self.tables.batch_put(&self.config.widgets_table, items)?;
        info!(count = widgets.len(), "Imported widgets");
        Ok(Response::new(200, ""))
    }

    /// `POST [page template]` - bulk create or replace page template records.
    pub fn import_page_templates(&self, request: &Request) -> Response {
        respond(self.try_import_page_templates(request))
    }

    fn try_import_page_templates(&self, request: &Request) -> Result<Response, HandlerError> {
        let templates: Vec<PageTemplateRecord> = request.json_body()?;
        let items = templates.iter().map(to_item).collect::<Result<Vec<_>, _>>()?;
        self.tables
            .batch_put(&self.config.page_templates_table, items)?;
        info!(count = templates.len(), "Imported page templates");
        Ok(Response::new(200, ""))
    }

    /// `POST ?slug` - render a page and write it to the site bucket.
    pub fn publish_page(&self, request: &Request) -> Response {
        respond(self.try_publish_page(request).map(|(response, _)| response))
    }

    /// Like [`publish_page`](Self::publish_page) but also returns the receipt.
    pub fn try_publish_page(
        &self,
        request: &Request,
    ) -> Result<(Response, PublishReceipt), HandlerError> {
        let slug = request.slug()?;
        let receipt = self.pipeline.publish(slug)?;
        Ok((Response::new(200, "{}"), receipt))
    }
}
