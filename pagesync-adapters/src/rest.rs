//! Generic JSON-over-HTTP document service.
//!
//! ```text
//! POST   {base}/{collection}        -> 200/201 {"id": "<string>" | <number>}
//! PUT    {base}/{collection}/{id}   -> 200/204
//! DELETE {base}/{collection}/{id}   -> 200/204
//! GET    {base}/{collection}/{id}   -> 200 {"id", "title", "content", "updated_at"}
//! ```
//!
//! `ureq` is blocking, so every exchange (request and body) runs on the
//! blocking pool with the socket timeout set to whatever is left of the call
//! deadline.

use std::fmt;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use pagesync_core::{AuthConfig, BackendName, Document, DocumentId, RestBackend};
use pagesync_sync::{AdapterError, CallContext, DocumentAdapter};

use crate::error::BuildError;

const CREATED: &[u16] = &[200, 201];
const WRITTEN: &[u16] = &[200, 204];
const FOUND: &[u16] = &[200];

/// Longest slice of an error body carried into a failure message.
const MAX_ERROR_BODY: usize = 200;

/// A resolved auth header. The value is a secret and never printed.
#[derive(Clone)]
struct AuthHeader {
    name: String,
    value: String,
}

impl fmt::Debug for AuthHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthHeader")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .finish()
    }
}

#[derive(Clone)]
pub struct RestAdapter {
    name: BackendName,
    /// `{base}/{collection}`, no trailing slash.
    endpoint: String,
    auth: Option<AuthHeader>,
    agent: ureq::Agent,
}

impl fmt::Debug for RestAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestAdapter")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("auth", &self.auth)
            .finish()
    }
}

impl RestAdapter {
    /// Unauthenticated adapter for `{base_url}/{collection}`.
    pub fn new(
        name: impl Into<BackendName>,
        base_url: &str,
        collection: &str,
    ) -> Result<Self, BuildError> {
        let name = name.into();
        let base = base_url.trim_end_matches('/');
        let has_host = base
            .split_once("://")
            .map(|(scheme, rest)| matches!(scheme, "http" | "https") && !rest.is_empty())
            .unwrap_or(false);
        if !has_host {
            return Err(BuildError::InvalidBaseUrl {
                backend: name,
                url: base_url.to_string(),
            });
        }
        let agent = ureq::AgentBuilder::new()
            .user_agent(concat!("pagesync/", env!("CARGO_PKG_VERSION")))
            .build();
        Ok(Self {
            endpoint: format!("{base}/{}", collection.trim_matches('/')),
            name,
            auth: None,
            agent,
        })
    }

    /// Build from config, reading secrets from the process environment.
    pub fn from_config(name: impl Into<BackendName>, config: &RestBackend) -> Result<Self, BuildError> {
        Self::from_config_with(name, config, |var| std::env::var(var).ok())
    }

    /// Build from config, resolving secret variable names through `lookup`.
    pub fn from_config_with<F>(
        name: impl Into<BackendName>,
        config: &RestBackend,
        lookup: F,
    ) -> Result<Self, BuildError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let adapter = Self::new(name, &config.base_url, &config.collection)?;
        let auth = resolve_auth(&adapter.name, &config.auth, lookup)?;
        Ok(Self { auth, ..adapter })
    }

    /// Send `name: value` on every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.auth = Some(AuthHeader {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn document_url(&self, id: &DocumentId) -> Result<String, AdapterError> {
        let raw = id.as_str();
        let unaddressable = raw.is_empty()
            || raw
                .chars()
                .any(|c| matches!(c, '/' | '?' | '#' | '%') || c.is_whitespace() || c.is_control());
        if unaddressable {
            return Err(AdapterError::InvalidIdentity(raw.to_string()));
        }
        Ok(format!("{}/{raw}", self.endpoint))
    }

    fn request(&self, method: &str, url: &str, ctx: &CallContext) -> Result<ureq::Request, AdapterError> {
        let mut request = self
            .agent
            .request(method, url)
            .set("Accept", "application/json");
        match ctx.remaining() {
            Some(left) if left.is_zero() => return Err(AdapterError::Timeout),
            Some(left) => request = request.timeout(left),
            None => {}
        }
        if let Some(auth) = &self.auth {
            request = request.set(&auth.name, &auth.value);
        }
        Ok(request)
    }
}

fn resolve_auth<F>(
    backend: &BackendName,
    auth: &AuthConfig,
    lookup: F,
) -> Result<Option<AuthHeader>, BuildError>
where
    F: Fn(&str) -> Option<String>,
{
    let secret = |var: &str| {
        lookup(var)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| BuildError::MissingSecret {
                backend: backend.clone(),
                var: var.to_string(),
            })
    };
    let header = match auth {
        AuthConfig::None => return Ok(None),
        AuthConfig::Basic {
            username,
            password_env,
        } => AuthHeader {
            name: "Authorization".to_string(),
            value: format!(
                "Basic {}",
                STANDARD.encode(format!("{username}:{}", secret(password_env)?))
            ),
        },
        AuthConfig::Bearer { token_env } => AuthHeader {
            name: "Authorization".to_string(),
            value: format!("Bearer {}", secret(token_env)?),
        },
        AuthConfig::Header { name, value_env } => AuthHeader {
            name: name.clone(),
            value: secret(value_env)?,
        },
    };
    if header.value.contains(['\r', '\n']) || header.name.trim().is_empty() {
        return Err(BuildError::InvalidHeader {
            backend: backend.clone(),
            header: header.name,
        });
    }
    Ok(Some(header))
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct PageBody<'a> {
    id: &'a str,
    title: &'a str,
    content: &'a str,
    updated_at: String,
}

impl<'a> PageBody<'a> {
    fn from_document(doc: &'a Document) -> Self {
        Self {
            id: doc.id.as_str(),
            title: &doc.title,
            content: &doc.content,
            updated_at: doc.timestamp.to_rfc3339(),
        }
    }

    fn to_json(&self) -> Result<Value, AdapterError> {
        serde_json::to_value(self).map_err(|e| AdapterError::MalformedResponse(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct CreatedBody {
    id: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct PageRecord {
    title: Option<String>,
    content: Option<String>,
    updated_at: Option<String>,
}

fn parse_created(body: CreatedBody) -> Result<String, AdapterError> {
    match body.id {
        Some(Value::String(id)) if !id.is_empty() => Ok(id),
        Some(Value::Number(id)) => Ok(id.to_string()),
        Some(other) => Err(AdapterError::MalformedResponse(format!(
            "create returned unusable id {other}"
        ))),
        None => Err(AdapterError::MalformedResponse(
            "create response has no id".to_string(),
        )),
    }
}

fn parse_record(id: DocumentId, record: PageRecord) -> Result<Document, AdapterError> {
    let missing = |field: &str| AdapterError::MalformedResponse(format!("missing field '{field}'"));
    let title = record.title.ok_or_else(|| missing("title"))?;
    let content = record.content.ok_or_else(|| missing("content"))?;
    let updated_at = record.updated_at.ok_or_else(|| missing("updated_at"))?;
    let timestamp = DateTime::parse_from_rfc3339(&updated_at)
        .map_err(|e| {
            AdapterError::MalformedResponse(format!("updated_at '{updated_at}' is not RFC 3339: {e}"))
        })?
        .with_timezone(&Utc);
    Ok(Document {
        id,
        title,
        content,
        timestamp,
    })
}

// ---------------------------------------------------------------------------
// Exchange
// ---------------------------------------------------------------------------

/// Send `request` on the blocking pool, check the status against `expect`,
/// and hand the response to `parse`.
async fn exchange<T, F>(
    request: ureq::Request,
    body: Option<Value>,
    expect: &'static [u16],
    parse: F,
) -> Result<T, AdapterError>
where
    T: Send + 'static,
    F: FnOnce(ureq::Response) -> Result<T, AdapterError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let sent = match body {
            Some(json) => request.send_json(json),
            None => request.call(),
        };
        let response = sent.map_err(from_ureq)?;
        if !expect.contains(&response.status()) {
            return Err(status_error(response.status(), response));
        }
        parse(response)
    })
    .await
    .map_err(|e| AdapterError::Transport(format!("request task failed: {e}")))?
}

fn from_ureq(err: ureq::Error) -> AdapterError {
    match err {
        ureq::Error::Status(status, response) => status_error(status, response),
        ureq::Error::Transport(transport) => AdapterError::Transport(transport.to_string()),
    }
}

fn status_error(status: u16, response: ureq::Response) -> AdapterError {
    let status_text = response.status_text().to_string();
    let body = response.into_string().unwrap_or_default();
    let message = match body.trim() {
        "" => status_text,
        text => text.chars().take(MAX_ERROR_BODY).collect(),
    };
    AdapterError::Status { status, message }
}

fn malformed(err: std::io::Error) -> AdapterError {
    AdapterError::MalformedResponse(err.to_string())
}

#[async_trait]
impl DocumentAdapter for RestAdapter {
    fn name(&self) -> &BackendName {
        &self.name
    }

    async fn create(&self, ctx: &CallContext, doc: &Document) -> Result<String, AdapterError> {
        let body = PageBody::from_document(doc).to_json()?;
        let request = self.request("POST", &self.endpoint, ctx)?;
        exchange(request, Some(body), CREATED, |response| {
            parse_created(response.into_json().map_err(malformed)?)
        })
        .await
    }

    async fn update(&self, ctx: &CallContext, doc: &Document) -> Result<(), AdapterError> {
        let url = self.document_url(&doc.id)?;
        let body = PageBody::from_document(doc).to_json()?;
        let request = self.request("PUT", &url, ctx)?;
        exchange(request, Some(body), WRITTEN, |_| Ok(())).await
    }

    async fn delete(&self, ctx: &CallContext, id: &DocumentId) -> Result<(), AdapterError> {
        let url = self.document_url(id)?;
        let request = self.request("DELETE", &url, ctx)?;
        exchange(request, None, WRITTEN, |_| Ok(())).await
    }

    async fn read(&self, ctx: &CallContext, id: &DocumentId) -> Result<Document, AdapterError> {
        let url = self.document_url(id)?;
        let request = self.request("GET", &url, ctx)?;
        let id = id.clone();
        exchange(request, None, FOUND, move |response| {
            parse_record(id, response.into_json().map_err(malformed)?)
        })
        .await
    }
}
