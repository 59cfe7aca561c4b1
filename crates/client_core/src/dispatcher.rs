//! Turns an [`Operation`] into exactly one HTTP call and normalizes the
//! answer into either a JSON value or an [`ErrorPayload`].

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use reqwest::{multipart, Client, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::{Map, Value};
use shared::error::ErrorPayload;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::{auth::AuthState, settings::Settings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        }
    }
}

/// A file carried in a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    Field(Value),
    File(Attachment),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Form(Vec<(String, FormValue)>),
}

impl RequestBody {
    pub fn has_file(&self) -> bool {
        matches!(self, Self::Form(parts) if parts.iter().any(|(_, part)| matches!(part, FormValue::File(_))))
    }
}

/// One request: method, path relative to the API base, and body.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub method: Method,
    pub path: String,
    pub body: RequestBody,
}

impl Operation {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> serde_json::Result<Self> {
        self.body = RequestBody::Json(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Flattens a serializable record into form fields. `null` members are
    /// left out of the form.
    pub fn form_from<T: Serialize>(mut self, body: &T) -> serde_json::Result<Self> {
        let mut parts = match self.body {
            RequestBody::Form(parts) => parts,
            _ => Vec::new(),
        };
        if let Value::Object(fields) = serde_json::to_value(body)? {
            parts.extend(
                fields
                    .into_iter()
                    .filter(|(_, value)| !value.is_null())
                    .map(|(name, value)| (name, FormValue::Field(value))),
            );
        }
        self.body = RequestBody::Form(parts);
        Ok(self)
    }

    pub fn with_file(mut self, name: impl Into<String>, attachment: Attachment) -> Self {
        let mut parts = match self.body {
            RequestBody::Form(parts) => parts,
            _ => Vec::new(),
        };
        parts.push((name.into(), FormValue::File(attachment)));
        self.body = RequestBody::Form(parts);
        self
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Failed(#[from] ErrorPayload),
    #[error("request cancelled")]
    Cancelled,
}

#[derive(Clone)]
pub struct Dispatcher {
    http: Client,
    base_url: Url,
    auth: AuthState,
    cancel: Option<CancellationToken>,
}

impl Dispatcher {
    pub fn new(settings: &Settings, auth: AuthState) -> Result<Self> {
        let mut base_url = Url::parse(&settings.api_base_url)
            .with_context(|| format!("invalid api base url '{}'", settings.api_base_url))?;
        // `Url::join` drops the last segment of a base without a trailing slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let mut builder = Client::builder();
        if let Some(timeout) = settings.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("failed to build http client")?;
        Ok(Self {
            http,
            base_url,
            auth,
            cancel: None,
        })
    }

    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    /// True once the token this dispatcher races has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// A dispatcher whose requests race `token`.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            cancel: Some(token),
            ..self.clone()
        }
    }

    pub async fn execute(&self, operation: Operation) -> Result<Value, DispatchError> {
        let url = self.base_url.join(&operation.path).map_err(|e| {
            ErrorPayload::new(format!("invalid request path '{}': {e}", operation.path))
        })?;
        info!(method = ?operation.method, %url, "dispatching request");

        let mut request = self.http.request(operation.method.into(), url);
        if let Some(token) = self.auth.access_token().await {
            request = request.bearer_auth(token);
        }
        let request = attach_body(request, operation.body)?;

        let exchange = async {
            let response = request.send().await.map_err(|err| transport_error(&err))?;
            let status = response.status();
            let text = response.text().await.map_err(|err| transport_error(&err))?;
            Ok::<_, ErrorPayload>((status, text))
        };

        let (status, text) = match &self.cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!(path = %operation.path, "request cancelled");
                    return Err(DispatchError::Cancelled);
                }
                exchanged = exchange => exchanged?,
            },
            None => exchange.await?,
        };

        if status.is_success() {
            debug!(%status, path = %operation.path, "request succeeded");
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_str(&text).map_err(|err| {
                DispatchError::Failed(
                    ErrorPayload::new(format!("malformed response body: {err}"))
                        .with_status(status.as_u16()),
                )
            });
        }

        let payload = normalize_error(status, &text);
        warn!(%status, path = %operation.path, "request failed: {}", payload.message);
        Err(DispatchError::Failed(payload))
    }
}

fn attach_body(request: RequestBuilder, body: RequestBody) -> Result<RequestBuilder, ErrorPayload> {
    let multipart_needed = body.has_file();
    Ok(match body {
        RequestBody::Empty => request,
        RequestBody::Json(value) => request.json(&value),
        RequestBody::Form(parts) if multipart_needed => request.multipart(multipart_form(parts)?),
        RequestBody::Form(parts) => {
            let object: Map<String, Value> = parts
                .into_iter()
                .filter_map(|(name, part)| match part {
                    FormValue::Field(value) => Some((name, value)),
                    FormValue::File(_) => None,
                })
                .collect();
            request.json(&Value::Object(object))
        }
    })
}

fn multipart_form(parts: Vec<(String, FormValue)>) -> Result<multipart::Form, ErrorPayload> {
    let mut form = multipart::Form::new();
    for (name, part) in parts {
        form = match part {
            FormValue::Field(value) => form.text(name, form_text(value)),
            FormValue::File(Attachment {
                filename,
                mime_type,
                bytes,
            }) => {
                let mut file = multipart::Part::bytes(bytes).file_name(filename);
                if let Some(mime) = mime_type {
                    file = file
                        .mime_str(&mime)
                        .map_err(|e| ErrorPayload::new(format!("invalid mime type '{mime}': {e}")))?;
                }
                form.part(name, file)
            }
        };
    }
    Ok(form)
}

/// Strings go in as-is; everything else is sent as its JSON text, so
/// booleans and arrays survive the form encoding.
fn form_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

fn transport_error(err: &reqwest::Error) -> ErrorPayload {
    if err.is_timeout() {
        return ErrorPayload::new("Request timed out");
    }
    ErrorPayload::new(err.to_string())
}

/// Maps a non-2xx answer onto an [`ErrorPayload`], recognising
/// `{"error": "..."}`, `{"error": {field: [...]}}`, `{"detail": "..."}`,
/// `{"message": "..."}` and bare `{field: [...]}` bodies.
pub fn normalize_error(status: StatusCode, body: &str) -> ErrorPayload {
    let fallback = || {
        let text = body.trim();
        if text.is_empty() || text.starts_with('<') {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()))
        } else {
            text.to_string()
        }
    };

    let payload = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(object)) => from_error_object(&object).unwrap_or_else(|| ErrorPayload::new(fallback())),
        Ok(Value::String(message)) if !message.is_empty() => ErrorPayload::new(message),
        _ => ErrorPayload::new(fallback()),
    };
    payload.with_status(status.as_u16())
}

fn from_error_object(object: &Map<String, Value>) -> Option<ErrorPayload> {
    match object.get("error") {
        Some(Value::String(message)) => return Some(ErrorPayload::new(message.clone())),
        Some(Value::Object(fields)) => {
            return Some(ErrorPayload::validation(field_messages(fields)));
        }
        _ => {}
    }
    for key in ["detail", "message"] {
        if let Some(Value::String(message)) = object.get(key) {
            return Some(ErrorPayload::new(message.clone()));
        }
    }

    let looks_like_field_map = !object.is_empty()
        && object
            .values()
            .all(|value| matches!(value, Value::Array(items) if items.iter().all(Value::is_string)));
    looks_like_field_map.then(|| ErrorPayload::validation(field_messages(object)))
}

/// Field errors arrive as a string or a list of strings; lists are joined.
fn field_messages(fields: &Map<String, Value>) -> BTreeMap<String, String> {
    fields
        .iter()
        .filter_map(|(field, value)| {
            let message = match value {
                Value::String(message) => message.clone(),
                Value::Array(items) => items
                    .iter()
                    .map(|item| match item {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(" "),
                Value::Null => return None,
                other => other.to_string(),
            };
            Some((field.clone(), message))
        })
        .collect()
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;
