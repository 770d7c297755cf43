//! Request building: logical API calls to wire requests.
//!
//! Authentication is applied afterwards by [`crate::oauth::sign_request`].

use crate::error::{Result, TumblrError};
use crate::multipart::Form;
use base64::{engine::general_purpose::STANDARD, Engine};
use indexmap::IndexMap;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT};
use serde_json::{Map, Number, Value};
use std::io::Read;
use url::Url;

/// HTTP methods the API uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binary payload sent as a multipart file part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub data: Vec<u8>,
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

impl Attachment {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Attachment {
            data: data.into(),
            filename: None,
            content_type: None,
        }
    }

    /// Buffer a readable stream
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(Self::new(data))
    }

    /// Decode an already base64-encoded payload
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let data = STANDARD
            .decode(encoded.trim())
            .map_err(|e| TumblrError::RequestBuild(format!("invalid base64 attachment: {e}")))?;
        Ok(Self::new(data))
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// A single request parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    String(String),
    Number(Number),
    Bool(bool),
    Binary(Attachment),
    Array(Vec<ParamValue>),
    /// Structured JSON (objects, null); sent as-is in JSON bodies and as
    /// JSON text elsewhere
    Json(Value),
}

impl ParamValue {
    /// Whether this value, or any nested array item, is binary
    pub fn contains_binary(&self) -> bool {
        match self {
            ParamValue::Binary(_) => true,
            ParamValue::Array(items) => items.iter().any(ParamValue::contains_binary),
            _ => false,
        }
    }

    /// JSON representation for request bodies
    pub fn to_json(&self) -> Result<Value> {
        Ok(match self {
            ParamValue::String(s) => Value::String(s.clone()),
            ParamValue::Number(n) => Value::Number(n.clone()),
            ParamValue::Bool(b) => Value::Bool(*b),
            ParamValue::Json(v) => v.clone(),
            ParamValue::Array(items) => {
                Value::Array(items.iter().map(ParamValue::to_json).collect::<Result<_>>()?)
            }
            ParamValue::Binary(_) => {
                return Err(TumblrError::RequestBuild(
                    "binary values cannot be encoded as JSON".to_string(),
                ))
            }
        })
    }

    // Text used for query strings and multipart text fields.
    fn to_text(&self) -> Option<String> {
        match self {
            ParamValue::String(s) => Some(s.clone()),
            ParamValue::Number(n) => Some(n.to_string()),
            ParamValue::Bool(b) => Some(b.to_string()),
            ParamValue::Json(Value::String(s)) => Some(s.clone()),
            ParamValue::Json(v) => Some(v.to_string()),
            ParamValue::Array(_) | ParamValue::Binary(_) => None,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::String(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::String(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

macro_rules! impl_from_integer {
    ($($t:ty),*) => {
        $(impl From<$t> for ParamValue {
            fn from(v: $t) -> Self {
                ParamValue::Number(Number::from(v))
            }
        })*
    };
}

impl_from_integer!(i32, i64, u32, u64, usize);

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Number::from_f64(v)
            .map(ParamValue::Number)
            .unwrap_or(ParamValue::Json(Value::Null))
    }
}

impl From<Attachment> for ParamValue {
    fn from(v: Attachment) -> Self {
        ParamValue::Binary(v)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(items: Vec<T>) -> Self {
        ParamValue::Array(items.into_iter().map(Into::into).collect())
    }
}

impl From<Value> for ParamValue {
    fn from(v: Value) -> Self {
        match v {
            Value::String(s) => ParamValue::String(s),
            Value::Number(n) => ParamValue::Number(n),
            Value::Bool(b) => ParamValue::Bool(b),
            Value::Array(items) => ParamValue::Array(items.into_iter().map(Into::into).collect()),
            other => ParamValue::Json(other),
        }
    }
}

/// Ordered request parameters
pub type Params = IndexMap<String, ParamValue>;

/// Convert a JSON object into ordered parameters
pub fn params_from_value(value: Value) -> Result<Params> {
    match value {
        Value::Object(map) => Ok(map.into_iter().map(|(k, v)| (k, v.into())).collect()),
        Value::Null => Ok(Params::new()),
        other => Err(TumblrError::RequestBuild(format!(
            "parameters must be a JSON object, got {other}"
        ))),
    }
}

/// An API call before it is turned into HTTP
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalRequest {
    pub method: HttpMethod,
    /// Absolute path, placeholders already substituted; may carry a query string
    pub path: String,
    pub params: Params,
}

impl LogicalRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        LogicalRequest {
            method,
            path: path.into(),
            params: Params::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    /// Add one parameter
    pub fn param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Replace all parameters
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }
}

/// Body of a wire request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// No body; any parameters travel in the query string
    Empty,
    Json(Vec<u8>),
    Multipart { boundary: String, bytes: Vec<u8> },
}

impl Body {
    pub fn len(&self) -> usize {
        match self {
            Body::Empty => 0,
            Body::Json(bytes) | Body::Multipart { bytes, .. } => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Body::Empty => &[],
            Body::Json(bytes) | Body::Multipart { bytes, .. } => bytes,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Body::Empty => "empty",
            Body::Json(_) => "json",
            Body::Multipart { .. } => "multipart",
        }
    }
}

/// A fully resolved HTTP request, built once and sent once
#[derive(Debug, Clone)]
pub struct WireRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Body,
}

impl WireRequest {
    /// Query string pairs, decoded, in URL order
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    /// Look up the first query parameter with `name`
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    /// URL with query and fragment removed
    pub fn base_url(&self) -> String {
        let mut url = self.url.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.to_string()
    }
}

// Requests never leave the configured origin, whatever the path looks like.
fn resolve_url(base_url: &Url, path: &str) -> Result<Url> {
    if path.starts_with("//") || path.starts_with("/\\") {
        return Err(TumblrError::RequestBuild(format!(
            "path must not name a host: {path:?}"
        )));
    }

    let (path_part, query) = match path.split_once('?') {
        Some((p, q)) => (p, Some(q).filter(|q| !q.is_empty())),
        None => (path, None),
    };

    let mut url = base_url.clone();
    url.set_path(path_part);
    url.set_query(query);
    url.set_fragment(None);

    if url.origin() != base_url.origin() {
        return Err(TumblrError::RequestBuild(format!(
            "path {path:?} resolves outside {}",
            base_url.origin().ascii_serialization()
        )));
    }
    Ok(url)
}

/// Build the wire request for `request`, without authentication
pub fn build_request(request: &LogicalRequest, base_url: &Url, user_agent: &str) -> Result<WireRequest> {
    if !request.path.starts_with('/') {
        return Err(TumblrError::RequestBuild(format!(
            "path must be absolute: {:?}",
            request.path
        )));
    }
    if let Some(segment) = request
        .path
        .split(|c| c == '/' || c == '?')
        .find(|segment| segment.starts_with(':'))
    {
        return Err(TumblrError::RequestBuild(format!(
            "unresolved path placeholder {segment} in {}",
            request.path
        )));
    }

    let mut url = resolve_url(base_url, &request.path)?;
    let params = promote_base64_data(&request.params)?;

    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(user_agent)
            .map_err(|e| TumblrError::RequestBuild(format!("invalid user agent: {e}")))?,
    );

    let body = match request.method {
        HttpMethod::Get => {
            let mut pairs = Vec::new();
            for (name, value) in &params {
                flatten_text(name, value, &mut pairs)?;
            }
            if !pairs.is_empty() {
                url.query_pairs_mut().extend_pairs(pairs);
            }
            Body::Empty
        }
        HttpMethod::Post | HttpMethod::Put => {
            if params.is_empty() {
                Body::Empty
            } else if params.values().any(ParamValue::contains_binary) {
                let mut form = Form::new();
                for (name, value) in &params {
                    append_part(&mut form, name.clone(), value)?;
                }
                let content_type = HeaderValue::from_str(&form.content_type())
                    .map_err(|e| TumblrError::RequestBuild(format!("invalid boundary: {e}")))?;
                headers.insert(CONTENT_TYPE, content_type);
                Body::Multipart {
                    boundary: form.boundary().to_string(),
                    bytes: form.encode(),
                }
            } else {
                let mut object = Map::new();
                for (name, value) in &params {
                    object.insert(name.clone(), value.to_json()?);
                }
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                Body::Json(serde_json::to_vec(&Value::Object(object))?)
            }
        }
    };

    if request.method != HttpMethod::Get {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
    }

    Ok(WireRequest {
        method: request.method,
        url,
        headers,
        body,
    })
}

// A `data64` parameter carries base64 file content; send it as the `data` file part.
fn promote_base64_data(params: &Params) -> Result<Params> {
    if !params.contains_key("data64") {
        return Ok(params.clone());
    }
    if params.contains_key("data") {
        return Err(TumblrError::RequestBuild(
            "parameters may contain data or data64, not both".to_string(),
        ));
    }

    fn decode(value: &ParamValue) -> Result<ParamValue> {
        match value {
            ParamValue::String(encoded) => Ok(ParamValue::Binary(Attachment::from_base64(encoded)?)),
            ParamValue::Array(items) => Ok(ParamValue::Array(items.iter().map(decode).collect::<Result<_>>()?)),
            ParamValue::Binary(_) => Ok(value.clone()),
            other => Err(TumblrError::RequestBuild(format!(
                "data64 must be a base64 string, got {other:?}"
            ))),
        }
    }

    params
        .iter()
        .map(|(name, value)| {
            if name == "data64" {
                Ok(("data".to_string(), decode(value)?))
            } else {
                Ok((name.clone(), value.clone()))
            }
        })
        .collect()
}

fn flatten_text(name: &str, value: &ParamValue, out: &mut Vec<(String, String)>) -> Result<()> {
    match value {
        ParamValue::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten_text(&format!("{name}[{i}]"), item, out)?;
            }
        }
        ParamValue::Binary(_) => {
            return Err(TumblrError::RequestBuild(format!(
                "binary parameter {name} can only be sent in a POST or PUT body"
            )))
        }
        scalar => {
            if let Some(text) = scalar.to_text() {
                out.push((name.to_string(), text));
            }
        }
    }
    Ok(())
}

fn append_part(form: &mut Form, name: String, value: &ParamValue) -> Result<()> {
    match value {
        ParamValue::Binary(attachment) => {
            form.file(
                name.clone(),
                attachment.filename.clone().unwrap_or(name),
                attachment
                    .content_type
                    .clone()
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
                attachment.data.clone(),
            );
        }
        ParamValue::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                append_part(form, format!("{name}[{i}]"), item)?;
            }
        }
        scalar => {
            if let Some(text) = scalar.to_text() {
                form.text(name, text);
            }
        }
    }
    Ok(())
}
