//! Request authentication.
//!
//! API key credentials add an `api_key` query parameter. OAuth1 credentials
//! add an HMAC-SHA1 signed `Authorization` header; the signature covers the
//! method, the URL without its query, the query parameters and the OAuth
//! protocol parameters. Request bodies (JSON or multipart) are never signed.

use crate::credentials::{Credentials, OAuth1Credentials};
use crate::error::{Result, TumblrError};
use crate::request::{HttpMethod, WireRequest};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use sha1::Sha1;
use tracing::debug;
use uuid::Uuid;

type HmacSha1 = Hmac<Sha1>;

pub const SIGNATURE_METHOD: &str = "HMAC-SHA1";
pub const OAUTH_VERSION: &str = "1.0";

/// RFC 3986 percent-encoding: everything but `A-Z a-z 0-9 - . _ ~`
pub fn percent_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Fresh per-request nonce
pub fn generate_nonce() -> String {
    Uuid::new_v4().simple().to_string()
}

/// The OAuth protocol parameters, minus the signature
pub fn protocol_params(credentials: &OAuth1Credentials, nonce: &str, timestamp: i64) -> Vec<(String, String)> {
    vec![
        ("oauth_consumer_key".to_string(), credentials.consumer_key.clone()),
        ("oauth_nonce".to_string(), nonce.to_string()),
        ("oauth_signature_method".to_string(), SIGNATURE_METHOD.to_string()),
        ("oauth_timestamp".to_string(), timestamp.to_string()),
        ("oauth_token".to_string(), credentials.token.clone()),
        ("oauth_version".to_string(), OAUTH_VERSION.to_string()),
    ]
}

/// Build the signature base string from already-combined parameters
pub fn signature_base_string(method: HttpMethod, base_url: &str, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();

    let normalized = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.as_str(),
        percent_encode(base_url),
        percent_encode(&normalized)
    )
}

/// Compute `oauth_signature` for a request.
///
/// `params` are the signable request parameters (query string, and form
/// fields for url-encoded bodies); the OAuth protocol parameters are added
/// here. The result only depends on the arguments.
pub fn sign(
    method: HttpMethod,
    base_url: &str,
    params: &[(String, String)],
    credentials: &OAuth1Credentials,
    nonce: &str,
    timestamp: i64,
) -> Result<String> {
    let mut all = params.to_vec();
    all.extend(protocol_params(credentials, nonce, timestamp));
    let base_string = signature_base_string(method, base_url, &all);

    let key = format!(
        "{}&{}",
        percent_encode(&credentials.consumer_secret),
        percent_encode(&credentials.token_secret)
    );
    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| TumblrError::Auth(format!("invalid signing key: {e}")))?;
    mac.update(base_string.as_bytes());

    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Value of the `Authorization` header
pub fn authorization_header(
    credentials: &OAuth1Credentials,
    nonce: &str,
    timestamp: i64,
    signature: &str,
) -> String {
    let mut params = protocol_params(credentials, nonce, timestamp);
    params.push(("oauth_signature".to_string(), signature.to_string()));
    params.sort();

    let fields = params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join(", ");

    format!("OAuth {fields}")
}

/// Split an `Authorization: OAuth ...` value back into decoded pairs
pub fn parse_authorization_header(header: &str) -> Option<Vec<(String, String)>> {
    let fields = header.strip_prefix("OAuth ")?;
    fields
        .split(',')
        .map(|field| {
            let (k, v) = field.trim().split_once('=')?;
            let v = v.trim_matches('"');
            let decoded = urlencoding::decode(v).ok()?;
            Some((k.to_string(), decoded.into_owned()))
        })
        .collect()
}

/// Authenticate `request` with a fresh nonce and the current time
pub fn sign_request(request: &mut WireRequest, credentials: &Credentials) -> Result<()> {
    sign_request_with(request, credentials, &generate_nonce(), Utc::now().timestamp())
}

/// Authenticate `request` with an explicit nonce and timestamp
pub fn sign_request_with(
    request: &mut WireRequest,
    credentials: &Credentials,
    nonce: &str,
    timestamp: i64,
) -> Result<()> {
    match credentials {
        Credentials::None => {}
        Credentials::ApiKey(key) => {
            if key.is_empty() {
                return Err(TumblrError::Auth("api key is empty".to_string()));
            }
            request.url.query_pairs_mut().append_pair("api_key", key);
        }
        Credentials::OAuth1(oauth) => {
            let missing = oauth.missing_fields();
            if !missing.is_empty() {
                return Err(TumblrError::Auth(format!(
                    "OAuth1 credentials have empty fields: {}",
                    missing.join(", ")
                )));
            }

            let signature = sign(
                request.method,
                &request.base_url(),
                &request.query_pairs(),
                oauth,
                nonce,
                timestamp,
            )?;
            let header = authorization_header(oauth, nonce, timestamp, &signature);
            let value = HeaderValue::from_str(&header)
                .map_err(|e| TumblrError::Auth(format!("invalid Authorization header: {e}")))?;
            request.headers.insert(AUTHORIZATION, value);
        }
    }

    debug!(auth = credentials.kind(), method = %request.method, "request authenticated");
    Ok(())
}
