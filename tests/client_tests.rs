use async_trait::async_trait;
use rand::distributions::{Alphanumeric, DistString};
use rand::Rng;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tumblr_rest::oauth::{parse_authorization_header, sign};
use tumblr_rest::{
    endpoints, Attachment, Body, CallArgs, Client, ClientOptions, HttpMethod, LogicalRequest,
    OAuth1Credentials, ParamValue, Params, Transport, TransportError, TransportResponse, TumblrError, WireRequest,
};

const OK_BODY: &str = r#"{"meta":{"status":200,"msg":"OK"},"response":{"ok":true}}"#;

/// Records every request and answers from a queue of canned responses
#[derive(Default)]
struct Recorder {
    requests: Mutex<Vec<WireRequest>>,
    replies: Mutex<VecDeque<std::result::Result<TransportResponse, TransportError>>>,
}

impl Recorder {
    fn replying(status: u16, body: &str) -> Arc<Self> {
        let recorder = Recorder::default();
        recorder.push(status, body);
        Arc::new(recorder)
    }

    fn push(&self, status: u16, body: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(TransportResponse::new(status, body.as_bytes().to_vec())));
    }

    fn failing(error: TransportError) -> Arc<Self> {
        let recorder = Recorder::default();
        recorder.replies.lock().unwrap().push_back(Err(error));
        Arc::new(recorder)
    }

    fn last(&self) -> WireRequest {
        self.requests.lock().unwrap().last().cloned().expect("no request sent")
    }

    fn count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for Recorder {
    async fn send(&self, request: WireRequest) -> std::result::Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(TransportResponse::new(200, OK_BODY.as_bytes().to_vec())))
    }
}

fn oauth_options() -> ClientOptions {
    ClientOptions::oauth1("consumer", "consumer-secret", "token", "token-secret")
}

fn oauth_credentials() -> OAuth1Credentials {
    OAuth1Credentials::new("consumer", "consumer-secret", "token", "token-secret")
}

fn header(request: &WireRequest, name: &str) -> Option<String> {
    request
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[tokio::test]
async fn test_api_key_get_root() -> anyhow::Result<()> {
    let transport = Recorder::replying(200, OK_BODY);
    let client = Client::with_transport(ClientOptions::api_key("abc123"), transport.clone())?;

    let value = client.send(LogicalRequest::get("/")).await?;
    assert_eq!(value, json!({"ok": true}));

    let request = transport.last();
    assert_eq!(request.url.path(), "/");
    assert_eq!(request.query_param("api_key").as_deref(), Some("abc123"));
    assert!(request.headers.get("authorization").is_none());
    Ok(())
}

#[tokio::test]
async fn test_unauthenticated_request_has_no_credentials() -> anyhow::Result<()> {
    let transport = Recorder::replying(200, OK_BODY);
    let client = Client::with_transport(ClientOptions::default(), transport.clone())?;

    client
        .get_request("/v2/tagged", [("tag".to_string(), ParamValue::from("cats"))].into_iter().collect())
        .await?;

    let request = transport.last();
    assert_eq!(request.query_pairs(), vec![("tag".to_string(), "cats".to_string())]);
    assert!(request.headers.get("authorization").is_none());
    Ok(())
}

#[tokio::test]
async fn test_oauth_multipart_signature_excludes_body() -> anyhow::Result<()> {
    let transport = Recorder::replying(201, r#"{"meta":{"status":201,"msg":"Created"},"response":{"id":1}}"#);
    let client = Client::with_transport(oauth_options(), transport.clone())?;

    client
        .send(
            LogicalRequest::post("/v2/blog/staff.tumblr.com/post")
                .param("type", "photo")
                .param("caption", "a mushroom")
                .param("data", Attachment::new(b"\x89PNG".to_vec()).with_content_type("image/png")),
        )
        .await?;

    let request = transport.last();
    assert!(matches!(request.body, Body::Multipart { .. }));
    assert!(header(&request, "content-type")
        .unwrap()
        .starts_with("multipart/form-data; boundary="));
    assert_eq!(
        header(&request, "content-length").unwrap(),
        request.body.len().to_string()
    );

    let auth = parse_authorization_header(&header(&request, "authorization").unwrap()).unwrap();
    let field = |name: &str| {
        auth.iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
            .unwrap()
    };
    assert_eq!(field("oauth_consumer_key"), "consumer");
    assert_eq!(field("oauth_token"), "token");
    assert_eq!(field("oauth_signature_method"), "HMAC-SHA1");
    assert_eq!(field("oauth_version"), "1.0");

    let timestamp: i64 = field("oauth_timestamp").parse()?;
    let nonce = field("oauth_nonce");
    let creds = oauth_credentials();
    let url = "https://api.tumblr.com/v2/blog/staff.tumblr.com/post";

    let expected = sign(HttpMethod::Post, url, &[], &creds, &nonce, timestamp)?;
    assert_eq!(field("oauth_signature"), expected);

    let with_body = sign(
        HttpMethod::Post,
        url,
        &[
            ("type".to_string(), "photo".to_string()),
            ("caption".to_string(), "a mushroom".to_string()),
        ],
        &creds,
        &nonce,
        timestamp,
    )?;
    assert_ne!(field("oauth_signature"), with_body);
    Ok(())
}

#[tokio::test]
async fn test_oauth_fresh_nonce_per_request() -> anyhow::Result<()> {
    let transport = Arc::new(Recorder::default());
    let client = Client::with_transport(oauth_options(), transport.clone())?;

    client.send(LogicalRequest::get("/v2/user/info")).await?;
    let first = header(&transport.last(), "authorization").unwrap();
    client.send(LogicalRequest::get("/v2/user/info")).await?;
    let second = header(&transport.last(), "authorization").unwrap();

    let nonce = |h: &str| {
        parse_authorization_header(h)
            .unwrap()
            .into_iter()
            .find(|(k, _)| k == "oauth_nonce")
            .unwrap()
            .1
    };
    assert_ne!(nonce(&first), nonce(&second));
    Ok(())
}

#[tokio::test]
async fn test_json_body_round_trips_random_params() -> anyhow::Result<()> {
    let transport = Arc::new(Recorder::default());
    let client = Client::with_transport(ClientOptions::api_key("k"), transport.clone())?;
    let mut rng = rand::thread_rng();

    for _ in 0..20 {
        let mut request = LogicalRequest::post("/v2/user/follow");
        let mut expected = serde_json::Map::new();
        for i in 0..rng.gen_range(1..6) {
            let name = format!("field{i}");
            let value = match rng.gen_range(0..4) {
                0 => json!(Alphanumeric.sample_string(&mut rng, 12)),
                1 => json!(rng.gen::<i32>()),
                2 => json!(rng.gen::<bool>()),
                _ => json!("🍄 ünïcödé"),
            };
            request = request.param(name.clone(), value.clone());
            expected.insert(name, value);
        }

        client.send(request).await?;
        let sent = transport.last();
        let decoded: Value = serde_json::from_slice(sent.body.as_bytes())?;
        assert_eq!(decoded, Value::Object(expected));
        assert_eq!(header(&sent, "content-length").unwrap(), sent.body.len().to_string());
    }
    Ok(())
}

#[tokio::test]
async fn test_emoji_content_length() -> anyhow::Result<()> {
    let transport = Arc::new(Recorder::default());
    let client = Client::with_transport(ClientOptions::default(), transport.clone())?;

    client
        .send(LogicalRequest::post("/v2/blog/staff.tumblr.com/posts").param("powerup", "🍄"))
        .await?;

    let sent = transport.last();
    let body = "{\"powerup\":\"🍄\"}";
    assert_eq!(sent.body.as_bytes(), body.as_bytes());
    assert_eq!(header(&sent, "content-length").unwrap(), body.len().to_string());
    assert_ne!(body.len(), body.chars().count());
    Ok(())
}

#[tokio::test]
async fn test_http_error_surfaces() -> anyhow::Result<()> {
    let transport = Recorder::replying(404, r#"{"meta":{"status":404,"msg":"Not Found"},"response":[]}"#);
    let client = Client::with_transport(ClientOptions::api_key("k"), transport)?;

    let err = client
        .send(LogicalRequest::get("/v2/blog/nobody.tumblr.com/info"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("404"));
    assert!(err.to_string().contains("Not Found"));
    Ok(())
}

#[tokio::test]
async fn test_malformed_body_is_envelope_error() -> anyhow::Result<()> {
    let transport = Recorder::replying(200, "not json at all");
    let client = Client::with_transport(ClientOptions::default(), transport)?;

    let err = client.send(LogicalRequest::get("/v2/user/info")).await.unwrap_err();
    match err {
        TumblrError::Envelope { status, body, .. } => {
            assert_eq!(status, 200);
            assert_eq!(body, "not json at all");
        }
        other => panic!("expected envelope error, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_transport_error_propagates_unchanged() -> anyhow::Result<()> {
    let transport = Recorder::failing(TransportError::timed_out("deadline elapsed"));
    let client = Client::with_transport(ClientOptions::default(), transport.clone())?;

    let err = client.send(LogicalRequest::get("/v2/user/info")).await.unwrap_err();
    match err {
        TumblrError::Transport(inner) => {
            assert!(inner.is_timeout());
            assert_eq!(inner.to_string(), "deadline elapsed");
        }
        other => panic!("expected transport error, got {other:?}"),
    }
    assert_eq!(transport.count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_single_send_per_call() -> anyhow::Result<()> {
    let transport = Recorder::replying(500, r#"{"meta":{"status":500,"msg":"Server Error"}}"#);
    let client = Client::with_transport(ClientOptions::default(), transport.clone())?;

    assert!(client.send(LogicalRequest::get("/v2/user/info")).await.is_err());
    assert_eq!(transport.count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_callback_mode_returns_nothing() -> anyhow::Result<()> {
    let transport = Arc::new(Recorder::default());
    let client = Client::with_transport(ClientOptions::api_key("k"), transport.clone())?;
    let (tx, rx) = tokio::sync::oneshot::channel();

    let dispatch = client.call(
        &endpoints::BLOG_INFO,
        &["staff"],
        CallArgs::new().callback(move |result, raw| {
            let _ = tx.send((result.ok(), raw.map(|r| r.status)));
        }),
    );
    assert!(dispatch.is_callback());
    assert!(dispatch.into_deferred().is_none());

    let (value, status) = rx.await?;
    assert_eq!(value, Some(json!({"ok": true})));
    assert_eq!(status, Some(200));
    assert_eq!(transport.last().url.path(), "/v2/blog/staff.tumblr.com/info");
    Ok(())
}

#[tokio::test]
async fn test_deferred_mode_rejects_on_error() -> anyhow::Result<()> {
    let transport = Recorder::replying(401, r#"{"meta":{"status":401,"msg":"Not Authorized"}}"#);
    let client = Client::with_transport(ClientOptions::default(), transport)?;

    let deferred = client
        .call(&endpoints::USER_INFO, &[], CallArgs::new())
        .into_deferred()
        .expect("deferred without callback");
    let err = deferred.await.unwrap_err();
    assert!(err.is_permission_denied());
    Ok(())
}

#[tokio::test]
async fn test_promise_mode_wraps_callback_calls() -> anyhow::Result<()> {
    let transport = Arc::new(Recorder::default());
    let client = Client::with_transport(ClientOptions::default(), transport.clone())?;
    client.return_promises();

    let called = Arc::new(Mutex::new(false));
    let flag = called.clone();
    let dispatch = client.call(
        &endpoints::USER_DASHBOARD,
        &[],
        CallArgs::new().param("limit", 2).callback(move |_, _| {
            *flag.lock().unwrap() = true;
        }),
    );

    let value = dispatch.into_deferred().expect("promise mode returns deferred").await?;
    assert_eq!(value, json!({"ok": true}));
    assert!(!*called.lock().unwrap());
    assert_eq!(transport.last().query_param("limit").as_deref(), Some("2"));
    Ok(())
}

#[tokio::test]
async fn test_promise_mode_from_options() -> anyhow::Result<()> {
    let options = ClientOptions::from_json_str(r#"{"consumer_key":"k","returnPromises":true}"#)?;
    let client = Client::with_transport(options, Arc::new(Recorder::default()))?;
    assert!(client.promise_mode());
    Ok(())
}

#[tokio::test]
async fn test_endpoint_validation_fails_before_sending() -> anyhow::Result<()> {
    let transport = Arc::new(Recorder::default());
    let client = Client::with_transport(ClientOptions::default(), transport.clone())?;

    let err = client
        .call(&endpoints::REBLOG_POST, &["staff"], CallArgs::new().param("id", "1"))
        .into_deferred()
        .unwrap()
        .await
        .unwrap_err();
    assert!(matches!(err, TumblrError::RequestBuild(ref msg) if msg.contains("reblog_key")));
    assert_eq!(transport.count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_credentials_never_leave_base_origin() -> anyhow::Result<()> {
    for options in [oauth_options(), ClientOptions::api_key("SECRETKEY")] {
        let transport = Arc::new(Recorder::default());
        let client = Client::with_transport(options, transport.clone())?;

        for path in ["//evil.example/steal", "/\\evil.example/steal"] {
            let err = client.send(LogicalRequest::get(path)).await.unwrap_err();
            assert!(matches!(err, TumblrError::RequestBuild(_)), "{path} should be rejected");
            let err = client.post_request(path, Params::new()).await.unwrap_err();
            assert!(matches!(err, TumblrError::RequestBuild(_)));
        }
        assert_eq!(transport.count(), 0);
    }
    Ok(())
}

#[tokio::test]
async fn test_call_named_and_put_method() -> anyhow::Result<()> {
    let transport = Arc::new(Recorder::default());
    let client = Client::with_transport(oauth_options(), transport.clone())?;

    client
        .call_named(
            "edit_post",
            &["staff", "123"],
            CallArgs::new().param("content", json!([{"type": "text", "text": "hi"}])),
        )
        .into_deferred()
        .unwrap()
        .await?;

    let sent = transport.last();
    assert_eq!(sent.method, HttpMethod::Put);
    assert_eq!(sent.url.path(), "/v2/blog/staff.tumblr.com/posts/123");
    let body: Value = serde_json::from_slice(sent.body.as_bytes())?;
    assert_eq!(body, json!({"content": [{"type": "text", "text": "hi"}]}));

    let unknown = client
        .call_named("no_such_endpoint", &[], CallArgs::new())
        .into_deferred()
        .unwrap()
        .await;
    assert!(unknown.is_err());
    Ok(())
}

#[tokio::test]
async fn test_legacy_avatar_redirect() -> anyhow::Result<()> {
    let transport = Recorder::replying(
        301,
        r#"{"meta":{"status":301,"msg":"Moved Permanently"},"response":{"avatar_url":"https://64.media.tumblr.com/a.png"}}"#,
    );
    let client = Client::with_transport(ClientOptions::api_key("k"), transport.clone())?;

    let value = client
        .call(&endpoints::BLOG_AVATAR, &["staff", "64"], CallArgs::new())
        .into_deferred()
        .unwrap()
        .await?;
    assert_eq!(value["avatar_url"], "https://64.media.tumblr.com/a.png");
    assert_eq!(transport.last().url.path(), "/v2/blog/staff.tumblr.com/avatar/64");
    Ok(())
}

#[tokio::test]
async fn test_concurrent_calls_share_client() -> anyhow::Result<()> {
    let transport = Arc::new(Recorder::default());
    let client = Client::with_transport(ClientOptions::api_key("k"), transport.clone())?;

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .send(LogicalRequest::get("/v2/tagged").param("tag", format!("t{i}")))
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await??;
    }
    assert_eq!(transport.count(), 8);
    Ok(())
}

#[test]
fn test_partial_oauth_options_rejected() {
    let options = ClientOptions {
        consumer_key: Some("ck".to_string()),
        token: Some("t".to_string()),
        ..ClientOptions::default()
    };
    let result = Client::with_transport(options, Arc::new(Recorder::default()));
    assert!(matches!(result, Err(TumblrError::Config(_))));
}
