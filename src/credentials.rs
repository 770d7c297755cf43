use crate::client::ClientOptions;
use crate::error::{Result, TumblrError};

/// OAuth1 consumer and token pair used to sign requests.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuth1Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub token: String,
    pub token_secret: String,
}

impl OAuth1Credentials {
    pub fn new(
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        token: impl Into<String>,
        token_secret: impl Into<String>,
    ) -> Self {
        OAuth1Credentials {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            token: token.into(),
            token_secret: token_secret.into(),
        }
    }

    /// Names of the fields that are empty, in declaration order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("consumer_key", &self.consumer_key),
            ("consumer_secret", &self.consumer_secret),
            ("token", &self.token),
            ("token_secret", &self.token_secret),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

// Implement Debug manually to avoid exposing secrets
impl std::fmt::Debug for OAuth1Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth1Credentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<redacted>")
            .field("token", &self.token)
            .field("token_secret", &"<redacted>")
            .finish()
    }
}

/// The authentication mode a client signs its requests with.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Credentials {
    /// Requests go out unauthenticated
    #[default]
    None,
    /// `api_key` query parameter
    ApiKey(String),
    /// OAuth1 HMAC-SHA1 `Authorization` header
    OAuth1(OAuth1Credentials),
}

impl Credentials {
    /// Classify the credential fields of `options`.
    ///
    /// A lone `consumer_key` selects API key authentication and all four
    /// fields select OAuth1. Any other combination is rejected rather than
    /// downgraded.
    pub fn resolve(options: &ClientOptions) -> Result<Self> {
        fn present(field: &Option<String>) -> Option<&str> {
            field.as_deref().filter(|v| !v.is_empty())
        }

        match (
            present(&options.consumer_key),
            present(&options.consumer_secret),
            present(&options.token),
            present(&options.token_secret),
        ) {
            (None, None, None, None) => Ok(Credentials::None),
            (Some(key), None, None, None) => Ok(Credentials::ApiKey(key.to_string())),
            (Some(consumer_key), Some(consumer_secret), Some(token), Some(token_secret)) => {
                Ok(Credentials::OAuth1(OAuth1Credentials::new(
                    consumer_key,
                    consumer_secret,
                    token,
                    token_secret,
                )))
            }
            (consumer_key, consumer_secret, token, token_secret) => {
                let supplied: Vec<&str> = [
                    ("consumer_key", consumer_key),
                    ("consumer_secret", consumer_secret),
                    ("token", token),
                    ("token_secret", token_secret),
                ]
                .into_iter()
                .filter_map(|(name, value)| value.map(|_| name))
                .collect();

                Err(TumblrError::Config(format!(
                    "incomplete OAuth1 credentials: got {}, expected either consumer_key alone \
                     or all of consumer_key, consumer_secret, token, token_secret",
                    supplied.join(", ")
                )))
            }
        }
    }

    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Credentials::None => "none",
            Credentials::ApiKey(_) => "api_key",
            Credentials::OAuth1(_) => "oauth1",
        }
    }
}
