//! HTTP plumbing for the Graph connector.
//!
//! A thin wrapper over `reqwest` that adds authentication, optional rate
//! limiting and uniform error mapping. Requests are sent once; callers decide
//! what a failure means.

use crate::secure_string::SecureString;
use crate::traits::{AuthConfig, ConnectorConfig, ConnectorError, ConnectorResult};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, RETRY_AFTER};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Error bodies are truncated to this many characters.
const MAX_ERROR_BODY: usize = 1000;

/// Tokens this close to expiry are refreshed before use.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Seconds reported when a 429 carries no usable `Retry-After`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Header Graph uses to identify a request in its own diagnostics.
const GRAPH_REQUEST_ID: &str = "request-id";

/// Authenticated JSON client bound to one base URL.
pub struct HttpClient {
    client: Client,
    config: ConnectorConfig,
    token: Mutex<Option<CachedToken>>,
    rate_limiter: Option<DirectRateLimiter>,
}

struct CachedToken {
    access_token: SecureString,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - ChronoDuration::seconds(TOKEN_REFRESH_MARGIN_SECS) > now
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3599
}

/// Client-side request budget.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per period.
    pub max_requests: u32,
    pub period: Duration,
    /// Requests allowed back to back before pacing kicks in.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            period: Duration::from_secs(60),
            burst_size: 10,
        }
    }
}

impl RateLimitConfig {
    /// Budget of `per_minute` requests a minute with a sixth of it as burst.
    pub fn per_minute(per_minute: u32) -> Self {
        Self {
            max_requests: per_minute,
            period: Duration::from_secs(60),
            burst_size: (per_minute / 6).max(1),
        }
    }

    fn quota(&self) -> ConnectorResult<Quota> {
        let max_requests = self.max_requests.max(1);
        let quota = Quota::with_period(self.period / max_requests).ok_or_else(|| {
            ConnectorError::ConfigError("Rate limit period must be non-zero".to_string())
        })?;
        Ok(quota.allow_burst(NonZeroU32::new(self.burst_size).unwrap_or(NonZeroU32::MIN)))
    }
}

impl HttpClient {
    /// Creates a client, pacing its requests to `rate_limit` when given.
    pub fn with_rate_limit(
        config: ConnectorConfig,
        rate_limit: Option<RateLimitConfig>,
    ) -> ConnectorResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(default_headers(&config)?)
            .build()
            .map_err(|e| ConnectorError::ConfigError(e.to_string()))?;

        let rate_limiter = rate_limit
            .map(|rl| rl.quota().map(RateLimiter::direct))
            .transpose()?;

        Ok(Self {
            client,
            config,
            token: Mutex::new(None),
            rate_limiter,
        })
    }

    /// Joins `path` onto the base URL.
    pub fn build_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// GETs `path` and decodes the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ConnectorResult<T> {
        self.send_json(Method::GET, path, None::<&()>).await
    }

    /// PATCHes `body` to `path`. An empty response (204 No Content) decodes
    /// as JSON `null`.
    pub async fn patch_json<B, T>(&self, path: &str, body: &B) -> ConnectorResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::PATCH, path, Some(body)).await
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> ConnectorResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.client.request(method, self.build_url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = self.execute(request).await?;
        decode_json(response).await
    }

    async fn execute(&self, request: RequestBuilder) -> ConnectorResult<Response> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        let response = self
            .authorize(request)
            .await?
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let request_id = header_str(response.headers(), GRAPH_REQUEST_ID).unwrap_or_default();
        debug!(%status, url = %response.url(), request_id, "Received response");

        if status.is_success() {
            return Ok(response);
        }

        warn!(
            connector = %self.config.name,
            %status,
            request_id,
            "Request rejected"
        );

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = header_str(response.headers(), RETRY_AFTER.as_str())
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            return Err(ConnectorError::RateLimited(retry_after));
        }

        let body = response.text().await.unwrap_or_default();
        Err(error_for_status(status, &body))
    }

    async fn authorize(&self, request: RequestBuilder) -> ConnectorResult<RequestBuilder> {
        match &self.config.auth {
            AuthConfig::None => Ok(request),
            AuthConfig::BearerToken { token } => Ok(request.bearer_auth(token.expose_secret())),
            AuthConfig::OAuth2 {
                client_id,
                client_secret,
                token_url,
                scopes,
            } => {
                let token = self
                    .access_token(client_id, client_secret, token_url, scopes)
                    .await?;
                Ok(request.bearer_auth(token.expose_secret()))
            }
        }
    }

    /// Returns the cached client-credentials token, fetching a new one when
    /// it is missing or about to expire. The lock is held across the fetch so
    /// concurrent callers share one token request.
    async fn access_token(
        &self,
        client_id: &str,
        client_secret: &SecureString,
        token_url: &str,
        scopes: &[String],
    ) -> ConnectorResult<SecureString> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(token.access_token.clone());
        }

        info!(connector = %self.config.name, "Requesting access token");

        let scope = scopes.join(" ");
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", client_id),
            ("client_secret", client_secret.expose_secret()),
            ("scope", scope.as_str()),
        ];

        let response = self
            .client
            .post(token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| ConnectorError::AuthenticationFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::AuthenticationFailed(format!(
                "OAuth2 token request failed ({}): {}",
                status,
                truncate(&body)
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))?;

        let access_token = SecureString::new(token.access_token);
        *cached = Some(CachedToken {
            access_token: access_token.clone(),
            expires_at: Utc::now() + ChronoDuration::seconds(token.expires_in),
        });
        Ok(access_token)
    }
}

fn default_headers(config: &ConnectorConfig) -> ConnectorResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    for (key, value) in &config.headers {
        let name = HeaderName::try_from(key.as_str())
            .map_err(|e| ConnectorError::ConfigError(format!("Invalid header '{}': {}", key, e)))?;
        let value = HeaderValue::try_from(value.as_str())
            .map_err(|e| ConnectorError::ConfigError(format!("Invalid header '{}': {}", key, e)))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn transport_error(e: reqwest::Error) -> ConnectorError {
    if e.is_timeout() {
        ConnectorError::Timeout(e.to_string())
    } else if e.is_connect() {
        ConnectorError::ConnectionFailed(e.to_string())
    } else {
        ConnectorError::RequestFailed(e.to_string())
    }
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> ConnectorResult<T> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))?;
    let text = if text.trim().is_empty() { "null" } else { &text };

    serde_json::from_str(text).map_err(|e| {
        ConnectorError::InvalidResponse(format!(
            "Failed to parse response (status {}): {} - Body: {}",
            status,
            e,
            truncate(text)
        ))
    })
}

/// Maps a non-success status and its body to a connector error. The body is
/// kept so Graph error details survive to the caller.
fn error_for_status(status: StatusCode, body: &str) -> ConnectorError {
    let body = truncate(body);
    match status {
        StatusCode::UNAUTHORIZED => ConnectorError::AuthenticationFailed(body),
        StatusCode::FORBIDDEN => ConnectorError::AuthorizationDenied(body),
        StatusCode::NOT_FOUND => ConnectorError::NotFound(body),
        StatusCode::BAD_REQUEST => ConnectorError::RequestFailed(format!("Bad request: {}", body)),
        s if s.is_server_error() => {
            ConnectorError::RequestFailed(format!("Server error {}: {}", s, body))
        }
        s => ConnectorError::RequestFailed(format!("Client error {}: {}", s, body)),
    }
}

fn truncate(text: &str) -> String {
    text.chars().take(MAX_ERROR_BODY).collect()
}
