use std::fmt;
use std::sync::Arc;

use reqwest::{header, Method, StatusCode, Url};
use rustls::ClientConfig;
use serde::Serialize;
use tokio::time::sleep;
use tracing::{Instrument, Span};

use crate::{
    pool::{ConnectionPool, PoolLimits},
    tls, Delivery, HttpClientOptions, Result, RetryStrategy, Route, WebhookHttpError,
};

/// Produces [`WebhookHttpClient`] instances from [`HttpClientOptions`].
///
/// The TLS context is built once, when the factory is created, and shared by
/// every client it builds.
pub struct HttpClientFactory {
    options: HttpClientOptions,
    tls: Option<ClientConfig>,
    span: Span,
}

impl fmt::Debug for HttpClientFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClientFactory")
            .field("options", &self.options)
            .field("insecure_tls_context", &self.tls.is_some())
            .finish()
    }
}

impl HttpClientFactory {
    pub fn new(options: HttpClientOptions) -> Self {
        Self::with_span(options, Span::current())
    }

    /// Creates a factory whose log events, and those of every client it
    /// builds, are recorded inside `span`.
    pub fn with_span(options: HttpClientOptions, span: Span) -> Self {
        let tls = if options.insecure_tls {
            span.in_scope(tls::insecure_tls_context)
        } else {
            None
        };
        Self { options, tls, span }
    }

    pub fn options(&self) -> &HttpClientOptions {
        &self.options
    }

    /// Whether the insecure trust policy will be installed on built clients.
    pub fn has_insecure_tls_context(&self) -> bool {
        self.tls.is_some()
    }

    /// Builds a pooled client.
    ///
    /// Fails on invalid options or if `reqwest` cannot construct its client.
    pub fn build(&self) -> Result<WebhookHttpClient> {
        self.options.validate()?;
        let limits = PoolLimits::default();

        let mut builder = reqwest::Client::builder()
            .connect_timeout(self.options.connect_timeout())
            .read_timeout(self.options.socket_timeout())
            .pool_max_idle_per_host(limits.max_per_route)
            .pool_idle_timeout(limits.validate_after_inactivity);

        builder = match &self.tls {
            Some(config) => builder.use_preconfigured_tls(config.clone()),
            None => builder.use_rustls_tls(),
        };

        let http = builder.build().map_err(WebhookHttpError::Build)?;

        let _entered = self.span.enter();
        tracing::debug!(
            connect_timeout_ms = self.options.connection_timeout_ms,
            socket_timeout_ms = self.options.socket_timeout_ms,
            max_tries = self.options.max_tries,
            retry_interval_ms = self.options.retry_interval_ms,
            insecure_tls = self.tls.is_some(),
            "built webhook http client"
        );

        Ok(WebhookHttpClient {
            http,
            pool: Arc::new(ConnectionPool::new(
                limits,
                self.options.connection_request_timeout(),
            )),
            retry: RetryStrategy::from_options(&self.options),
            span: self.span.clone(),
        })
    }
}

#[derive(Clone)]
/// Pooled HTTP client for webhook delivery.
///
/// Clones share the connection pool and its limits.
pub struct WebhookHttpClient {
    http: reqwest::Client,
    pool: Arc<ConnectionPool>,
    retry: RetryStrategy,
    span: Span,
}

impl fmt::Debug for WebhookHttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookHttpClient")
            .field("pool", &self.pool)
            .field("retry", &self.retry)
            .finish()
    }
}

impl WebhookHttpClient {
    /// Builds a client straight from options.
    pub fn new(options: HttpClientOptions) -> Result<Self> {
        HttpClientFactory::new(options).build()
    }

    pub fn retry_strategy(&self) -> &RetryStrategy {
        &self.retry
    }

    pub fn pool_limits(&self) -> PoolLimits {
        self.pool.limits()
    }

    /// POSTs a JSON document.
    ///
    /// Server errors (status >= 500) are retried at a fixed interval until the
    /// attempt ceiling; the last response is returned as-is. Other statuses
    /// are returned after one attempt. Transport errors are not retried.
    pub async fn post(&self, url: &str, body: impl Into<String>) -> Result<Delivery> {
        let url = Url::parse(url)
            .map_err(|err| WebhookHttpError::InvalidUrl(format!("{url}: {err}")))?;
        let body = body.into();
        self.send_with_retry(Method::POST, url, body)
            .instrument(self.span.clone())
            .await
    }

    /// Serializes `payload` as JSON and POSTs it. See [`WebhookHttpClient::post`].
    pub async fn post_json<T>(&self, url: &str, payload: &T) -> Result<Delivery>
    where
        T: Serialize + ?Sized,
    {
        let body = serde_json::to_string(payload)?;
        self.post(url, body).await
    }

    /// Releases the client. In-flight and later deliveries fail with
    /// [`WebhookHttpError::Closed`] when they next need a connection slot.
    pub fn close(&self) {
        self.pool.close();
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    async fn send_with_retry(&self, method: Method, url: Url, body: String) -> Result<Delivery> {
        let route = Route::from_url(&url)?;
        let mut execution_count = 0u32;
        loop {
            execution_count += 1;
            let lease = self.pool.acquire(&route).await?;

            let response = self
                .http
                .request(method.clone(), url.clone())
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.clone())
                .send()
                .await
                .map_err(WebhookHttpError::Transport)?;

            let status = response.status();
            let decision = self.retry.decide(execution_count, status);
            if decision.retry {
                tracing::debug!(
                    attempt = execution_count,
                    wait_ms = u64::try_from(decision.wait.as_millis()).unwrap_or(u64::MAX),
                    "retrying request caused by '{}', request: '{} {}'",
                    reason_phrase(status),
                    method,
                    url
                );
                // Reading to the end lets the connection go back to the pool.
                let _ = response.bytes().await;
                drop(lease);
                sleep(decision.wait).await;
                continue;
            }

            let headers = response.headers().clone();
            let body = response.bytes().await.map_err(WebhookHttpError::Transport)?;
            drop(lease);
            return Ok(Delivery {
                status,
                headers,
                attempts: execution_count,
                body,
            });
        }
    }
}

fn reason_phrase(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("unknown status")
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::{reason_phrase, HttpClientFactory, WebhookHttpClient};
    use crate::{HttpClientOptions, WebhookHttpError};

    #[test]
    fn secure_options_skip_insecure_context() {
        let factory = HttpClientFactory::new(HttpClientOptions::default());
        assert!(!factory.has_insecure_tls_context());
    }

    #[test]
    fn insecure_options_install_context() {
        let factory = HttpClientFactory::new(HttpClientOptions {
            insecure_tls: true,
            ..HttpClientOptions::default()
        });
        assert!(factory.has_insecure_tls_context());
        assert!(format!("{factory:?}").contains("insecure_tls_context: true"));
    }

    #[tokio::test]
    async fn build_exposes_fixed_pool_limits_and_configured_retry() {
        let client = WebhookHttpClient::new(HttpClientOptions {
            max_tries: 3,
            insecure_tls: true,
            ..HttpClientOptions::default()
        })
        .expect("client must build");

        let limits = client.pool_limits();
        assert_eq!(limits.max_per_route, 100);
        assert_eq!(limits.max_total, 200);
        assert_eq!(client.retry_strategy().max_tries(), 3);
        assert!(!client.is_closed());
    }

    #[test]
    fn build_rejects_invalid_options() {
        let err = HttpClientFactory::new(HttpClientOptions {
            socket_timeout_ms: 0,
            ..HttpClientOptions::default()
        })
        .build()
        .expect_err("zero socket timeout must be rejected");
        assert!(matches!(err, WebhookHttpError::Config(_)));
    }

    #[test]
    fn reason_phrase_falls_back_for_nonstandard_codes() {
        assert_eq!(reason_phrase(StatusCode::BAD_GATEWAY), "Bad Gateway");
        let odd = StatusCode::from_u16(599).expect("valid status");
        assert_eq!(reason_phrase(odd), "unknown status");
    }
}
