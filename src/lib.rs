//! `webhook-http` builds the outbound HTTP(S) client used to deliver webhook
//! event payloads.
//!
//! A client built by [`HttpClientFactory`] carries:
//! - connect, socket (read) and pool-acquisition timeouts from
//!   [`HttpClientOptions`]
//! - a connection limiter of 100 connections per route and 200 in total
//! - a fixed-interval [`RetryStrategy`] that reissues a request after a
//!   status >= 500, up to `max_tries` attempts
//! - optionally, the [`InsecureTrustPolicy`], which accepts any certificate
//!   and hostname
//!
//! ```no_run
//! use webhook_http::{HttpClientFactory, HttpClientOptions};
//!
//! # async fn run() -> webhook_http::Result<()> {
//! let client = HttpClientFactory::new(HttpClientOptions::from_env()?).build()?;
//! let delivery = client
//!     .post("https://hooks.example.com/notify", r#"{"type":"ref-updated"}"#)
//!     .await?;
//! println!("{} after {} attempt(s)", delivery.status, delivery.attempts);
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod options;
mod pool;
mod retry;
mod tls;
mod types;

pub use client::{HttpClientFactory, WebhookHttpClient};
pub use error::WebhookHttpError;
pub use options::HttpClientOptions;
pub use pool::{
    PoolLimits, MAX_CONNECTIONS_PER_ROUTE, MAX_TOTAL_CONNECTIONS, VALIDATE_AFTER_INACTIVITY,
};
pub use retry::{RetryDecision, RetryStrategy};
pub use tls::{insecure_tls_context, InsecureTrustPolicy};
pub use types::{Delivery, Route};

pub type Result<T> = std::result::Result<T, WebhookHttpError>;
