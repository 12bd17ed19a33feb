use std::borrow::Cow;
use std::fmt;

use bytes::Bytes;
use reqwest::{header::HeaderMap, StatusCode, Url};

use crate::{Result, WebhookHttpError};

/// A distinct `(scheme, host, port)` target for pooled connections.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Route {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl Route {
    /// Derives the route of `url`, filling in the scheme's default port.
    ///
    /// Only `http` and `https` are served.
    pub fn from_url(url: &Url) -> Result<Self> {
        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(WebhookHttpError::InvalidUrl(format!(
                "unsupported scheme '{scheme}' in {url}"
            )));
        }
        let host = url
            .host_str()
            .ok_or_else(|| WebhookHttpError::InvalidUrl(format!("missing host in {url}")))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| WebhookHttpError::InvalidUrl(format!("missing port in {url}")))?;

        Ok(Self {
            scheme: scheme.to_owned(),
            host: host.to_ascii_lowercase(),
            port,
        })
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// Final response of a delivery, after any retries.
///
/// Status, headers and body are those of the last attempt, as received.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Number of attempts made, the first one included.
    pub attempts: u32,
    pub body: Bytes,
}

impl Delivery {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Canonical reason phrase of the final status, if it has one.
    pub fn reason(&self) -> Option<&'static str> {
        self.status.canonical_reason()
    }

    /// Body as UTF-8, with invalid sequences replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}
