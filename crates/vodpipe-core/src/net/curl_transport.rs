//! libcurl-backed transport.

use anyhow::{Context, Result};
use std::time::Duration;

use super::{HttpRequest, HttpTransport, Method};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 12) vodpipe/0.1";

/// Blocking transport using one `curl::easy::Easy` per request.
#[derive(Debug, Clone)]
pub struct CurlTransport {
    connect_timeout: Duration,
    timeout: Duration,
}

impl CurlTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            connect_timeout: timeout.min(Duration::from_secs(15)),
            timeout,
        }
    }
}

impl Default for CurlTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(15))
    }
}

impl HttpTransport for CurlTransport {
    fn execute(&self, request: &HttpRequest) -> Result<String> {
        let mut easy = curl::easy::Easy::new();
        let url = match request.method {
            Method::Get => request.full_url()?,
            Method::Post => request.url.clone(),
        };
        easy.url(&url).context("invalid URL")?;
        easy.follow_location(true)?;
        easy.connect_timeout(self.connect_timeout)?;
        easy.timeout(self.timeout)?;
        easy.accept_encoding("")?;

        let mut list = curl::easy::List::new();
        let mut has_user_agent = false;
        for (k, v) in &request.headers {
            has_user_agent |= k.trim().eq_ignore_ascii_case("user-agent");
            list.append(&format!("{}: {}", k.trim(), v.trim()))?;
        }
        if !has_user_agent {
            easy.useragent(DEFAULT_USER_AGENT)?;
        }
        if !request.headers.is_empty() {
            easy.http_headers(list)?;
        }

        if request.method == Method::Post {
            easy.post(true)?;
            easy.post_fields_copy(request.form_body().as_bytes())?;
        }

        let mut body = Vec::new();
        {
            let mut transfer = easy.transfer();
            transfer.write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer
                .perform()
                .with_context(|| format!("request to {} failed", request.url))?;
        }

        let code = easy.response_code().context("no response code")?;
        if !(200..300).contains(&code) {
            anyhow::bail!("{} returned HTTP {}", request.url, code);
        }
        tracing::trace!(url = %request.url, bytes = body.len(), "http response");
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}
