//! HTTP access for site APIs, EPG documents and page sniffing.
//!
//! The transport is a blocking trait so the libcurl implementation stays
//! simple; async callers go through `fetch_text`, which moves the request to
//! the blocking thread pool.

mod curl_transport;

pub use curl_transport::CurlTransport;

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    /// Params are sent as an `application/x-www-form-urlencoded` body.
    Post,
}

/// One request: params go to the query string (GET) or the form body (POST).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub params: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: HashMap::new(),
            params: Vec::new(),
        }
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            ..Self::get(url)
        }
    }

    pub fn headers(mut self, headers: &HashMap<String, String>) -> Self {
        self.headers
            .extend(headers.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Value of a param, if present.
    pub fn param_value(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// URL with params appended as a query string (GET form).
    pub fn full_url(&self) -> Result<String> {
        if self.params.is_empty() {
            return Ok(self.url.clone());
        }
        let mut url = url::Url::parse(&self.url)
            .with_context(|| format!("invalid URL: {}", self.url))?;
        url.query_pairs_mut().extend_pairs(self.params.iter());
        Ok(url.into())
    }

    /// Params encoded as a form body (POST form).
    pub fn form_body(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.params.iter())
            .finish()
    }
}

/// Blocking HTTP transport returning the response body as text.
pub trait HttpTransport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<String>;
}

/// Run a request on the blocking pool.
pub async fn fetch_text(transport: Arc<dyn HttpTransport>, request: HttpRequest) -> Result<String> {
    let url = request.url.clone();
    tokio::task::spawn_blocking(move || transport.execute(&request))
        .await
        .with_context(|| format!("HTTP task for {} did not complete", url))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_appends_query() {
        let req = HttpRequest::get("https://cms.example.com/api.php/provide/vod/?ac=list")
            .param("wd", "流浪 地球")
            .param("pg", "2");
        let url = req.full_url().unwrap();
        assert!(url.starts_with("https://cms.example.com/api.php/provide/vod/?ac=list&wd="));
        assert!(url.ends_with("&pg=2"));
        assert_eq!(req.param_value("pg"), Some("2"));
    }

    #[test]
    fn post_encodes_form_body() {
        let req = HttpRequest::post("https://example.com/api")
            .params([("play", "a b"), ("flag", "x&y")]);
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.form_body(), "play=a+b&flag=x%26y");
        assert_eq!(req.full_url().unwrap(), "https://example.com/api?play=a+b&flag=x%26y");
    }

    #[test]
    fn no_params_keeps_url_verbatim() {
        let req = HttpRequest::get("not even a url");
        assert_eq!(req.full_url().unwrap(), "not even a url");
        assert!(HttpRequest::get("::bad").param("a", "b").full_url().is_err());
    }
}
