//! HTTP transport abstraction
//!
//! The fetch wrapper and the subgraph client talk to the network through
//! `HttpTransport`, so tests can swap in scripted responses.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// A POST without its URL (the URL depends on the selected credential).
/// JSON-RPC and GraphQL both go out this way.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    pub fn post_json(body: serde_json::Value) -> Self {
        Self {
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: Some(body),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Perform the request. `Err` means the request never produced an HTTP
    /// status (DNS, connect, TLS, timeout); every status is an `Ok`.
    async fn send(&self, url: &str, request: &HttpRequest) -> Result<HttpResponse, String>;
}

/// Production transport backed by a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {}", e))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, url: &str, request: &HttpRequest) -> Result<HttpResponse, String> {
        let mut builder = self.client.post(url);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| format!("Failed to read response body: {}", e))?;

        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transport for unit tests

    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    pub struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<HttpResponse, String>>>,
        pub requests: Mutex<Vec<(String, HttpRequest)>>,
    }

    impl ScriptedTransport {
        pub fn new(responses: Vec<Result<HttpResponse, String>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn urls(&self) -> Vec<String> {
            self.requests.lock().iter().map(|(u, _)| u.clone()).collect()
        }
    }

    pub fn ok(body: &str) -> Result<HttpResponse, String> {
        Ok(HttpResponse {
            status: 200,
            body: body.to_string(),
        })
    }

    pub fn status(code: u16, body: &str) -> Result<HttpResponse, String> {
        Ok(HttpResponse {
            status: code,
            body: body.to_string(),
        })
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn send(&self, url: &str, request: &HttpRequest) -> Result<HttpResponse, String> {
            self.requests.lock().push((url.to_string(), request.clone()));
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err("no scripted response left".to_string()))
        }
    }
}
