//! Shared HTTP transport for the REST API.
//!
//! Every request built through [`ApiTransport`] runs the auth interceptor
//! (if installed) immediately before it is sent, so the `Authorization`
//! header always reflects the token current at send time.

mod error;
mod interceptor;

use reqwest::{Method, Request, Response};
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::token::TokenSupplier;

pub use error::{ApiErrorResponse, TransportError};
pub use interceptor::{InterceptorRegistration, authorize};

/// HTTP client bound to the API base URL, with its interceptor registration.
#[derive(Debug)]
pub struct ApiTransport {
    client: reqwest::Client,
    base_url: Url,
    auth: InterceptorRegistration,
}

impl ApiTransport {
    /// Create a transport for `base_url` with a default client.
    pub fn new(base_url: Url) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a transport using an existing client.
    pub fn with_client(client: reqwest::Client, base_url: Url) -> Self {
        Self {
            client,
            base_url,
            auth: InterceptorRegistration::new(),
        }
    }

    /// Base URL requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Install the auth interceptor on this transport.
    ///
    /// Idempotent: only the first call has an effect. Returns `true` for the
    /// call that installed it.
    pub fn install_auth_once(&self, supplier: TokenSupplier) -> bool {
        self.auth.install_once(supplier)
    }

    /// Whether the auth interceptor is installed.
    pub fn has_auth_interceptor(&self) -> bool {
        self.auth.is_installed()
    }

    /// Resolve `path` relative to the base URL.
    ///
    /// The base URL is treated as a directory, so `auth/logout` on
    /// `http://host/api` becomes `http://host/api/auth/logout`.
    pub fn url(&self, path: &str) -> Result<Url, TransportError> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let dir = format!("{}/", base.path());
            base.set_path(&dir);
        }
        Ok(base.join(path.trim_start_matches('/'))?)
    }

    /// Build a request for `path` with the interceptor applied.
    pub fn request(&self, method: Method, path: &str) -> Result<Request, TransportError> {
        let url = self.url(path)?;
        Ok(self.auth.apply(Request::new(method, url)))
    }

    /// Build a JSON request for `path` with the interceptor applied.
    pub fn json_request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<Request, TransportError> {
        let url = self.url(path)?;
        let request = self.client.request(method, url).json(body).build()?;
        Ok(self.auth.apply(request))
    }

    /// Send a request, mapping non-success statuses to `TransportError::Api`.
    pub async fn execute(&self, request: Request) -> Result<Response, TransportError> {
        let request = self.auth.apply(request);
        debug!(method = %request.method(), url = %request.url(), "sending API request");

        let response = self.client.execute(request).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(TransportError::from_response_body(status.as_u16(), &body))
    }

    /// `POST` to `path` with no body.
    pub async fn post(&self, path: &str) -> Result<Response, TransportError> {
        let request = self.request(Method::POST, path)?;
        self.execute(request).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};

    use super::*;
    use crate::token::SessionToken;

    fn transport() -> ApiTransport {
        ApiTransport::new(Url::parse("http://localhost:5000/api").unwrap())
    }

    #[test]
    fn url_joins_under_base_path() {
        let transport = transport();
        assert_eq!(
            transport.url("auth/logout").unwrap().as_str(),
            "http://localhost:5000/api/auth/logout"
        );
        assert_eq!(
            transport.url("/contracts/12").unwrap().as_str(),
            "http://localhost:5000/api/contracts/12"
        );
    }

    #[test]
    fn request_without_interceptor_has_no_auth_header() {
        let request = transport().request(Method::GET, "users").unwrap();
        assert!(request.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn double_install_yields_single_header() {
        let transport = transport();
        let supplier: TokenSupplier = Arc::new(|| Some(SessionToken::new("tok")));

        assert!(transport.install_auth_once(Arc::clone(&supplier)));
        assert!(!transport.install_auth_once(supplier));

        let request = transport.request(Method::GET, "users").unwrap();
        let values: Vec<_> = request.headers().get_all(AUTHORIZATION).iter().collect();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0], "Bearer tok");
    }

    #[test]
    fn json_request_carries_body_and_auth() {
        let transport = transport();
        transport.install_auth_once(Arc::new(|| Some(SessionToken::new("tok"))));

        let request = transport
            .json_request(Method::POST, "contracts/paged", &serde_json::json!({"page": 1}))
            .unwrap();

        assert_eq!(request.headers()[AUTHORIZATION], "Bearer tok");
        assert_eq!(request.headers()[CONTENT_TYPE], "application/json");
    }

    #[tokio::test]
    async fn execute_reports_connection_failure() {
        // Port 9 (discard) is not listening on test hosts.
        let transport = ApiTransport::new(Url::parse("http://127.0.0.1:9/api").unwrap());
        let result = transport.post("auth/logout").await;
        assert!(matches!(result, Err(TransportError::Request(_))));
    }
}
