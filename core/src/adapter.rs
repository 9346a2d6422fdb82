//! The single point where outbound requests get credentials and hit the wire.
//!
//! # Design
//! Every request built by `ApiClient` goes through `HttpAdapter`, which reads
//! the token from the credential store on every call (no in-memory copy, so
//! an external sign-out takes effect on the next request), attaches
//! `Authorization: Bearer <token>` unless the route is on the configured
//! unauthenticated allow-list, executes the request through the injected
//! `Transport`, and turns non-2xx responses into `ApiError::Http`.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::client::ApiClient;
use crate::config::ClientConfig;
use crate::credentials::CredentialStore;
use crate::error::ApiError;
use crate::http::{HttpBody, HttpMethod, HttpRequest, HttpResponse, Transport};

/// How a request that is not on the allow-list treats a missing token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPolicy {
    /// Fail with `AuthRequired` before sending.
    Required,
    /// Attach the token when one is stored, send anonymously otherwise.
    Optional,
}

pub struct HttpAdapter {
    client: ApiClient,
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    credentials: Arc<CredentialStore>,
}

impl HttpAdapter {
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>, credentials: Arc<CredentialStore>) -> Self {
        Self {
            client: ApiClient::new(&config.base_url),
            config,
            transport,
            credentials,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    /// Send a request that needs the stored token.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.send_with_policy(request, TokenPolicy::Required).await
    }

    /// Send a request that works signed in or anonymously.
    pub async fn send_optional_auth(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.send_with_policy(request, TokenPolicy::Optional).await
    }

    pub async fn send_with_policy(
        &self,
        mut request: HttpRequest,
        policy: TokenPolicy,
    ) -> Result<HttpResponse, ApiError> {
        strip_authorization(&mut request);
        if !self.config.is_unauthenticated(&request.path) {
            match (self.credentials.token().await?, policy) {
                (Some(token), _) => request.set_header("Authorization", format!("Bearer {token}")),
                (None, TokenPolicy::Required) => return Err(ApiError::AuthRequired),
                (None, TokenPolicy::Optional) => {}
            }
        }
        self.execute(request).await
    }

    /// Send with an explicit token instead of the stored one. Used while
    /// signing in, before the new token has been persisted.
    pub async fn send_with_token(&self, mut request: HttpRequest, token: &str) -> Result<HttpResponse, ApiError> {
        strip_authorization(&mut request);
        if !self.config.is_unauthenticated(&request.path) {
            request.set_header("Authorization", format!("Bearer {token}"));
        }
        self.execute(request).await
    }

    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        debug!(
            method = request.method.as_str(),
            path = %request.path,
            authenticated = request.header("authorization").is_some(),
            "sending request"
        );
        let response = self.transport.execute(request).await?;
        if !response.is_success() {
            debug!(status = response.status, "request failed");
            return Err(ApiError::Http {
                status: response.status,
                body: response.body,
            });
        }
        Ok(response)
    }

    // -----------------------------------------------------------------------
    // Path-level helpers for endpoints without a dedicated builder.
    // -----------------------------------------------------------------------

    fn raw<T: Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&T>,
    ) -> Result<HttpRequest, ApiError> {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        let mut request = HttpRequest {
            method,
            url: format!("{}{path}", self.client.base_url()),
            path: path.split('?').next().unwrap_or_default().to_string(),
            headers: Vec::new(),
            body: None,
        };
        if let Some(body) = body {
            let json = serde_json::to_string(body).map_err(|e| ApiError::Serialization(e.to_string()))?;
            request
                .headers
                .push(("content-type".to_string(), "application/json".to_string()));
            request.body = Some(HttpBody::Json(json));
        }
        Ok(request)
    }

    pub async fn get(&self, path: &str) -> Result<HttpResponse, ApiError> {
        let request = self.raw::<()>(HttpMethod::Get, path, None)?;
        self.send(request).await
    }

    pub async fn post<T: Serialize + ?Sized>(&self, path: &str, body: Option<&T>) -> Result<HttpResponse, ApiError> {
        let request = self.raw(HttpMethod::Post, path, body)?;
        self.send(request).await
    }

    pub async fn put<T: Serialize + ?Sized>(&self, path: &str, body: Option<&T>) -> Result<HttpResponse, ApiError> {
        let request = self.raw(HttpMethod::Put, path, body)?;
        self.send(request).await
    }

    pub async fn patch<T: Serialize + ?Sized>(&self, path: &str, body: Option<&T>) -> Result<HttpResponse, ApiError> {
        let request = self.raw(HttpMethod::Patch, path, body)?;
        self.send(request).await
    }

    pub async fn delete(&self, path: &str) -> Result<HttpResponse, ApiError> {
        let request = self.raw::<()>(HttpMethod::Delete, path, None)?;
        self.send(request).await
    }
}

fn strip_authorization(request: &mut HttpRequest) {
    request
        .headers
        .retain(|(k, _)| !k.eq_ignore_ascii_case("authorization"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::testing::ScriptedTransport;
    use crate::types::UserProfile;

    async fn adapter(token: Option<&str>) -> (HttpAdapter, Arc<ScriptedTransport>) {
        let credentials = Arc::new(CredentialStore::new(Arc::new(MemoryStorage::new())));
        if let Some(token) = token {
            credentials.save(token, &UserProfile::default()).await.unwrap();
        }
        let transport = Arc::new(ScriptedTransport::new());
        let adapter = HttpAdapter::new(ClientConfig::default(), transport.clone(), credentials);
        (adapter, transport)
    }

    #[tokio::test]
    async fn attaches_bearer_token() {
        let (adapter, transport) = adapter(Some("tok")).await;
        transport.push_json(200, "[]");
        adapter.send(adapter.client().build_list_pets()).await.unwrap();

        let sent = transport.requests();
        assert_eq!(sent[0].header("Authorization"), Some("Bearer tok"));
    }

    #[tokio::test]
    async fn check_email_never_carries_token() {
        let (adapter, transport) = adapter(Some("tok")).await;
        transport.push_json(200, r#"{"isDuplicate":true}"#);
        let mut request = adapter.client().build_check_email("a@b.com");
        request.set_header("Authorization", "Bearer smuggled");
        let resp = adapter.send_optional_auth(request).await.unwrap();

        let check = adapter.client().parse_check_email(resp).unwrap();
        assert!(check.is_duplicate);
        assert_eq!(transport.requests()[0].header("authorization"), None);
    }

    #[tokio::test]
    async fn missing_token_fails_before_sending() {
        let (adapter, transport) = adapter(None).await;
        let err = adapter.send(adapter.client().build_list_pets()).await.unwrap_err();
        assert_eq!(err, ApiError::AuthRequired);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn optional_policy_sends_anonymously() {
        let (adapter, transport) = adapter(None).await;
        transport.push_json(200, "[]");
        adapter
            .send_optional_auth(adapter.client().build_list_posts())
            .await
            .unwrap();
        assert_eq!(transport.requests()[0].header("authorization"), None);
    }

    #[tokio::test]
    async fn token_is_reread_on_every_call() {
        let (adapter, transport) = adapter(Some("first")).await;
        transport.push_json(200, "[]");
        transport.push_json(200, "[]");
        adapter.send(adapter.client().build_list_pets()).await.unwrap();
        adapter
            .credentials()
            .save("second", &UserProfile::default())
            .await
            .unwrap();
        adapter.send(adapter.client().build_list_pets()).await.unwrap();

        let sent = transport.requests();
        assert_eq!(sent[0].header("authorization"), Some("Bearer first"));
        assert_eq!(sent[1].header("authorization"), Some("Bearer second"));
    }

    #[tokio::test]
    async fn non_2xx_becomes_http_error() {
        let (adapter, transport) = adapter(Some("tok")).await;
        transport.push_json(500, "oops");
        let err = adapter.get("/events").await.unwrap_err();
        assert_eq!(
            err,
            ApiError::Http {
                status: 500,
                body: "oops".to_string()
            }
        );
    }

    #[tokio::test]
    async fn transport_failure_is_network_error() {
        let (adapter, transport) = adapter(Some("tok")).await;
        transport.push_network_error("connection reset");
        let err = adapter.get("events").await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
        assert_eq!(transport.requests()[0].path, "/events");
    }

    #[tokio::test]
    async fn raw_post_serializes_body() {
        let (adapter, transport) = adapter(Some("tok")).await;
        transport.push_json(201, "{}");
        adapter
            .post("/community/1/comments", Some(&serde_json::json!({"content": "hi"})))
            .await
            .unwrap();
        let sent = &transport.requests()[0];
        assert_eq!(sent.method, HttpMethod::Post);
        assert_eq!(sent.body, Some(HttpBody::Json(r#"{"content":"hi"}"#.to_string())));
    }
}
