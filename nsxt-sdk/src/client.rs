//! Manager API trait and its HTTP implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::models::{ApiErrorBody, NsService, NsServiceListResult, TransportZoneStatus};

/// A successful (2xx) answer from the manager.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    pub status: StatusCode,
    pub body: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(body: T) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }
}

/// Operations the provider needs from an NSX-T manager.
///
/// Implementations are shared between resource instances and must not keep
/// per-request state; the manager serializes conflicting writes itself.
#[async_trait]
pub trait ManagerApi: Send + Sync {
    /// Create an NS service. The returned body carries the assigned id.
    async fn create_ns_service(&self, service: &NsService) -> Result<ApiResponse<NsService>>;

    /// Read an NS service by id.
    async fn read_ns_service(&self, id: &str) -> Result<ApiResponse<NsService>>;

    /// Replace an NS service. `service.revision` must match the stored revision.
    async fn update_ns_service(
        &self,
        id: &str,
        service: &NsService,
    ) -> Result<ApiResponse<NsService>>;

    /// Delete an NS service.
    async fn delete_ns_service(&self, id: &str) -> Result<ApiResponse<()>>;

    /// List all NS services.
    async fn list_ns_services(&self) -> Result<ApiResponse<NsServiceListResult>>;

    /// Read the tunnel/BFD status summary of a transport zone.
    async fn read_transport_zone_status(
        &self,
        zone_id: &str,
    ) -> Result<ApiResponse<TransportZoneStatus>>;
}

/// Connection settings for [`HttpClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Manager host, optionally with scheme and port (`nsx.example.com`,
    /// `https://10.0.0.5:443`, `http://127.0.0.1:8443`).
    pub host: String,
    pub username: String,
    pub password: String,
    /// Accept self-signed manager certificates.
    pub allow_unverified_ssl: bool,
    pub timeout: Duration,
}

/// [`ManagerApi`] over HTTPS with basic authentication.
pub struct HttpClient {
    client: Client,
    base_url: Url,
    username: String,
    password: String,
}

impl HttpClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.host.trim().is_empty() {
            return Err(ClientError::Config("manager host is empty".to_string()));
        }

        let client = Client::builder()
            .danger_accept_invalid_certs(config.allow_unverified_ssl)
            .timeout(config.timeout)
            .build()?;

        let base_url = Self::base_url_for(&config.host);
        let base_url = Url::parse(&base_url)
            .map_err(|e| ClientError::Config(format!("invalid manager URL {}: {}", base_url, e)))?;

        Ok(Self {
            client,
            base_url,
            username: config.username,
            password: config.password,
        })
    }

    /// API root for a configured host; hosts without a scheme use https.
    pub fn base_url_for(host: &str) -> String {
        let host = host.trim().trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{}/api/v1", host)
        } else {
            format!("https://{}/api/v1", host)
        }
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// URL of `segments` below the API root. Each segment is percent-encoded,
    /// so ids containing `/`, `?` or `#` stay within their own segment.
    pub fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                ClientError::Config(format!("{} cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .basic_auth(&self.username, Some(&self.password))
            .header(reqwest::header::ACCEPT, "application/json")
    }

    /// Send a request, mapping non-2xx answers to [`ClientError::Status`].
    async fn execute(&self, request: RequestBuilder) -> Result<reqwest::Response> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let bytes = response.bytes().await?;
        let body = serde_json::from_slice::<ApiErrorBody>(&bytes).ok();
        debug!(status = %status, "Manager returned error status");
        Err(ClientError::Status { status, body })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<ApiResponse<T>> {
        let response = self.execute(request).await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        let body = serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))?;
        Ok(ApiResponse { status, body })
    }
}

#[async_trait]
impl ManagerApi for HttpClient {
    async fn create_ns_service(&self, service: &NsService) -> Result<ApiResponse<NsService>> {
        debug!(element = service.nsservice_element.resource_type(), "POST ns-services");
        self.send_json(self.client.post(self.url(&["ns-services"])?).json(service))
            .await
    }

    async fn read_ns_service(&self, id: &str) -> Result<ApiResponse<NsService>> {
        debug!(id = %id, "GET ns-services");
        self.send_json(self.client.get(self.url(&["ns-services", id])?))
            .await
    }

    async fn update_ns_service(
        &self,
        id: &str,
        service: &NsService,
    ) -> Result<ApiResponse<NsService>> {
        debug!(id = %id, revision = service.revision, "PUT ns-services");
        self.send_json(
            self.client
                .put(self.url(&["ns-services", id])?)
                .json(service),
        )
        .await
    }

    async fn delete_ns_service(&self, id: &str) -> Result<ApiResponse<()>> {
        debug!(id = %id, "DELETE ns-services");
        let response = self
            .execute(self.client.delete(self.url(&["ns-services", id])?))
            .await?;
        Ok(ApiResponse {
            status: response.status(),
            body: (),
        })
    }

    async fn list_ns_services(&self) -> Result<ApiResponse<NsServiceListResult>> {
        self.send_json(self.client.get(self.url(&["ns-services"])?))
            .await
    }

    async fn read_transport_zone_status(
        &self,
        zone_id: &str,
    ) -> Result<ApiResponse<TransportZoneStatus>> {
        debug!(zone_id = %zone_id, "GET transport-zones status");
        self.send_json(
            self.client
                .get(self.url(&["transport-zones", zone_id, "status"])?),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(host: &str) -> ClientConfig {
        ClientConfig {
            host: host.to_string(),
            username: "admin".to_string(),
            password: "secret".to_string(),
            allow_unverified_ssl: true,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_base_url_defaults_to_https() {
        assert_eq!(
            HttpClient::base_url_for("nsx.example.com"),
            "https://nsx.example.com/api/v1"
        );
        assert_eq!(
            HttpClient::base_url_for("http://127.0.0.1:8443/"),
            "http://127.0.0.1:8443/api/v1"
        );
    }

    #[test]
    fn test_ids_are_percent_encoded() {
        let client = HttpClient::new(config("nsx.example.com")).unwrap();
        assert_eq!(
            client.url(&["ns-services", "x?y#z/w"]).unwrap().as_str(),
            "https://nsx.example.com/api/v1/ns-services/x%3Fy%23z%2Fw"
        );
        assert_eq!(
            client
                .url(&["transport-zones", "zone 1", "status"])
                .unwrap()
                .path(),
            "/api/v1/transport-zones/zone%201/status"
        );
    }

    #[test]
    fn test_empty_host_rejected() {
        let result = HttpClient::new(config("  "));
        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Port 9 (discard) is not expected to accept HTTP connections.
        let client = HttpClient::new(config("http://127.0.0.1:9")).unwrap();
        let err = client.read_ns_service("missing").await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)), "got {:?}", err);
        assert!(!err.is_not_found());
    }
}
