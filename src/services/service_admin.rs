//! Read-only client for the running server's administrative API.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;

use crate::config::service::ServiceAdminConfig;
use crate::error::ServiceError;

/// Service used to look a server up by cluster and name.
pub const GET_SERVER_BY_NAME: &str = "zato.server.get-by-name";

/// What the pipeline needs from the live service.
#[async_trait]
pub trait ServiceAdmin: Send + Sync {
    /// `Ok(false)` means the service answered but does not know the server yet.
    async fn server_visible(&self, cluster: &str, server: &str) -> Result<bool, ServiceError>;
}

#[derive(Debug, Serialize)]
struct InvokeRequest<'a> {
    service: &'static str,
    request: ServerLookup<'a>,
}

#[derive(Debug, Serialize)]
struct ServerLookup<'a> {
    cluster_name: &'a str,
    name: &'a str,
}

pub struct HttpServiceAdmin {
    client: reqwest::Client,
    invoke_url: String,
    username: String,
    password: Option<String>,
}

impl HttpServiceAdmin {
    pub fn new(config: &ServiceAdminConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            invoke_url: format!(
                "{}/zato/admin/invoke",
                config.base_url.as_str().trim_end_matches('/')
            ),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }
}

#[async_trait]
impl ServiceAdmin for HttpServiceAdmin {
    async fn server_visible(&self, cluster: &str, server: &str) -> Result<bool, ServiceError> {
        let body = InvokeRequest {
            service: GET_SERVER_BY_NAME,
            request: ServerLookup {
                cluster_name: cluster,
                name: server,
            },
        };

        let response = self
            .client
            .post(&self.invoke_url)
            .basic_auth(&self.username, self.password.as_ref())
            .json(&body)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(ServiceError::Status {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}
