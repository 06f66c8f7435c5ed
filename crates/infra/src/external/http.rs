//! reqwest clients for the permission service and the gateway.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use keystone_auth::{RoleId, UrlGrant};

use super::{PermissionSource, PublicPathSource, RemoteError};

pub const ROLE_BY_USER_PATH: &str = "/internal/user/v1/users/permission/role";
pub const URLS_BY_ROLE_PATH: &str = "/internal/user/v1/users/permission/urls";
pub const PUBLIC_PATHS_PATH: &str = "/internal/gateway/public-paths";

fn build_client(timeout: Duration) -> Result<reqwest::Client, RemoteError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| RemoteError::Transport(e.to_string()))
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

fn ok_response(resp: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        Err(RemoteError::Status(status.as_u16()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoleResponse {
    role_id: Option<String>,
}

/// Permission lookups against a remote user service.
#[derive(Debug, Clone)]
pub struct HttpPermissionSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPermissionSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl PermissionSource for HttpPermissionSource {
    async fn role_for_user(&self, user_id: &str) -> Result<Option<RoleId>, RemoteError> {
        let resp = self
            .client
            .get(endpoint(&self.base_url, ROLE_BY_USER_PATH))
            .query(&[("userId", user_id)])
            .send()
            .await?;
        let body: Option<RoleResponse> = ok_response(resp)?.json().await?;
        Ok(body.and_then(|r| RoleId::parse_present(r.role_id.as_deref())))
    }

    async fn urls_for_role(&self, role_id: &RoleId) -> Result<Vec<UrlGrant>, RemoteError> {
        let resp = self
            .client
            .get(endpoint(&self.base_url, URLS_BY_ROLE_PATH))
            .query(&[("roleId", role_id.as_str())])
            .send()
            .await?;
        let urls: Option<Vec<UrlGrant>> = ok_response(resp)?.json().await?;
        Ok(urls.unwrap_or_default())
    }
}

/// Public path list served by the gateway.
#[derive(Debug, Clone)]
pub struct HttpPublicPathSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPublicPathSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl PublicPathSource for HttpPublicPathSource {
    async fn public_patterns(&self) -> Result<Vec<String>, RemoteError> {
        let resp = self
            .client
            .get(endpoint(&self.base_url, PUBLIC_PATHS_PATH))
            .send()
            .await?;
        let paths: Option<Vec<String>> = ok_response(resp)?.json().await?;
        Ok(paths.unwrap_or_default())
    }
}
