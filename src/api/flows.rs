//! Wire shapes of the flow catalog listing.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::core::constants::CATALOG_PATH;
use crate::utils::url::construct_api_url;

#[derive(Debug, Deserialize)]
pub struct CatalogResponse {
    #[serde(default)]
    pub data: Vec<CatalogFlow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogFlow {
    pub flow_id: String,
    pub flow_name: String,
    #[serde(default)]
    pub data: CatalogFlowData,
}

#[derive(Debug, Default, Deserialize)]
pub struct CatalogFlowData {
    #[serde(default)]
    pub nodes: Vec<CatalogNode>,
}

#[derive(Debug, Deserialize)]
pub struct CatalogNode {
    pub id: String,
    pub data: CatalogNodeData,
}

#[derive(Debug, Deserialize)]
pub struct CatalogNodeData {
    pub node: CatalogNodeDefinition,
}

#[derive(Debug, Deserialize)]
pub struct CatalogNodeDefinition {
    #[serde(default)]
    pub tweaks: Vec<CatalogTweak>,
}

#[derive(Debug, Deserialize)]
pub struct CatalogTweak {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default: Option<Value>,
    pub value_type: String,
}

/// Failure to obtain the flow catalog.
#[derive(Debug)]
pub enum CatalogError {
    Transport(reqwest::Error),
    Status { status: u16, body: String },
    Decode(reqwest::Error),
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::Transport(err) => write!(f, "Catalog request failed: {err}"),
            CatalogError::Status { status, body } => {
                write!(f, "Catalog request failed with status {status}")?;
                if !body.trim().is_empty() {
                    write!(f, ": {}", body.trim())?;
                }
                Ok(())
            }
            CatalogError::Decode(err) => write!(f, "Catalog response is not a flow listing: {err}"),
        }
    }
}

impl std::error::Error for CatalogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CatalogError::Transport(err) | CatalogError::Decode(err) => Some(err),
            CatalogError::Status { .. } => None,
        }
    }
}

pub async fn fetch_catalog(
    client: &reqwest::Client,
    catalog_url: &str,
    access_token: Option<&str>,
) -> Result<CatalogResponse, CatalogError> {
    let url = construct_api_url(catalog_url, CATALOG_PATH);
    debug!(url = %url, authorized = access_token.is_some(), "Fetching flow catalog");
    let mut request = client.get(url);
    if let Some(token) = access_token.filter(|token| !token.is_empty()) {
        request = request.header("Authorization", format!("Bearer {token}"));
    }

    let response = request.send().await.map_err(CatalogError::Transport)?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(CatalogError::Status { status, body });
    }

    response
        .json::<CatalogResponse>()
        .await
        .map_err(CatalogError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::{CannedResponse, TestServer};
    use serde_json::json;

    #[tokio::test]
    async fn fetch_sends_bearer_token_and_decodes_listing() {
        let server = TestServer::start(vec![(
            "/store/components/all",
            CannedResponse::json(
                200,
                json!({"data": [{
                    "flowId": "f1",
                    "flowName": "Support",
                    "data": {"nodes": [{
                        "id": "ChatModel-1",
                        "data": {"node": {"tweaks": [{
                            "name": "temperature",
                            "display_name": "Temperature",
                            "default": 0.1,
                            "value_type": "float"
                        }]}}
                    }]}
                }]}),
            ),
        )])
        .await;

        let client = reqwest::Client::new();
        let catalog = fetch_catalog(&client, server.base_url(), Some("secret"))
            .await
            .expect("catalog");
        assert_eq!(catalog.data.len(), 1);
        assert_eq!(catalog.data[0].flow_id, "f1");
        assert_eq!(catalog.data[0].data.nodes[0].data.node.tweaks[0].name, "temperature");

        let requests = server.requests();
        assert_eq!(requests[0].method, "GET");
        assert_eq!(requests[0].header("authorization"), Some("Bearer secret"));
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let server = TestServer::start(vec![(
            "/store/components/all",
            CannedResponse::text(401, "text/plain", "no token"),
        )])
        .await;

        let client = reqwest::Client::new();
        let err = fetch_catalog(&client, server.base_url(), None)
            .await
            .expect_err("should fail");
        assert!(matches!(err, CatalogError::Status { status: 401, .. }));
        assert_eq!(
            err.to_string(),
            "Catalog request failed with status 401: no token"
        );
        assert_eq!(server.requests()[0].header("authorization"), None);
    }
}
