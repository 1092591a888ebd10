//! Shopify Admin API client
//!
//! Implements `TargetStore` over the REST products endpoints. Tag lookup for
//! orphan adoption goes through the GraphQL endpoint, since REST cannot
//! filter products by tag.

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::domain::errors::ClientError;
use crate::domain::product::{TargetKey, TargetProductPayload, TargetRecord};
use crate::domain::services::TargetStore;
use crate::infrastructure::config::TargetConfig;
use crate::infrastructure::http_client::HttpClient;

const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

const TAG_QUERY: &str = r#"query productsByTag($query: String!) {
  products(first: 5, query: $query) {
    edges { node { legacyResourceId tags } }
  }
}"#;

#[derive(Serialize)]
struct ProductBody<'a> {
    product: &'a TargetProductPayload,
}

#[derive(Deserialize)]
struct ProductEnvelope {
    product: TargetRecord,
}

pub struct ShopifyStoreClient {
    http: HttpClient,
    access_token: String,
    api_base: String,
}

impl ShopifyStoreClient {
    pub fn new(http: HttpClient, config: &TargetConfig) -> Self {
        Self {
            http: http.with_context_label("shopify"),
            access_token: config.access_token.clone(),
            api_base: format!("{}/admin/api/{}", store_base_url(&config.store_url), config.api_version),
        }
    }

    fn products_url(&self) -> String {
        format!("{}/products.json", self.api_base)
    }

    fn product_url(&self, target_key: &TargetKey) -> String {
        format!("{}/products/{}.json", self.api_base, target_key)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(ACCESS_TOKEN_HEADER, &self.access_token)
    }
}

/// Accepts a bare shop host or a full base URL
fn store_base_url(store_url: &str) -> String {
    let trimmed = store_url.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

#[async_trait]
impl TargetStore for ShopifyStoreClient {
    async fn create(&self, payload: &TargetProductPayload) -> Result<TargetRecord, ClientError> {
        let request = self
            .authorized(self.http.post(&self.products_url()))
            .json(&ProductBody { product: payload });
        let response = self.http.send_expecting(request, StatusCode::CREATED).await?;
        let envelope: ProductEnvelope = HttpClient::read_json(response).await?;

        info!("🛒 Created Shopify product {}", envelope.product.id);
        Ok(envelope.product)
    }

    async fn update(
        &self,
        target_key: &TargetKey,
        payload: &TargetProductPayload,
    ) -> Result<TargetRecord, ClientError> {
        let request = self
            .authorized(self.http.put(&self.product_url(target_key)))
            .json(&ProductBody { product: payload });
        let response = self.http.send_expecting(request, StatusCode::OK).await?;
        let envelope: ProductEnvelope = HttpClient::read_json(response).await?;

        info!("🛒 Updated Shopify product {}", target_key);
        Ok(envelope.product)
    }

    async fn fetch(&self, target_key: &TargetKey) -> Result<TargetRecord, ClientError> {
        let request = self.authorized(self.http.get(&self.product_url(target_key)));
        let response = self.http.send_expecting(request, StatusCode::OK).await?;
        let envelope: ProductEnvelope = HttpClient::read_json(response).await?;
        Ok(envelope.product)
    }

    async fn find_by_source_tag(&self, tag: &str) -> Result<Option<TargetRecord>, ClientError> {
        let body = json!({
            "query": TAG_QUERY,
            "variables": { "query": format!("tag:'{tag}'") },
        });
        let request = self
            .authorized(self.http.post(&format!("{}/graphql.json", self.api_base)))
            .json(&body);
        let response = self.http.send(request).await?;
        let result: GraphQlResponse = HttpClient::read_json(response).await?;

        if let Some(error) = result.errors.into_iter().next() {
            return Err(ClientError::Api {
                code: "graphql".to_string(),
                message: error.message,
            });
        }

        // Search is tokenized, so confirm the exact tag before trusting a hit
        let hit = result
            .data
            .map(|data| data.products.edges)
            .unwrap_or_default()
            .into_iter()
            .map(|edge| edge.node)
            .find(|node| node.tags.iter().any(|candidate| candidate == tag));

        match hit {
            Some(node) => {
                debug!("Tag {} matches Shopify product {}", tag, node.legacy_resource_id);
                self.fetch(&TargetKey::new(node.legacy_resource_id)).await.map(Some)
            }
            None => Ok(None),
        }
    }
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<TagQueryData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct TagQueryData {
    products: ProductConnection,
}

#[derive(Deserialize)]
struct ProductConnection {
    #[serde(default)]
    edges: Vec<ProductEdge>,
}

#[derive(Deserialize)]
struct ProductEdge {
    node: ProductNode,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductNode {
    legacy_resource_id: String,
    #[serde(default)]
    tags: Vec<String>,
}
