//! Alibaba ICBU open platform client
//!
//! Implements `SourceCatalog` over the signed sync gateway. Every request
//! carries the system parameters plus an upper-case hex HMAC-SHA256 of the
//! sorted, concatenated `key + value` pairs.

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Deserializer};
use sha2::Sha256;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::domain::errors::ClientError;
use crate::domain::product::{PriceTier, SourceKey, SourceProductRecord};
use crate::domain::services::SourceCatalog;
use crate::infrastructure::config::SourceConfig;
use crate::infrastructure::http_client::HttpClient;

type HmacSha256 = Hmac<Sha256>;

const LIST_METHOD: &str = "alibaba.icbu.product.list";
const DETAIL_METHOD: &str = "alibaba.icbu.product.get";

/// Upper-case hex HMAC-SHA256 over `k1v1k2v2...` in key order
pub fn sign_params(params: &BTreeMap<&str, String>, secret: &str) -> Result<String, ClientError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .map_err(|e| ClientError::Signing(e.to_string()))?;

    for (key, value) in params {
        mac.update(key.as_bytes());
        mac.update(value.as_bytes());
    }

    Ok(hex::encode_upper(mac.finalize().into_bytes()))
}

pub struct AlibabaCatalogClient {
    http: HttpClient,
    config: SourceConfig,
}

impl AlibabaCatalogClient {
    pub fn new(http: HttpClient, config: SourceConfig) -> Self {
        Self {
            http: http.with_context_label("alibaba"),
            config,
        }
    }

    /// System parameters shared by every call
    fn base_params(&self, method: &str) -> BTreeMap<&'static str, String> {
        let mut params = BTreeMap::new();
        params.insert("app_key", self.config.app_key.clone());
        params.insert("access_token", self.config.access_token.clone());
        params.insert("timestamp", Utc::now().timestamp_millis().to_string());
        params.insert("sign_method", "sha256".to_string());
        params.insert("format", "json".to_string());
        params.insert("method", method.to_string());
        params.insert("language", self.config.language.clone());
        params
    }

    async fn call(&self, mut params: BTreeMap<&'static str, String>) -> Result<serde_json::Value, ClientError> {
        let sign = sign_params(&params, &self.config.app_secret)?;
        params.insert("sign", sign);

        let request = self.http.get(&self.config.api_url).query(&params);
        let response = self.http.send(request).await?;
        let body: serde_json::Value = HttpClient::read_json(response).await?;

        if let Some(error) = body.get("error_response") {
            let error: ApiErrorBody = serde_json::from_value(error.clone())?;
            return Err(ClientError::Api {
                code: error.code.unwrap_or_default(),
                message: error.sub_msg.or(error.msg).unwrap_or_default(),
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl SourceCatalog for AlibabaCatalogClient {
    async fn list_ids(&self, page: u32, page_size: u32) -> Result<Vec<SourceKey>, ClientError> {
        let mut params = self.base_params(LIST_METHOD);
        params.insert("current_page", page.to_string());
        params.insert("page_size", page_size.to_string());
        params.insert("status", "published".to_string());

        let body = self.call(params).await?;
        let envelope: ListEnvelope = serde_json::from_value(body)?;
        let response = envelope
            .alibaba_icbu_product_list_response
            .ok_or_else(|| ClientError::decode("missing alibaba_icbu_product_list_response"))?;

        // The gateway omits `products` entirely past the last page
        let ids: Vec<SourceKey> = response
            .products
            .map(|products| products.alibaba_product_brief_response)
            .unwrap_or_default()
            .into_iter()
            .map(|brief| brief.id)
            .collect();

        info!("📦 Listed {} product ids on page {}", ids.len(), page);
        Ok(ids)
    }

    async fn fetch_detail(&self, key: &SourceKey) -> Result<Option<SourceProductRecord>, ClientError> {
        let mut params = self.base_params(DETAIL_METHOD);
        params.insert("product_id", key.to_string());

        let body = self.call(params).await?;
        let envelope: DetailEnvelope = serde_json::from_value(body)?;

        let Some(product) = envelope
            .alibaba_icbu_product_get_response
            .and_then(|response| response.product)
        else {
            debug!("Detail response for {} carries no product", key);
            return Ok(None);
        };

        Ok(Some(product.into_record(key.clone())))
    }
}

// Wire shapes

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default, deserialize_with = "lenient_string")]
    code: Option<String>,
    msg: Option<String>,
    sub_msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListEnvelope {
    alibaba_icbu_product_list_response: Option<ListResponse>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    products: Option<ProductBriefs>,
}

#[derive(Debug, Deserialize)]
struct ProductBriefs {
    #[serde(default)]
    alibaba_product_brief_response: Vec<ProductBrief>,
}

#[derive(Debug, Deserialize)]
struct ProductBrief {
    id: SourceKey,
}

#[derive(Debug, Deserialize)]
struct DetailEnvelope {
    alibaba_icbu_product_get_response: Option<DetailResponse>,
}

#[derive(Debug, Deserialize)]
struct DetailResponse {
    product: Option<RawProduct>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawProduct {
    subject: Option<String>,
    description: Option<String>,
    main_image: Option<MainImage>,
    video_info: Option<VideoInfo>,
    description_images: Option<DescriptionImages>,
    product_sku: Option<ProductSku>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MainImage {
    images: Option<StringList>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StringList {
    string: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VideoInfo {
    video_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DescriptionImages {
    image_urls: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProductSku {
    skus: Option<Skus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Skus {
    sku_definition: Vec<SkuDefinition>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SkuDefinition {
    bulk_discount_prices: Option<BulkDiscountPrices>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BulkDiscountPrices {
    bulk_discount_price: Vec<BulkDiscountPrice>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BulkDiscountPrice {
    #[serde(deserialize_with = "lenient_f64")]
    start_quantity: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    price: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    inventory: Option<f64>,
}

impl RawProduct {
    fn into_record(self, key: SourceKey) -> SourceProductRecord {
        // Only the first SKU definition carries the quantity breaks
        let price_tiers = self
            .product_sku
            .and_then(|sku| sku.skus)
            .and_then(|skus| skus.sku_definition.into_iter().next())
            .and_then(|definition| definition.bulk_discount_prices)
            .map(|prices| prices.bulk_discount_price)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|tier| {
                let quantity = tier.start_quantity?;
                let price = tier.price?;
                if !(quantity >= 1.0 && quantity <= f64::from(u32::MAX)) {
                    return None;
                }
                Some(PriceTier::new(
                    quantity as u32,
                    price,
                    tier.inventory.map(|inventory| inventory as i64),
                ))
            })
            .collect();

        SourceProductRecord {
            source_key: Some(key),
            title: self.subject,
            description: self.description.unwrap_or_default(),
            main_images: self
                .main_image
                .and_then(|image| image.images)
                .map(|list| list.string)
                .unwrap_or_default(),
            description_images: self
                .description_images
                .map(|images| images.image_urls)
                .unwrap_or_default(),
            video_url: self
                .video_info
                .and_then(|video| video.video_url)
                .filter(|url| !url.is_empty()),
            price_tiers,
        }
    }
}

/// Numbers arrive as JSON numbers or numeric strings
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<NumberOrText>::deserialize(deserializer)? {
        Some(NumberOrText::Number(number)) => Some(number),
        Some(NumberOrText::Text(text)) => text.trim().parse().ok(),
        None => None,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<NumberOrText>::deserialize(deserializer)? {
        Some(NumberOrText::Number(number)) => Some(number.to_string()),
        Some(NumberOrText::Text(text)) => Some(text),
        None => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> AlibabaCatalogClient {
        let config = SourceConfig {
            app_key: "key".to_string(),
            app_secret: "secret".to_string(),
            access_token: "tok".to_string(),
            api_url: format!("{}/sync", server.uri()),
            ..SourceConfig::default()
        };
        AlibabaCatalogClient::new(HttpClient::default(), config)
    }

    #[test]
    fn signature_is_upper_hex_hmac_of_sorted_pairs() {
        let mut params = BTreeMap::new();
        params.insert("timestamp", "1700000000000".to_string());
        params.insert("method", "alibaba.icbu.product.get".to_string());
        params.insert("app_key", "key".to_string());
        params.insert("product_id", "1600".to_string());
        params.insert("access_token", "tok".to_string());

        assert_eq!(
            sign_params(&params, "secret").unwrap(),
            "64D0D7198898B7F768BF6932F397466655A2E07C6C27FDFC5B6BFCC170A7DCEE"
        );
    }

    #[tokio::test]
    async fn list_ids_reads_brief_ids() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("method", LIST_METHOD))
            .and(query_param("current_page", "2"))
            .and(query_param("page_size", "30"))
            .and(query_param("status", "published"))
            .and(query_param("sign_method", "sha256"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "alibaba_icbu_product_list_response": {
                    "products": {
                        "alibaba_product_brief_response": [
                            {"id": 1600123456789_u64, "subject": "A"},
                            {"id": "1600987654321", "subject": "B"}
                        ]
                    }
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ids = client(&server).list_ids(2, 30).await.unwrap();

        assert_eq!(ids, vec![SourceKey::from("1600123456789"), SourceKey::from("1600987654321")]);
    }

    #[tokio::test]
    async fn list_past_the_end_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "alibaba_icbu_product_list_response": {"total_item": 0}
            })))
            .mount(&server)
            .await;

        assert!(client(&server).list_ids(9, 30).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn gateway_errors_surface_as_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error_response": {"code": 27, "msg": "Invalid session", "sub_msg": "token expired"}
            })))
            .mount(&server)
            .await;

        let err = client(&server).list_ids(1, 30).await.unwrap_err();

        match err {
            ClientError::Api { code, message } => {
                assert_eq!(code, "27");
                assert_eq!(message, "token expired");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn detail_maps_media_and_first_sku_tiers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("method", DETAIL_METHOD))
            .and(query_param("product_id", "1600"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "alibaba_icbu_product_get_response": {
                    "product": {
                        "subject": "Steel Bottle",
                        "description": "<p>Cold for 24h</p>",
                        "main_image": {"images": {"string": ["https://s/1.jpg", "https://s/2.jpg"]}},
                        "video_info": {"video_url": "https://s/v.mp4"},
                        "description_images": {"image_urls": ["https://s/d1.jpg"]},
                        "product_sku": {"skus": {"sku_definition": [
                            {"bulk_discount_prices": {"bulk_discount_price": [
                                {"start_quantity": 1, "price": "10.00"},
                                {"start_quantity": "10", "price": 8.5, "inventory": 100}
                            ]}},
                            {"bulk_discount_prices": {"bulk_discount_price": [
                                {"start_quantity": 500, "price": 1.0}
                            ]}}
                        ]}}
                    }
                }
            })))
            .mount(&server)
            .await;

        let record = client(&server)
            .fetch_detail(&SourceKey::from("1600"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(record.source_key, Some(SourceKey::from("1600")));
        assert_eq!(record.title.as_deref(), Some("Steel Bottle"));
        assert_eq!(record.main_images.len(), 2);
        assert_eq!(record.video_url.as_deref(), Some("https://s/v.mp4"));
        assert_eq!(record.description_images, vec!["https://s/d1.jpg".to_string()]);
        assert_eq!(
            record.price_tiers,
            vec![PriceTier::new(1, 10.0, None), PriceTier::new(10, 8.5, Some(100))]
        );
    }

    #[tokio::test]
    async fn detail_without_product_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "alibaba_icbu_product_get_response": {}
            })))
            .mount(&server)
            .await;

        let detail = client(&server).fetch_detail(&SourceKey::from("1")).await.unwrap();
        assert_eq!(detail, None);
    }

    #[tokio::test]
    async fn server_errors_are_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = client(&server).fetch_detail(&SourceKey::from("1")).await.unwrap_err();
        assert!(matches!(err, ClientError::HttpStatus { status: 502, .. }));
    }
}
