//! Content transformation
//!
//! Turns a source product record (with its media already re-hosted) into the
//! payload shape the target store accepts.

use crate::application::media_stage::RehostedMedia;
use crate::domain::product::{
    ProductImage, ProductOption, SourceKey, SourceProductRecord, TargetProductPayload, Variant,
};
use crate::domain::sync_outcome::SkipReason;
use crate::infrastructure::config::{TargetConfig, defaults};

/// Title used when the source record has none
pub const FALLBACK_TITLE: &str = "Alibaba Product";

const PRODUCT_STATUS: &str = "active";
const OPTION_NAME: &str = "MOQ";

/// Record -> payload transformation
pub trait ContentTransformer: Send + Sync {
    /// Variants in tier order. Records with no usable tier are not synced.
    fn derive_variants(&self, record: &SourceProductRecord) -> Result<Vec<Variant>, SkipReason>;

    /// Tag that marks a target record as the mirror of `key`
    fn source_tag(&self, key: &SourceKey) -> String;

    fn assemble(
        &self,
        key: &SourceKey,
        record: &SourceProductRecord,
        media: RehostedMedia,
        variants: Vec<Variant>,
    ) -> TargetProductPayload;
}

/// Storefront product transformer
#[derive(Debug, Clone)]
pub struct ProductContentTransformer {
    vendor: String,
    product_type: String,
    tag_prefix: String,
}

impl ProductContentTransformer {
    pub fn new(
        vendor: impl Into<String>,
        product_type: impl Into<String>,
        tag_prefix: impl Into<String>,
    ) -> Self {
        Self {
            vendor: vendor.into(),
            product_type: product_type.into(),
            tag_prefix: tag_prefix.into(),
        }
    }

    pub fn from_config(config: &TargetConfig) -> Self {
        Self::new(&config.vendor, &config.product_type, &config.source_tag_prefix)
    }

    /// Video block, description block, then one `<img>` per detail image
    pub fn render_body(media: &RehostedMedia) -> String {
        let mut parts = Vec::with_capacity(media.description_images.len() + 2);

        if let Some(video_url) = &media.video_url {
            parts.push(format!(
                r#"<video controls><source src="{video_url}" type="video/mp4"></video>"#
            ));
        }
        if !media.description.is_empty() {
            parts.push(format!("<div>{}</div>", media.description));
        }
        for image_url in &media.description_images {
            parts.push(format!(r#"<img src="{image_url}" />"#));
        }

        parts.join("\n")
    }
}

impl Default for ProductContentTransformer {
    fn default() -> Self {
        Self::new(
            defaults::TARGET_VENDOR,
            defaults::TARGET_PRODUCT_TYPE,
            defaults::SOURCE_TAG_PREFIX,
        )
    }
}

impl ContentTransformer for ProductContentTransformer {
    fn derive_variants(&self, record: &SourceProductRecord) -> Result<Vec<Variant>, SkipReason> {
        let variants: Vec<Variant> = record
            .price_tiers
            .iter()
            .filter(|tier| tier.is_usable())
            .map(Variant::from_tier)
            .collect();

        if variants.is_empty() {
            return Err(SkipReason::NoPricing);
        }
        Ok(variants)
    }

    fn source_tag(&self, key: &SourceKey) -> String {
        format!("{}{}", self.tag_prefix, key)
    }

    fn assemble(
        &self,
        key: &SourceKey,
        record: &SourceProductRecord,
        media: RehostedMedia,
        variants: Vec<Variant>,
    ) -> TargetProductPayload {
        let body_html = Self::render_body(&media);
        let title = record
            .title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .unwrap_or(FALLBACK_TITLE)
            .to_string();

        TargetProductPayload {
            title,
            body_html,
            vendor: self.vendor.clone(),
            product_type: self.product_type.clone(),
            tags: self.source_tag(key),
            status: PRODUCT_STATUS.to_string(),
            options: vec![ProductOption {
                name: OPTION_NAME.to_string(),
            }],
            images: media
                .main_images
                .into_iter()
                .map(|src| ProductImage { src })
                .collect(),
            variants,
        }
    }
}
