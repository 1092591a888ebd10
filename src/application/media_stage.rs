//! Media re-hosting step
//!
//! Copies a record's assets to our own media host before the payload is
//! assembled. Uploads run one after another; a failed asset is logged and
//! left out, it never fails the item.

use std::sync::Arc;

use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::domain::product::SourceProductRecord;
use crate::domain::services::MediaRehoster;
use crate::infrastructure::config::defaults;

/// Asset URLs after re-hosting
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RehostedMedia {
    pub main_images: Vec<String>,
    pub video_url: Option<String>,
    /// Description HTML with inline images pointing at the media host
    pub description: String,
    pub description_images: Vec<String>,
}

pub struct MediaStage {
    rehoster: Arc<dyn MediaRehoster>,
    max_main_images: usize,
}

impl MediaStage {
    pub fn new(rehoster: Arc<dyn MediaRehoster>, max_main_images: usize) -> Self {
        Self {
            rehoster,
            max_main_images,
        }
    }

    pub fn with_defaults(rehoster: Arc<dyn MediaRehoster>) -> Self {
        Self::new(rehoster, defaults::MAX_MAIN_IMAGES)
    }

    pub async fn rehost(&self, record: &SourceProductRecord) -> RehostedMedia {
        let mut main_images = Vec::new();
        for url in record.main_images.iter().take(self.max_main_images) {
            if let Some(hosted) = self.rehost_one(url, "main image").await {
                main_images.push(hosted);
            }
        }

        let video_url = match record.video_url.as_deref().filter(|url| !url.is_empty()) {
            Some(url) => self.rehost_one(url, "video").await,
            None => None,
        };

        let description = self.rehost_inline_images(&record.description).await;

        let mut description_images = Vec::new();
        for url in &record.description_images {
            if let Some(hosted) = self.rehost_one(url, "detail image").await {
                description_images.push(hosted);
            }
        }

        RehostedMedia {
            main_images,
            video_url,
            description,
            description_images,
        }
    }

    async fn rehost_one(&self, url: &str, kind: &str) -> Option<String> {
        let url = normalize_url(url);
        match self.rehoster.rehost(&url).await {
            Ok(hosted) => Some(hosted),
            Err(e) => {
                warn!("⚠️ Failed to re-host {} {}: {}", kind, url, e);
                None
            }
        }
    }

    /// Point every `<img src>` in the description at the media host.
    /// Images that fail to upload keep their original URL.
    async fn rehost_inline_images(&self, description: &str) -> String {
        let sources = inline_image_sources(description);
        if sources.is_empty() {
            return description.to_string();
        }

        let mut rewritten = description.to_string();
        for src in sources {
            if let Some(hosted) = self.rehost_one(&src, "inline image").await {
                // attribute values come back entity-decoded from the parser
                if !rewritten.contains(&src) {
                    debug!("Inline image source {} not found verbatim in description", src);
                    continue;
                }
                rewritten = rewritten.replace(&src, &hosted);
            }
        }
        rewritten
    }
}

/// Protocol-relative URLs (`//host/x.jpg`) are fetched over https
pub fn normalize_url(url: &str) -> String {
    match url.strip_prefix("//") {
        Some(rest) => format!("https://{rest}"),
        None => url.to_string(),
    }
}

/// Distinct `<img src>` values in document order
fn inline_image_sources(html: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse("img[src]") else {
        return Vec::new();
    };
    let fragment = Html::parse_fragment(html);

    let mut sources: Vec<String> = Vec::new();
    for element in fragment.select(&selector) {
        if let Some(src) = element.value().attr("src") {
            let src = src.trim();
            if !src.is_empty() && !sources.iter().any(|seen| seen == src) {
                sources.push(src.to_string());
            }
        }
    }
    sources
}

/// Blank every quoted `<img src>` value, leaving the surrounding markup
pub fn mask_image_sources(html: &str) -> String {
    let mut masked = html.to_string();
    for src in inline_image_sources(html) {
        masked = masked
            .replace(&format!("\"{src}\""), "\"\"")
            .replace(&format!("'{src}'"), "''");
    }
    masked
}
