//! Diff between a stored target record and freshly built content

use std::fmt;

use crate::application::media_stage::mask_image_sources;
use crate::domain::product::{TargetProductPayload, TargetRecord};

/// One field that no longer matches the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldChange {
    Title { stored: String, source: String },
    Description,
    ImageCount { stored: usize, source: usize },
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Title { stored, source } => write!(f, "title ({stored:?} -> {source:?})"),
            Self::Description => f.write_str("description"),
            Self::ImageCount { stored, source } => write!(f, "image count ({stored} -> {source})"),
        }
    }
}

/// Decides whether a mapped target record needs an update.
/// An empty result means the record is left alone.
///
/// `description` is the description HTML the payload body was rendered
/// from, after inline images were re-hosted.
pub trait ProductComparator: Send + Sync {
    fn diff(
        &self,
        existing: &TargetRecord,
        payload: &TargetProductPayload,
        description: &str,
    ) -> Vec<FieldChange>;
}

/// Title equality, description containment and image count only.
///
/// Image URLs inside the description are ignored, since re-hosted URLs
/// differ between runs. Price, variant and inventory changes are not
/// detected.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoarseComparator;

impl ProductComparator for CoarseComparator {
    fn diff(
        &self,
        existing: &TargetRecord,
        payload: &TargetProductPayload,
        description: &str,
    ) -> Vec<FieldChange> {
        let mut changes = Vec::new();

        if existing.title != payload.title {
            changes.push(FieldChange::Title {
                stored: existing.title.clone(),
                source: payload.title.clone(),
            });
        }

        let stored_body = mask_image_sources(&existing.body_html);
        if !stored_body.contains(&mask_image_sources(description)) {
            changes.push(FieldChange::Description);
        }

        if existing.images.len() != payload.images.len() {
            changes.push(FieldChange::ImageCount {
                stored: existing.images.len(),
                source: payload.images.len(),
            });
        }

        changes
    }
}
