//! Test utilities for catalog-sync
//!
//! In-memory stand-ins for every external collaborator, so pipeline tests
//! run without network or database access and can inspect what was called.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::application::content_transformer::{ContentTransformer, ProductContentTransformer};
use crate::application::media_stage::RehostedMedia;
use crate::domain::errors::{ClientError, SyncError};
use crate::domain::product::{
    PriceTier, SourceKey, SourceProductRecord, TargetKey, TargetProductPayload, TargetRecord,
};
use crate::domain::repositories::IdentityMap;
use crate::domain::services::{AlertNotifier, MediaRehoster, SourceCatalog, TargetStore};

/// Fakes may be shared with a task that panicked; keep going regardless
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Product record with media, video and two usable price tiers
pub fn sample_record() -> SourceProductRecord {
    SourceProductRecord {
        source_key: Some(SourceKey::from("1600")),
        title: Some("Steel Bottle".to_string()),
        description: "Double-wall insulated bottle".to_string(),
        main_images: (0..3).map(|i| format!("https://src.test/main-{i}.jpg")).collect(),
        description_images: vec!["https://src.test/detail-0.jpg".to_string()],
        video_url: Some("https://src.test/video.mp4".to_string()),
        price_tiers: vec![PriceTier::new(1, 10.0, None), PriceTier::new(10, 8.5, Some(100))],
    }
}

/// Payload built from a record without re-hosting its media
pub fn sample_payload(record: &SourceProductRecord) -> TargetProductPayload {
    let transformer = ProductContentTransformer::default();
    let key = record
        .source_key
        .clone()
        .unwrap_or_else(|| SourceKey::from("1600"));
    let media = RehostedMedia {
        main_images: record.main_images.clone(),
        video_url: record.video_url.clone(),
        description: record.description.clone(),
        description_images: record.description_images.clone(),
    };
    let variants = transformer.derive_variants(record).unwrap_or_default();
    transformer.assemble(&key, record, media, variants)
}

/// Scripted source catalog
#[derive(Default)]
pub struct FakeCatalog {
    pages: Vec<Vec<SourceKey>>,
    failing_page: Option<u32>,
    details: HashMap<SourceKey, SourceProductRecord>,
    failing_details: HashSet<SourceKey>,
    panicking_details: HashSet<SourceKey>,
    detail_delay: Option<Duration>,
    listed: Mutex<Vec<u32>>,
    detail_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listing pages in order; pages past the end come back empty
    pub fn with_pages(pages: Vec<Vec<SourceKey>>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    pub fn with_detail(mut self, key: SourceKey, record: SourceProductRecord) -> Self {
        self.details.insert(key, record);
        self
    }

    pub fn with_detail_delay(mut self, delay: Duration) -> Self {
        self.detail_delay = Some(delay);
        self
    }

    pub fn failing_page(mut self, page: u32) -> Self {
        self.failing_page = Some(page);
        self
    }

    pub fn failing_detail(mut self, key: SourceKey) -> Self {
        self.failing_details.insert(key);
        self
    }

    pub fn panicking_detail(mut self, key: SourceKey) -> Self {
        self.panicking_details.insert(key);
        self
    }

    /// Page numbers requested so far, in call order
    pub fn listed_pages(&self) -> Vec<u32> {
        lock(&self.listed).clone()
    }

    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight_details(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceCatalog for FakeCatalog {
    async fn list_ids(&self, page: u32, _page_size: u32) -> Result<Vec<SourceKey>, ClientError> {
        lock(&self.listed).push(page);
        if self.failing_page == Some(page) {
            return Err(ClientError::HttpStatus {
                status: 503,
                body: "listing unavailable".to_string(),
            });
        }
        let index = page.saturating_sub(1) as usize;
        Ok(self.pages.get(index).cloned().unwrap_or_default())
    }

    async fn fetch_detail(&self, key: &SourceKey) -> Result<Option<SourceProductRecord>, ClientError> {
        if self.panicking_details.contains(key) {
            panic!("simulated failure while fetching {key}");
        }

        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.detail_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_details.contains(key) {
            return Err(ClientError::Io("connection reset".to_string()));
        }
        Ok(self.details.get(key).cloned())
    }
}

/// Target store kept in memory; ids are assigned from 1000 upwards
pub struct FakeTargetStore {
    records: Mutex<BTreeMap<String, TargetRecord>>,
    next_id: AtomicU64,
    create_calls: AtomicUsize,
    update_calls: AtomicUsize,
    fail_creates: AtomicBool,
}

impl FakeTargetStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1000),
            create_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
            fail_creates: AtomicBool::new(false),
        }
    }

    pub fn seed(&self, record: TargetRecord) {
        lock(&self.records).insert(record.id.to_string(), record);
    }

    pub fn record(&self, key: &TargetKey) -> Option<TargetRecord> {
        lock(&self.records).get(key.as_str()).cloned()
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn fail_creates(&self) {
        self.fail_creates.store(true, Ordering::SeqCst);
    }

    fn not_found(key: &TargetKey) -> ClientError {
        ClientError::HttpStatus {
            status: 404,
            body: format!("product {key} not found"),
        }
    }
}

impl Default for FakeTargetStore {
    fn default() -> Self {
        Self::new()
    }
}

fn record_from_payload(id: TargetKey, payload: &TargetProductPayload) -> TargetRecord {
    TargetRecord {
        id,
        title: payload.title.clone(),
        body_html: payload.body_html.clone(),
        images: payload.images.clone(),
        tags: payload.tags.clone(),
    }
}

#[async_trait]
impl TargetStore for FakeTargetStore {
    async fn create(&self, payload: &TargetProductPayload) -> Result<TargetRecord, ClientError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(ClientError::HttpStatus {
                status: 422,
                body: "invalid product".to_string(),
            });
        }

        let id = TargetKey::new(self.next_id.fetch_add(1, Ordering::SeqCst).to_string());
        let record = record_from_payload(id, payload);
        self.seed(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        target_key: &TargetKey,
        payload: &TargetProductPayload,
    ) -> Result<TargetRecord, ClientError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        let mut records = lock(&self.records);
        let stored = records
            .get_mut(target_key.as_str())
            .ok_or_else(|| Self::not_found(target_key))?;
        *stored = record_from_payload(target_key.clone(), payload);
        Ok(stored.clone())
    }

    async fn fetch(&self, target_key: &TargetKey) -> Result<TargetRecord, ClientError> {
        self.record(target_key).ok_or_else(|| Self::not_found(target_key))
    }

    async fn find_by_source_tag(&self, tag: &str) -> Result<Option<TargetRecord>, ClientError> {
        Ok(lock(&self.records)
            .values()
            .find(|record| record.tags.split(',').any(|candidate| candidate.trim() == tag))
            .cloned())
    }
}

/// Media host that maps `scheme://path` to `https://cdn.test/path`
#[derive(Default)]
pub struct FakeRehoster {
    failing: Vec<String>,
    uploaded: Mutex<Vec<String>>,
}

impl FakeRehoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every URL containing `fragment`
    pub fn failing_on(mut self, fragment: &str) -> Self {
        self.failing.push(fragment.to_string());
        self
    }

    /// Every URL passed to `rehost`, including failed ones
    pub fn uploaded(&self) -> Vec<String> {
        lock(&self.uploaded).clone()
    }
}

#[async_trait]
impl MediaRehoster for FakeRehoster {
    async fn rehost(&self, source_url: &str) -> Result<String, ClientError> {
        lock(&self.uploaded).push(source_url.to_string());
        if self.failing.iter().any(|fragment| source_url.contains(fragment.as_str())) {
            return Err(ClientError::Io(format!("upload of {source_url} failed")));
        }
        let path = source_url
            .split_once("://")
            .map_or(source_url, |(_, rest)| rest);
        Ok(format!("https://cdn.test/{path}"))
    }
}

/// Identity map in a `HashMap`
#[derive(Default)]
pub struct InMemoryIdentityMap {
    entries: Mutex<HashMap<SourceKey, TargetKey>>,
    failing: AtomicBool,
}

impl InMemoryIdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &SourceKey) -> Option<TargetKey> {
        lock(&self.entries).get(key).cloned()
    }

    pub fn insert(&self, key: SourceKey, target_key: TargetKey) {
        lock(&self.entries).insert(key, target_key);
    }

    /// Make every subsequent call fail
    pub fn fail_all(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), SyncError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SyncError::IdentityMap("database is locked".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityMap for InMemoryIdentityMap {
    async fn lookup(&self, key: &SourceKey) -> Result<Option<TargetKey>, SyncError> {
        self.check()?;
        Ok(self.get(key))
    }

    async fn upsert(&self, key: &SourceKey, target_key: &TargetKey) -> Result<(), SyncError> {
        self.check()?;
        self.insert(key.clone(), target_key.clone());
        Ok(())
    }
}

/// Notifier that keeps every `(subject, message)` pair
#[derive(Default)]
pub struct RecordingNotifier {
    alerts: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<(String, String)> {
        lock(&self.alerts).clone()
    }
}

#[async_trait]
impl AlertNotifier for RecordingNotifier {
    async fn notify(&self, subject: &str, message: &str) {
        lock(&self.alerts).push((subject.to_string(), message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_payload_is_complete() {
        let payload = sample_payload(&sample_record());
        assert_eq!(payload.variants.len(), 2);
        assert_eq!(payload.images.len(), 3);
        assert!(payload.body_html.contains("Double-wall insulated bottle"));
    }

    #[tokio::test]
    async fn fake_store_round_trips_created_records() {
        let store = FakeTargetStore::new();
        let created = store.create(&sample_payload(&sample_record())).await.unwrap();

        assert_eq!(store.fetch(&created.id).await.unwrap(), created);
        assert_eq!(
            store.find_by_source_tag("AlibabaID:1600").await.unwrap().map(|r| r.id),
            Some(created.id)
        );
    }
}
