//! Persistence capability and the SplitView key schema.
//!
//! The store is the only thing that survives the reload the overlay triggers,
//! so everything the next page load needs is written here first. Keys:
//!
//! - `splitview_active_pages`: `{ <PageKey>: true }` for pages with the overlay on
//! - `splitview_scroll_y`: scroll offset to restore after the reload
//! - `splitview_csp_ready`: one-shot [`ReloadMarker`] naming the page whose
//!   bypass rule was just installed
//! - `<PageKey>`: [`PageState`] with the last panel width for that page

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::page::PageKey;

pub const ACTIVE_PAGES_KEY: &str = "splitview_active_pages";
pub const SCROLL_Y_KEY: &str = "splitview_scroll_y";
pub const CSP_READY_KEY: &str = "splitview_csp_ready";

/// Key/value items as exchanged with the store.
pub type Items = serde_json::Map<String, Value>;

/// Site-level "activate on load" flags, keyed by PageKey.
pub type ActivePages = BTreeMap<String, bool>;

/// Error type for persistence access.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Malformed value under '{key}': {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to encode value: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Asynchronous key/value persistence with last-error semantics.
#[async_trait(?Send)]
pub trait Store {
    /// Fetch the given keys. Missing keys are absent from the result.
    async fn get(&self, keys: &[&str]) -> Result<Items, StoreError>;
    async fn set(&self, items: Items) -> Result<(), StoreError>;
    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError>;
}

#[async_trait(?Send)]
impl<T: Store + ?Sized> Store for Rc<T> {
    async fn get(&self, keys: &[&str]) -> Result<Items, StoreError> {
        (**self).get(keys).await
    }

    async fn set(&self, items: Items) -> Result<(), StoreError> {
        (**self).set(items).await
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        (**self).remove(keys).await
    }
}

// =============================================================================
// Persisted Records
// =============================================================================

/// Per-page saved state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageState {
    pub width: u32,
}

/// Continuation written right before the overlay forces a reload.
///
/// Its presence for a PageKey means "the bypass rule is installed and the
/// reload that follows is ours"; the load that sees it must remove it before
/// doing anything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadMarker {
    pub page_key: String,
    #[serde(default)]
    pub scroll_y: i32,
}

impl ReloadMarker {
    pub fn new(page_key: &PageKey, scroll_y: i32) -> Self {
        Self {
            page_key: page_key.as_str().to_string(),
            scroll_y,
        }
    }

    pub fn matches(&self, page_key: &PageKey) -> bool {
        self.page_key == page_key.as_str()
    }
}

/// Older builds stored the bare PageKey string as the marker.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredMarker {
    Record(ReloadMarker),
    Key(String),
}

/// What a fresh page load needs to decide how to start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationSnapshot {
    pub page_active: bool,
    pub marker: Option<ReloadMarker>,
}

// =============================================================================
// Typed Accessors
// =============================================================================

fn decode<T: serde::de::DeserializeOwned>(items: &Items, key: &str) -> Result<Option<T>, StoreError> {
    match items.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|source| StoreError::Decode { key: key.to_string(), source }),
    }
}

/// Decode a value, treating malformed data as absent.
fn decode_lenient<T: serde::de::DeserializeOwned>(items: &Items, key: &str) -> Option<T> {
    decode(items, key).unwrap_or_else(|e| {
        log::warn!("{e}");
        None
    })
}

/// Read everything a fresh page load needs in one round trip.
pub async fn load_activation<S: Store + ?Sized>(store: &S, page_key: &PageKey) -> Result<ActivationSnapshot, StoreError> {
    let items = store.get(&[ACTIVE_PAGES_KEY, SCROLL_Y_KEY, CSP_READY_KEY]).await?;

    let active_pages: ActivePages = decode_lenient(&items, ACTIVE_PAGES_KEY).unwrap_or_default();
    let page_active = active_pages.get(page_key.as_str()).copied().unwrap_or(false);

    let fallback_scroll = decode_lenient::<i32>(&items, SCROLL_Y_KEY).unwrap_or(0);
    let marker = decode_lenient::<StoredMarker>(&items, CSP_READY_KEY).map(|stored| match stored {
        StoredMarker::Record(marker) => marker,
        StoredMarker::Key(page_key) => ReloadMarker { page_key, scroll_y: fallback_scroll },
    });

    Ok(ActivationSnapshot { page_active, marker })
}

pub async fn load_active_pages<S: Store + ?Sized>(store: &S) -> Result<ActivePages, StoreError> {
    let items = store.get(&[ACTIVE_PAGES_KEY]).await?;
    Ok(decode_lenient(&items, ACTIVE_PAGES_KEY).unwrap_or_default())
}

/// Add or remove `page_key` from the active-page set.
pub async fn set_page_active<S: Store + ?Sized>(store: &S, page_key: &PageKey, active: bool) -> Result<(), StoreError> {
    let mut pages = load_active_pages(store).await?;
    if active {
        pages.insert(page_key.as_str().to_string(), true);
    } else {
        pages.remove(page_key.as_str());
    }
    let mut items = Items::new();
    items.insert(ACTIVE_PAGES_KEY.to_string(), serde_json::to_value(pages)?);
    store.set(items).await
}

/// Persist the reload continuation. When `active_pages` is given it is
/// written in the same call, so the page is never marked active without a
/// marker or vice versa.
pub async fn arm_reload<S: Store + ?Sized>(
    store: &S,
    marker: &ReloadMarker,
    active_pages: Option<&ActivePages>,
) -> Result<(), StoreError> {
    let mut items = Items::new();
    items.insert(CSP_READY_KEY.to_string(), serde_json::to_value(marker)?);
    items.insert(SCROLL_Y_KEY.to_string(), Value::from(marker.scroll_y));
    if let Some(pages) = active_pages {
        items.insert(ACTIVE_PAGES_KEY.to_string(), serde_json::to_value(pages)?);
    }
    store.set(items).await
}

/// Drop the one-shot marker (consumed, or reload abandoned).
pub async fn clear_marker<S: Store + ?Sized>(store: &S) -> Result<(), StoreError> {
    store.remove(&[CSP_READY_KEY]).await
}

/// Undo [`arm_reload`]'s marker and scroll offset after a reload is called off.
pub async fn disarm_reload<S: Store + ?Sized>(store: &S) -> Result<(), StoreError> {
    store.remove(&[CSP_READY_KEY, SCROLL_Y_KEY]).await
}

pub async fn clear_scroll<S: Store + ?Sized>(store: &S) -> Result<(), StoreError> {
    store.remove(&[SCROLL_Y_KEY]).await
}

pub async fn load_width<S: Store + ?Sized>(store: &S, page_key: &PageKey) -> Result<Option<u32>, StoreError> {
    let items = store.get(&[page_key.as_str()]).await?;
    let state: Option<PageState> = decode(&items, page_key.as_str())?;
    Ok(state.map(|s| s.width).filter(|&w| w > 0))
}

pub async fn save_width<S: Store + ?Sized>(store: &S, page_key: &PageKey, width: u32) -> Result<(), StoreError> {
    let mut items = Items::new();
    items.insert(page_key.as_str().to_string(), serde_json::to_value(PageState { width })?);
    store.set(items).await
}

// =============================================================================
// In-Memory Store
// =============================================================================

/// Store backed by a map, with injectable failures.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RefCell<Items>,
    failure: RefCell<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following operation fail with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.borrow_mut() = Some(message.into());
    }

    pub fn recover(&self) {
        self.failure.borrow_mut().take();
    }

    pub fn value(&self, key: &str) -> Option<Value> {
        self.items.borrow().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.items.borrow().contains_key(key)
    }

    pub fn insert(&self, key: &str, value: Value) {
        self.items.borrow_mut().insert(key.to_string(), value);
    }

    pub fn snapshot(&self) -> Items {
        self.items.borrow().clone()
    }

    fn check(&self) -> Result<(), StoreError> {
        match self.failure.borrow().as_ref() {
            Some(message) => Err(StoreError::Backend(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait(?Send)]
impl Store for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<Items, StoreError> {
        self.check()?;
        let items = self.items.borrow();
        Ok(keys
            .iter()
            .filter_map(|key| items.get(*key).map(|value| (key.to_string(), value.clone())))
            .collect())
    }

    async fn set(&self, items: Items) -> Result<(), StoreError> {
        self.check()?;
        self.items.borrow_mut().extend(items);
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        self.check()?;
        let mut items = self.items.borrow_mut();
        for key in keys {
            items.remove(*key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(url: &str) -> PageKey {
        PageKey::parse(url).unwrap()
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_empty_store_is_inactive() {
        let store = MemoryStore::new();
        let snapshot = load_activation(&store, &key("https://x.test/a")).await.unwrap();
        assert_eq!(snapshot, ActivationSnapshot::default());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_arm_reload_writes_continuation() {
        let store = MemoryStore::new();
        let page = key("https://x.test/a");
        let mut pages = ActivePages::new();
        pages.insert(page.to_string(), true);

        arm_reload(&store, &ReloadMarker::new(&page, 640), Some(&pages)).await.unwrap();

        assert_eq!(store.value(SCROLL_Y_KEY), Some(json!(640)));
        assert_eq!(
            store.value(CSP_READY_KEY),
            Some(json!({ "pageKey": "splitview_x.test/a", "scrollY": 640 }))
        );
        let snapshot = load_activation(&store, &page).await.unwrap();
        assert!(snapshot.page_active);
        assert!(snapshot.marker.unwrap().matches(&page));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_legacy_string_marker() {
        let store = MemoryStore::new();
        store.insert(CSP_READY_KEY, json!("splitview_x.test/a"));
        store.insert(SCROLL_Y_KEY, json!(120));

        let snapshot = load_activation(&store, &key("https://x.test/a")).await.unwrap();
        assert_eq!(
            snapshot.marker,
            Some(ReloadMarker { page_key: "splitview_x.test/a".to_string(), scroll_y: 120 })
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_disarm_leaves_no_scroll_for_legacy_marker() {
        let store = MemoryStore::new();
        let page = key("https://x.test/a");
        arm_reload(&store, &ReloadMarker::new(&page, 500), None).await.unwrap();

        disarm_reload(&store).await.unwrap();
        assert!(store.snapshot().is_empty());

        store.insert(CSP_READY_KEY, json!("splitview_x.test/a"));
        let snapshot = load_activation(&store, &page).await.unwrap();
        assert_eq!(snapshot.marker.map(|m| m.scroll_y), Some(0));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_malformed_active_pages_reads_as_empty() {
        let store = MemoryStore::new();
        store.insert(ACTIVE_PAGES_KEY, json!(["not", "a", "map"]));
        let snapshot = load_activation(&store, &key("https://x.test/a")).await.unwrap();
        assert!(!snapshot.page_active);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_set_page_active_keeps_other_pages() {
        let store = MemoryStore::new();
        let a = key("https://x.test/a");
        let b = key("https://x.test/b");
        set_page_active(&store, &a, true).await.unwrap();
        set_page_active(&store, &b, true).await.unwrap();
        set_page_active(&store, &a, false).await.unwrap();

        assert_eq!(store.value(ACTIVE_PAGES_KEY), Some(json!({ "splitview_x.test/b": true })));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_width_round_trip() {
        let store = MemoryStore::new();
        let page = key("https://x.test/a");
        assert_eq!(load_width(&store, &page).await.unwrap(), None);

        save_width(&store, &page, 612).await.unwrap();
        assert_eq!(store.value(page.as_str()), Some(json!({ "width": 612 })));
        assert_eq!(load_width(&store, &page).await.unwrap(), Some(612));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_backend_failure_surfaces() {
        let store = MemoryStore::new();
        store.fail_with("QUOTA_BYTES quota exceeded");
        let err = load_activation(&store, &key("https://x.test/a")).await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(ref m) if m.contains("QUOTA")));
    }
}
