//! In-memory ObjectStore
//!
//! Stands in for a real provider in tests. Listing honours page sizes and
//! continuation tokens the same way S3 does, so pagination bugs show up here.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::path::ObjectPath;
use crate::traits::{DeleteOutcome, KeyError, ListOptions, ListPage, ObjectInfo, ObjectStore};

/// Default page size, matching S3's ListObjectsV2 limit
pub const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: Option<String>,
    last_modified: jiff::Timestamp,
}

#[derive(Debug, Default)]
struct State {
    buckets: BTreeSet<String>,
    objects: BTreeMap<(String, String), StoredObject>,
}

/// ObjectStore backed by an ordered map
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
    page_size: usize,
    list_requests: AtomicUsize,
    delete_requests: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            page_size: DEFAULT_PAGE_SIZE,
            list_requests: AtomicUsize::new(0),
            delete_requests: AtomicUsize::new(0),
        }
    }

    /// Cap every listing page at `page_size` entries
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn create_bucket(&self, bucket: &str) {
        self.lock().buckets.insert(bucket.to_string());
    }

    /// Number of `list_objects` requests served so far
    pub fn list_requests(&self) -> usize {
        self.list_requests.load(Ordering::SeqCst)
    }

    /// Number of `delete_objects` requests served so far
    pub fn delete_requests(&self) -> usize {
        self.delete_requests.load(Ordering::SeqCst)
    }

    /// Number of objects stored in `bucket`
    pub fn object_count(&self, bucket: &str) -> usize {
        self.lock()
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A poisoned lock only means another test thread panicked mid-call.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn require_bucket(state: &State, bucket: &str) -> Result<()> {
        if state.buckets.contains(bucket) {
            Ok(())
        } else {
            Err(Error::NotFound(format!("Bucket not found: {bucket}")))
        }
    }

    fn info(key: &str, object: &StoredObject) -> ObjectInfo {
        let mut info = ObjectInfo::file(key, object.data.len() as i64);
        info.last_modified = Some(object.last_modified);
        info.content_type = object.content_type.clone();
        info
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_buckets(&self) -> Result<Vec<ObjectInfo>> {
        Ok(self
            .lock()
            .buckets
            .iter()
            .map(ObjectInfo::bucket)
            .collect())
    }

    async fn list_objects(&self, path: &ObjectPath, options: ListOptions) -> Result<ListPage> {
        self.list_requests.fetch_add(1, Ordering::SeqCst);
        let state = self.lock();
        Self::require_bucket(&state, &path.bucket)?;

        let limit = options
            .max_keys
            .map(|m| (m.max(1) as usize).min(self.page_size))
            .unwrap_or(self.page_size);
        let prefix = path.key.as_str();

        let mut items = Vec::new();
        let mut last_key = None;
        let mut truncated = false;

        let candidates = state
            .objects
            .iter()
            .filter(|((b, k), _)| b == &path.bucket && k.starts_with(prefix))
            .filter(|((_, k), _)| match &options.continuation_token {
                Some(token) => k.as_str() > token.as_str(),
                None => true,
            });

        for ((_, key), object) in candidates {
            if items.len() == limit {
                truncated = true;
                break;
            }

            items.push(Self::info(key, object));
            last_key = Some(key.clone());
        }

        Ok(ListPage {
            items,
            truncated,
            continuation_token: if truncated { last_key } else { None },
        })
    }

    async fn head_object(&self, path: &ObjectPath) -> Result<ObjectInfo> {
        let state = self.lock();
        Self::require_bucket(&state, &path.bucket)?;
        state
            .objects
            .get(&(path.bucket.clone(), path.key.clone()))
            .map(|object| Self::info(&path.key, object))
            .ok_or_else(|| Error::NotFound(path.to_string()))
    }

    async fn get_object(&self, path: &ObjectPath) -> Result<Vec<u8>> {
        let state = self.lock();
        Self::require_bucket(&state, &path.bucket)?;
        state
            .objects
            .get(&(path.bucket.clone(), path.key.clone()))
            .map(|object| object.data.clone())
            .ok_or_else(|| Error::NotFound(path.to_string()))
    }

    async fn put_object(
        &self,
        path: &ObjectPath,
        data: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<ObjectInfo> {
        let mut state = self.lock();
        Self::require_bucket(&state, &path.bucket)?;

        let object = StoredObject {
            data,
            content_type,
            last_modified: jiff::Timestamp::now(),
        };
        let info = Self::info(&path.key, &object);
        state
            .objects
            .insert((path.bucket.clone(), path.key.clone()), object);
        Ok(info)
    }

    async fn delete_object(&self, path: &ObjectPath) -> Result<()> {
        let mut state = self.lock();
        Self::require_bucket(&state, &path.bucket)?;
        state
            .objects
            .remove(&(path.bucket.clone(), path.key.clone()));
        Ok(())
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<DeleteOutcome> {
        self.delete_requests.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        Self::require_bucket(&state, bucket)?;

        let mut outcome = DeleteOutcome::default();
        for key in keys {
            match state.objects.remove(&(bucket.to_string(), key.clone())) {
                Some(_) => outcome.deleted.push(key.clone()),
                None => outcome.errors.push(KeyError {
                    key: key.clone(),
                    code: "NoSuchKey".to_string(),
                    message: "The specified key does not exist.".to_string(),
                }),
            }
        }
        Ok(outcome)
    }
}
