//! Bucket façade
//!
//! `BucketClient` binds an [`ObjectStore`] to one bucket and turns the
//! store's request/response shapes into simpler values: booleans for
//! existence, a lazy stream for listings, and summaries for batch work.
//!
//! Every operation awaits its requests one at a time. Batch operations keep
//! going past individual failures and report them in the summary.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use tracing::{debug, instrument, warn};

use crate::config::TransferSettings;
use crate::error::{Error, Result};
use crate::path::{ObjectPath, join_key, key_from_file_name, local_target};
use crate::summary::{DeleteSummary, DownloadSummary, UploadSummary};
use crate::traits::{ListOptions, ObjectInfo, ObjectStore};

/// How `upload_files` walks a directory and names the resulting keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadOptions {
    /// Descend into subdirectories; keys become `/`-joined relative paths
    pub recursive: bool,

    /// Prefix prepended to every generated key
    pub key_prefix: Option<String>,
}

impl From<&TransferSettings> for UploadOptions {
    fn from(settings: &TransferSettings) -> Self {
        Self {
            recursive: settings.recursive_upload,
            key_prefix: None,
        }
    }
}

/// Bucket-scoped convenience client
#[derive(Debug)]
pub struct BucketClient<S: ObjectStore + ?Sized> {
    store: Arc<S>,
    bucket: String,
    settings: TransferSettings,
}

impl<S: ObjectStore + ?Sized> Clone for BucketClient<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            bucket: self.bucket.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<S: ObjectStore + ?Sized> BucketClient<S> {
    /// Bind `store` to `bucket` with default transfer settings
    pub fn new(store: Arc<S>, bucket: impl Into<String>) -> Self {
        Self::with_settings(store, bucket, TransferSettings::default())
    }

    pub fn with_settings(
        store: Arc<S>,
        bucket: impl Into<String>,
        settings: TransferSettings,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            settings,
        }
    }

    /// Bucket this client is bound to
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn settings(&self) -> &TransferSettings {
        &self.settings
    }

    fn path(&self, key: &str) -> ObjectPath {
        ObjectPath::new(&self.bucket, key)
    }

    /// Check whether `key` exists.
    ///
    /// Only "not found" becomes `false`; any other failure is returned.
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    pub async fn file_exists(&self, key: &str) -> Result<bool> {
        match self.store.head_object(&self.path(key)).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Lazily list every object under `prefix`, following continuation tokens.
    ///
    /// A page is requested only when the previous page's items have been
    /// consumed. Each call starts an independent pagination sequence.
    pub fn list_objects(&self, prefix: &str) -> BoxStream<'_, Result<ObjectInfo>> {
        enum Cursor {
            Start,
            Next(String),
            Done,
        }

        let root = self.path(prefix);
        stream::try_unfold((Cursor::Start, root), move |(cursor, root)| async move {
            let sent = match cursor {
                Cursor::Done => return Ok(None),
                Cursor::Start => None,
                Cursor::Next(token) => Some(token),
            };

            let options = ListOptions {
                max_keys: self.settings.effective_list_page_size(),
                continuation_token: sent.clone(),
            };
            let page = self.store.list_objects(&root, options).await?;
            debug!(
                bucket = %root.bucket,
                prefix = %root.key,
                items = page.items.len(),
                more = page.continuation_token.is_some(),
                "listed page"
            );

            let next = match page.continuation_token {
                Some(token) if sent.as_deref() == Some(token.as_str()) => {
                    return Err(Error::Provider(format!(
                        "listing of {root} returned the same continuation token twice"
                    )));
                }
                Some(token) => Cursor::Next(token),
                None => Cursor::Done,
            };

            Ok::<_, Error>(Some((page.items, (next, root))))
        })
        .map_ok(|items| stream::iter(items.into_iter().map(Ok::<_, Error>)))
        .try_flatten()
        .boxed()
    }

    /// Lazily yield every key in the bucket
    pub fn list_objects_recursive(&self) -> BoxStream<'_, Result<String>> {
        self.list_objects("").map_ok(|info| info.key).boxed()
    }

    /// Upload a local file.
    ///
    /// Without `key_name` the key is the file's base name. An existing object
    /// under the same key is replaced.
    #[instrument(skip_all, fields(bucket = %self.bucket, path = %local_path.as_ref().display()))]
    pub async fn upload_file(
        &self,
        local_path: impl AsRef<Path>,
        key_name: Option<&str>,
    ) -> Result<ObjectInfo> {
        let local_path = local_path.as_ref();
        let key = match key_name {
            Some(key) => key.to_string(),
            None => key_from_file_name(local_path)?,
        };
        if key.is_empty() {
            return Err(Error::InvalidKey("key cannot be empty".into()));
        }

        let data = tokio::fs::read(local_path)
            .await
            .map_err(|e| Error::local_io(local_path, e))?;
        let content_type = mime_guess::from_path(local_path)
            .first()
            .map(|m| m.essence_str().to_string());

        let info = self
            .store
            .put_object(&self.path(&key), data, content_type)
            .await?;
        debug!(%key, size = ?info.size_bytes, "uploaded");
        Ok(info)
    }

    /// Upload the files in `directory` using the client's transfer settings
    pub async fn upload_files(&self, directory: impl AsRef<Path>) -> Result<UploadSummary> {
        let options = UploadOptions::from(&self.settings);
        self.upload_files_with(directory, &options).await
    }

    /// Upload the files in `directory`.
    ///
    /// An unreadable `directory` is an error. Anything that fails after that,
    /// including unreadable subdirectories and symlink cycles, is recorded in
    /// the summary.
    #[instrument(skip_all, fields(bucket = %self.bucket, dir = %directory.as_ref().display()))]
    pub async fn upload_files_with(
        &self,
        directory: impl AsRef<Path>,
        options: &UploadOptions,
    ) -> Result<UploadSummary> {
        let directory = directory.as_ref();
        let mut summary = UploadSummary::new();
        let files = collect_files(directory, options.recursive, &mut summary).await?;
        let prefix = options.key_prefix.as_deref().unwrap_or_default();

        for (file, relative) in files {
            let key = join_key(prefix, &relative);
            match self.upload_file(&file, Some(&key)).await {
                Ok(_) => summary.record_success(key),
                Err(e) => {
                    warn!(%key, error = %e, "upload failed");
                    summary.record_failure(key, e.to_string());
                }
            }
        }

        debug!(
            succeeded = summary.succeeded_count(),
            failed = summary.failed_count(),
            "directory upload finished"
        );
        Ok(summary)
    }

    /// Download `key` to `target_dir/<key>`, creating parent directories.
    ///
    /// Returns the path written.
    #[instrument(skip(self, target_dir), fields(bucket = %self.bucket))]
    pub async fn download_file(&self, key: &str, target_dir: impl AsRef<Path>) -> Result<PathBuf> {
        let destination = local_target(target_dir.as_ref(), key)?;
        let data = self.store.get_object(&self.path(key)).await?;

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::local_io(parent, e))?;
        }
        tokio::fs::write(&destination, &data)
            .await
            .map_err(|e| Error::local_io(&destination, e))?;

        debug!(path = %destination.display(), bytes = data.len(), "downloaded");
        Ok(destination)
    }

    /// Download each key, collecting failures instead of stopping
    pub async fn download_files<I>(&self, keys: I, target_dir: impl AsRef<Path>) -> DownloadSummary
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let target_dir = target_dir.as_ref();
        let mut summary = DownloadSummary::new();

        for key in keys {
            let key = key.as_ref();
            match self.download_file(key, target_dir).await {
                Ok(_) => summary.record_success(key),
                Err(e) => {
                    warn!(%key, error = %e, "download failed");
                    summary.record_failure(key, e.to_string());
                }
            }
        }

        summary
    }

    /// Download every object under `prefix`, keeping full keys as paths.
    ///
    /// Directory marker objects are skipped. A prefix with nothing under it
    /// is `NotFound`; a listing failure aborts the download.
    #[instrument(skip(self, target_dir), fields(bucket = %self.bucket))]
    pub async fn download_prefix(
        &self,
        prefix: &str,
        target_dir: impl AsRef<Path>,
    ) -> Result<DownloadSummary> {
        let target_dir = target_dir.as_ref();
        let prefix = if prefix.is_empty() || prefix.ends_with('/') {
            prefix.to_string()
        } else {
            format!("{prefix}/")
        };

        let mut summary = DownloadSummary::new();
        let mut listed = 0usize;
        let mut objects = self.list_objects(&prefix);

        while let Some(info) = objects.try_next().await? {
            listed += 1;
            if info.key.ends_with('/') {
                continue;
            }
            match self.download_file(&info.key, target_dir).await {
                Ok(_) => summary.record_success(info.key),
                Err(e) => {
                    warn!(key = %info.key, error = %e, "download failed");
                    summary.record_failure(info.key, e.to_string());
                }
            }
        }

        if listed == 0 {
            return Err(Error::NotFound(self.path(&prefix).to_string()));
        }
        Ok(summary)
    }

    /// Delete a single object
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    pub async fn delete_file(&self, key: &str) -> Result<()> {
        self.store.delete_object(&self.path(key)).await
    }

    /// Delete many objects with batched requests.
    ///
    /// Requests carry at most `delete_batch_size` keys. Keys the provider
    /// rejects, or never acknowledges, end up in `failed`. When a whole
    /// request fails, every key in it is failed with the provider's error.
    ///
    /// The summary reflects what the store reports. S3 treats deleting an
    /// absent key as a success, so with `S3Client` missing keys land in
    /// `succeeded`; `MemoryStore` reports them as `NoSuchKey` failures.
    #[instrument(skip_all, fields(bucket = %self.bucket))]
    pub async fn delete_files<I>(&self, keys: I) -> DeleteSummary
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut seen = HashSet::new();
        let keys: Vec<String> = keys
            .into_iter()
            .map(Into::into)
            .filter(|k| seen.insert(k.clone()))
            .collect();

        let mut summary = DeleteSummary::new();
        for chunk in keys.chunks(self.settings.effective_delete_batch_size()) {
            match self.store.delete_objects(&self.bucket, chunk).await {
                Ok(outcome) => {
                    let confirmed: HashSet<&str> =
                        outcome.deleted.iter().map(String::as_str).collect();
                    let rejected: HashMap<&str, String> = outcome
                        .errors
                        .iter()
                        .map(|e| (e.key.as_str(), delete_reason(&e.code, &e.message)))
                        .collect();

                    for key in chunk {
                        if let Some(reason) = rejected.get(key.as_str()) {
                            summary.record_failure(key.as_str(), reason.as_str());
                        } else if confirmed.contains(key.as_str()) {
                            summary.record_success(key.as_str());
                        } else {
                            summary.record_failure(
                                key.as_str(),
                                "deletion was not acknowledged by the provider",
                            );
                        }
                    }
                }
                Err(e) => {
                    warn!(keys = chunk.len(), error = %e, "batch delete request failed");
                    let reason = e.to_string();
                    for key in chunk {
                        summary.record_failure(key.as_str(), reason.as_str());
                    }
                }
            }
        }

        debug!(
            deleted = summary.succeeded_count(),
            failed = summary.failed_count(),
            "batch delete finished"
        );
        summary
    }
}

fn delete_reason(code: &str, message: &str) -> String {
    match (code.is_empty(), message.is_empty()) {
        (false, false) => format!("{code}: {message}"),
        (false, true) => code.to_string(),
        (true, false) => message.to_string(),
        (true, true) => "unknown error".to_string(),
    }
}

/// Names of every bucket visible to the store's session
pub async fn list_bucket_names<S: ObjectStore + ?Sized>(store: &S) -> Result<Vec<String>> {
    let buckets = store.list_buckets().await?;
    Ok(buckets.into_iter().map(|b| b.key).collect())
}

/// Gather regular files under `root` with their `/`-joined relative paths.
///
/// Symlinks are followed, but a directory already visited (by canonical
/// path) is not entered twice, so link cycles end the walk instead of
/// repeating it. Failing to read `root` is an error; anything below it that
/// cannot be read, and every cycle found, is recorded in `summary`.
async fn collect_files(
    root: &Path,
    recursive: bool,
    summary: &mut UploadSummary,
) -> Result<Vec<(PathBuf, String)>> {
    let mut files = Vec::new();
    let mut visited = HashSet::new();
    let canonical_root = tokio::fs::canonicalize(root)
        .await
        .map_err(|e| Error::local_io(root, e))?;
    visited.insert(canonical_root);
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if dir == root => return Err(Error::local_io(root, e)),
            Err(e) => {
                summary.record_failure(relative_key(root, &dir), e.to_string());
                continue;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) if dir == root => return Err(Error::local_io(root, e)),
                Err(e) => {
                    summary.record_failure(relative_key(root, &dir), e.to_string());
                    break;
                }
            };

            let path = entry.path();
            let metadata = match tokio::fs::metadata(&path).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    summary.record_failure(relative_key(root, &path), e.to_string());
                    continue;
                }
            };

            if metadata.is_file() {
                let relative = relative_key(root, &path);
                files.push((path, relative));
            } else if metadata.is_dir() && recursive {
                match tokio::fs::canonicalize(&path).await {
                    Ok(canonical) if visited.insert(canonical.clone()) => pending.push(path),
                    Ok(canonical) => {
                        warn!(path = %path.display(), canonical = %canonical.display(), "skipping directory cycle");
                        summary.record_failure(
                            relative_key(root, &path),
                            format!("directory cycle: already visited {}", canonical.display()),
                        );
                    }
                    Err(e) => summary.record_failure(relative_key(root, &path), e.to_string()),
                }
            }
        }
    }

    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}

fn relative_key(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
