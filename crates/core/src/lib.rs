//! bucket-core: SDK-independent bucket operations
//!
//! This crate provides:
//! - The `ObjectStore` trait, the seam to whichever SDK talks to the store
//! - `BucketClient`, a bucket-scoped façade over any `ObjectStore`
//! - Batch summaries, key/path helpers and configuration management
//! - `MemoryStore`, an in-memory `ObjectStore` for tests
//!
//! Nothing here depends on an AWS crate; see `bucket-s3` for the adapter.
//!
//! Configuration is a convenience layer. `BucketClient::new` needs only a
//! store and a bucket name, and no operation reads the config file itself.

pub mod bucket;
pub mod config;
pub mod error;
pub mod memory;
pub mod path;
pub mod summary;
pub mod traits;

pub use bucket::{BucketClient, UploadOptions, list_bucket_names};
pub use config::{
    Config, ConfigManager, RetryConfig, StoreSettings, TimeoutConfig, TransferSettings,
};
pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use path::{ObjectPath, join_key, key_from_file_name, local_target};
pub use summary::{BatchSummary, DeleteSummary, DownloadSummary, Failure, UploadSummary};
pub use traits::{DeleteOutcome, KeyError, ListOptions, ListPage, ObjectInfo, ObjectStore};
