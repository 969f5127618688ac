//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the ObjectStore trait from bucket-core.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};

use bucket_core::{
    BucketClient, Config, DeleteOutcome, Error, KeyError, ListOptions, ListPage, ObjectInfo,
    ObjectPath, ObjectStore, Result, StoreSettings,
};

/// Error codes S3 uses for a missing key or bucket
const NOT_FOUND_CODES: &[&str] = &["NoSuchKey", "NotFound", "NoSuchBucket"];

/// Error codes S3 uses for rejected credentials or permissions
const AUTH_CODES: &[&str] = &[
    "AccessDenied",
    "InvalidAccessKeyId",
    "SignatureDoesNotMatch",
    "ExpiredToken",
    "InvalidToken",
];

/// S3 client wrapper
#[derive(Debug, Clone)]
pub struct S3Client {
    inner: aws_sdk_s3::Client,
}

impl S3Client {
    /// Create a new S3 client from store settings.
    ///
    /// Credentials come from the SDK's default provider chain.
    pub async fn new(settings: &StoreSettings) -> Result<Self> {
        settings.validate()?;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(profile) = &settings.profile {
            loader = loader.profile_name(profile);
        }

        if let Some(region) = &settings.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }

        if let Some(endpoint) = &settings.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        if let Some(retry) = &settings.retry {
            loader = loader.retry_config(
                aws_config::retry::RetryConfig::standard()
                    .with_max_attempts(retry.max_attempts)
                    .with_initial_backoff(Duration::from_millis(retry.initial_backoff_ms))
                    .with_max_backoff(Duration::from_millis(retry.max_backoff_ms)),
            );
        }

        if let Some(timeout) = &settings.timeout {
            loader = loader.timeout_config(
                aws_config::timeout::TimeoutConfig::builder()
                    .connect_timeout(Duration::from_millis(timeout.connect_ms))
                    .read_timeout(Duration::from_millis(timeout.read_ms))
                    .build(),
            );
        }

        let config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(settings.force_path_style)
            .build();

        tracing::debug!(
            region = ?settings.region,
            endpoint = ?settings.endpoint,
            path_style = settings.force_path_style,
            "created S3 client"
        );

        Ok(Self::from_client(aws_sdk_s3::Client::from_conf(s3_config)))
    }

    /// Wrap a client the caller already configured and authenticated
    pub fn from_client(inner: aws_sdk_s3::Client) -> Self {
        Self { inner }
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }
}

/// Build a `BucketClient` for the bucket named in `config`
pub async fn connect(config: &Config) -> Result<BucketClient<S3Client>> {
    let bucket = config
        .bucket
        .clone()
        .ok_or_else(|| Error::Config("no bucket configured".into()))?;

    let client = S3Client::new(&config.store).await?;
    Ok(BucketClient::with_settings(
        std::sync::Arc::new(client),
        bucket,
        config.transfer.clone(),
    ))
}

/// Translate an SDK failure into the crate's error taxonomy
fn classify<E>(err: SdkError<E, HttpResponse>, target: &str) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let detail = DisplayErrorContext(&err).to_string();

    if matches!(
        err,
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_)
    ) {
        return Error::Network(format!("{target}: {detail}"));
    }

    let status = err.raw_response().map(|r| r.status().as_u16());
    classify_code(err.code(), status, target, detail)
}

fn classify_code(code: Option<&str>, status: Option<u16>, target: &str, detail: String) -> Error {
    let code = code.unwrap_or_default();

    if NOT_FOUND_CODES.contains(&code) || status == Some(404) {
        Error::NotFound(target.to_string())
    } else if AUTH_CODES.contains(&code) || status == Some(403) {
        Error::Auth(format!("{target}: {detail}"))
    } else {
        Error::Provider(format!("{target}: {detail}"))
    }
}

fn to_timestamp(value: &aws_smithy_types::DateTime) -> Option<jiff::Timestamp> {
    jiff::Timestamp::new(value.secs(), value.subsec_nanos() as i32).ok()
}

fn trim_etag(etag: &str) -> String {
    etag.trim_matches('"').to_string()
}

fn object_identifiers(keys: &[String]) -> Result<Vec<ObjectIdentifier>> {
    keys.iter()
        .map(|k| {
            ObjectIdentifier::builder()
                .key(k)
                .build()
                .map_err(|e| Error::General(e.to_string()))
        })
        .collect()
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn list_buckets(&self) -> Result<Vec<ObjectInfo>> {
        let response = self
            .inner
            .list_buckets()
            .send()
            .await
            .map_err(|e| classify(e, "list buckets"))?;

        let buckets = response
            .buckets()
            .iter()
            .map(|b| {
                let mut info = ObjectInfo::bucket(b.name().unwrap_or_default());
                info.last_modified = b.creation_date().and_then(to_timestamp);
                info
            })
            .collect();

        Ok(buckets)
    }

    async fn list_objects(&self, path: &ObjectPath, options: ListOptions) -> Result<ListPage> {
        let mut request = self.inner.list_objects_v2().bucket(&path.bucket);

        if !path.key.is_empty() {
            request = request.prefix(&path.key);
        }

        if let Some(max) = options.max_keys {
            request = request.max_keys(max);
        }

        if let Some(token) = &options.continuation_token {
            request = request.continuation_token(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify(e, &path.to_string()))?;

        let mut items = Vec::new();
        for object in response.contents() {
            let key = object.key().unwrap_or_default();
            let mut info = ObjectInfo::file(key, object.size().unwrap_or(0));
            info.last_modified = object.last_modified().and_then(to_timestamp);
            info.etag = object.e_tag().map(trim_etag);
            info.storage_class = object.storage_class().map(|sc| sc.as_str().to_string());
            items.push(info);
        }

        Ok(ListPage {
            items,
            truncated: response.is_truncated().unwrap_or(false),
            continuation_token: response.next_continuation_token().map(|s| s.to_string()),
        })
    }

    async fn head_object(&self, path: &ObjectPath) -> Result<ObjectInfo> {
        let response = self
            .inner
            .head_object()
            .bucket(&path.bucket)
            .key(&path.key)
            .send()
            .await
            .map_err(|e| classify(e, &path.to_string()))?;

        let mut info = ObjectInfo::file(&path.key, response.content_length().unwrap_or(0));
        info.last_modified = response.last_modified().and_then(to_timestamp);
        info.etag = response.e_tag().map(trim_etag);
        info.content_type = response.content_type().map(|ct| ct.to_string());
        info.storage_class = response.storage_class().map(|sc| sc.as_str().to_string());

        Ok(info)
    }

    async fn get_object(&self, path: &ObjectPath) -> Result<Vec<u8>> {
        let response = self
            .inner
            .get_object()
            .bucket(&path.bucket)
            .key(&path.key)
            .send()
            .await
            .map_err(|e| classify(e, &path.to_string()))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| Error::Network(format!("{path}: {e}")))?
            .into_bytes()
            .to_vec();

        Ok(data)
    }

    async fn put_object(
        &self,
        path: &ObjectPath,
        data: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<ObjectInfo> {
        let size = data.len() as i64;

        let response = self
            .inner
            .put_object()
            .bucket(&path.bucket)
            .key(&path.key)
            .body(ByteStream::from(data))
            .set_content_type(content_type.clone())
            .send()
            .await
            .map_err(|e| classify(e, &path.to_string()))?;

        let mut info = ObjectInfo::file(&path.key, size);
        info.etag = response.e_tag().map(trim_etag);
        info.content_type = content_type;
        info.last_modified = Some(jiff::Timestamp::now());

        Ok(info)
    }

    async fn delete_object(&self, path: &ObjectPath) -> Result<()> {
        self.inner
            .delete_object()
            .bucket(&path.bucket)
            .key(&path.key)
            .send()
            .await
            .map_err(|e| classify(e, &path.to_string()))?;

        Ok(())
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<DeleteOutcome> {
        if keys.is_empty() {
            return Ok(DeleteOutcome::default());
        }

        let delete = Delete::builder()
            .set_objects(Some(object_identifiers(keys)?))
            .quiet(false)
            .build()
            .map_err(|e| Error::General(e.to_string()))?;

        let response = self
            .inner
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| classify(e, bucket))?;

        let deleted = response
            .deleted()
            .iter()
            .filter_map(|d| d.key().map(|k| k.to_string()))
            .collect();

        let errors: Vec<KeyError> = response
            .errors()
            .iter()
            .filter_map(|e| {
                e.key().map(|key| KeyError {
                    key: key.to_string(),
                    code: e.code().unwrap_or_default().to_string(),
                    message: e.message().unwrap_or_default().to_string(),
                })
            })
            .collect();

        if !errors.is_empty() {
            tracing::warn!(bucket, failed = errors.len(), "provider rejected some deletes");
        }

        Ok(DeleteOutcome { deleted, errors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_not_found() {
        let err = classify_code(Some("NoSuchKey"), Some(404), "b/k", "detail".into());
        assert!(matches!(err, Error::NotFound(ref t) if t == "b/k"));

        // HeadObject carries no error body, only the status
        let err = classify_code(None, Some(404), "b/k", "detail".into());
        assert!(err.is_not_found());

        let err = classify_code(Some("NoSuchBucket"), None, "b", "detail".into());
        assert!(err.is_not_found());
    }

    #[test]
    fn test_classify_auth() {
        let err = classify_code(Some("AccessDenied"), Some(403), "b/k", "denied".into());
        assert!(matches!(err, Error::Auth(_)));

        let err = classify_code(None, Some(403), "b/k", "forbidden".into());
        assert!(matches!(err, Error::Auth(_)));

        let err = classify_code(Some("SignatureDoesNotMatch"), None, "b/k", "sig".into());
        assert!(matches!(err, Error::Auth(_)));
    }

    #[test]
    fn test_classify_other_provider_errors() {
        let err = classify_code(Some("SlowDown"), Some(503), "b/k", "throttled".into());
        assert!(matches!(err, Error::Provider(ref m) if m == "b/k: throttled"));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_to_timestamp() {
        let value = aws_smithy_types::DateTime::from_secs_and_nanos(1_700_000_000, 500);
        let ts = to_timestamp(&value).unwrap();
        assert_eq!(ts.as_second(), 1_700_000_000);
        assert_eq!(ts.subsec_nanosecond(), 500);
    }

    #[test]
    fn test_trim_etag() {
        assert_eq!(trim_etag("\"abc123\""), "abc123");
        assert_eq!(trim_etag("abc123"), "abc123");
    }

    #[test]
    fn test_object_identifiers() {
        let ids = object_identifiers(&["a".to_string(), "b/c".to_string()]).unwrap();
        let keys: Vec<&str> = ids.iter().map(|id| id.key()).collect();
        assert_eq!(keys, vec!["a", "b/c"]);
    }

    #[tokio::test]
    async fn test_connect_requires_bucket() {
        let err = connect(&Config::default()).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
