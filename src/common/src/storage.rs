use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, aws::AmazonS3Builder, local::LocalFileSystem, memory::InMemory};
use std::sync::Arc;
use url::Url;

use crate::config::StorageConfig;
use crate::workspace::WorkspaceId;

/// Create an object store from storage configuration
pub fn create_object_store(storage_config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    create_object_store_from_dsn(&storage_config.dsn)
}

/// Create an object store from a DSN string
///
/// Supported: `memory://`, `file:///path`, `s3://[key:secret@]host[:port]/bucket`.
pub fn create_object_store_from_dsn(dsn: &str) -> Result<Arc<dyn ObjectStore>> {
    let url =
        Url::parse(dsn).map_err(|e| anyhow::anyhow!("Invalid storage DSN '{}': {}", dsn, e))?;

    match url.scheme() {
        "file" => {
            let path = url.path();
            if path.is_empty() || path == "/" {
                return Err(anyhow::anyhow!(
                    "File DSN must specify a path: file:///path/to/storage"
                ));
            }
            std::fs::create_dir_all(path)
                .with_context(|| format!("Failed to create storage directory {path}"))?;
            Ok(Arc::new(LocalFileSystem::new_with_prefix(path)?))
        }
        "memory" => Ok(Arc::new(InMemory::new())),
        "s3" => {
            let builder = create_s3_builder_from_dsn(&url)?;
            Ok(Arc::new(builder.build()?))
        }
        scheme => Err(anyhow::anyhow!(
            "Unsupported storage scheme: {}. Supported: file, memory, s3",
            scheme
        )),
    }
}

/// Create an S3 builder from a DSN
/// DSN format: s3://[access_key:secret_key@]host[:port]/bucket
pub fn create_s3_builder_from_dsn(dsn: &Url) -> Result<AmazonS3Builder> {
    let host = dsn
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("Missing S3 host in DSN"))?;
    let port = dsn.port();
    let bucket = dsn.path().trim_start_matches('/');

    if bucket.is_empty() {
        return Err(anyhow::anyhow!(
            "S3 DSN must specify a bucket: s3://host/bucket"
        ));
    }

    let mut builder = AmazonS3Builder::new()
        .with_bucket_name(bucket)
        .with_region("us-east-1");

    let access_key = dsn.username();
    let secret_key = dsn.password().unwrap_or("");

    if !access_key.is_empty() {
        builder = builder
            .with_access_key_id(access_key)
            .with_secret_access_key(secret_key);
    }

    // MinIO and other S3-compatible stores need an explicit endpoint
    if !host.contains("amazonaws.com") {
        let scheme = if port == Some(443) { "https" } else { "http" };
        let endpoint = match port {
            Some(p) => format!("{scheme}://{host}:{p}"),
            None => format!("{scheme}://{host}"),
        };
        builder = builder
            .with_endpoint(endpoint)
            .with_allow_http(true)
            .with_virtual_hosted_style_request(false);
    }

    if access_key.is_empty() {
        if let Ok(env_key) = std::env::var("AWS_ACCESS_KEY_ID") {
            builder = builder.with_access_key_id(env_key);
        }
        if let Ok(env_secret) = std::env::var("AWS_SECRET_ACCESS_KEY") {
            builder = builder.with_secret_access_key(env_secret);
        }
        if let Ok(env_region) = std::env::var("AWS_DEFAULT_REGION") {
            builder = builder.with_region(env_region);
        }
    }

    Ok(builder)
}

/// A blob stored for a workspace.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    /// Full location as listed by the store
    pub location: ObjectPath,
    /// Location relative to the workspace prefix, in the store's encoded form
    pub name: String,
    pub size_bytes: u64,
    pub last_modified: DateTime<Utc>,
}

/// Workspace-scoped view over an object store.
///
/// Each workspace owns the objects under `<workspace>/`.
#[derive(Debug, Clone)]
pub struct WorkspaceBlobs {
    store: Arc<dyn ObjectStore>,
}

impl WorkspaceBlobs {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Full object-store path of a workspace object.
    ///
    /// `name` is the raw name records refer to; each segment is encoded the
    /// way the store encodes it on write.
    pub fn path(workspace: &WorkspaceId, name: &str) -> ObjectPath {
        ObjectPath::from(format!("{workspace}/{name}"))
    }

    /// List every object stored for the workspace.
    pub async fn list(&self, workspace: &WorkspaceId) -> Result<Vec<StoredObject>> {
        let prefix = ObjectPath::from(workspace.as_str());
        let strip = format!("{prefix}/");
        let metas: Vec<_> = self
            .store
            .list(Some(&prefix))
            .try_collect()
            .await
            .with_context(|| format!("Failed to list objects of workspace {workspace}"))?;

        Ok(metas
            .into_iter()
            .map(|meta| {
                let name = {
                    let location = meta.location.as_ref();
                    location
                        .strip_prefix(strip.as_str())
                        .unwrap_or(location)
                        .to_string()
                };
                StoredObject {
                    location: meta.location,
                    name,
                    size_bytes: meta.size,
                    last_modified: meta.last_modified,
                }
            })
            .collect())
    }

    /// Delete listed objects in one bulk request.
    ///
    /// `locations` are paths as returned by [`WorkspaceBlobs::list`]; they are
    /// passed to the store unchanged. Returns the number of objects deleted.
    pub async fn remove(
        &self,
        workspace: &WorkspaceId,
        locations: &[ObjectPath],
    ) -> Result<usize> {
        if locations.is_empty() {
            return Ok(0);
        }

        let locations = futures::stream::iter(
            locations
                .iter()
                .cloned()
                .map(Ok::<_, object_store::Error>)
                .collect::<Vec<_>>(),
        )
        .boxed();

        let deleted: Vec<ObjectPath> = self
            .store
            .delete_stream(locations)
            .try_collect()
            .await
            .with_context(|| format!("Failed to delete objects of workspace {workspace}"))?;

        Ok(deleted.len())
    }
}
