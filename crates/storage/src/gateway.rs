use std::ops::Range;
use std::sync::Arc;

use bytes::Bytes;
use object_store::path::Path as ObjPath;
use object_store::{DynObjectStore, ObjectMeta, PutMode, PutOptions};
use tracing::instrument;

use crate::credentials::{Role, RoleCredentials};
use crate::error::{classify, GatewayError, GatewayResult};
use crate::retry::RetryPolicy;
use crate::uri::{parse_uri, ParsedUri};

#[derive(Debug, Clone, Default)]
pub struct StorageOptions {
    pub concurrency: Option<usize>,
    pub retry: RetryPolicy,
    /// Pre-resolved credentials to use instead of re-resolving from the
    /// process environment. `None` falls back to `RoleCredentials::resolve`,
    /// which is the right default for CLI entry points; callers that
    /// already resolved credentials once per run (e.g. the orchestrator,
    /// from `RunConfig`) pass them through here so every `Gateway` for a
    /// role agrees on the same values.
    pub credentials: Option<RoleCredentials>,
}

/// Uniform list/head/get/put/delete/exists surface over one role's
/// object store. A run holds one `Gateway` for the source bucket and
/// one for the target bucket; they may wrap the same physical store.
pub struct Gateway {
    pub role: Role,
    pub uri: ParsedUri,
    store: Arc<DynObjectStore>,
    retry: RetryPolicy,
}

impl Gateway {
    pub async fn open(role: Role, uri: &str, opts: &StorageOptions) -> GatewayResult<Self> {
        let parsed = parse_uri(uri).map_err(|e| GatewayError::InvalidUri(e.to_string()))?;
        let creds = opts
            .credentials
            .clone()
            .unwrap_or_else(|| RoleCredentials::resolve(role));
        let store = make_object_store(&parsed, &creds)
            .map_err(|e| GatewayError::InvalidUri(e.to_string()))?;
        Ok(Self {
            role,
            uri: parsed,
            store,
            retry: opts.retry,
        })
    }

    pub fn root(&self) -> &ObjPath {
        &self.uri.root
    }

    pub fn child(&self, rel: &str) -> ObjPath {
        self.uri.root.child(rel)
    }

    /// Non-recursive listing of the immediate children of `prefix`
    /// (files and "directories", via object_store's delimiter listing).
    /// This is how the Batch Planner discovers SchemaFolder and
    /// TimestampFolder names without walking the whole entity tree.
    #[instrument(skip(self))]
    pub async fn list_dir(&self, prefix: &ObjPath) -> GatewayResult<Listing> {
        let store = self.store.clone();
        let prefix = prefix.clone();
        self.retry
            .run("list_dir", || {
                let store = store.clone();
                let prefix = prefix.clone();
                async move {
                    let result = store
                        .list_with_delimiter(Some(&prefix))
                        .await
                        .map_err(|e| classify(prefix.as_ref(), e))?;
                    Ok(Listing {
                        files: result.objects,
                        directories: result.common_prefixes,
                    })
                }
            })
            .await
    }

    /// Full recursive listing beneath `prefix`, for vacuum-style orphan
    /// discovery; the Batch Planner itself never uses this, preferring
    /// `list_dir`.
    #[instrument(skip(self))]
    pub async fn list_recursive(&self, prefix: &ObjPath) -> GatewayResult<Vec<ObjectMeta>> {
        use futures::StreamExt;
        let mut stream = self.store.list(Some(prefix));
        let mut out = Vec::new();
        while let Some(item) = stream.next().await {
            let meta = item.map_err(|e| classify(prefix.as_ref(), e))?;
            if !meta.location.as_ref().ends_with('/') {
                out.push(meta);
            }
        }
        Ok(out)
    }

    #[instrument(skip(self))]
    pub async fn head(&self, path: &ObjPath) -> GatewayResult<ObjectMeta> {
        let store = self.store.clone();
        let path = path.clone();
        self.retry
            .run("head", || {
                let store = store.clone();
                let path = path.clone();
                async move {
                    store
                        .head(&path)
                        .await
                        .map_err(|e| classify(path.as_ref(), e))
                }
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, path: &ObjPath) -> GatewayResult<Bytes> {
        let store = self.store.clone();
        let path = path.clone();
        self.retry
            .run("get", || {
                let store = store.clone();
                let path = path.clone();
                async move {
                    let result = store.get(&path).await.map_err(|e| classify(path.as_ref(), e))?;
                    result.bytes().await.map_err(|e| classify(path.as_ref(), e))
                }
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_range(&self, path: &ObjPath, range: Range<usize>) -> GatewayResult<Bytes> {
        let store = self.store.clone();
        let path = path.clone();
        self.retry
            .run("get_range", || {
                let store = store.clone();
                let path = path.clone();
                let range = range.clone();
                async move {
                    store
                        .get_range(&path, range)
                        .await
                        .map_err(|e| classify(path.as_ref(), e))
                }
            })
            .await
    }

    /// Unconditional put, used for checkpoint files and `_last_checkpoint`
    /// which are safe to overwrite.
    #[instrument(skip(self, bytes))]
    pub async fn put(&self, path: &ObjPath, bytes: Bytes) -> GatewayResult<()> {
        let store = self.store.clone();
        let path = path.clone();
        self.retry
            .run("put", || {
                let store = store.clone();
                let path = path.clone();
                let bytes = bytes.clone();
                async move {
                    store
                        .put(&path, bytes.into())
                        .await
                        .map(|_| ())
                        .map_err(|e| classify(path.as_ref(), e))
                }
            })
            .await
    }

    /// Conditional put (`if_none_match=*`): fails with `Conflict` if the
    /// object already exists. This is how commit files at
    /// `<version>.json` are written so two concurrent writers of the
    /// same entity's log are serialised.
    #[instrument(skip(self, bytes))]
    pub async fn put_if_absent(&self, path: &ObjPath, bytes: Bytes) -> GatewayResult<()> {
        let store = self.store.clone();
        let path = path.clone();
        self.retry
            .run("put_if_absent", || {
                let store = store.clone();
                let path = path.clone();
                let bytes = bytes.clone();
                async move {
                    let opts = PutOptions {
                        mode: PutMode::Create,
                        ..Default::default()
                    };
                    match store.put_opts(&path, bytes.into(), opts).await {
                        Ok(_) => Ok(()),
                        Err(object_store::Error::AlreadyExists { .. }) => Err(GatewayError::Conflict {
                            path: path.as_ref().to_string(),
                        }),
                        Err(e) => Err(classify(path.as_ref(), e)),
                    }
                }
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, path: &ObjPath) -> GatewayResult<()> {
        let store = self.store.clone();
        let path = path.clone();
        self.retry
            .run("delete", || {
                let store = store.clone();
                let path = path.clone();
                async move {
                    store
                        .delete(&path)
                        .await
                        .map_err(|e| classify(path.as_ref(), e))
                }
            })
            .await
    }

    pub async fn exists(&self, path: &ObjPath) -> GatewayResult<bool> {
        match self.head(path).await {
            Ok(_) => Ok(true),
            Err(GatewayError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

pub struct Listing {
    pub files: Vec<ObjectMeta>,
    pub directories: Vec<ObjPath>,
}

fn make_object_store(parsed: &ParsedUri, creds: &RoleCredentials) -> anyhow::Result<Arc<DynObjectStore>> {
    let store: Arc<DynObjectStore> = match parsed.url.scheme() {
        "s3" => {
            #[cfg(feature = "s3")]
            {
                use object_store::aws::AmazonS3Builder;
                let mut builder = AmazonS3Builder::from_env();
                if let Some(bucket) = parsed.url.host_str() {
                    builder = builder.with_bucket_name(bucket);
                }
                if let Some(region) = creds.get("REGION") {
                    builder = builder.with_region(region);
                }
                if let Some(key) = creds.get("ACCESS_KEY_ID") {
                    builder = builder.with_access_key_id(key);
                }
                if let Some(secret) = creds.get("SECRET_ACCESS_KEY") {
                    builder = builder.with_secret_access_key(secret);
                }
                if let Some(token) = creds.get("SESSION_TOKEN") {
                    builder = builder.with_token(token);
                }
                Arc::new(builder.build()?)
            }
            #[cfg(not(feature = "s3"))]
            {
                anyhow::bail!("s3 feature not enabled")
            }
        }
        "az" | "abfs" => {
            #[cfg(feature = "azure")]
            {
                use object_store::azure::MicrosoftAzureBuilder;
                let mut builder = MicrosoftAzureBuilder::from_env();
                if let Some(container) = parsed.url.host_str() {
                    builder = builder.with_container_name(container);
                }
                if let Some(account) = creds.get("ACCOUNT_NAME") {
                    builder = builder.with_account(account);
                }
                if let Some(key) = creds.get("ACCOUNT_KEY") {
                    builder = builder.with_access_key(key);
                }
                Arc::new(builder.build()?)
            }
            #[cfg(not(feature = "azure"))]
            {
                anyhow::bail!("azure feature not enabled")
            }
        }
        "gs" => {
            #[cfg(feature = "gcs")]
            {
                use object_store::gcp::GoogleCloudStorageBuilder;
                Arc::new(GoogleCloudStorageBuilder::from_env().build()?)
            }
            #[cfg(not(feature = "gcs"))]
            {
                anyhow::bail!("gcs feature not enabled")
            }
        }
        "file" | _ => Arc::new(object_store::local::LocalFileSystem::new()),
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_local_and_put_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let uri = dir.path().to_string_lossy().to_string();
        let gw = Gateway::open(Role::Target, &uri, &StorageOptions::default())
            .await
            .unwrap();
        let key = gw.child("hello.txt");
        gw.put(&key, Bytes::from_static(b"hi")).await.unwrap();
        let back = gw.get(&key).await.unwrap();
        assert_eq!(back, Bytes::from_static(b"hi"));
        assert!(gw.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn put_if_absent_conflicts_on_second_write() {
        let dir = tempfile::tempdir().unwrap();
        let uri = dir.path().to_string_lossy().to_string();
        let gw = Gateway::open(Role::Target, &uri, &StorageOptions::default())
            .await
            .unwrap();
        let key = gw.child("00000000000000000000.json");
        gw.put_if_absent(&key, Bytes::from_static(b"a")).await.unwrap();
        let err = gw.put_if_absent(&key, Bytes::from_static(b"b")).await.unwrap_err();
        assert!(matches!(err, GatewayError::Conflict { .. }));
    }

    #[tokio::test]
    async fn list_dir_is_non_recursive() {
        let dir = tempfile::tempdir().unwrap();
        let uri = dir.path().to_string_lossy().to_string();
        let gw = Gateway::open(Role::Source, &uri, &StorageOptions::default())
            .await
            .unwrap();
        gw.put(&gw.child("s1/1000/a.parquet"), Bytes::from_static(b"x"))
            .await
            .unwrap();
        gw.put(&gw.child("s1/2000/b.parquet"), Bytes::from_static(b"y"))
            .await
            .unwrap();
        let listing = gw.list_dir(&gw.child("s1")).await.unwrap();
        assert_eq!(listing.directories.len(), 2);
        assert!(listing.files.is_empty());
    }
}
