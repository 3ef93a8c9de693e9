//! Pluggable source suppliers (§3, §4.2): local filesystem and remote HTTP.
pub mod filesystem;
#[cfg(feature = "http-source")]
pub mod http;
pub mod registry;

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::IpxError;
use crate::once::Once;

/// Opaque per-request descriptor returned by a supplier for one id.
///
/// `data` is deferred and memoized: repeated calls to [`SourceDescriptor::data`]
/// return the same buffer (or the same failure) within the lifetime of this
/// descriptor, satisfying the invariant in §3.
pub struct SourceDescriptor {
    pub mtime: Option<SystemTime>,
    pub max_age: Option<u32>,
    data: Arc<Once<Bytes>>,
    fetch: DataFetch,
}

type DataFetch = Arc<dyn Fn() -> futures::future::BoxFuture<'static, Result<Bytes, IpxError>> + Send + Sync>;

impl SourceDescriptor {
    pub fn new<F, Fut>(mtime: Option<SystemTime>, max_age: Option<u32>, fetch: F) -> SourceDescriptor
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Bytes, IpxError>> + Send + 'static,
    {
        SourceDescriptor {
            mtime,
            max_age,
            data: Arc::new(Once::new()),
            fetch: Arc::new(move || Box::pin(fetch())),
        }
    }

    /// Deferred, memoized raw-bytes producer (§3's `getData`).
    pub async fn data(&self) -> Result<Bytes, IpxError> {
        let fetch = self.fetch.clone();
        self.data.get_or_init(move || {
            let fetch = fetch.clone();
            async move { fetch().await }
        }).await
    }
}

/// A named origin class: resolves an id to a [`SourceDescriptor`].
#[async_trait]
pub trait Supplier: Send + Sync {
    async fn resolve(&self, id: &str, bypass_domain: bool) -> Result<SourceDescriptor, IpxError>;
}
