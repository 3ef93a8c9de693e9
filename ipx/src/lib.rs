//! Core request-resolution engine for an HTTP image-transformation service.
//!
//! `ipx-server` is the thin HTTP facade; everything that does not depend on
//! an HTTP framework (URL decoding, supplier selection, the codec
//! pipeline, caching, and response shaping) lives here.
pub mod cache;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod literal;
pub mod once;
pub mod response;
pub mod safe_string;
pub mod source;
pub mod url;

use std::sync::Arc;

use cache::CacheBackend;
use config::IpxConfig;
use error::IpxError;
use source::filesystem::FilesystemSupplier;
use source::registry::SourceRegistry;

/// Long-lived, immutable-after-construction context: the supplier registry
/// and the optional cache handle (§3's "IPX context").
pub struct IpxContext {
    pub config: IpxConfig,
    pub registry: SourceRegistry,
    pub cache: Option<Box<dyn CacheBackend>>,
}

impl IpxContext {
    /// Builds the supplier registry from `config` (a falsy `dir`/empty
    /// `domains` disables the corresponding supplier, §6) and the cache
    /// backend, then wraps the result for sharing across request tasks.
    pub fn new(config: IpxConfig) -> Result<Arc<IpxContext>, IpxError> {
        let mut registry = SourceRegistry::new();

        if let Some(dir) = config.dir.as_deref() {
            if !dir.is_empty() {
                let supplier = FilesystemSupplier::new(dir, config.max_age).map_err(|err| {
                    IpxError::internal(format!("failed to initialize filesystem root {}: {}", dir, err))
                })?;
                registry.register("filesystem", Arc::new(supplier));
            }
        }

        #[cfg(feature = "http-source")]
        if !config.domains.is_empty() {
            registry.register("http", Arc::new(source::http::HttpSupplier::new(&config.domains, config.max_age)));
        }

        let cache = cache::build_backend(&config.cache)?;
        Ok(Arc::new(IpxContext { config, registry, cache }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_yields_context_with_no_suppliers() {
        let mut config = IpxConfig::default();
        config.dir = None;
        let ctx = IpxContext::new(config).unwrap();
        assert!(ctx.registry.select("/x.png").is_err());
    }

    #[test]
    fn dir_registers_filesystem_supplier() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = IpxConfig::default();
        config.dir = Some(dir.path().to_string_lossy().to_string());
        let ctx = IpxContext::new(config).unwrap();
        assert!(ctx.registry.select("/x.png").is_ok());
    }
}
