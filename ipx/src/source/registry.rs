//! Source registry: selects a supplier by id shape (§4.2).
use std::collections::HashMap;
use std::sync::Arc;

use super::Supplier;
use crate::error::IpxError;

/// Holds at most two entries: `filesystem` and `http`.
#[derive(Default)]
pub struct SourceRegistry {
    suppliers: HashMap<&'static str, Arc<dyn Supplier>>,
}

impl SourceRegistry {
    pub fn new() -> SourceRegistry {
        SourceRegistry::default()
    }

    pub fn register(&mut self, name: &'static str, supplier: Arc<dyn Supplier>) {
        self.suppliers.insert(name, supplier);
    }

    /// Picks `http` if the id carries a URL scheme, else `filesystem`.
    pub fn select(&self, id: &str) -> Result<&Arc<dyn Supplier>, IpxError> {
        let name = if has_scheme(id) { "http" } else { "filesystem" };
        self.suppliers.get(name).ok_or_else(|| IpxError::BadRequest("Unknown source".to_string()))
    }
}

fn has_scheme(id: &str) -> bool {
    id.find("://").is_some_and(|idx| {
        id[..idx].chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
    })
}
