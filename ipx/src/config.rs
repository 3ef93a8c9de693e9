//! Configuration layering: caller-supplied options first, then environment
//! defaults (§6). Every environment value goes through the same permissive
//! literal parser used for modifier arguments.
use std::env;

use crate::literal::{as_bool, as_u32, parse_literal};
use crate::url::Alias;

/// Cache backend selection (§6's `cache.type` discriminator).
#[derive(Debug, Clone, Default)]
pub enum CacheConfig {
    #[default]
    Disabled,
    Memory,
    /// Named but not shipped in-tree; an external collaborator (§1).
    Redis { host: String },
}

/// Resolved configuration for one `IpxContext`.
#[derive(Debug, Clone)]
pub struct IpxConfig {
    /// Filesystem root. `None` disables the filesystem supplier.
    pub dir: Option<String>,
    /// HTTP(S) origin allow-list. Empty disables the HTTP supplier.
    pub domains: Vec<String>,
    /// Prefix rewrites, applied in order.
    pub alias: Vec<Alias>,
    /// Default cache-control seconds, used when a supplier doesn't override it.
    pub max_age: u32,
    pub cache: CacheConfig,
}

impl Default for IpxConfig {
    fn default() -> Self {
        IpxConfig { dir: Some(".".to_string()), domains: Vec::new(), alias: Vec::new(), max_age: 300, cache: CacheConfig::default() }
    }
}

impl IpxConfig {
    /// Start from defaults, then apply whatever the environment sets,
    /// mirroring the "user options, then environment defaults" resolution
    /// order: call this first and let explicit caller overrides win by
    /// setting fields on the result afterwards.
    pub fn from_env() -> IpxConfig {
        let mut config = IpxConfig::default();

        if let Ok(dir) = env::var("IPX_DIR") {
            config.dir = non_falsy(&dir);
        }
        if let Ok(domains) = env::var("IPX_DOMAINS") {
            config.domains = split_list(&domains);
        }
        if let Ok(alias) = env::var("IPX_ALIAS") {
            config.alias = parse_alias_env(&alias);
        }
        if let Ok(max_age) = env::var("IPX_MAX_AGE") {
            if let Some(n) = as_u32(&parse_literal(&max_age)) {
                config.max_age = n;
            }
        }
        if let Ok(enabled) = env::var("IPX_CACHE_ENABLED") {
            if as_bool(&parse_literal(&enabled)) {
                config.cache = match env::var("IPX_CACHE_REDIS_HOST") {
                    Ok(host) if !host.is_empty() => CacheConfig::Redis { host },
                    _ => CacheConfig::Memory,
                };
            }
        }

        config
    }
}

fn non_falsy(s: &str) -> Option<String> {
    if s.is_empty() { None } else { Some(s.to_string()) }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',').map(|v| v.trim().to_string()).filter(|v| !v.is_empty()).collect()
}

/// `IPX_ALIAS` is `base1:replacement1,base2:replacement2`.
fn parse_alias_env(s: &str) -> Vec<Alias> {
    s.split(',')
        .filter_map(|entry| {
            let mut parts = entry.splitn(2, ':');
            let base = parts.next()?.trim();
            let replacement = parts.next()?.trim();
            if base.is_empty() {
                return None;
            }
            Some(Alias::new(base, replacement))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_filesystem_only() {
        let config = IpxConfig::default();
        assert_eq!(config.dir.as_deref(), Some("."));
        assert!(config.domains.is_empty());
        assert_eq!(config.max_age, 300);
    }

    #[test]
    fn split_list_trims_and_drops_empty() {
        assert_eq!(split_list("a, b ,,c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn parses_alias_env_pairs() {
        let aliases = parse_alias_env("/old:/new, /a:/b");
        assert_eq!(aliases.len(), 2);
        assert_eq!(aliases[0].base, "/old");
        assert_eq!(aliases[0].replacement, "/new");
    }
}
