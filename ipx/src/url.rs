//! URL decoding into `(id, modifiers)`, plus id normalization and alias
//! rewriting (§4.1).
use percent_encoding::percent_decode_str;

use crate::error::IpxError;
use crate::safe_string::stringify_strip;

/// Mapping from modifier name to raw argument string, keyed by
/// case-sensitive name, preserving first-occurrence insertion order. The
/// request engine's operation ordering (§4.5, §8 invariant 6) depends on
/// that order surviving decode. An empty map means "identity pipeline".
#[derive(Debug, Clone, Default)]
pub struct Modifiers(Vec<(String, String)>);

impl Modifiers {
    pub fn new() -> Modifiers {
        Modifiers::default()
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn insert(&mut self, key: String, value: String) {
        if let Some(existing) = self.0.iter_mut().find(|(k, _)| *k == key) {
            existing.1 = value;
        } else {
            self.0.push((key, value));
        }
    }
}

/// Parses `"/<modifiers>/<id...>"` into a modifier map and a raw,
/// percent-decoded id. Does not normalize the id; call [`normalize_id`]
/// next.
pub fn decode_path(path: &str) -> Result<(Modifiers, String), IpxError> {
    let stripped = path.strip_prefix('/').unwrap_or(path);
    let mut segments = stripped.splitn(2, '/');
    let modifiers_segment = segments.next().unwrap_or("");
    let rest = segments.next().unwrap_or("");

    if modifiers_segment.is_empty() {
        return Err(IpxError::BadRequest("Modifiers are missing".to_string()));
    }

    let id = percent_decode_str(rest)
        .decode_utf8()
        .map_err(|_| IpxError::BadRequest("Resource id is not valid UTF-8".to_string()))?
        .into_owned();

    if id.is_empty() || id == "/" {
        return Err(IpxError::BadRequest("Resource id is missing".to_string()));
    }

    let modifiers = decode_modifiers(modifiers_segment)?;
    Ok((modifiers, id))
}

fn decode_modifiers(segment: &str) -> Result<Modifiers, IpxError> {
    let mut modifiers = Modifiers::new();
    if segment == "_" {
        return Ok(modifiers);
    }

    for entry in segment.split(['&', ',']) {
        if entry.is_empty() {
            continue;
        }
        let (key, raw_value) = match entry.find([':', '=', '_']) {
            Some(idx) => (&entry[..idx], &entry[idx + 1..]),
            None => (entry, ""),
        };
        let value = percent_decode_str(raw_value)
            .decode_utf8()
            .map_err(|_| IpxError::BadRequest(format!("Modifier {} is not valid UTF-8", key)))?;
        modifiers.insert(stringify_strip(key), stringify_strip(&value));
    }

    Ok(modifiers)
}

const SCHEME_SEPARATOR: &str = "://";

fn has_scheme(id: &str) -> bool {
    id.find(SCHEME_SEPARATOR).is_some_and(|idx| {
        id[..idx].chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
    })
}

/// An id either keeps its URL scheme as-is, or is guaranteed to start with
/// a leading slash.
pub fn normalize_id(id: &str) -> String {
    if has_scheme(id) {
        id.to_string()
    } else if id.starts_with('/') {
        id.to_string()
    } else {
        format!("/{}", id)
    }
}

/// A single prefix-to-prefix rewrite, normalized at config time so `base`
/// always starts with `/`.
#[derive(Debug, Clone)]
pub struct Alias {
    pub base: String,
    pub replacement: String,
}

impl Alias {
    pub fn new(base: impl Into<String>, replacement: impl Into<String>) -> Alias {
        let base = base.into();
        let base = if base.starts_with('/') { base } else { format!("/{}", base) };
        Alias { base, replacement: replacement.into() }
    }
}

/// Applies the first matching alias (in configured order) to an already
/// normalized id. At most one alias fires.
pub fn apply_aliases(id: &str, aliases: &[Alias]) -> String {
    for alias in aliases {
        if let Some(rest) = id.strip_prefix(alias.base.as_str()) {
            return join_paths(&alias.replacement, rest);
        }
    }
    id.to_string()
}

fn join_paths(base: &str, rest: &str) -> String {
    if base.is_empty() {
        return normalize_id(rest);
    }
    let base = base.strip_suffix('/').unwrap_or(base);
    let rest = rest.strip_prefix('/').unwrap_or(rest);
    if rest.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base, rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_modifiers_rejected() {
        assert!(matches!(decode_path("//logo.png"), Err(IpxError::BadRequest(_))));
    }

    #[test]
    fn underscore_is_empty_modifier_set() {
        let (mods, id) = decode_path("/_/logo.png").unwrap();
        assert!(mods.is_empty());
        assert_eq!(id, "logo.png");
    }

    #[test]
    fn missing_id_rejected() {
        assert!(matches!(decode_path("/_/"), Err(IpxError::BadRequest(_))));
        assert!(matches!(decode_path("/_"), Err(IpxError::BadRequest(_))));
    }

    #[test]
    fn parses_modifier_entries() {
        let (mods, id) = decode_path("/w_50,f=jpeg,q:80/photo.jpg").unwrap();
        assert_eq!(mods.get("w"), Some(&"50".to_string()));
        assert_eq!(mods.get("f"), Some(&"jpeg".to_string()));
        assert_eq!(mods.get("q"), Some(&"80".to_string()));
        assert_eq!(id, "photo.jpg");
    }

    #[test]
    fn modifier_without_value_defaults_to_empty() {
        let (mods, _) = decode_path("/enlarge/logo.png").unwrap();
        assert_eq!(mods.get("enlarge"), Some(&String::new()));
    }

    #[test]
    fn percent_decodes_id_once() {
        let (_, id) = decode_path("/_/some%20file.png").unwrap();
        assert_eq!(id, "some file.png");
    }

    #[test]
    fn normalize_keeps_scheme() {
        assert_eq!(normalize_id("https://example.com/x.png"), "https://example.com/x.png");
    }

    #[test]
    fn normalize_adds_leading_slash() {
        assert_eq!(normalize_id("logo.png"), "/logo.png");
        assert_eq!(normalize_id("/logo.png"), "/logo.png");
    }

    #[test]
    fn alias_rewrites_first_match_only() {
        let aliases = vec![
            Alias::new("/a", "/real-a"),
            Alias::new("/a/b", "/real-a-b"),
        ];
        assert_eq!(apply_aliases("/a/b/c.png", &aliases), "/real-a/b/c.png");
    }

    #[test]
    fn alias_no_match_passthrough() {
        let aliases = vec![Alias::new("/a", "/real-a")];
        assert_eq!(apply_aliases("/z/c.png", &aliases), "/z/c.png");
    }
}
