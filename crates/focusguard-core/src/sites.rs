//! Blocked and whitelisted site lists.
//!
//! Lists hold normalized hostnames: lowercase, no scheme, no port or path,
//! no leading `www.`. Duplicates are never stored.

use serde_json::Value;
use tracing::{info, warn};
use url::Url;

use crate::error::{Result, ValidationError};
use crate::store::{keys, Store, StoreExt};

/// Reduce arbitrary user input to a bare hostname.
///
/// Returns `None` for empty or unparsable input.
pub fn normalize_hostname(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    let candidate = if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let url = Url::parse(&candidate).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    if host.is_empty() {
        return None;
    }
    Some(host.to_string())
}

/// Whether `site` can be used verbatim as a rule pattern host.
pub fn is_valid_hostname(site: &str) -> bool {
    if site.is_empty() || site.chars().any(|c| c.is_whitespace() || c == '/' || c == ':') {
        return false;
    }
    match Url::parse(&format!("https://{site}/")) {
        Ok(url) => url.host_str() == Some(site),
        Err(_) => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Added(String),
    AlreadyPresent(String),
}

impl AddOutcome {
    pub fn host(&self) -> &str {
        match self {
            AddOutcome::Added(h) | AddOutcome::AlreadyPresent(h) => h,
        }
    }
}

/// The two user-managed site lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteList {
    Blocked,
    Whitelisted,
}

impl SiteList {
    pub fn key(self) -> &'static str {
        match self {
            SiteList::Blocked => keys::BLOCKED_SITES,
            SiteList::Whitelisted => keys::WHITELISTED_SITES,
        }
    }

    pub fn list(self, store: &dyn Store) -> Result<Vec<String>> {
        Ok(store.get_or_default(self.key())?)
    }

    /// Normalize `input` and append it. Invalid input leaves the list untouched.
    pub fn add(self, store: &dyn Store, input: &str) -> Result<AddOutcome> {
        let host = normalize_hostname(input)
            .ok_or_else(|| ValidationError::InvalidHostname(input.trim().to_string()))?;

        let mut outcome = AddOutcome::AlreadyPresent(host.clone());
        store.update(self.key(), &mut |current| {
            let mut sites = decode_list(self.key(), current.as_ref());
            if sites.contains(&host) {
                outcome = AddOutcome::AlreadyPresent(host.clone());
                return current;
            }
            sites.push(host.clone());
            outcome = AddOutcome::Added(host.clone());
            Some(Value::from(sites))
        })?;

        if let AddOutcome::Added(h) = &outcome {
            info!(list = self.key(), host = %h, "site added");
        }
        Ok(outcome)
    }

    /// Remove a host. Accepts raw input and matches its normalized form too.
    /// Returns whether anything was removed.
    pub fn remove(self, store: &dyn Store, host: &str) -> Result<bool> {
        let normalized = normalize_hostname(host);
        let raw = host.trim().to_string();
        let mut removed = false;
        store.update(self.key(), &mut |current| {
            let sites = decode_list(self.key(), current.as_ref());
            let before = sites.len();
            let kept: Vec<String> = sites
                .into_iter()
                .filter(|s| *s != raw && Some(s) != normalized.as_ref())
                .collect();
            removed = kept.len() != before;
            if removed {
                Some(Value::from(kept))
            } else {
                current
            }
        })?;
        Ok(removed)
    }
}

fn decode_list(key: &str, value: Option<&Value>) -> Vec<String> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(v) => serde_json::from_value(v.clone()).unwrap_or_else(|e| {
            warn!(%key, error = %e, "discarding malformed site list");
            Vec::new()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::store::{MemoryStore, WriteBatch};
    use serde_json::json;

    #[test]
    fn normalizes_full_url() {
        assert_eq!(
            normalize_hostname("https://www.Example.com/path").as_deref(),
            Some("example.com")
        );
    }

    #[test]
    fn normalizes_bare_and_http_inputs() {
        assert_eq!(normalize_hostname("  YouTube.com ").as_deref(), Some("youtube.com"));
        assert_eq!(normalize_hostname("http://news.ycombinator.com/item?id=1").as_deref(), Some("news.ycombinator.com"));
        assert_eq!(normalize_hostname("www.reddit.com:8080/r/rust").as_deref(), Some("reddit.com"));
        assert_eq!(normalize_hostname("HTTPS://WWW.X.COM").as_deref(), Some("x.com"));
    }

    #[test]
    fn only_one_www_prefix_is_stripped() {
        assert_eq!(normalize_hostname("www.www.a.com").as_deref(), Some("www.a.com"));
    }

    #[test]
    fn rejects_empty_and_unparsable() {
        assert_eq!(normalize_hostname(""), None);
        assert_eq!(normalize_hostname("   "), None);
        assert_eq!(normalize_hostname("exa mple.com"), None);
        assert_eq!(normalize_hostname("https://"), None);
    }

    #[test]
    fn valid_hostname_check() {
        assert!(is_valid_hostname("a.com"));
        assert!(is_valid_hostname("x.a.com"));
        assert!(!is_valid_hostname(""));
        assert!(!is_valid_hostname("A.com"));
        assert!(!is_valid_hostname("a.com/path"));
        assert!(!is_valid_hostname("a b.com"));
    }

    #[test]
    fn add_normalizes_and_dedupes() {
        let store = MemoryStore::new();
        let first = SiteList::Blocked.add(&store, "https://www.YouTube.com/watch").unwrap();
        assert_eq!(first, AddOutcome::Added("youtube.com".into()));
        let again = SiteList::Blocked.add(&store, "youtube.com").unwrap();
        assert_eq!(again, AddOutcome::AlreadyPresent("youtube.com".into()));
        assert_eq!(SiteList::Blocked.list(&store).unwrap(), vec!["youtube.com"]);
    }

    #[test]
    fn invalid_input_does_not_mutate() {
        let store = MemoryStore::new();
        SiteList::Whitelisted.add(&store, "docs.rs").unwrap();
        let mut rx = store.subscribe();
        let err = SiteList::Whitelisted.add(&store, "   ").unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::InvalidHostname(_))
        ));
        assert!(rx.try_recv().is_err());
        assert_eq!(SiteList::Whitelisted.list(&store).unwrap(), vec!["docs.rs"]);
    }

    #[test]
    fn remove_accepts_raw_or_normalized() {
        let store = MemoryStore::new();
        store
            .apply(WriteBatch::new().set(keys::BLOCKED_SITES, json!(["a.com", "b.com"])))
            .unwrap();
        assert!(SiteList::Blocked.remove(&store, "https://www.a.com").unwrap());
        assert!(!SiteList::Blocked.remove(&store, "zzz.com").unwrap());
        assert_eq!(SiteList::Blocked.list(&store).unwrap(), vec!["b.com"]);
    }

    #[test]
    fn lists_preserve_insertion_order() {
        let store = MemoryStore::new();
        for site in ["c.com", "a.com", "b.com"] {
            SiteList::Blocked.add(&store, site).unwrap();
        }
        assert_eq!(
            SiteList::Blocked.list(&store).unwrap(),
            vec!["c.com", "a.com", "b.com"]
        );
    }
}
