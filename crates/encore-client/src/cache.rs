//! Conditional-request cache for static assets
//!
//! Remembers validators (`ETag`, `Last-Modified`) and bodies per path so
//! repeat fetches can go out conditional and a 304 still yields the bytes.

use std::collections::HashMap;

use parking_lot::Mutex;

#[derive(Debug, Clone, Default)]
pub struct CachedEntry {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub body: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: Mutex<HashMap<String, CachedEntry>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Conditional headers to attach when re-fetching `path`.
    pub fn validators(&self, path: &str) -> Vec<(&'static str, String)> {
        let entries = self.entries.lock();
        let Some(entry) = entries.get(path) else {
            return Vec::new();
        };
        let mut headers = Vec::new();
        if let Some(etag) = &entry.etag {
            headers.push(("If-None-Match", etag.clone()));
        }
        if let Some(last_modified) = &entry.last_modified {
            headers.push(("If-Modified-Since", last_modified.clone()));
        }
        headers
    }

    pub fn store(
        &self,
        path: &str,
        etag: Option<String>,
        last_modified: Option<String>,
        body: Vec<u8>,
    ) {
        if etag.is_none() && last_modified.is_none() {
            return;
        }
        self.entries
            .lock()
            .insert(path.to_string(), CachedEntry { etag, last_modified, body });
    }

    pub fn body(&self, path: &str) -> Option<Vec<u8>> {
        self.entries.lock().get(path).map(|e| e.body.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validators_round_trip() {
        let cache = ResponseCache::new();
        assert!(cache.validators("/js/app.js").is_empty());

        cache.store("/js/app.js", Some("\"abc\"".into()), None, b"body".to_vec());
        let headers = cache.validators("/js/app.js");
        assert_eq!(headers, vec![("If-None-Match", "\"abc\"".to_string())]);
        assert_eq!(cache.body("/js/app.js").unwrap(), b"body");
    }

    #[test]
    fn test_uncacheable_responses_are_not_stored() {
        let cache = ResponseCache::new();
        cache.store("/favicon.ico", None, None, b"x".to_vec());
        assert!(cache.body("/favicon.ico").is_none());
    }
}
