//! Run-wide request counters
//!
//! Free-form string keys, `METHOD|path` for HTTP traffic plus a few special
//! keys. The final score is a weighted sum over prefix aggregates.

use dashmap::DashMap;

pub const STATIC_200: &str = "staticfile-200";
pub const STATIC_304: &str = "staticfile-304";
pub const LOAD_LEVEL_UP: &str = "load-level-up";

#[derive(Debug, Default)]
pub struct Counters {
    map: DashMap<String, i64>,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self, key: &str) {
        self.add(key, 1);
    }

    pub fn add(&self, key: &str, n: i64) {
        *self.map.entry(key.to_string()).or_insert(0) += n;
    }

    pub fn get(&self, key: &str) -> i64 {
        self.map.get(key).map(|v| *v).unwrap_or(0)
    }

    pub fn sum_prefix(&self, prefix: &str) -> i64 {
        self.map
            .iter()
            .filter(|kv| kv.key().starts_with(prefix))
            .map(|kv| *kv.value())
            .sum()
    }

    /// Sorted copy for the end-of-run summary log.
    pub fn snapshot(&self) -> Vec<(String, i64)> {
        let mut entries: Vec<_> = self
            .map
            .iter()
            .map(|kv| (kv.key().clone(), *kv.value()))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_sums() {
        let counters = Counters::new();
        counters.inc("GET|/");
        counters.add("GET|/api/events/1", 2);
        counters.inc("POST|/api/users");
        counters.inc(STATIC_304);

        assert_eq!(counters.sum_prefix("GET|"), 3);
        assert_eq!(counters.sum_prefix("POST|"), 1);
        assert_eq!(counters.sum_prefix("DELETE|"), 0);
        assert_eq!(counters.get(STATIC_304), 1);
    }

    #[test]
    fn test_snapshot_sorted_by_count() {
        let counters = Counters::new();
        counters.add("a", 1);
        counters.add("b", 5);
        let snap = counters.snapshot();
        assert_eq!(snap[0], ("b".to_string(), 5));
    }
}
