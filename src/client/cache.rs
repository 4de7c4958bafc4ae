use dashmap::DashMap;

/// ETag revalidation cache shared by every call of a [`Client`](crate::Client).
///
/// Keyed by request target. Entries are written only for `200` answers to
/// `GET` that carry an `ETag`, and are never evicted. The tag and body maps
/// are updated one after the other, so a concurrent reader may briefly see a
/// new tag next to the previous body.
#[derive(Debug, Default)]
pub struct ConditionalCache {
    etags: DashMap<String, String>,
    bodies: DashMap<String, Vec<u8>>,
}

impl ConditionalCache {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last `ETag` seen for `target`.
    pub fn etag(&self, target: &str) -> Option<String> {
        self.etags.get(target).map(|entry| entry.value().clone())
    }

    /// Last `200` body seen for `target`.
    pub fn body(&self, target: &str) -> Option<Vec<u8>> {
        self.bodies.get(target).map(|entry| entry.value().clone())
    }

    pub(crate) fn store(&self, target: &str, etag: &str, body: &[u8]) {
        self.etags.insert(target.to_string(), etag.to_string());
        self.bodies.insert(target.to_string(), body.to_vec());
    }

    /// Number of cached targets.
    #[inline]
    pub fn len(&self) -> usize {
        self.etags.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.etags.is_empty()
    }

    pub fn clear(&self) {
        self.etags.clear();
        self.bodies.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn store_and_replace() {
        let cache = ConditionalCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.etag("/a"), None);

        cache.store("/a", "\"v1\"", b"one");
        cache.store("/b", "W/\"x\"", b"");
        cache.store("/a", "\"v2\"", b"two");

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.etag("/a").as_deref(), Some("\"v2\""));
        assert_eq!(cache.body("/a"), Some(b"two".to_vec()));
        assert_eq!(cache.body("/b"), Some(Vec::new()));
        assert_eq!(cache.etag("/a?x=1"), None);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.body("/a"), None);
    }

    #[test]
    fn shared_between_threads() {
        let cache = Arc::new(ConditionalCache::new());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    let target = format!("/{}", i % 4);
                    cache.store(&target, &format!("\"{i}\""), target.as_bytes());
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 4);
        for i in 0..4 {
            let target = format!("/{i}");
            assert_eq!(cache.body(&target), Some(target.clone().into_bytes()));
        }
    }
}
