use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use moka::sync::Cache;

use crate::codec::Codec;
use crate::error::CodecError;
use crate::schema::{SchemaPath, TypeDefinition};

/// Cache key of a built codec: the leaf's schema path plus its type
///
/// Paths are relative to the root node a parse or write starts from, so the
/// same path can name differently typed leaves in one context.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CodecKey {
    path: SchemaPath,
    type_def: TypeDefinition,
}

impl CodecKey {
    pub fn new(path: &SchemaPath, type_def: &TypeDefinition) -> Self {
        Self {
            path: path.clone(),
            type_def: type_def.clone(),
        }
    }

    pub fn path(&self) -> &SchemaPath {
        &self.path
    }

    pub fn type_def(&self) -> &TypeDefinition {
        &self.type_def
    }
}

/// In-memory cache of built codecs, keyed by [`CodecKey`]
///
/// Uses `moka` for concurrent access and "thundering herd" protection: a codec
/// is only built once even if several parses ask for it at the same time.
pub struct CodecCache {
    cache: Cache<CodecKey, Arc<Codec>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CodecCache {
    pub fn new(max_capacity: u64) -> Self {
        let cache = Cache::builder().max_capacity(max_capacity).build();

        Self {
            cache,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Get a codec from the cache, or build it if missing.
    ///
    /// The `builder` closure only runs if the key is missing; concurrent
    /// callers for the same key wait for the single leader to finish.
    pub fn get_or_build<F>(&self, key: CodecKey, builder: F) -> Result<Arc<Codec>, CodecError>
    where
        F: FnOnce() -> Result<Codec, CodecError>,
    {
        if let Some(codec) = self.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(codec);
        }
        self.cache
            .try_get_with(key, || {
                self.misses.fetch_add(1, Ordering::Relaxed);
                builder().map(Arc::new)
            })
            .map_err(|e| (*e).clone())
    }

    fn get(&self, key: &CodecKey) -> Option<Arc<Codec>> {
        self.cache.get(key)
    }

    /// Get cache statistics
    pub fn stats(&self) -> CodecCacheStats {
        // Flush pending maintenance so the entry count is current
        self.cache.run_pending_tasks();

        CodecCacheStats {
            entry_count: self.cache.entry_count(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Statistics for codec cache operations
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CodecCacheStats {
    pub entry_count: u64,
    pub hits: u64,
    /// Number of codecs built
    pub misses: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qname::QName;
    use std::sync::atomic::AtomicUsize;

    fn flag_path() -> SchemaPath {
        SchemaPath::root()
            .child(&QName::new("urn:foo", "top"))
            .child(&QName::new("urn:foo", "flag"))
    }

    #[test]
    fn test_codec_cache_basic_operations() {
        let cache = CodecCache::new(10);
        let key = CodecKey::new(&flag_path(), &TypeDefinition::Boolean);

        assert!(cache.get(&key).is_none());

        let codec = cache
            .get_or_build(key.clone(), || Codec::for_type(key.type_def()))
            .unwrap();
        assert_eq!(codec.type_name(), "boolean");
        assert!(cache.get(&key).is_some());

        let again = cache
            .get_or_build(key.clone(), || panic!("codec must come from the cache"))
            .unwrap();
        assert!(Arc::ptr_eq(&codec, &again));

        let stats = cache.stats();
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_same_path_with_other_type_is_a_separate_entry() {
        let cache = CodecCache::new(10);
        let path = flag_path();

        let boolean = cache
            .get_or_build(CodecKey::new(&path, &TypeDefinition::Boolean), || {
                Codec::for_type(&TypeDefinition::Boolean)
            })
            .unwrap();
        let string = cache
            .get_or_build(CodecKey::new(&path, &TypeDefinition::string()), || {
                Codec::for_type(&TypeDefinition::string())
            })
            .unwrap();
        assert_eq!(boolean.type_name(), "boolean");
        assert_eq!(string.type_name(), "string");
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn test_build_errors_are_not_cached() {
        let cache = CodecCache::new(10);
        let key = CodecKey::new(&SchemaPath::root(), &TypeDefinition::decimal64(0));
        assert!(cache.get_or_build(key.clone(), || Codec::for_type(key.type_def())).is_err());
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn test_concurrent_cache_access() {
        let cache = Arc::new(CodecCache::new(100));
        let builds = Arc::new(AtomicUsize::new(0));
        let key = CodecKey::new(&flag_path(), &TypeDefinition::int32());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let builds = Arc::clone(&builds);
                let key = key.clone();
                std::thread::spawn(move || {
                    cache
                        .get_or_build(key, || {
                            builds.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                            Codec::for_type(&TypeDefinition::int32())
                        })
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().type_name(), "int32");
        }
        assert_eq!(builds.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
