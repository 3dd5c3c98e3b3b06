use std::sync::Arc;

use tracing::debug;

use crate::cache::{CodecCache, CodecCacheStats, CodecKey};
use crate::error::Result;
use crate::schema::{SchemaContext, SchemaPath, TypeDefinition};

use super::{Codec, ModulePrefixes};

const DEFAULT_CAPACITY: u64 = 4096;

/// Hands out shared codecs for the leaves of one schema context.
///
/// Codecs are cached by the leaf's schema path together with its type, so a
/// leaf reached from a different root never picks up another leaf's codec.
/// The registry must only be used with the context it was created for. It is
/// read-only after creation apart from the cache and can be shared across
/// threads.
pub struct CodecRegistry {
    modules: Arc<ModulePrefixes>,
    cache: CodecCache,
}

impl CodecRegistry {
    pub fn new(context: &SchemaContext) -> Self {
        Self::with_capacity(context, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(context: &SchemaContext, max_capacity: u64) -> Self {
        Self {
            modules: Arc::new(ModulePrefixes::from_context(context)),
            cache: CodecCache::new(max_capacity),
        }
    }

    /// Codec for the leaf at `path`, built from `type_def` on first use
    pub fn codec_for(&self, path: &SchemaPath, type_def: &TypeDefinition) -> Result<Arc<Codec>> {
        self.cache.get_or_build(CodecKey::new(path, type_def), || {
            debug!(path = %path, kind = type_def.kind_name(), "building codec");
            Codec::new(type_def, Arc::clone(&self.modules))
        })
    }

    /// Uncached codec for a free-standing type
    pub fn codec_for_type(&self, type_def: &TypeDefinition) -> Result<Codec> {
        Codec::new(type_def, Arc::clone(&self.modules))
    }

    pub fn modules(&self) -> &ModulePrefixes {
        &self.modules
    }

    pub fn stats(&self) -> CodecCacheStats {
        self.cache.stats()
    }
}
