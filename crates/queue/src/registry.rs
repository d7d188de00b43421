//! Type tag to decoder mapping.

use std::collections::HashMap;
use std::fmt;

use crate::envelope::WorkItemEnvelope;
use crate::error::ProcessorError;
use crate::item::WorkItem;

type Decoder<T> = Box<dyn Fn(&str) -> Result<T, String> + Send + Sync>;

/// Decoders for the envelope type tags a processor accepts.
///
/// A registry for `T` always understands `T::TYPE_TAG`. Extra tags cover items
/// written under an older tag or shape; they must still decode into `T`.
pub struct CodecRegistry<T> {
    decoders: HashMap<String, Decoder<T>>,
}

impl<T: WorkItem> CodecRegistry<T> {
    pub fn new() -> Self {
        let mut registry = Self {
            decoders: HashMap::new(),
        };
        registry.register(T::TYPE_TAG, |raw| {
            serde_json::from_str::<T>(raw).map_err(|e| e.to_string())
        });
        registry
    }

    /// Register (or replace) the decoder for `tag`.
    pub fn register<F>(&mut self, tag: impl Into<String>, decoder: F)
    where
        F: Fn(&str) -> Result<T, String> + Send + Sync + 'static,
    {
        self.decoders.insert(tag.into(), Box::new(decoder));
    }

    /// Accept `tag` as another name for `T`'s own JSON shape.
    pub fn with_alias(mut self, tag: impl Into<String>) -> Self {
        self.register(tag, |raw| {
            serde_json::from_str::<T>(raw).map_err(|e| e.to_string())
        });
        self
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.decoders.contains_key(tag)
    }

    pub fn decode(&self, envelope: &WorkItemEnvelope) -> Result<T, ProcessorError> {
        let decoder = self.decoders.get(envelope.item_type()).ok_or_else(|| {
            ProcessorError::serialization(format!(
                "no decoder registered for item type '{}'",
                envelope.item_type()
            ))
        })?;
        decoder(envelope.item()).map_err(|e| {
            ProcessorError::serialization(format!(
                "failed to decode '{}' item {}: {e}",
                envelope.item_type(),
                envelope.id()
            ))
        })
    }
}

impl<T: WorkItem> Default for CodecRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for CodecRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        tags.sort_unstable();
        f.debug_struct("CodecRegistry").field("tags", &tags).finish()
    }
}
