use super::logging::{StoreLogger, TracingLogger};
use crate::json::{AllRowsStrategy, SampledStrategy, SchemaInferenceEngine};
use crate::storage::{JsonLinesFile, RecordFile};
use std::fmt;
use std::sync::Arc;

/// Store configuration
#[derive(Clone)]
pub struct StoreConfig {
    /// Enforce foreign keys after load
    pub foreign_keys: bool,

    /// Rewrite a table's file after each mutation outside a transaction
    pub auto_sync: bool,

    /// Fail `open` on the first per-table load error instead of dropping
    /// the table with a warning
    pub strict_load: bool,

    /// Infer from an evenly spaced sample of this many rows instead of all
    /// rows
    pub inference_sample_size: Option<usize>,

    pub logger: Arc<dyn StoreLogger>,

    pub record_file: Arc<dyn RecordFile>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self {
            foreign_keys: true,
            auto_sync: true,
            strict_load: false,
            inference_sample_size: None,
            logger: Arc::new(TracingLogger),
            record_file: Arc::new(JsonLinesFile::new()),
        }
    }

    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    pub fn auto_sync(mut self, enabled: bool) -> Self {
        self.auto_sync = enabled;
        self
    }

    pub fn strict_load(mut self, enabled: bool) -> Self {
        self.strict_load = enabled;
        self
    }

    pub fn inference_sample_size(mut self, size: usize) -> Self {
        self.inference_sample_size = Some(size);
        self
    }

    pub fn logger(mut self, logger: Arc<dyn StoreLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn record_file(mut self, record_file: Arc<dyn RecordFile>) -> Self {
        self.record_file = record_file;
        self
    }

    pub(crate) fn inference_engine(&self) -> SchemaInferenceEngine {
        match self.inference_sample_size {
            Some(size) => SchemaInferenceEngine::with_strategy(Box::new(SampledStrategy::new(size))),
            None => SchemaInferenceEngine::with_strategy(Box::new(AllRowsStrategy)),
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("foreign_keys", &self.foreign_keys)
            .field("auto_sync", &self.auto_sync)
            .field("strict_load", &self.strict_load)
            .field("inference_sample_size", &self.inference_sample_size)
            .finish_non_exhaustive()
    }
}
