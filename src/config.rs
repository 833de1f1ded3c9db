//! Configuration for write and read sessions.
//!
//! Both configurations follow the builder style: start from `default()`,
//! adjust with `with_*` methods and check with `validate()` before use.

use crate::constants::{DEFAULT_OBS_BUFFER_SIZE, DEFAULT_READ_CHUNK_SIZE};
use crate::models::{FormatVersion, VariableIdMode};
use serde::{Deserialize, Serialize};

/// Configuration for a point observation write session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriterConfig {
    /// Observation rows staged before a flush
    /// Default: 32,768
    pub buffer_size: usize,

    /// On-disk layout to produce
    /// Default: V1.2
    pub version: FormatVersion,

    /// Interpretation of the per-observation variable column
    /// Default: GRIB code
    pub variable_id_mode: VariableIdMode,

    /// Heights may be above ground level as well as above mean sea level
    pub height_above_ground: bool,

    /// Describe variable indices as BUFR variables
    pub prepbufr_names: bool,

    /// Check that observations sharing a header index carry identical
    /// header fields
    pub verify_header_linkage: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_OBS_BUFFER_SIZE,
            version: FormatVersion::V1_2,
            variable_id_mode: VariableIdMode::GribCode,
            height_above_ground: false,
            prepbufr_names: false,
            verify_header_linkage: false,
        }
    }
}

impl WriterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flush threshold
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Select the on-disk layout
    pub fn with_version(mut self, version: FormatVersion) -> Self {
        self.version = version;
        self
    }

    /// Select GRIB-code or variable-index mode
    pub fn with_variable_id_mode(mut self, mode: VariableIdMode) -> Self {
        self.variable_id_mode = mode;
        self
    }

    pub fn with_height_above_ground(mut self, enabled: bool) -> Self {
        self.height_above_ground = enabled;
        self
    }

    pub fn with_prepbufr_names(mut self, enabled: bool) -> Self {
        self.prepbufr_names = enabled;
        self
    }

    pub fn with_header_linkage_verification(mut self, enabled: bool) -> Self {
        self.verify_header_linkage = enabled;
        self
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), String> {
        if self.buffer_size == 0 {
            return Err("Buffer size must be greater than 0".to_string());
        }
        if self.buffer_size > i32::MAX as usize {
            return Err("Buffer size must fit in a 32-bit row count".to_string());
        }
        if self.prepbufr_names && self.variable_id_mode == VariableIdMode::GribCode {
            return Err("BUFR variable naming requires variable-index mode".to_string());
        }
        Ok(())
    }
}

/// Configuration for a point observation read session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Observation rows decoded per chunk
    /// Default: 32,768 (the writer buffer size)
    pub chunk_size: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }
}

impl ReaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("Chunk size must be greater than 0".to_string());
        }
        Ok(())
    }
}
