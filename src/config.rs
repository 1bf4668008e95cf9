// Reader options shared by all format entry points

use crate::error::{Error, Result};
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// How MPEG audio frames are read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadMode {
    /// Read every frame up front
    Eager,
    /// Sample a bounded prefix and read the rest on demand
    #[default]
    Lazy,
}

/// Immutable options, built once and passed down by reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Label of the 8-bit encoding used for ISO-8859-1 strings
    pub legacy_encoding: String,
    pub read_mode: ReadMode,
    /// Number of frames sampled by the lazy bitrate estimate
    pub estimate_precision: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            legacy_encoding: Self::DEFAULT_ENCODING.to_string(),
            read_mode: ReadMode::Lazy,
            estimate_precision: Self::DEFAULT_PRECISION,
        }
    }
}

impl Options {
    pub const DEFAULT_ENCODING: &'static str = "windows-1252";
    pub const DEFAULT_PRECISION: usize = 1000;

    /// Load options from a JSON file; missing keys keep their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let options: Options = serde_json::from_str(&text)
            .map_err(|e| Error::Configuration(format!("options file: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    pub fn with_read_mode(mut self, mode: ReadMode) -> Self {
        self.read_mode = mode;
        self
    }

    pub fn with_estimate_precision(mut self, precision: usize) -> Self {
        self.estimate_precision = precision;
        self
    }

    /// Resolve the legacy encoding label
    pub fn legacy_encoding(&self) -> Result<&'static Encoding> {
        Encoding::for_label(self.legacy_encoding.as_bytes())
            .ok_or_else(|| Error::invalid(format!("unknown text encoding '{}'", self.legacy_encoding)))
    }

    /// Check every option against the domain the readers accept
    pub fn validate(&self) -> Result<()> {
        self.legacy_encoding()?;
        if self.estimate_precision == 0 {
            return Err(Error::invalid("estimate precision must be at least one frame"));
        }
        Ok(())
    }
}
