//! Recorder configuration and the validated values derived from it.
//!
//! Validation happens here once; everything downstream receives an already
//! accepted [`SsidFilter`] or [`SessionName`].

use crate::error::{RResult, RecorderError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;

/// ~11 minutes at 30 FPS. Older entries are overwritten past this.
pub const DEFAULT_BUFFER_CAPACITY: usize = 20_000;
pub const DEFAULT_SSID_PATTERN: &str = "TA.*";

/// Near/far planes used when the camera builds its projection matrix.
pub const NEAR_PLANE: f32 = 0.1;
pub const FAR_PLANE: f32 = 100.0;

/// Compiled SSID pattern. Matching is against the whole SSID.
#[derive(Clone, Debug)]
pub struct SsidFilter {
    pattern: String,
    regex: Regex,
}

impl SsidFilter {
    pub fn new(pattern: &str) -> RResult<Self> {
        if pattern.is_empty() {
            return Err(RecorderError::Configuration(
                "SSID pattern must not be empty".to_string(),
            ));
        }

        let anchored = format!("^(?:{})$", pattern);
        let regex = Regex::new(&anchored).map_err(|e| {
            RecorderError::Configuration(format!("invalid SSID pattern '{}': {}", pattern, e))
        })?;

        Ok(SsidFilter {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn matches(&self, ssid: &str) -> bool {
        self.regex.is_match(ssid)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// Session name with spaces stripped. Never empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionName(String);

impl SessionName {
    pub fn parse(raw: &str) -> RResult<Self> {
        let name: String = raw.chars().filter(|c| *c != ' ').collect();
        if name.is_empty() {
            return Err(RecorderError::Configuration(
                "session name is required".to_string(),
            ));
        }
        Ok(SessionName(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecorderConfig {
    pub ssid_pattern: String,
    pub buffer_capacity: usize,
    pub show_point_cloud: bool,
    pub show_debug: bool,
    pub live_status_interval_secs: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        RecorderConfig {
            ssid_pattern: DEFAULT_SSID_PATTERN.to_string(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            show_point_cloud: true,
            show_debug: true,
            live_status_interval_secs: 2,
        }
    }
}

impl RecorderConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> RResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            RecorderError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            RecorderError::Configuration(format!("cannot parse {}: {}", path.display(), e))
        })
    }

    pub fn ssid_filter(&self) -> RResult<SsidFilter> {
        SsidFilter::new(&self.ssid_pattern)
    }

    pub fn capacity(&self) -> RResult<NonZeroUsize> {
        NonZeroUsize::new(self.buffer_capacity).ok_or_else(|| {
            RecorderError::Configuration("buffer capacity must be greater than zero".to_string())
        })
    }

    pub fn validate(&self) -> RResult<(SsidFilter, NonZeroUsize)> {
        Ok((self.ssid_filter()?, self.capacity()?))
    }
}
