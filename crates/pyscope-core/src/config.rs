//! # Inspector Configuration
//!
//! Limits and presentation settings for a [`StackInspector`](crate::stack::StackInspector).
//!
//! ## Environment Variables
//!
//! - `PYSCOPE_MAX_FRAME_DEPTH`: overrides [`InspectorConfig::max_frame_depth`]
//!
//! ## Example
//!
//! ```rust
//! use pyscope_core::config::InspectorConfig;
//!
//! let config = InspectorConfig::default().with_max_frame_depth(64).with_unknown_placeholder("<?>");
//! assert_eq!(config.max_frame_depth, 64);
//! ```

use std::env;

use crate::error::{InspectError, InspectResult};

/// Environment variable read by [`InspectorConfig::from_env`].
pub const MAX_FRAME_DEPTH_VAR: &str = "PYSCOPE_MAX_FRAME_DEPTH";

/// Default frame depth limit.
pub const DEFAULT_MAX_FRAME_DEPTH: usize = 1024;

/// Default string length limit, in characters.
pub const DEFAULT_MAX_STRING_CHARS: usize = 64 * 1024;

/// Default line table size limit, in bytes.
pub const DEFAULT_MAX_LINE_TABLE_BYTES: usize = 1024 * 1024;

/// Settings for one inspection session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectorConfig
{
    /// Frames yielded before a walk fails with `FrameChainTooLong`.
    pub max_frame_depth: usize,
    /// Longest string object decoded; longer ones are treated as corrupt.
    pub max_string_chars: usize,
    /// Largest line table read; larger ones resolve to an unknown line.
    pub max_line_table_bytes: usize,
    /// Text used for a filename or function name that cannot be read.
    pub unknown_placeholder: String,
}

impl Default for InspectorConfig
{
    fn default() -> Self
    {
        Self {
            max_frame_depth: DEFAULT_MAX_FRAME_DEPTH,
            max_string_chars: DEFAULT_MAX_STRING_CHARS,
            max_line_table_bytes: DEFAULT_MAX_LINE_TABLE_BYTES,
            unknown_placeholder: "???".to_string(),
        }
    }
}

impl InspectorConfig
{
    /// Defaults overlaid with environment variables.
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` if a variable is set but does not parse.
    pub fn from_env() -> InspectResult<Self>
    {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Defaults overlaid with values from `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> InspectResult<Self>
    {
        let mut config = Self::default();
        if let Some(raw) = lookup(MAX_FRAME_DEPTH_VAR) {
            config.max_frame_depth = raw
                .trim()
                .parse()
                .map_err(|_| InspectError::InvalidArgument(format!("{MAX_FRAME_DEPTH_VAR}={raw} is not a frame count")))?;
        }
        Ok(config)
    }

    /// Set the frame depth limit.
    #[must_use]
    pub fn with_max_frame_depth(mut self, depth: usize) -> Self
    {
        self.max_frame_depth = depth;
        self
    }

    /// Set the string length limit.
    #[must_use]
    pub fn with_max_string_chars(mut self, chars: usize) -> Self
    {
        self.max_string_chars = chars;
        self
    }

    /// Set the line table size limit.
    #[must_use]
    pub fn with_max_line_table_bytes(mut self, bytes: usize) -> Self
    {
        self.max_line_table_bytes = bytes;
        self
    }

    /// Set the unreadable-name placeholder.
    #[must_use]
    pub fn with_unknown_placeholder(mut self, placeholder: impl Into<String>) -> Self
    {
        self.unknown_placeholder = placeholder.into();
        self
    }
}
