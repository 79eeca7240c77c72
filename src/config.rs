//! Rendering configuration.

use serde::{Deserialize, Serialize};

use crate::codec::Encoding;

/// Configuration for one [`TemplateEngine`](crate::TemplateEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Encoding applied to text entries.
    pub encoding: Encoding,
    /// Poll futures and sub-streams that the queue has not reached yet, so
    /// their failures surface immediately. When false, a source is only
    /// polled once it reaches the head of the queue.
    pub watch_pending: bool,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            encoding: Encoding::Utf8,
            watch_pending: true,
        }
    }
}

impl TemplateConfig {
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_watch_pending(mut self, watch_pending: bool) -> Self {
        self.watch_pending = watch_pending;
        self
    }
}
