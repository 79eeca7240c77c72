//! Template engine
//!
//! Binds a configuration and a codec, then renders templates into
//! independent [`TemplateStream`]s. Nothing is shared between rendered
//! streams except the codec.

use std::sync::Arc;

use tracing::debug;

use crate::codec::{BuiltinCodec, Encoding, TextCodec};
use crate::config::TemplateConfig;
use crate::driver::TemplateStream;
use crate::template::Template;

#[derive(Clone)]
pub struct TemplateEngine {
    config: TemplateConfig,
    codec: Arc<dyn TextCodec>,
}

impl TemplateEngine {
    pub fn new(config: TemplateConfig) -> Self {
        Self {
            config,
            codec: Arc::new(BuiltinCodec),
        }
    }

    /// Engine rendering text with `encoding`, defaults otherwise.
    pub fn with_encoding(encoding: Encoding) -> Self {
        Self::new(TemplateConfig::default().with_encoding(encoding))
    }

    /// Replace the text codec.
    pub fn with_codec(mut self, codec: impl TextCodec + 'static) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    pub fn config(&self) -> &TemplateConfig {
        &self.config
    }

    pub fn render(&self, template: Template) -> TemplateStream {
        debug!(
            slots = template.interpolations().len(),
            encoding = %self.config.encoding,
            watch_pending = self.config.watch_pending,
            "rendering template"
        );
        TemplateStream::new(template.into_queue(), self.config.clone(), Arc::clone(&self.codec))
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new(TemplateConfig::default())
    }
}

impl std::fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Render `template` as UTF-8 with the default configuration.
pub fn stream_template(template: Template) -> TemplateStream {
    TemplateEngine::default().render(template)
}
