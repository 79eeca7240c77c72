//! Stream Templates
//!
//! Describe an output byte stream as literal text interleaved with
//! interpolated values, and read it back as one ordered stream of chunks.
//! Interpolations may be text, raw bytes, nested sequences, futures or other
//! byte streams; they are drained lazily, only as fast as the consumer pulls.
//!
//! # Architecture
//!
//! ```text
//! consumer pull ──► TemplateStream (driver)
//!                        │
//!                        ├── WorkQueue ──► Interpolation::kind()
//!                        ├── LiteralBuffer ──► TextCodec (flush)
//!                        ├── SubStreamPump (one sub-stream at a time)
//!                        └── AsyncAwaiter (one future at a time)
//! ```
//!
//! Output order always follows template order, whatever order sources
//! produce in. Adjacent literal, text and byte entries leave as one chunk.
//! The first failure of any source, or an abort, tears the whole stream
//! down and drops every source it still holds.
//!
//! # Example
//!
//! ```ignore
//! use stream_template::{stream_template, Interpolation, Template};
//!
//! let template = Template::builder()
//!     .literal("Hello ")
//!     .interpolate("tom")
//!     .literal(", here is ")
//!     .interpolate(Interpolation::future(async { anyhow::Ok("a future") }))
//!     .build();
//!
//! let bytes = stream_template(template).collect_bytes().await?;
//! assert_eq!(&bytes[..], b"Hello tom, here is a future");
//! ```

mod awaiter;
mod buffer;
mod codec;
mod config;
mod driver;
mod engine;
mod entry;
mod error;
mod pump;
mod queue;
mod template;

pub use awaiter::AsyncAwaiter;
pub use buffer::LiteralBuffer;
pub use codec::{BuiltinCodec, Encoding, TextCodec};
pub use config::TemplateConfig;
pub use driver::{AbortHandle, DriverState, TemplateStream};
pub use engine::{stream_template, TemplateEngine};
pub use entry::{Deferred, EntryKind, Interpolation, Source};
pub use error::TemplateError;
pub use pump::{PumpState, SubStreamPump};
pub use queue::WorkQueue;
pub use template::{Template, TemplateBuilder};
