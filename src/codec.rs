//! Text codecs
//!
//! Literal text is turned into bytes only when the literal buffer is flushed.
//! The encoding is fixed per rendered stream; raw byte interpolations bypass
//! the codec entirely.

use std::fmt;
use std::str::FromStr;

use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::TemplateError;

/// Standard alphabet, padding optional on decode.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &base64::alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Text encoding applied to literal and text entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Encoding {
    #[default]
    Utf8,
    /// Little-endian UTF-16 code units.
    Utf16Le,
    /// Low byte of each UTF-16 code unit.
    Latin1,
    /// Same byte mapping as latin1.
    Ascii,
    /// Text is a hex string, decoded to the bytes it spells.
    Hex,
    /// Text is base64, decoded to the bytes it spells.
    Base64,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf8",
            Self::Utf16Le => "utf16le",
            Self::Latin1 => "latin1",
            Self::Ascii => "ascii",
            Self::Hex => "hex",
            Self::Base64 => "base64",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Self::Utf8),
            "utf16le" | "utf-16le" | "ucs2" | "ucs-2" => Ok(Self::Utf16Le),
            "latin1" | "binary" => Ok(Self::Latin1),
            "ascii" => Ok(Self::Ascii),
            "hex" => Ok(Self::Hex),
            "base64" => Ok(Self::Base64),
            _ => Err(TemplateError::UnknownEncoding(s.to_string())),
        }
    }
}

impl TryFrom<String> for Encoding {
    type Error = TemplateError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Encoding> for String {
    fn from(encoding: Encoding) -> Self {
        encoding.as_str().to_string()
    }
}

/// Converts text to bytes for a given encoding.
///
/// Must be a pure function of its inputs; the driver may call it at any flush.
pub trait TextCodec: Send + Sync {
    fn encode(&self, text: &str, encoding: Encoding) -> Result<Bytes, TemplateError>;
}

/// Codec covering every [`Encoding`] variant.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCodec;

impl TextCodec for BuiltinCodec {
    fn encode(&self, text: &str, encoding: Encoding) -> Result<Bytes, TemplateError> {
        let bytes = match encoding {
            Encoding::Utf8 => Bytes::copy_from_slice(text.as_bytes()),
            Encoding::Utf16Le => text
                .encode_utf16()
                .flat_map(u16::to_le_bytes)
                .collect::<Vec<u8>>()
                .into(),
            Encoding::Latin1 | Encoding::Ascii => text
                .encode_utf16()
                .map(|unit| (unit & 0xff) as u8)
                .collect::<Vec<u8>>()
                .into(),
            Encoding::Hex => hex::decode(text)
                .map_err(|e| encoding_error(encoding, e))?
                .into(),
            Encoding::Base64 => BASE64
                .decode(text)
                .map_err(|e| encoding_error(encoding, e))?
                .into(),
        };
        Ok(bytes)
    }
}

fn encoding_error(encoding: Encoding, err: impl fmt::Display) -> TemplateError {
    TemplateError::Encoding {
        encoding: encoding.to_string(),
        message: err.to_string(),
    }
}
