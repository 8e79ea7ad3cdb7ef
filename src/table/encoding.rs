//! Text encoding handling for delimited data files.
//!
//! Course datasets come from spreadsheets saved on many different systems,
//! so UTF-8 cannot be assumed. When the caller does not name an encoding the
//! bytes are fed to a statistical detector and decoded with its guess.

use chardetng::EncodingDetector;
use encoding_rs::Encoding;

use crate::error::{Error, Result};

/// Guesses the encoding of `bytes` from byte-level statistics.
///
/// A UTF-8 or UTF-16 byte-order mark wins over the statistical guess.
pub fn detect_encoding(bytes: &[u8]) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return encoding;
    }
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    detector.guess(None, true)
}

/// Looks up an encoding by its WHATWG label (`"utf-8"`, `"latin1"`, ...).
pub fn encoding_for_label(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| Error::Config(format!("unknown text encoding {:?}", label)))
}

/// Decodes `bytes` to text, using `label` when given and detection otherwise.
/// Malformed sequences are replaced rather than rejected.
pub fn decode_text(bytes: &[u8], label: Option<&str>) -> Result<String> {
    let encoding = match label {
        Some(label) => encoding_for_label(label)?,
        None => detect_encoding(bytes),
    };
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::warn!("text is not valid {}; replaced malformed sequences", used.name());
    }
    Ok(text.into_owned())
}
