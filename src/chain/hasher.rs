// Block Hasher - canonical, sorted-key SHA-256 over a block's linked fields
//
// Existing ledgers were produced by a JSON encoder with ", " / ": " separators
// and ASCII-only output; every block hash depends on reproducing those bytes.

use serde::Serialize;
use serde_json::ser::{Formatter, Serializer};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io;
use thiserror::Error;

/// Errors from canonical encoding
#[derive(Error, Debug)]
pub enum HasherError {
    #[error("Canonical encoding failed: {0}")]
    EncodingFailed(#[from] serde_json::Error),

    #[error("Canonical encoding produced non-UTF-8 output")]
    InvalidUtf8,
}

/// JSON formatter producing the canonical byte layout.
///
/// Members are separated by `", "`, keys from values by `": "`, and every
/// character outside printable ASCII is written as a lowercase `\uXXXX`
/// escape (UTF-16 surrogate pairs above the BMP).
#[derive(Clone, Copy, Debug, Default)]
pub struct CanonicalFormatter;

impl Formatter for CanonicalFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if fragment.bytes().all(is_printable_ascii) {
            return writer.write_all(fragment.as_bytes());
        }

        let mut units = [0u16; 2];
        for ch in fragment.chars() {
            if ch.is_ascii() && is_printable_ascii(ch as u8) {
                writer.write_all(&[ch as u8])?;
            } else {
                for unit in ch.encode_utf16(&mut units).iter() {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}

fn is_printable_ascii(byte: u8) -> bool {
    (0x20..=0x7e).contains(&byte)
}

/// Encode any serializable value with the canonical formatter
pub fn to_canonical_json<T>(value: &T) -> Result<String, HasherError>
where
    T: Serialize + ?Sized,
{
    let mut out = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut out, CanonicalFormatter);
    value.serialize(&mut serializer)?;
    String::from_utf8(out).map_err(|_| HasherError::InvalidUtf8)
}

/// Deterministic hasher for ledger blocks
pub struct BlockHasher;

impl BlockHasher {
    /// The exact envelope bytes that get hashed.
    ///
    /// Keys are held in a `BTreeMap`, so they serialize in code point order:
    /// `previousHash`, `timestamp`, `voteData`.
    pub fn envelope(
        timestamp: &str,
        vote_data: &str,
        previous_hash: &str,
    ) -> Result<String, HasherError> {
        let mut fields = BTreeMap::new();
        fields.insert("timestamp", timestamp);
        fields.insert("voteData", vote_data);
        fields.insert("previousHash", previous_hash);
        to_canonical_json(&fields)
    }

    /// Lowercase hex SHA-256 of the canonical envelope
    pub fn hash(
        timestamp: &str,
        vote_data: &str,
        previous_hash: &str,
    ) -> Result<String, HasherError> {
        let envelope = Self::envelope(timestamp, vote_data, previous_hash)?;
        Ok(hex::encode(Sha256::digest(envelope.as_bytes())))
    }
}
