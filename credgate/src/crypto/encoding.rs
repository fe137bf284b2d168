//! Shared text encoding and comparison helpers. Every byte string that crosses
//! the crate boundary is standard base64 without padding, and every equality
//! check on secret-derived material goes through `constant_time_eq`.

use base64::{engine::general_purpose::STANDARD_NO_PAD, DecodeError, Engine};
use subtle::ConstantTimeEq;

/// Encodes raw bytes as unpadded standard base64.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD_NO_PAD.encode(bytes)
}

/// Decodes unpadded standard base64. Padded input is rejected so that the
/// producing and consuming sides agree on a single textual form.
pub fn decode(text: &str) -> Result<Vec<u8>, DecodeError> {
    STANDARD_NO_PAD.decode(text.as_bytes())
}

/// Compares two byte strings without branching on their contents.
///
/// Inputs of different length compare unequal; only the lengths are observable,
/// never the position of the first differing byte.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
