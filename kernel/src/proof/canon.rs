//! JSON byte writers.
//!
//! Two forms are produced:
//!
//! - [`canonical_json_bytes`]: compact, sorted keys, integers only. Used for
//!   the run manifest, whose bytes feed the run digest.
//! - [`document_json_bytes`]: sorted keys, 4-space indentation, floats
//!   allowed. Used for the documents handed to the simulation binary
//!   (`config.json`, `campaign.json`, `custom_reports.json`).

use serde::Serialize;
use serde_json::Value;

use crate::error::{KernelError, Result};

/// Compact JSON with sorted keys, rejecting non-integer numbers.
///
/// Key order comes from `serde_json::Map`, which is `BTreeMap`-backed, so
/// the compact writer is already canonical once floats are ruled out.
///
/// # Errors
///
/// Returns [`KernelError::Validation`] if any number is not representable
/// as `i64` or `u64`.
pub fn canonical_json_bytes(value: &Value) -> Result<Vec<u8>> {
    require_integers(value)?;
    Ok(serde_json::to_vec(value)?)
}

/// Serialize a document with sorted keys and 4-space indentation.
///
/// # Errors
///
/// Returns [`KernelError::Json`] if serialization fails.
pub fn document_json_bytes(value: &impl Serialize) -> Result<Vec<u8>> {
    // Round-trip through Value so struct field order is sorted too.
    let value = serde_json::to_value(value)?;
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(buf)
}

fn require_integers(value: &Value) -> Result<()> {
    match value {
        Value::Number(n) if !(n.is_i64() || n.is_u64()) => Err(KernelError::validation(
            format!("non-integer number in canonical JSON: {n}"),
        )),
        Value::Array(items) => items.iter().try_for_each(require_integers),
        Value::Object(map) => map.values().try_for_each(require_integers),
        _ => Ok(()),
    }
}
