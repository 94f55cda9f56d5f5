//! Canonical text serialization of tariff records.
//!
//! Every record is rendered into a single deterministic string of the form
//! `htsnumber: 0101.21.00|indent: 2|description: Horses|...` — one
//! `field: value` segment per column, absent values rendered as the literal
//! `None`, segments joined by `|`. This string is the unit of embedding:
//! the same record always produces the same string, and the stored vectors
//! are only meaningful for this exact field order. Changing the order or
//! the rendering requires re-embedding the whole table.
//!
//! [`parse`] inverts [`canonicalize`] and is used by the indexer as a
//! defensive re-parse before any vector is persisted.

use crate::error::{Error, Result};
use crate::models::TariffRecord;

/// Field names in canonical order. The embedding corpus was built with this
/// exact ordering; it must not change independently of the stored vectors.
pub const FIELD_NAMES: [&str; 9] = [
    "htsnumber",
    "indent",
    "description",
    "unitofquantity",
    "generalrateofduty",
    "specialrateofduty",
    "extrarateofduty",
    "quotaquantity",
    "additionalduties",
];

/// Separator between record segments.
pub const FIELD_DELIMITER: char = '|';

/// Separator between a field name and its value within a segment.
const VALUE_SEPARATOR: &str = ": ";

/// The record's column values in canonical field order, `indent` rendered
/// as its decimal string.
pub fn canonical_values(record: &TariffRecord) -> [Option<String>; 9] {
    [
        record.htsnumber.clone(),
        record.indent.map(|i| i.to_string()),
        record.description.clone(),
        record.unitofquantity.clone(),
        record.generalrateofduty.clone(),
        record.specialrateofduty.clone(),
        record.extrarateofduty.clone(),
        record.quotaquantity.clone(),
        record.additionalduties.clone(),
    ]
}

/// Render a record into its canonical embeddable text.
///
/// Deterministic: the same record always yields the same string.
pub fn canonicalize(record: &TariffRecord) -> String {
    let values = canonical_values(record);
    let segments: Vec<String> = FIELD_NAMES
        .iter()
        .zip(values.iter())
        .map(|(name, value)| match value {
            Some(v) => format!("{}{}{}", name, VALUE_SEPARATOR, v),
            None => format!("{}{}None", name, VALUE_SEPARATOR),
        })
        .collect();
    segments.join(&FIELD_DELIMITER.to_string())
}

/// Parse a canonical text back into its field values, in canonical order.
///
/// A literal value of `None` is indistinguishable from an absent one and
/// parses back to `None`.
///
/// # Errors
///
/// [`Error::MalformedRecord`] when the segment count does not match the
/// field count, a segment lacks the `": "` separator, or a field name is
/// out of order.
pub fn parse(text: &str) -> Result<Vec<Option<String>>> {
    let segments: Vec<&str> = text.split(FIELD_DELIMITER).collect();
    if segments.len() != FIELD_NAMES.len() {
        return Err(Error::MalformedRecord(format!(
            "expected {} segments, found {}",
            FIELD_NAMES.len(),
            segments.len()
        )));
    }

    let mut values = Vec::with_capacity(FIELD_NAMES.len());
    for (segment, expected_name) in segments.iter().zip(FIELD_NAMES.iter()) {
        let (name, value) = segment.split_once(VALUE_SEPARATOR).ok_or_else(|| {
            Error::MalformedRecord(format!("segment '{}' lacks a ': ' separator", segment))
        })?;
        if name != *expected_name {
            return Err(Error::MalformedRecord(format!(
                "expected field '{}', found '{}'",
                expected_name, name
            )));
        }
        values.push(match value {
            "None" => None,
            v => Some(v.to_string()),
        });
    }

    Ok(values)
}
