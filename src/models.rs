//! Core data models for the tariff retrieval pipeline.
//!
//! These types represent the tariff schedule rows and search results that
//! flow through indexing and retrieval.

use serde::{Deserialize, Serialize};

/// One line item of the Harmonized Tariff Schedule.
///
/// All fields may be absent — the source schedule leaves most columns blank
/// on heading and subheading rows. The same `htsnumber` can repeat at
/// different indent levels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TariffRecord {
    pub htsnumber: Option<String>,
    pub indent: Option<i64>,
    pub description: Option<String>,
    pub unitofquantity: Option<String>,
    pub generalrateofduty: Option<String>,
    pub specialrateofduty: Option<String>,
    pub extrarateofduty: Option<String>,
    pub quotaquantity: Option<String>,
    pub additionalduties: Option<String>,
}

/// A similarity search hit: a tariff record with its cosine distance from
/// the query vector (smaller is closer).
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub record: TariffRecord,
    pub distance: f64,
}

/// A substring-lookup result from the non-semantic `lookup` path.
#[derive(Debug, Clone, Serialize)]
pub struct ExactMatch {
    pub htsnumber: Option<String>,
    pub description: Option<String>,
    pub generalrateofduty: Option<String>,
}
