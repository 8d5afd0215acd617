use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitHeader {
    pub unit_id: String,
    pub unit_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfessionalRecord {
    pub unit_id: String,
    pub unit_name: String,
    pub person_id: String,
    pub secondary_id: String,
    pub full_name: String,
    pub role_code: String,
    pub role_text: String,
}

/// Flat key/value address fields for one unit, as produced by the detail fetch.
pub type UnitDetailFields = BTreeMap<String, String>;

/// Unit id to its detail fields.
pub type UnitDetails = BTreeMap<String, UnitDetailFields>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalUnitRecord {
    pub unit_id: String,
    pub unit_name: String,
    pub address: String,
    pub listed_phone: String,
    pub phone: String,
    pub matched_directory_name: String,
    pub match_score: Option<f64>,
    pub detail_url: String,
    pub professional_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceHash {
    pub path: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunManifest<C> {
    pub manifest_version: u32,
    pub run_id: String,
    pub command: String,
    pub invocation: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub paths: BTreeMap<String, String>,
    pub source_hashes: Vec<SourceHash>,
    pub counts: C,
    pub warnings: Vec<String>,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStateManifest {
    pub last_command: Option<String>,
    pub last_run_id: Option<String>,
    pub status: Option<String>,
    pub started_at: Option<String>,
    pub updated_at: Option<String>,
    pub last_manifest_path: Option<String>,
    pub warning_count: Option<usize>,
}
