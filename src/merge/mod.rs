//! Joins unit identity, fetched address fields and the matched directory
//! phone into one record per unit.

#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::matching::FuzzyMatcher;
use crate::model::{FinalUnitRecord, ProfessionalRecord, UnitDetailFields, UnitDetails, UnitHeader};

const ADDRESS_LINE_KEYS: [&str; 4] = ["street", "number", "complement", "neighborhood"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompletenessReport {
    pub total: usize,
    pub missing_address: usize,
    pub missing_name: usize,
    pub with_phone: usize,
    pub with_listed_phone: usize,
    pub matched: usize,
    pub duplicate_unit_ids: Vec<String>,
}

fn field<'a>(fields: &'a UnitDetailFields, key: &str) -> Option<&'a str> {
    fields
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

/// `street, number, complement, neighborhood, CEP <postal_code>, <city> - <state>`
/// with absent parts left out.
pub fn assemble_address(fields: &UnitDetailFields) -> String {
    let mut parts = ADDRESS_LINE_KEYS
        .iter()
        .filter_map(|key| field(fields, key))
        .map(ToOwned::to_owned)
        .collect::<Vec<String>>();

    if let Some(postal_code) = field(fields, "postal_code") {
        parts.push(format!("CEP {postal_code}"));
    }

    if let Some(city) = field(fields, "city") {
        match field(fields, "state") {
            Some(state) => parts.push(format!("{city} - {state}")),
            None => parts.push(city.to_string()),
        }
    }

    parts.join(", ")
}

pub fn professional_counts(records: &[ProfessionalRecord]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::<String, usize>::new();
    for record in records {
        *counts.entry(record.unit_id.clone()).or_insert(0) += 1;
    }
    counts
}

pub fn merge_unit(
    unit: &UnitHeader,
    details: &UnitDetails,
    matcher: &FuzzyMatcher<'_>,
    professional_count: usize,
) -> FinalUnitRecord {
    let empty = UnitDetailFields::new();
    let fields = details.get(&unit.unit_id).unwrap_or(&empty);
    let matched = matcher.best_match(&unit.unit_name);

    FinalUnitRecord {
        unit_id: unit.unit_id.clone(),
        unit_name: unit.unit_name.clone(),
        address: assemble_address(fields),
        listed_phone: field(fields, "phone").unwrap_or("").to_string(),
        phone: matched.phone().to_string(),
        matched_directory_name: matched
            .entry
            .map(|entry| entry.raw_name.clone())
            .unwrap_or_default(),
        match_score: matched.accepted_score(),
        detail_url: field(fields, "detail_url").unwrap_or("").to_string(),
        professional_count,
    }
}

pub fn merge_units(
    units: &[UnitHeader],
    details: &UnitDetails,
    matcher: &FuzzyMatcher<'_>,
    professionals: &[ProfessionalRecord],
) -> (Vec<FinalUnitRecord>, CompletenessReport) {
    let counts = professional_counts(professionals);
    let records = units
        .iter()
        .map(|unit| {
            let count = counts.get(&unit.unit_id).copied().unwrap_or(0);
            merge_unit(unit, details, matcher, count)
        })
        .collect::<Vec<FinalUnitRecord>>();

    let report = completeness(&records);
    (records, report)
}

pub fn completeness(records: &[FinalUnitRecord]) -> CompletenessReport {
    let mut seen = HashSet::<&str>::new();
    let mut duplicate_unit_ids = Vec::<String>::new();

    for record in records {
        if !seen.insert(record.unit_id.as_str()) && !duplicate_unit_ids.contains(&record.unit_id)
        {
            duplicate_unit_ids.push(record.unit_id.clone());
        }
    }

    CompletenessReport {
        total: records.len(),
        missing_address: records
            .iter()
            .filter(|record| record.address.trim().is_empty())
            .count(),
        missing_name: records
            .iter()
            .filter(|record| record.unit_name.trim().is_empty())
            .count(),
        with_phone: records
            .iter()
            .filter(|record| !record.phone.trim().is_empty())
            .count(),
        with_listed_phone: records
            .iter()
            .filter(|record| !record.listed_phone.trim().is_empty())
            .count(),
        matched: records
            .iter()
            .filter(|record| record.match_score.is_some())
            .count(),
        duplicate_unit_ids,
    }
}
