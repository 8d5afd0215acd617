use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use super::RecordDrop;
use crate::model::{ProfessionalRecord, UnitHeader};

pub const PERSON_ID_LEN: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    PersonId,
    SecondaryId,
    EmptyName,
    RoleCode,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationStats {
    pub input: usize,
    pub valid: usize,
    pub invalid_person_id: usize,
    pub invalid_secondary_id: usize,
    pub empty_name: usize,
    pub invalid_role_code: usize,
    pub duplicates_removed: usize,
}

impl ValidationStats {
    fn reject(&mut self, reason: RejectReason) {
        match reason {
            RejectReason::PersonId => self.invalid_person_id += 1,
            RejectReason::SecondaryId => self.invalid_secondary_id += 1,
            RejectReason::EmptyName => self.empty_name += 1,
            RejectReason::RoleCode => self.invalid_role_code += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedCount {
    pub label: String,
    pub count: usize,
}

fn is_ascii_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|byte| byte.is_ascii_digit())
}

pub fn check_record(record: &ProfessionalRecord) -> Result<(), RejectReason> {
    let person_id = record.person_id.trim();
    if person_id.len() != PERSON_ID_LEN || !is_ascii_digits(person_id) {
        return Err(RejectReason::PersonId);
    }
    if !is_ascii_digits(record.secondary_id.trim()) {
        return Err(RejectReason::SecondaryId);
    }
    if record.full_name.trim().is_empty() {
        return Err(RejectReason::EmptyName);
    }

    let role_code = record.role_code.trim();
    if !(5..=6).contains(&role_code.len()) || !is_ascii_digits(role_code) {
        return Err(RejectReason::RoleCode);
    }

    Ok(())
}

/// Drops records failing a format predicate, then keeps the first record for
/// each `(unit_id, person_id, role_code)` key.
pub fn validate_records(
    records: Vec<ProfessionalRecord>,
) -> (Vec<ProfessionalRecord>, ValidationStats, Vec<RecordDrop>) {
    let mut stats = ValidationStats {
        input: records.len(),
        ..ValidationStats::default()
    };
    let mut seen = HashSet::<(String, String, String)>::new();
    let mut valid = Vec::with_capacity(records.len());
    let mut drops = Vec::new();

    for record in records {
        if let Err(reason) = check_record(&record) {
            stats.reject(reason);
            drops.push(RecordDrop::Rejected {
                unit_id: record.unit_id,
                person_id: record.person_id,
                reason,
            });
            continue;
        }

        let key = (
            record.unit_id.clone(),
            record.person_id.clone(),
            record.role_code.clone(),
        );
        if !seen.insert(key) {
            stats.duplicates_removed += 1;
            drops.push(RecordDrop::Duplicate {
                unit_id: record.unit_id,
                person_id: record.person_id,
                role_code: record.role_code,
            });
            continue;
        }

        valid.push(record);
    }

    stats.valid = valid.len();
    (valid, stats, drops)
}

/// Counts per label, highest first; equal counts keep first-seen order.
pub fn rank_by<'a, F>(records: &'a [ProfessionalRecord], label: F) -> Vec<RankedCount>
where
    F: Fn(&'a ProfessionalRecord) -> &'a str,
{
    let mut positions = HashMap::<&str, usize>::new();
    let mut ranking = Vec::<RankedCount>::new();

    for record in records {
        let key = label(record);
        match positions.get(key) {
            Some(&index) => ranking[index].count += 1,
            None => {
                positions.insert(key, ranking.len());
                ranking.push(RankedCount {
                    label: key.to_string(),
                    count: 1,
                });
            }
        }
    }

    ranking.sort_by(|a, b| b.count.cmp(&a.count));
    ranking
}

/// Unique units by first occurrence, ordered numerically when every id is an
/// integer and lexicographically otherwise.
pub fn unit_listing(records: &[ProfessionalRecord]) -> Vec<UnitHeader> {
    let mut seen = HashSet::<&str>::new();
    let mut units = Vec::<UnitHeader>::new();

    for record in records {
        let unit_id = record.unit_id.trim();
        let unit_name = record.unit_name.trim();
        if unit_id.is_empty() || unit_name.is_empty() {
            continue;
        }
        if seen.insert(unit_id) {
            units.push(UnitHeader {
                unit_id: unit_id.to_string(),
                unit_name: unit_name.to_string(),
            });
        }
    }

    let numeric = units
        .iter()
        .map(|unit| unit.unit_id.parse::<u64>().ok())
        .collect::<Option<Vec<u64>>>();

    match numeric {
        Some(keys) => {
            let mut keyed = keys.into_iter().zip(units).collect::<Vec<(u64, UnitHeader)>>();
            keyed.sort_by_key(|(key, _)| *key);
            keyed.into_iter().map(|(_, unit)| unit).collect()
        }
        None => {
            units.sort_by(|a, b| a.unit_id.cmp(&b.unit_id));
            units
        }
    }
}

/// Person ids linked to more than one unit, with their unit ids in first-seen order.
pub fn multi_unit_people(records: &[ProfessionalRecord]) -> BTreeMap<String, Vec<String>> {
    let mut units_by_person = BTreeMap::<String, Vec<String>>::new();

    for record in records {
        let units = units_by_person.entry(record.person_id.clone()).or_default();
        if !units.contains(&record.unit_id) {
            units.push(record.unit_id.clone());
        }
    }

    units_by_person.retain(|_, units| units.len() > 1);
    units_by_person
}
