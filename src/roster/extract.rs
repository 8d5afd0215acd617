use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;

use super::segment::RecordSentinel;
use crate::model::{ProfessionalRecord, UnitHeader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    Strict,
    Fallback,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractStats {
    pub strict: usize,
    pub fallback: usize,
    pub failed: usize,
}

impl ExtractStats {
    pub fn record(&mut self, outcome: Option<ExtractionMethod>) {
        match outcome {
            Some(ExtractionMethod::Strict) => self.strict += 1,
            Some(ExtractionMethod::Fallback) => self.fallback += 1,
            None => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RecordFields {
    person_id: String,
    secondary_id: String,
    full_name: String,
    role_code: String,
    role_text: String,
}

#[derive(Debug, Clone)]
pub struct FieldExtractor {
    strict_record: Regex,
    leading_ids: Regex,
    sentinel: RecordSentinel,
}

impl FieldExtractor {
    pub fn new(sentinel: RecordSentinel) -> Result<Self> {
        Ok(Self {
            strict_record: Regex::new(r"^(\d{11})\s+(\d+)\s+(.+?)\s+(\d{5,6})\s*-\s*(.+)$")
                .context("failed to compile strict record regex")?,
            leading_ids: Regex::new(r"^\d+\s+\d+\s+")
                .context("failed to compile leading identifier regex")?,
            sentinel,
        })
    }

    /// Strict pattern first, positional fallback second. `None` means the
    /// candidate is discarded.
    pub fn extract(
        &self,
        unit: &UnitHeader,
        candidate: &str,
    ) -> Option<(ProfessionalRecord, ExtractionMethod)> {
        let (fields, method) = match self.extract_strict(candidate) {
            Some(fields) => (fields, ExtractionMethod::Strict),
            None => (self.extract_fallback(candidate)?, ExtractionMethod::Fallback),
        };

        Some((
            ProfessionalRecord {
                unit_id: unit.unit_id.clone(),
                unit_name: unit.unit_name.clone(),
                person_id: fields.person_id,
                secondary_id: fields.secondary_id,
                full_name: fields.full_name,
                role_code: fields.role_code,
                role_text: fields.role_text,
            },
            method,
        ))
    }

    fn extract_strict(&self, candidate: &str) -> Option<RecordFields> {
        let captures = self.strict_record.captures(candidate)?;
        let field = |index: usize| {
            captures
                .get(index)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default()
        };

        Some(RecordFields {
            person_id: field(1),
            secondary_id: field(2),
            full_name: field(3),
            role_code: field(4),
            role_text: field(5),
        })
    }

    // The name is cut out of the original text rather than rebuilt from tokens,
    // so its internal spacing survives. A name that itself contains a
    // `ddddd - text` run is split at that run.
    fn extract_fallback(&self, candidate: &str) -> Option<RecordFields> {
        let tokens = candidate.split_whitespace().collect::<Vec<&str>>();
        if tokens.len() < 4 {
            return None;
        }

        let sentinel = self.sentinel.find(candidate)?;
        let head = &candidate[..sentinel.start];
        let name = match self.leading_ids.find(head) {
            Some(prefix) => &head[prefix.end()..],
            None => head,
        };

        Some(RecordFields {
            person_id: tokens[0].to_string(),
            secondary_id: tokens[1].to_string(),
            full_name: name.trim().to_string(),
            role_code: sentinel.role_code,
            role_text: sentinel.role_text,
        })
    }
}
