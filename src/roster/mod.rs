//! Roster text parsing: line classification, unit segmentation, record
//! assembly, field extraction and validation.
//!
//! Every stage is best-effort. Lines and records that do not fit are counted
//! and skipped; nothing here fails on input content.

mod classify;
mod extract;
mod segment;
mod validate;

use std::collections::{BTreeMap, HashSet};

use anyhow::Result;
use serde::Serialize;

use crate::model::{ProfessionalRecord, UnitHeader};

pub use classify::LineClassifier;
pub use extract::{ExtractStats, FieldExtractor};
pub use segment::{RecordSentinel, SegmentStats, assemble_candidates, segment_units};
pub use validate::{
    RankedCount, RejectReason, ValidationStats, multi_unit_people, rank_by, unit_listing,
    validate_records,
};

#[derive(Debug, Clone, Serialize)]
pub struct ParseReport {
    pub segment: SegmentStats,
    pub extract: ExtractStats,
    pub validation: ValidationStats,
    pub unit_count: usize,
    pub distinct_person_ids: usize,
    pub multi_unit_people: BTreeMap<String, Vec<String>>,
    pub units_ranked: Vec<RankedCount>,
    pub roles_ranked: Vec<RankedCount>,
}

/// Text or a record left out of the output, in the order it was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordDrop {
    /// Tail of a unit block that never reached a role code.
    Dangling { unit_id: String, text: String },
    /// Candidate the extractor could not split into fields.
    Unextracted { unit_id: String, text: String },
    Rejected {
        unit_id: String,
        person_id: String,
        reason: RejectReason,
    },
    Duplicate {
        unit_id: String,
        person_id: String,
        role_code: String,
    },
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub records: Vec<ProfessionalRecord>,
    pub segment: SegmentStats,
    pub extract: ExtractStats,
    pub drops: Vec<RecordDrop>,
}

#[derive(Debug, Clone)]
pub struct RosterParse {
    pub records: Vec<ProfessionalRecord>,
    pub units: Vec<UnitHeader>,
    pub report: ParseReport,
    pub drops: Vec<RecordDrop>,
}

#[derive(Debug, Clone)]
pub struct RosterParser {
    classifier: LineClassifier,
    sentinel: RecordSentinel,
    extractor: FieldExtractor,
}

impl RosterParser {
    pub fn new() -> Result<Self> {
        let sentinel = RecordSentinel::new()?;
        Ok(Self {
            classifier: LineClassifier::new()?,
            extractor: FieldExtractor::new(sentinel.clone())?,
            sentinel,
        })
    }

    /// Extracted records before validation, in source order.
    pub fn extract_records(&self, text: &str) -> Extraction {
        let (blocks, mut segment_stats) = segment_units(&self.classifier, text.lines());
        let mut extract_stats = ExtractStats::default();
        let mut records = Vec::new();
        let mut drops = Vec::new();

        for block in &blocks {
            let assembled = assemble_candidates(&self.sentinel, &block.lines);
            segment_stats.candidate_records += assembled.candidates.len();

            for candidate in &assembled.candidates {
                let extracted = self.extractor.extract(&block.header, candidate);
                extract_stats.record(extracted.as_ref().map(|(_, method)| *method));
                match extracted {
                    Some((record, _)) => records.push(record),
                    None => drops.push(RecordDrop::Unextracted {
                        unit_id: block.header.unit_id.clone(),
                        text: candidate.clone(),
                    }),
                }
            }

            if let Some(text) = assembled.dangling {
                segment_stats.dangling_fragments += 1;
                drops.push(RecordDrop::Dangling {
                    unit_id: block.header.unit_id.clone(),
                    text,
                });
            }
        }

        Extraction {
            records,
            segment: segment_stats,
            extract: extract_stats,
            drops,
        }
    }

    pub fn parse(&self, text: &str) -> RosterParse {
        let Extraction {
            records: extracted,
            segment,
            extract,
            mut drops,
        } = self.extract_records(text);
        let (records, validation, rejected) = validate_records(extracted);
        drops.extend(rejected);
        let units = unit_listing(&records);

        let distinct_person_ids = records
            .iter()
            .map(|record| record.person_id.as_str())
            .collect::<HashSet<&str>>()
            .len();

        let report = ParseReport {
            segment,
            extract,
            validation,
            unit_count: units.len(),
            distinct_person_ids,
            multi_unit_people: multi_unit_people(&records),
            units_ranked: rank_by(&records, |record| record.unit_name.as_str()),
            roles_ranked: rank_by(&records, |record| record.role_text.as_str()),
        };

        RosterParse {
            records,
            units,
            report,
            drops,
        }
    }
}
