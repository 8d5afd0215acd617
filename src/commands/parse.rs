use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::cli::ParseArgs;
use crate::commands::{RunContext, RunReport};
use crate::roster::{RecordDrop, RosterParser};
use crate::util::{read_text, source_hash, write_csv_records, write_json_pretty};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseCounts {
    pub lines_total: usize,
    pub candidate_records: usize,
    pub extracted_records: usize,
    pub valid_records: usize,
    pub units: usize,
    pub distinct_person_ids: usize,
    pub dropped: usize,
}

pub fn run(args: ParseArgs) -> Result<()> {
    RunContext::drive("parse", &args.cache_root, |context| execute(context, &args))
}

pub(crate) fn execute(context: &RunContext, args: &ParseArgs) -> Result<RunReport<ParseCounts>> {
    let layout = &context.layout;
    let input_path = args
        .input_path
        .clone()
        .unwrap_or_else(|| layout.roster_text_path());
    let professionals_path = layout.professionals_path();
    let units_path = layout.units_path();
    let report_path = layout.parse_report_path();

    let text = read_text(&input_path)
        .with_context(|| format!("roster text not available at {}", input_path.display()))?;
    let parser = RosterParser::new()?;
    let parsed = parser.parse(&text);
    let stats = &parsed.report;

    info!(
        lines = stats.segment.lines_total,
        headers = stats.segment.header_lines,
        noise = stats.segment.noise_lines,
        orphan_content = stats.segment.orphan_content_lines,
        candidates = stats.segment.candidate_records,
        dangling = stats.segment.dangling_fragments,
        "segmented roster text"
    );
    info!(
        strict = stats.extract.strict,
        fallback = stats.extract.fallback,
        failed = stats.extract.failed,
        "extracted record fields"
    );
    info!(
        input = stats.validation.input,
        valid = stats.validation.valid,
        invalid_person_id = stats.validation.invalid_person_id,
        invalid_secondary_id = stats.validation.invalid_secondary_id,
        empty_name = stats.validation.empty_name,
        invalid_role_code = stats.validation.invalid_role_code,
        duplicates = stats.validation.duplicates_removed,
        "validated records"
    );

    for dropped in &parsed.drops {
        log_drop(dropped);
    }

    for (rank, role) in stats.roles_ranked.iter().take(args.top_roles).enumerate() {
        info!(rank = rank + 1, role = %role.label, count = role.count, "role ranking");
    }

    write_csv_records(&professionals_path, &parsed.records)?;
    write_csv_records(&units_path, &parsed.units)?;
    write_json_pretty(&report_path, stats)?;

    info!(
        professionals = parsed.records.len(),
        units = parsed.units.len(),
        path = %professionals_path.display(),
        "wrote parsed roster"
    );

    let mut report = RunReport::new(ParseCounts {
        lines_total: stats.segment.lines_total,
        candidate_records: stats.segment.candidate_records,
        extracted_records: stats.extract.strict + stats.extract.fallback,
        valid_records: stats.validation.valid,
        units: stats.unit_count,
        distinct_person_ids: stats.distinct_person_ids,
        dropped: parsed.drops.len(),
    });
    report.path("input_path", &input_path);
    report.path("professionals_path", &professionals_path);
    report.path("units_path", &units_path);
    report.path("parse_report_path", &report_path);
    report.source_hashes.push(source_hash(&input_path)?);

    if stats.segment.orphan_content_lines > 0 {
        report.warn(format!(
            "{} content lines appeared before the first unit header and were dropped",
            stats.segment.orphan_content_lines
        ));
    }
    if stats.extract.failed > 0 {
        report.warn(format!(
            "{} candidate records could not be split into fields",
            stats.extract.failed
        ));
    }
    if parsed.records.is_empty() {
        report.warn("no valid professional records parsed".to_string());
    }

    Ok(report)
}

fn log_drop(dropped: &RecordDrop) {
    match dropped {
        RecordDrop::Dangling { unit_id, text } => {
            debug!(unit_id = %unit_id, text = %text, "dropped fragment without role code");
        }
        RecordDrop::Unextracted { unit_id, text } => {
            debug!(unit_id = %unit_id, text = %text, "dropped candidate without fields");
        }
        RecordDrop::Rejected {
            unit_id,
            person_id,
            reason,
        } => {
            debug!(unit_id = %unit_id, person_id = %person_id, reason = ?reason, "rejected record");
        }
        RecordDrop::Duplicate {
            unit_id,
            person_id,
            role_code,
        } => {
            debug!(
                unit_id = %unit_id,
                person_id = %person_id,
                role_code = %role_code,
                "dropped duplicate record"
            );
        }
    }
}
