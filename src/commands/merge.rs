use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::{debug, info};

use crate::cli::MergeArgs;
use crate::commands::{RunContext, RunReport};
use crate::matching::{DirectoryEntry, DirectoryStats, FuzzyMatcher, ListingSplitter};
use crate::merge::{CompletenessReport, merge_units};
use crate::model::{ProfessionalRecord, UnitDetails, UnitHeader};
use crate::store;
use crate::util::{read_csv_records, read_json, read_text, source_hash, write_csv_records};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeCounts {
    pub units: usize,
    pub details: usize,
    pub professionals: usize,
    pub directory: DirectoryStats,
    pub completeness: CompletenessReport,
    pub db_units: Option<i64>,
    pub db_professionals: Option<i64>,
}

pub fn run(args: MergeArgs) -> Result<()> {
    RunContext::drive("merge", &args.cache_root, |context| execute(context, &args))
}

pub(crate) fn execute(context: &RunContext, args: &MergeArgs) -> Result<RunReport<MergeCounts>> {
    let layout = &context.layout;
    let units_path = args
        .units_path
        .clone()
        .unwrap_or_else(|| layout.units_path());
    let details_path = args
        .details_path
        .clone()
        .unwrap_or_else(|| layout.details_path());
    let directory_path = args
        .directory_path
        .clone()
        .unwrap_or_else(|| layout.directory_path());
    let professionals_path = args
        .professionals_path
        .clone()
        .unwrap_or_else(|| layout.professionals_path());
    let output_path = args
        .output_path
        .clone()
        .unwrap_or_else(|| layout.final_units_path());

    let mut report = RunReport::new(MergeCounts::default());

    if !units_path.exists() {
        bail!("units file missing: {} (run parse first)", units_path.display());
    }
    let units: Vec<UnitHeader> = read_csv_records(&units_path)?;
    report.path("units_path", &units_path);
    report.source_hashes.push(source_hash(&units_path)?);

    let details: UnitDetails = if details_path.exists() {
        report.path("details_path", &details_path);
        report.source_hashes.push(source_hash(&details_path)?);
        read_json(&details_path)?
    } else {
        report.warn(format!(
            "details file missing: {}; addresses left empty",
            details_path.display()
        ));
        UnitDetails::new()
    };

    let professionals: Vec<ProfessionalRecord> = if professionals_path.exists() {
        report.path("professionals_path", &professionals_path);
        report.source_hashes.push(source_hash(&professionals_path)?);
        read_csv_records(&professionals_path)?
    } else {
        report.warn(format!(
            "professionals file missing: {}; professional counts left at zero",
            professionals_path.display()
        ));
        Vec::new()
    };

    let config = args.match_config();
    let (directory, directory_stats) = if directory_path.exists() {
        report.path("directory_path", &directory_path);
        report.source_hashes.push(source_hash(&directory_path)?);
        load_directory(&directory_path, config.min_token_len)?
    } else {
        report.warn(format!(
            "phone directory missing: {}; no phones matched",
            directory_path.display()
        ));
        (Vec::new(), DirectoryStats::default())
    };

    info!(
        rows = directory_stats.source_rows,
        skipped = directory_stats.skipped_rows,
        multi_name = directory_stats.multi_name_rows,
        entries = directory_stats.entries,
        "loaded phone directory"
    );

    let matcher = FuzzyMatcher::new(&directory, config);
    let (records, completeness) = merge_units(&units, &details, &matcher, &professionals);

    write_csv_records(&output_path, &records)?;
    report.path("output_path", &output_path);

    info!(
        total = completeness.total,
        missing_address = completeness.missing_address,
        missing_name = completeness.missing_name,
        with_phone = completeness.with_phone,
        with_listed_phone = completeness.with_listed_phone,
        matched = completeness.matched,
        path = %output_path.display(),
        "wrote final units"
    );

    if !completeness.duplicate_unit_ids.is_empty() {
        report.warn(format!(
            "duplicate unit ids in final output: {}",
            completeness.duplicate_unit_ids.join(", ")
        ));
    }

    if !args.skip_db {
        let db_path = args.db_path.clone().unwrap_or_else(|| layout.db_path());
        let mut connection = store::open(&db_path)?;
        store::replace_units(&mut connection, &records)?;
        store::replace_professionals(&mut connection, &professionals)?;
        report.counts.db_units = Some(store::count_rows(
            &connection,
            "SELECT COUNT(*) FROM units",
        )?);
        report.counts.db_professionals = Some(store::count_rows(
            &connection,
            "SELECT COUNT(*) FROM professionals",
        )?);
        report.path("db_path", &db_path);
        info!(path = %db_path.display(), "stored merged units");
    }

    report.counts.units = units.len();
    report.counts.details = details.len();
    report.counts.professionals = professionals.len();
    report.counts.directory = directory_stats;
    report.counts.completeness = completeness;

    Ok(report)
}

/// `.csv` files hold the name listing in the first column and the phone in the
/// second, after one header row of any wording; anything else is read as one
/// `<names>, <phone>` listing per line.
fn load_directory(
    path: &Path,
    min_token_len: usize,
) -> Result<(Vec<DirectoryEntry>, DirectoryStats)> {
    let splitter = ListingSplitter::new()?;
    let is_csv = path
        .extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("csv"));

    if is_csv {
        let rows = read_directory_rows(path)?;
        return Ok(splitter.expand_rows(rows, min_token_len));
    }

    let text = read_text(path)?;
    let mut stats = DirectoryStats::default();
    let mut entries = Vec::new();
    for line in text.lines().filter(|line| !line.trim().is_empty()) {
        stats.source_rows += 1;
        let parsed = splitter.parse_line(line, min_token_len);
        match parsed.len() {
            0 => {
                stats.skipped_rows += 1;
                debug!(line = %line, "directory line without name and phone");
            }
            1 => {}
            _ => stats.multi_name_rows += 1,
        }
        entries.extend(parsed);
    }
    stats.entries = entries.len();

    Ok((entries, stats))
}

fn read_directory_rows(path: &Path) -> Result<Vec<(String, String)>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open csv file: {}", path.display()))?;

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.with_context(|| {
            format!("failed to read row {} of {}", index + 1, path.display())
        })?;
        let column = |position: usize| record.get(position).unwrap_or("").to_string();
        rows.push((column(0), column(1)));
    }

    Ok(rows)
}
