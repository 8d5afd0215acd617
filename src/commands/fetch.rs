use std::path::Path;

use anyhow::{Result, bail};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::FetchArgs;
use crate::commands::{RunContext, RunReport};
use crate::fetch::{
    DetailEndpoint, DetailPageParser, FetchFailure, FetchTarget, HttpPageSource,
    ListingHarvester, PageSource, fetch_details,
};
use crate::model::{UnitDetails, UnitHeader};
use crate::util::{read_csv_records, read_json, read_text, source_hash, write_json_pretty};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FetchCounts {
    pub targets: usize,
    pub skipped_existing: usize,
    pub attempted: usize,
    pub fetched: usize,
    pub failed: usize,
    pub details_total: usize,
    pub failures: Vec<FetchFailure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSource {
    CommandLine,
    ListingHtml,
    UnitsCsv,
}

pub fn run(args: FetchArgs) -> Result<()> {
    RunContext::drive("fetch", &args.cache_root, |context| {
        let source = HttpPageSource::new(args.retry_policy())?;
        execute(context, &args, &source)
    })
}

pub(crate) fn execute<S: PageSource>(
    context: &RunContext,
    args: &FetchArgs,
    source: &S,
) -> Result<RunReport<FetchCounts>> {
    let layout = &context.layout;
    let output_path = args
        .output_path
        .clone()
        .unwrap_or_else(|| layout.details_path());
    let units_path = args
        .units_path
        .clone()
        .unwrap_or_else(|| layout.units_path());

    let endpoint = DetailEndpoint {
        base_url: args.base_url.clone(),
        municipality_code: args.municipality_code.clone(),
    };
    let mut report = RunReport::new(FetchCounts::default());
    let (targets, target_source) = resolve_targets(args, &endpoint, &units_path)?;
    match target_source {
        TargetSource::CommandLine => {}
        TargetSource::ListingHtml => {
            if let Some(listing) = &args.listing_html {
                report.path("listing_html", listing);
                report.source_hashes.push(source_hash(listing)?);
            }
        }
        TargetSource::UnitsCsv => {
            report.path("units_path", &units_path);
            report.source_hashes.push(source_hash(&units_path)?);
        }
    }

    let mut details: UnitDetails = if args.only_missing && output_path.exists() {
        read_json(&output_path)?
    } else {
        UnitDetails::new()
    };

    let pending = pending_targets(&targets, &details, args.only_missing);
    report.counts.targets = targets.len();
    report.counts.skipped_existing = targets.len() - pending.len();
    report.counts.attempted = pending.len();

    info!(
        targets = targets.len(),
        pending = pending.len(),
        source = ?target_source,
        only_missing = args.only_missing,
        "resolved fetch targets"
    );

    let parser = DetailPageParser::new()?;
    let outcome = fetch_details(
        source,
        &endpoint,
        &parser,
        &pending,
        args.retry_policy().pause,
    );

    report.counts.fetched = outcome.details.len();
    report.counts.failed = outcome.failures.len();
    details.extend(outcome.details);
    report.counts.details_total = details.len();

    write_json_pretty(&output_path, &details)?;
    report.path("output_path", &output_path);

    info!(
        fetched = report.counts.fetched,
        failed = report.counts.failed,
        total = report.counts.details_total,
        path = %output_path.display(),
        "wrote unit details"
    );

    if !outcome.failures.is_empty() {
        report.warn(format!(
            "{} unit detail pages could not be fetched; rerun with --only-missing",
            outcome.failures.len()
        ));
    }
    report.counts.failures = outcome.failures;

    Ok(report)
}

/// Listing pages keep the linked code as-is, so units of another
/// municipality are fetched from their own detail pages.
fn resolve_targets(
    args: &FetchArgs,
    endpoint: &DetailEndpoint,
    units_path: &Path,
) -> Result<(Vec<FetchTarget>, TargetSource)> {
    if !args.unit_ids.is_empty() {
        let targets = args
            .unit_ids
            .iter()
            .filter(|id| !id.trim().is_empty())
            .map(|id| endpoint.target(id))
            .collect();
        return Ok((targets, TargetSource::CommandLine));
    }

    if let Some(listing) = &args.listing_html {
        let html = read_text(listing)?;
        let targets = ListingHarvester::new()?
            .unit_codes(&html)
            .iter()
            .map(|code| FetchTarget::from_unit_code(code))
            .collect::<Vec<FetchTarget>>();
        if targets.is_empty() {
            warn!(path = %listing.display(), "listing page links no unit detail pages");
        }
        return Ok((targets, TargetSource::ListingHtml));
    }

    if !units_path.exists() {
        bail!(
            "no fetch targets: pass --unit-id, --listing-html, or run parse to create {}",
            units_path.display()
        );
    }
    let units: Vec<UnitHeader> = read_csv_records(units_path)?;
    let targets = units
        .iter()
        .filter(|unit| !unit.unit_id.trim().is_empty())
        .map(|unit| endpoint.target(&unit.unit_id))
        .collect();

    Ok((targets, TargetSource::UnitsCsv))
}

/// Targets still to fetch. With `only_missing`, ids already holding details
/// are skipped.
pub fn pending_targets(
    targets: &[FetchTarget],
    existing: &UnitDetails,
    only_missing: bool,
) -> Vec<FetchTarget> {
    targets
        .iter()
        .filter(|target| !only_missing || !existing.contains_key(&target.unit_id))
        .cloned()
        .collect()
}
