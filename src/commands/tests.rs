use std::cell::Cell;
use std::collections::HashMap;
use std::path::Path;

use anyhow::anyhow;

use super::*;
use crate::cli::{FetchArgs, MergeArgs, ParseArgs};
use crate::fetch::{FetchTarget, PageSource};
use crate::model::{FinalUnitRecord, ProfessionalRecord, UnitDetails, UnitHeader};
use crate::util::{read_csv_records, read_json, write_json_pretty, write_text};

const ROSTER_TEXT: &str = "\
---- PAGE 1 ----
MS / SAS / DRAC
CNES: 2558726 - UBS VILA NOVA
12345678901 898001 JOAO DA SILVA 225125 - MEDICO CLINICO
10987654321 898002 MARIA
SOUZA 223505 - ENFERMEIRO
---- PAGE 2 ----
CNES: 5428343 - CENTRO DE ESPECIALIDADES
12345678901 898001 JOAO DA SILVA 225125 - MEDICO CLINICO
Total de Profissionais: 1
";

const DETAIL_PAGE: &str = r#"
<table>
  <tr><td><b>Logradouro:</b></td><td><b>Número:</b></td><td><b>Telefone:</b></td></tr>
  <tr><td>RUA B</td><td>45</td><td>6733334444</td></tr>
  <tr><td><b>Complemento:</b></td><td><b>Bairro:</b></td><td><b>CEP:</b></td>
      <td><b>Município:</b></td><td><b>UF:</b></td></tr>
  <tr><td></td><td>CENTRO</td><td>79002000</td><td>CAMPO GRANDE</td><td>MS</td></tr>
</table>
"#;

struct FakeSource {
    pages: HashMap<String, String>,
    calls: Cell<usize>,
}

impl PageSource for FakeSource {
    fn fetch_text(&self, url: &str) -> Result<String> {
        self.calls.set(self.calls.get() + 1);
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("no page for {url}"))
    }
}

fn parse_args(root: &Path) -> ParseArgs {
    ParseArgs {
        cache_root: root.to_path_buf(),
        input_path: None,
        top_roles: 30,
    }
}

fn fetch_args(root: &Path, unit_ids: &[&str], only_missing: bool) -> FetchArgs {
    FetchArgs {
        cache_root: root.to_path_buf(),
        unit_ids: unit_ids.iter().map(|id| id.to_string()).collect(),
        listing_html: None,
        units_path: None,
        output_path: None,
        only_missing,
        base_url: "http://fake.test/".to_string(),
        municipality_code: "500320".to_string(),
        attempts: 1,
        backoff_ms: 0,
        timeout_secs: 1,
        pause_ms: 0,
    }
}

fn merge_args(root: &Path) -> MergeArgs {
    MergeArgs {
        cache_root: root.to_path_buf(),
        units_path: None,
        details_path: None,
        directory_path: None,
        professionals_path: None,
        output_path: None,
        db_path: None,
        skip_db: false,
        match_threshold: 0.4,
        min_token_len: 2,
        substring_bonus: 0.2,
    }
}

fn run_parse(root: &Path) -> RunReport<parse::ParseCounts> {
    write_text(&CacheLayout::new(root).roster_text_path(), ROSTER_TEXT).expect("write roster");
    let context = RunContext::start("parse", root).expect("start parse");
    let report = parse::execute(&context, &parse_args(root)).expect("parse runs");
    context.finish(report.clone()).expect("finish parse");
    report
}

#[test]
fn drive_writes_manifest_and_run_state() {
    let dir = tempfile::tempdir().expect("tempdir");

    RunContext::drive("parse", dir.path(), |_| Ok(RunReport::new(7_usize)))
        .expect("drive completes");

    let layout = CacheLayout::new(dir.path());
    let state: RunStateManifest = read_json(&layout.run_state_path()).expect("run state");
    assert_eq!(state.last_command.as_deref(), Some("parse"));
    assert_eq!(state.status.as_deref(), Some("completed"));
    assert_eq!(state.warning_count, Some(0));

    let manifest_path = state.last_manifest_path.expect("manifest path recorded");
    assert!(manifest_path.contains("parse_run_"));
    let manifest: serde_json::Value = read_json(Path::new(&manifest_path)).expect("manifest");
    assert_eq!(manifest["counts"], 7);
    assert_eq!(manifest["status"], "completed");
}

#[test]
fn drive_marks_failed_runs() {
    let dir = tempfile::tempdir().expect("tempdir");

    let result = RunContext::drive::<(), _>("merge", dir.path(), |_| Err(anyhow!("boom")));

    assert!(result.is_err());
    let state: RunStateManifest =
        read_json(&CacheLayout::new(dir.path()).run_state_path()).expect("run state");
    assert_eq!(state.status.as_deref(), Some("failed"));
    assert_eq!(state.last_manifest_path, None);
}

#[test]
fn render_pages_marks_every_page() {
    let pages = vec!["CNES: 1 - A\nlinha\n".to_string(), "  \n".to_string()];

    let (text, counts) = extract::render_pages(&pages);

    assert_eq!(
        text,
        "---- PAGE 1 ----\nCNES: 1 - A\nlinha\n---- PAGE 2 ----\n[NO TEXT]\n"
    );
    assert_eq!(counts.page_count, 2);
    assert_eq!(counts.empty_page_count, 1);
    assert_eq!(counts.line_count, 5);
}

#[test]
fn parse_writes_professionals_units_and_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let report = run_parse(dir.path());
    let layout = CacheLayout::new(dir.path());

    assert_eq!(report.counts.valid_records, 3);
    assert_eq!(report.counts.units, 2);
    assert_eq!(report.counts.distinct_person_ids, 2);
    assert_eq!(report.counts.dropped, 0);
    assert!(report.warnings.is_empty());

    let professionals: Vec<ProfessionalRecord> =
        read_csv_records(&layout.professionals_path()).expect("professionals csv");
    assert_eq!(professionals.len(), 3);
    assert_eq!(professionals[1].full_name, "MARIA SOUZA");
    assert_eq!(professionals[1].role_code, "223505");

    let units: Vec<UnitHeader> = read_csv_records(&layout.units_path()).expect("units csv");
    assert_eq!(
        units
            .iter()
            .map(|unit| unit.unit_id.as_str())
            .collect::<Vec<&str>>(),
        vec!["2558726", "5428343"]
    );

    let parse_report: serde_json::Value =
        read_json(&layout.parse_report_path()).expect("parse report");
    assert_eq!(parse_report["segment"]["header_lines"], 2);
    assert_eq!(parse_report["extract"]["strict"], 3);
    assert_eq!(parse_report["roles_ranked"][0]["label"], "MEDICO CLINICO");
    assert_eq!(parse_report["roles_ranked"][0]["count"], 2);
    assert_eq!(
        parse_report["multi_unit_people"]["12345678901"],
        serde_json::json!(["2558726", "5428343"])
    );
}

#[test]
fn parse_counts_dropped_fragments_and_records() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = CacheLayout::new(dir.path());
    write_text(
        &layout.roster_text_path(),
        "CNES: 2558726 - UBS VILA NOVA\n\
         12345678901 898001 JOAO DA SILVA 225125 - MEDICO CLINICO\n\
         12345678901 898001 JOAO DA SILVA 225125 - MEDICO CLINICO\n\
         10987654321 898002 SEM CODIGO\n",
    )
    .expect("seed roster text");

    let context = RunContext::start("parse", dir.path()).expect("start parse");
    let report = parse::execute(&context, &parse_args(dir.path())).expect("parse runs");

    assert_eq!(report.counts.valid_records, 1);
    assert_eq!(report.counts.dropped, 2);
}

#[test]
fn parse_fails_without_roster_text() {
    let dir = tempfile::tempdir().expect("tempdir");
    let context = RunContext::start("parse", dir.path()).expect("start parse");

    assert!(parse::execute(&context, &parse_args(dir.path())).is_err());
}

#[test]
fn fetch_only_missing_keeps_existing_details() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = CacheLayout::new(dir.path());
    let mut existing = UnitDetails::new();
    existing.insert(
        "2558726".to_string(),
        [("street".to_string(), "RUA A".to_string())].into_iter().collect(),
    );
    write_json_pretty(&layout.details_path(), &existing).expect("seed details");

    let args = fetch_args(dir.path(), &["2558726", "5428343", "9999999"], true);
    let mut pages = HashMap::new();
    pages.insert(
        "http://fake.test/Exibe_Ficha_Estabelecimento.asp?VCo_Unidade=5003205428343".to_string(),
        DETAIL_PAGE.to_string(),
    );
    let source = FakeSource {
        pages,
        calls: Cell::new(0),
    };

    let context = RunContext::start("fetch", dir.path()).expect("start fetch");
    let report = fetch::execute(&context, &args, &source).expect("fetch runs");

    assert_eq!(source.calls.get(), 2);
    assert_eq!(report.counts.targets, 3);
    assert_eq!(report.counts.skipped_existing, 1);
    assert_eq!(report.counts.fetched, 1);
    assert_eq!(report.counts.failed, 1);
    assert_eq!(report.counts.failures[0].unit_id, "9999999");
    assert_eq!(report.warnings.len(), 1);

    let details: UnitDetails = read_json(&layout.details_path()).expect("details json");
    assert_eq!(details.len(), 2);
    assert_eq!(details["2558726"]["street"], "RUA A");
    assert_eq!(details["5428343"]["phone"], "6733334444");
    assert_eq!(details["5428343"]["city"], "CAMPO GRANDE");
}

#[test]
fn fetch_without_only_missing_refetches_everything() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = CacheLayout::new(dir.path());
    let mut existing = UnitDetails::new();
    existing.insert("1111111".to_string(), Default::default());
    write_json_pretty(&layout.details_path(), &existing).expect("seed details");

    let source = FakeSource {
        pages: HashMap::new(),
        calls: Cell::new(0),
    };
    let context = RunContext::start("fetch", dir.path()).expect("start fetch");
    let report = fetch::execute(&context, &fetch_args(dir.path(), &["1111111"], false), &source)
        .expect("fetch runs");

    assert_eq!(source.calls.get(), 1);
    assert_eq!(report.counts.details_total, 0);
    let details: UnitDetails = read_json(&layout.details_path()).expect("details json");
    assert!(details.is_empty());
}

#[test]
fn pending_targets_respects_only_missing() {
    let targets = vec![
        FetchTarget::from_unit_code("5003201111111"),
        FetchTarget::from_unit_code("5003202222222"),
    ];
    let mut existing = UnitDetails::new();
    existing.insert("1111111".to_string(), Default::default());

    assert_eq!(
        fetch::pending_targets(&targets, &existing, true),
        vec![targets[1].clone()]
    );
    assert_eq!(fetch::pending_targets(&targets, &existing, false), targets);
}

#[test]
fn fetch_from_listing_uses_linked_municipality_code() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = CacheLayout::new(dir.path());
    let listing_path = dir.path().join("listing.html");
    write_text(
        &listing_path,
        r#"<a href="Exibe_Ficha_Estabelecimento.asp?VCo_Unidade=5002705428343">UBS</a>"#,
    )
    .expect("seed listing");

    let mut args = fetch_args(dir.path(), &[], false);
    args.listing_html = Some(listing_path);
    let mut pages = HashMap::new();
    pages.insert(
        "http://fake.test/Exibe_Ficha_Estabelecimento.asp?VCo_Unidade=5002705428343".to_string(),
        DETAIL_PAGE.to_string(),
    );
    let source = FakeSource {
        pages,
        calls: Cell::new(0),
    };

    let context = RunContext::start("fetch", dir.path()).expect("start fetch");
    let report = fetch::execute(&context, &args, &source).expect("fetch runs");

    assert_eq!(report.counts.fetched, 1);
    assert_eq!(report.counts.failed, 0);
    let details: UnitDetails = read_json(&layout.details_path()).expect("details json");
    assert_eq!(
        details["5428343"]["detail_url"],
        "http://fake.test/Exibe_Ficha_Estabelecimento.asp?VCo_Unidade=5002705428343"
    );
}

#[test]
fn merge_joins_parsed_units_with_directory_and_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = CacheLayout::new(dir.path());
    run_parse(dir.path());

    let mut details = UnitDetails::new();
    details.insert(
        "5428343".to_string(),
        [
            ("street".to_string(), "RUA B".to_string()),
            ("city".to_string(), "CAMPO GRANDE".to_string()),
            ("state".to_string(), "MS".to_string()),
            ("phone".to_string(), "6733334444".to_string()),
        ]
        .into_iter()
        .collect(),
    );
    write_json_pretty(&layout.details_path(), &details).expect("seed details");
    write_text(
        &layout.directory_path(),
        "name,phone\nUBS Vila Nova e Centro de Especialidades,67 3314-0000\n,3333-0000\n",
    )
    .expect("seed directory");

    let context = RunContext::start("merge", dir.path()).expect("start merge");
    let report = merge::execute(&context, &merge_args(dir.path())).expect("merge runs");

    assert_eq!(report.counts.units, 2);
    assert_eq!(report.counts.directory.source_rows, 2);
    assert_eq!(report.counts.directory.skipped_rows, 1);
    assert_eq!(report.counts.directory.multi_name_rows, 1);
    assert_eq!(report.counts.directory.entries, 2);
    assert_eq!(report.counts.completeness.matched, 2);
    assert_eq!(report.counts.completeness.missing_address, 1);
    assert_eq!(report.counts.db_units, Some(2));
    assert_eq!(report.counts.db_professionals, Some(3));
    assert!(report.warnings.is_empty());

    let records: Vec<FinalUnitRecord> =
        read_csv_records(&layout.final_units_path()).expect("final csv");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].unit_id, "2558726");
    assert_eq!(records[0].phone, "67 3314-0000");
    assert_eq!(records[0].matched_directory_name, "UBS Vila Nova");
    assert_eq!(records[0].professional_count, 2);
    assert_eq!(records[1].address, "RUA B, CAMPO GRANDE - MS");
    assert_eq!(records[1].listed_phone, "6733334444");
    assert_eq!(records[1].matched_directory_name, "Centro de Especialidades");
    assert_eq!(records[1].professional_count, 1);
}

#[test]
fn merge_reads_free_text_directory_and_warns_on_missing_inputs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = CacheLayout::new(dir.path());
    crate::util::write_csv_records(
        &layout.units_path(),
        &[UnitHeader {
            unit_id: "1".to_string(),
            unit_name: "Posto Central".to_string(),
        }],
    )
    .expect("seed units");
    let directory_path = dir.path().join("phones.txt");
    write_text(&directory_path, "Posto Central / Posto Norte, 3000-1000\nsem telefone\n")
        .expect("seed directory");

    let mut args = merge_args(dir.path());
    args.directory_path = Some(directory_path);
    args.skip_db = true;
    let context = RunContext::start("merge", dir.path()).expect("start merge");
    let report = merge::execute(&context, &args).expect("merge runs");

    assert_eq!(report.counts.directory.entries, 2);
    assert_eq!(report.counts.directory.skipped_rows, 1);
    assert_eq!(report.counts.completeness.matched, 1);
    assert_eq!(report.counts.db_units, None);
    assert_eq!(report.warnings.len(), 2);
    assert!(!layout.db_path().exists());
}

#[test]
fn merge_reads_csv_directory_columns_by_position() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = CacheLayout::new(dir.path());
    crate::util::write_csv_records(
        &layout.units_path(),
        &[UnitHeader {
            unit_id: "1".to_string(),
            unit_name: "UBS Vila Nova".to_string(),
        }],
    )
    .expect("seed units");
    let directory_path = dir.path().join("telefones.csv");
    write_text(
        &directory_path,
        "unidade,telefone,observacao\nUBS Vila Nova,67 99999-0000,\nPosto Norte\n",
    )
    .expect("seed directory");

    let mut args = merge_args(dir.path());
    args.directory_path = Some(directory_path);
    args.skip_db = true;
    let context = RunContext::start("merge", dir.path()).expect("start merge");
    let report = merge::execute(&context, &args).expect("merge runs");

    assert_eq!(report.counts.directory.source_rows, 2);
    assert_eq!(report.counts.directory.entries, 1);
    assert_eq!(report.counts.directory.skipped_rows, 1);
    assert_eq!(report.counts.completeness.matched, 1);
    assert_eq!(report.counts.completeness.with_phone, 1);

    let records: Vec<FinalUnitRecord> =
        read_csv_records(&layout.final_units_path()).expect("final csv");
    assert_eq!(records[0].phone, "67 99999-0000");
    assert_eq!(records[0].matched_directory_name, "UBS Vila Nova");
}

#[test]
fn merge_requires_units() {
    let dir = tempfile::tempdir().expect("tempdir");
    let context = RunContext::start("merge", dir.path()).expect("start merge");

    assert!(merge::execute(&context, &merge_args(dir.path())).is_err());
}
