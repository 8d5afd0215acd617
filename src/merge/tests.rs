use super::*;
use crate::matching::{DirectoryEntry, MatchConfig};

fn fields(pairs: &[(&str, &str)]) -> UnitDetailFields {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

fn unit(unit_id: &str, unit_name: &str) -> UnitHeader {
    UnitHeader {
        unit_id: unit_id.to_string(),
        unit_name: unit_name.to_string(),
    }
}

fn professional(unit_id: &str, person_id: &str) -> ProfessionalRecord {
    ProfessionalRecord {
        unit_id: unit_id.to_string(),
        unit_name: String::new(),
        person_id: person_id.to_string(),
        secondary_id: "1".to_string(),
        full_name: "NOME".to_string(),
        role_code: "22345".to_string(),
        role_text: "MEDICO".to_string(),
    }
}

#[test]
fn assemble_address_orders_present_parts() {
    let full = fields(&[
        ("street", "RUA DAS FLORES"),
        ("number", "120"),
        ("complement", "SALA 2"),
        ("neighborhood", "CENTRO"),
        ("postal_code", "79000000"),
        ("city", "CAMPO GRANDE"),
        ("state", "MS"),
        ("phone", "(67) 3314-0000"),
    ]);

    assert_eq!(
        assemble_address(&full),
        "RUA DAS FLORES, 120, SALA 2, CENTRO, CEP 79000000, CAMPO GRANDE - MS"
    );
}

#[test]
fn assemble_address_skips_blank_parts_and_missing_state() {
    let partial = fields(&[
        ("street", "AV BRASIL"),
        ("number", "  "),
        ("neighborhood", "VILA NOVA"),
        ("city", "DOURADOS"),
    ]);

    assert_eq!(assemble_address(&partial), "AV BRASIL, VILA NOVA, DOURADOS");
    assert_eq!(assemble_address(&UnitDetailFields::new()), "");
    assert_eq!(
        assemble_address(&fields(&[("state", "MS"), ("postal_code", "79000000")])),
        "CEP 79000000"
    );
}

#[test]
fn merge_units_joins_details_directory_and_counts() {
    let units = vec![
        unit("2558726", "UBS Vila Nova"),
        unit("5428343", "Centro de Especialidades"),
    ];
    let mut details = UnitDetails::new();
    details.insert(
        "2558726".to_string(),
        fields(&[
            ("street", "RUA A"),
            ("city", "CAMPO GRANDE"),
            ("state", "MS"),
            ("phone", "6733330000"),
            ("detail_url", "http://example.test/ficha?id=2558726"),
        ]),
    );
    let directory = vec![DirectoryEntry::new("UBS Vila Nova", "67 99999-0000", 2)];
    let matcher = FuzzyMatcher::new(&directory, MatchConfig::default());
    let professionals = vec![
        professional("2558726", "11111111111"),
        professional("2558726", "22222222222"),
    ];

    let (records, report) = merge_units(&units, &details, &matcher, &professionals);

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].address, "RUA A, CAMPO GRANDE - MS");
    assert_eq!(records[0].listed_phone, "6733330000");
    assert_eq!(records[0].phone, "67 99999-0000");
    assert_eq!(records[0].matched_directory_name, "UBS Vila Nova");
    assert!(records[0].match_score.is_some());
    assert_eq!(records[0].detail_url, "http://example.test/ficha?id=2558726");
    assert_eq!(records[0].professional_count, 2);

    assert_eq!(records[1].address, "");
    assert_eq!(records[1].phone, "");
    assert_eq!(records[1].match_score, None);
    assert_eq!(records[1].professional_count, 0);

    assert_eq!(report.total, 2);
    assert_eq!(report.missing_address, 1);
    assert_eq!(report.missing_name, 0);
    assert_eq!(report.with_phone, 1);
    assert_eq!(report.with_listed_phone, 1);
    assert_eq!(report.matched, 1);
    assert!(report.duplicate_unit_ids.is_empty());
}

#[test]
fn completeness_flags_duplicate_unit_ids_once() {
    let directory = Vec::<DirectoryEntry>::new();
    let matcher = FuzzyMatcher::new(&directory, MatchConfig::default());
    let details = UnitDetails::new();
    let units = vec![unit("1", "A"), unit("1", "A"), unit("1", ""), unit("2", "B")];

    let (_, report) = merge_units(&units, &details, &matcher, &[]);

    assert_eq!(report.duplicate_unit_ids, vec!["1"]);
    assert_eq!(report.missing_name, 1);
    assert_eq!(report.with_phone, 0);
}
