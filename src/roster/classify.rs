use anyhow::{Context, Result};
use regex::Regex;

use crate::model::UnitHeader;

const BOILERPLATE_PREFIXES: [&str; 5] = [
    "Total de Profissionais",
    "MS / SAS",
    "DATASUS",
    "---- PAGE",
    "[NO TEXT]",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineClass {
    Header(UnitHeader),
    Noise,
    Content(String),
}

#[derive(Debug, Clone)]
pub struct LineClassifier {
    unit_header: Regex,
}

impl LineClassifier {
    pub fn new() -> Result<Self> {
        Ok(Self {
            unit_header: Regex::new(r"^CNES\s*:\s*(\d+)\s*-\s*(.+)$")
                .context("failed to compile unit header regex")?,
        })
    }

    pub fn classify(&self, raw_line: &str) -> LineClass {
        let line = raw_line.trim_end();

        if let Some(captures) = self.unit_header.captures(line) {
            let unit_id = captures.get(1).map(|m| m.as_str().trim()).unwrap_or("");
            let unit_name = captures.get(2).map(|m| m.as_str().trim()).unwrap_or("");
            return LineClass::Header(UnitHeader {
                unit_id: unit_id.to_string(),
                unit_name: unit_name.to_string(),
            });
        }

        if line.trim().is_empty() || is_boilerplate(line) {
            return LineClass::Noise;
        }

        LineClass::Content(line.to_string())
    }
}

fn is_boilerplate(line: &str) -> bool {
    let line = line.trim_start();
    BOILERPLATE_PREFIXES
        .iter()
        .any(|prefix| line.starts_with(prefix))
}
