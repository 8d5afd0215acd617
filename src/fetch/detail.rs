use anyhow::{Result, anyhow};
use scraper::{ElementRef, Html, Selector};

use crate::model::UnitDetailFields;

const FALLBACK_LABELS: [(&str, &str); 7] = [
    ("Bairro", "neighborhood"),
    ("CEP", "postal_code"),
    ("Município", "city"),
    ("UF", "state"),
    ("Telefone", "phone"),
    ("Número", "number"),
    ("Complemento", "complement"),
];

/// Reads the facility sheet layout, where a `<b>Label:</b>` row is followed by
/// a row holding the values in `<td>` cells.
#[derive(Debug, Clone)]
pub struct DetailPageParser {
    label: Selector,
    cell: Selector,
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|error| anyhow!("invalid CSS selector '{selector}': {error}"))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<&str>>().join(" ")
}

fn set_field(fields: &mut UnitDetailFields, key: &str, value: Option<&String>) {
    if let Some(value) = value.map(|value| value.trim()).filter(|value| !value.is_empty()) {
        fields.insert(key.to_string(), value.to_string());
    }
}

impl DetailPageParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            label: parse_selector("b")?,
            cell: parse_selector("td")?,
        })
    }

    pub fn values_after_label(&self, document: &Html, label: &str) -> Vec<String> {
        let wanted = label.to_lowercase();

        for bold in document.select(&self.label) {
            let text = collapse_whitespace(&bold.text().collect::<String>());
            if text.trim_end_matches(':').trim().to_lowercase() != wanted {
                continue;
            }

            let Some(row) = bold
                .ancestors()
                .filter_map(ElementRef::wrap)
                .find(|element| element.value().name() == "tr")
            else {
                continue;
            };

            let Some(value_row) = row
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .find(|element| element.value().name() == "tr")
            else {
                continue;
            };

            return value_row
                .select(&self.cell)
                .map(|cell| collapse_whitespace(&cell.text().collect::<String>()))
                .collect();
        }

        Vec::new()
    }

    pub fn parse(&self, html: &str) -> UnitDetailFields {
        let document = Html::parse_document(html);
        let mut fields = UnitDetailFields::new();

        let street_row = self.values_after_label(&document, "Logradouro");
        set_field(&mut fields, "street", street_row.first());
        set_field(&mut fields, "number", street_row.get(1));
        if street_row.len() >= 3 {
            set_field(&mut fields, "phone", street_row.last());
        }

        let locality_row = self.values_after_label(&document, "Complemento");
        set_field(&mut fields, "complement", locality_row.first());
        set_field(&mut fields, "neighborhood", locality_row.get(1));
        set_field(&mut fields, "postal_code", locality_row.get(2));
        set_field(&mut fields, "city", locality_row.get(3));
        set_field(&mut fields, "state", locality_row.get(4));

        for (label, key) in FALLBACK_LABELS {
            if fields.contains_key(key) {
                continue;
            }
            let values = self.values_after_label(&document, label);
            set_field(&mut fields, key, values.first());
        }

        fields
    }
}
