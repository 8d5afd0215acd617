use std::collections::HashSet;

use anyhow::{Context, Result};
use regex::Regex;

#[derive(Debug, Clone)]
pub struct ListingHarvester {
    detail_anchor: Regex,
}

impl ListingHarvester {
    pub fn new() -> Result<Self> {
        Ok(Self {
            detail_anchor: Regex::new(r"Exibe_Ficha_Estabelecimento\.asp\?VCo_Unidade=([0-9]+)")
                .context("failed to compile listing anchor regex")?,
        })
    }

    /// `VCo_Unidade` values linked from a saved listing page, first
    /// occurrence order, unmodified.
    pub fn unit_codes(&self, html: &str) -> Vec<String> {
        let mut seen = HashSet::<&str>::new();

        self.detail_anchor
            .captures_iter(html)
            .filter_map(|captures| captures.get(1).map(|m| m.as_str()))
            .filter(|value| seen.insert(*value))
            .map(ToOwned::to_owned)
            .collect()
    }
}
