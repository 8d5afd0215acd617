use std::collections::BTreeSet;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;

use super::normalize::{name_tokens, normalize_name};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    pub raw_name: String,
    pub normalized_name: String,
    pub tokens: BTreeSet<String>,
    pub phone: String,
}

impl DirectoryEntry {
    pub fn new(raw_name: &str, phone: &str, min_token_len: usize) -> Self {
        let normalized_name = normalize_name(raw_name);
        let tokens = name_tokens(&normalized_name, min_token_len);

        Self {
            raw_name: raw_name.to_string(),
            normalized_name,
            tokens,
            phone: phone.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirectoryStats {
    pub source_rows: usize,
    pub skipped_rows: usize,
    pub multi_name_rows: usize,
    pub entries: usize,
}

/// Splits a listing such as `UBS Centro e UBS Norte / PSF Sul` into names.
#[derive(Debug, Clone)]
pub struct ListingSplitter {
    separators: Regex,
}

impl ListingSplitter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            separators: Regex::new(r"(?i)\s+e\s+|\s*,\s*|/|\s+and\s+")
                .context("failed to compile directory listing separator regex")?,
        })
    }

    pub fn split_names(&self, listing: &str) -> Vec<String> {
        self.separators
            .split(listing)
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(ToOwned::to_owned)
            .collect()
    }

    /// One entry per listed name, every entry carrying the row's phone. Rows
    /// lacking a name or a phone produce nothing.
    pub fn expand(&self, name: &str, phone: &str, min_token_len: usize) -> Vec<DirectoryEntry> {
        let name = name.trim();
        let phone = phone.trim();
        if name.is_empty() || phone.is_empty() {
            return Vec::new();
        }

        let parts = self.split_names(name);
        if parts.len() > 1 {
            parts
                .iter()
                .map(|part| DirectoryEntry::new(part, phone, min_token_len))
                .collect()
        } else {
            vec![DirectoryEntry::new(name, phone, min_token_len)]
        }
    }

    /// Free-text `<names>, <phone>` line; the phone follows the last comma.
    pub fn parse_line(&self, line: &str, min_token_len: usize) -> Vec<DirectoryEntry> {
        match line.rsplit_once(',') {
            Some((names, phone)) => self.expand(names, phone, min_token_len),
            None => Vec::new(),
        }
    }

    pub fn expand_rows<I>(
        &self,
        rows: I,
        min_token_len: usize,
    ) -> (Vec<DirectoryEntry>, DirectoryStats)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut stats = DirectoryStats::default();
        let mut entries = Vec::new();

        for (name, phone) in rows {
            stats.source_rows += 1;
            let expanded = self.expand(&name, &phone, min_token_len);
            match expanded.len() {
                0 => stats.skipped_rows += 1,
                1 => {}
                _ => stats.multi_name_rows += 1,
            }
            entries.extend(expanded);
        }

        stats.entries = entries.len();
        (entries, stats)
    }
}
