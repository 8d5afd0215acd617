use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;

use super::classify::{LineClass, LineClassifier};
use crate::model::UnitHeader;

/// Content lines collected under one unit header, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitBlock {
    pub header: UnitHeader,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SegmentStats {
    pub lines_total: usize,
    pub header_lines: usize,
    pub noise_lines: usize,
    pub content_lines: usize,
    pub orphan_content_lines: usize,
    pub candidate_records: usize,
    pub dangling_fragments: usize,
}

/// Trailing role code (5-6 digits), a dash, and the role text up to end of input.
#[derive(Debug, Clone)]
pub struct RecordSentinel {
    pattern: Regex,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentinelMatch {
    pub start: usize,
    pub role_code: String,
    pub role_text: String,
}

impl RecordSentinel {
    pub fn new() -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(r"(\d{5,6})\s*-\s*(.+)$")
                .context("failed to compile record sentinel regex")?,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    pub fn find(&self, text: &str) -> Option<SentinelMatch> {
        let captures = self.pattern.captures(text)?;
        let code = captures.get(1)?;
        let role_text = captures.get(2)?;

        Some(SentinelMatch {
            start: code.start(),
            role_code: code.as_str().to_string(),
            role_text: role_text.as_str().trim().to_string(),
        })
    }
}

#[derive(Debug, Default)]
struct SegmentState {
    closed: Vec<UnitBlock>,
    open: Option<UnitBlock>,
    stats: SegmentStats,
}

fn segment_step(mut state: SegmentState, class: LineClass) -> SegmentState {
    state.stats.lines_total += 1;

    match class {
        LineClass::Header(header) => {
            state.stats.header_lines += 1;
            if let Some(block) = state.open.take() {
                state.closed.push(block);
            }
            state.open = Some(UnitBlock {
                header,
                lines: Vec::new(),
            });
        }
        LineClass::Noise => state.stats.noise_lines += 1,
        LineClass::Content(line) => {
            state.stats.content_lines += 1;
            match state.open.as_mut() {
                Some(block) => block.lines.push(line),
                None => state.stats.orphan_content_lines += 1,
            }
        }
    }

    state
}

/// Groups classified lines into one block per unit header. Content seen before
/// the first header has no unit and is only counted.
pub fn segment_units<'a, I>(
    classifier: &LineClassifier,
    lines: I,
) -> (Vec<UnitBlock>, SegmentStats)
where
    I: IntoIterator<Item = &'a str>,
{
    let mut state = lines
        .into_iter()
        .map(|line| classifier.classify(line))
        .fold(SegmentState::default(), segment_step);

    if let Some(block) = state.open.take() {
        state.closed.push(block);
    }

    (state.closed, state.stats)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssembledRecords {
    pub candidates: Vec<String>,
    pub dangling: Option<String>,
}

#[derive(Debug, Default)]
struct AssemblyState {
    acc: String,
    candidates: Vec<String>,
}

/// Joins wrapped lines with single spaces until the accumulated text ends in
/// a role sentinel. A tail that never reaches a sentinel is returned as
/// `dangling` and is not a record.
pub fn assemble_candidates(sentinel: &RecordSentinel, lines: &[String]) -> AssembledRecords {
    let state = lines
        .iter()
        .fold(AssemblyState::default(), |mut state, line| {
            if !state.acc.is_empty() {
                state.acc.push(' ');
            }
            state.acc.push_str(line);

            if sentinel.is_match(&state.acc) {
                state.candidates.push(std::mem::take(&mut state.acc));
            }
            state
        });

    AssembledRecords {
        candidates: state.candidates,
        dangling: if state.acc.is_empty() {
            None
        } else {
            Some(state.acc)
        },
    }
}
