use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::info;

use crate::cli::ExtractArgs;
use crate::commands::{RunContext, RunReport};
use crate::util::{source_hash, write_text};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractCounts {
    pub page_count: usize,
    pub empty_page_count: usize,
    pub line_count: usize,
}

pub fn run(args: ExtractArgs) -> Result<()> {
    RunContext::drive("extract", &args.cache_root, |context| execute(context, &args))
}

fn execute(context: &RunContext, args: &ExtractArgs) -> Result<RunReport<ExtractCounts>> {
    let output_path = args
        .output_path
        .clone()
        .unwrap_or_else(|| context.layout.roster_text_path());

    info!(pdf = %args.pdf_path.display(), "extracting roster text");

    let pages = extract_pages_with_pdftotext(&args.pdf_path, args.max_pages)?;
    let (text, counts) = render_pages(&pages);
    write_text(&output_path, &text)?;

    info!(
        path = %output_path.display(),
        pages = counts.page_count,
        empty_pages = counts.empty_page_count,
        "wrote roster text"
    );

    let mut report = RunReport::new(counts);
    report.path("pdf_path", &args.pdf_path);
    report.path("output_path", &output_path);
    report.source_hashes.push(source_hash(&args.pdf_path)?);
    if report.counts.empty_page_count > 0 {
        let warning = format!(
            "{} of {} pages had no text layer",
            report.counts.empty_page_count, report.counts.page_count
        );
        report.warn(warning);
    }

    Ok(report)
}

/// Page-broken text stream: a `---- PAGE n ----` marker before every page and
/// `[NO TEXT]` in place of an empty one.
pub fn render_pages(pages: &[String]) -> (String, ExtractCounts) {
    let mut counts = ExtractCounts {
        page_count: pages.len(),
        ..ExtractCounts::default()
    };
    let mut text = String::new();

    for (index, page) in pages.iter().enumerate() {
        text.push_str(&format!("---- PAGE {} ----\n", index + 1));
        let body = page.trim_end();
        if body.trim().is_empty() {
            counts.empty_page_count += 1;
            text.push_str("[NO TEXT]\n");
        } else {
            text.push_str(body);
            text.push('\n');
        }
    }

    counts.line_count = text.lines().count();
    (text, counts)
}

fn extract_pages_with_pdftotext(pdf_path: &Path, max_pages: Option<usize>) -> Result<Vec<String>> {
    let mut command = Command::new("pdftotext");
    command.arg("-enc").arg("UTF-8").arg("-f").arg("1");
    if let Some(max_pages) = max_pages {
        command.arg("-l").arg(max_pages.to_string());
    }
    command.arg(pdf_path).arg("-");

    let output = command
        .output()
        .with_context(|| format!("failed to execute pdftotext for {}", pdf_path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "pdftotext returned non-zero exit status for {}: {}",
            pdf_path.display(),
            stderr.trim()
        );
    }

    let raw = String::from_utf8_lossy(&output.stdout);
    let mut pages: Vec<String> = raw
        .split('\u{000C}')
        .map(|chunk| chunk.replace('\u{0000}', ""))
        .collect();

    // pdftotext terminates every page with a form feed
    if pages.last().is_some_and(|page| page.is_empty()) {
        pages.pop();
    }

    Ok(pages)
}
