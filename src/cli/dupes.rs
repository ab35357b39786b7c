//! Dupes command - flag functions that look like copies of indexed code
//!
//! Findings are advisory; the command succeeds whether or not it finds any.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use codesim::config::Config;
use codesim::core::CodeUnit;
use codesim::embeddings::{create_provider, EmbeddingProvider};
use codesim::search::{DuplicateClassifier, DuplicateMatch, SimilaritySearch};

use super::ui::{self, colors, symbols};

struct Finding {
    unit: CodeUnit,
    matches: Vec<DuplicateMatch>,
}

pub async fn run(config: Config, files: &[String], threshold: Option<f32>) -> Result<()> {
    let root = super::project_root(None)?;
    let search = SimilaritySearch::new(super::load_index(&root, &config)?);
    let threshold = threshold.unwrap_or(config.duplicates.threshold as f32);
    let classifier = DuplicateClassifier::with_threshold(&search, threshold)
        .context("Invalid duplicate threshold")?;

    let mut provider: Option<Arc<dyn EmbeddingProvider>> = None;
    let mut provider_failed = false;
    let mut findings = Vec::new();
    let mut checked = 0usize;

    for file in files {
        let extraction = match super::relative_to_root(&root, file)
            .and_then(|relative| super::extract(&root, &relative, &config))
        {
            Ok(extraction) => extraction,
            Err(e) => {
                ui::print_warning(&format!("Skipping {}: {:#}", file, e));
                continue;
            }
        };

        for (unit, text) in extraction.units_with_text() {
            checked += 1;

            let result = if search.index().get(&unit.id).is_some() {
                classifier.detect_duplicates(unit)
            } else {
                if provider.is_none() && !provider_failed {
                    match create_provider(&config.embeddings) {
                        Ok(p) => provider = Some(p),
                        Err(e) => {
                            warn!("Cannot embed unindexed functions: {}", e);
                            provider_failed = true;
                        }
                    }
                }
                let Some(provider) = provider.as_ref() else {
                    debug!("Skipping unindexed {}", unit.id);
                    continue;
                };
                classifier
                    .detect_duplicates_for_text(provider.as_ref(), unit, &text)
                    .await
            };

            match result {
                Ok(matches) if !matches.is_empty() => findings.push(Finding {
                    unit: unit.clone(),
                    matches,
                }),
                Ok(_) => {}
                Err(e) => warn!("Could not check {}::{}: {}", unit.file_path, unit.symbol_name, e),
            }
        }
    }

    print_report(&root, &findings, checked, threshold);
    Ok(())
}

fn print_report(root: &Path, findings: &[Finding], checked: usize, threshold: f32) {
    println!();
    if findings.is_empty() {
        println!(
            "{}  {} No duplicates above {:.2} among {} functions{}",
            colors::SUCCESS,
            symbols::SUCCESS,
            threshold,
            checked,
            colors::RESET
        );
        println!();
        return;
    }

    let title = format!("{} Possible Duplicates", findings.len());
    ui::box_top(colors::WARNING, symbols::WARNING, &title);
    ui::box_blank(colors::WARNING);
    ui::box_row(colors::WARNING, "Functions Checked:", &checked.to_string(), colors::FG);
    ui::box_row(colors::WARNING, "Threshold:", &format!("{:.2}", threshold), colors::FG);
    ui::box_blank(colors::WARNING);
    ui::box_bottom(colors::WARNING);
    println!();

    for finding in findings {
        println!(
            "  {}{} {}{}{} {}{}:{}{}",
            colors::ACCENT,
            symbols::FUNCTION,
            colors::BOLD,
            finding.unit.symbol_name,
            colors::RESET,
            colors::MUTED,
            finding.unit.file_path,
            finding.unit.start_line,
            colors::RESET
        );
        for m in &finding.matches {
            println!(
                "      {}{} {:.3} {:<17}{} {}{}:{} {}{}",
                ui::level_color(m.level),
                symbols::MATCH,
                m.score,
                m.level.label(),
                colors::RESET,
                colors::FG,
                ui::truncate_path(&root.join(&m.unit.file_path), 40),
                m.unit.start_line,
                m.unit.symbol_name,
                colors::RESET
            );
        }
        println!();
    }
}
