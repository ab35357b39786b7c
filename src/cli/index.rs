//! Index command - build or update the similarity index

use anyhow::{bail, Context, Result};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use codesim::config::Config;
use codesim::embeddings::create_provider;
use codesim::index::{
    self, BuildEvent, BuildOptions, BuildReport, BuildState, CancelToken, IndexBuilder,
};
use codesim::vcs;

use super::ui::{self, colors, symbols};

pub struct IndexArgs<'a> {
    pub path: Option<&'a str>,
    pub force: bool,
    pub changed: &'a [String],
    pub since: Option<&'a str>,
    pub clear: bool,
}

pub async fn run(config: Config, args: IndexArgs<'_>) -> Result<()> {
    let root = super::project_root(args.path)?;

    if args.clear {
        if index::clear(&root, &config.index.directory)
            .with_context(|| format!("Failed to remove index under {}", root.display()))?
        {
            println!(
                "{}  {} Index cleared{}",
                colors::SUCCESS,
                symbols::SUCCESS,
                colors::RESET
            );
        } else {
            ui::print_warning("No index to clear");
        }
        return Ok(());
    }

    let changed = changed_files(&root, args.changed, args.since)?;
    let provider = create_provider(&config.embeddings).context("No embedding provider available")?;

    print_header(&root, &provider.describe(), changed.as_ref().map(Vec::len));

    let mut options = BuildOptions::from_config(&root, &config.index).with_force(args.force);
    if let Some(changed) = changed {
        options = options.with_changed_files(changed);
    }

    let cancel = match config.index.build_timeout_secs {
        Some(secs) => CancelToken::with_timeout(Duration::from_secs(secs)),
        None => CancelToken::new(),
    };
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; finishing in-flight embeddings");
            interrupt.cancel();
        }
    });

    let pb = ui::progress_bar(0, "Scanning");
    let observer = pb.clone();
    let builder = IndexBuilder::new(provider, options).with_observer(move |event| match event {
        BuildEvent::State(state) => observer.set_prefix(capitalize(state.label())),
        BuildEvent::FilesFound(n) => observer.set_message(format!("{} files", n)),
        BuildEvent::EmbeddingStarted(n) => {
            observer.set_length(n as u64);
            observer.set_position(0);
        }
        BuildEvent::UnitEmbedded => observer.inc(1),
    });

    let outcome = builder.build(&cancel).await;
    pb.finish_and_clear();

    let outcome = outcome.context("Failed to write index")?;
    print_summary(&outcome.report, &outcome.index_path, config.verbose);

    if outcome.report.state == BuildState::Failed {
        bail!("Index build failed: no embedding backend could embed any unit");
    }

    info!("Index written to {}", outcome.index_path.display());
    Ok(())
}

/// Union of explicit paths and paths changed since `since`; `None` means full build.
fn changed_files(root: &Path, explicit: &[String], since: Option<&str>) -> Result<Option<Vec<String>>> {
    if explicit.is_empty() && since.is_none() {
        return Ok(None);
    }

    let mut changed: BTreeSet<String> = BTreeSet::new();
    for path in explicit {
        let relative = match super::relative_to_root(root, path) {
            Ok(relative) => relative,
            // Deleted files cannot be canonicalized; take them as given
            Err(_) => index::scan::normalize(Path::new(path)),
        };
        changed.insert(relative);
    }
    if let Some(rev) = since {
        let from_git = vcs::changed_files_since(root, rev)
            .with_context(|| format!("Failed to diff against {}", rev))?;
        changed.extend(from_git);
    }

    Ok(Some(changed.into_iter().collect()))
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Print the indexing header
fn print_header(root: &Path, provider: &str, changed: Option<usize>) {
    let mode = match changed {
        Some(n) => format!("Incremental ({} changed files)", n),
        None => "Full build".to_string(),
    };

    println!();
    ui::box_top(colors::PRIMARY, symbols::LOADING, "codesim");
    ui::box_blank(colors::PRIMARY);
    ui::box_row(colors::PRIMARY, "Target:", &ui::truncate_path(root, 40), colors::FG);
    ui::box_row(colors::PRIMARY, "Mode:", &mode, colors::MUTED);
    ui::box_row(colors::PRIMARY, "Embeddings:", provider, colors::MUTED);
    ui::box_blank(colors::PRIMARY);
    ui::box_bottom(colors::PRIMARY);
    println!();
}

/// Print the indexing summary
fn print_summary(report: &BuildReport, index_path: &Path, verbose: bool) {
    let (icon, color, title) = match report.state {
        BuildState::Failed => (symbols::ERROR, colors::ERROR, "Indexing Failed"),
        BuildState::PersistedPartial => (symbols::WARNING, colors::WARNING, "Indexing Completed with Warnings"),
        _ if !report.extraction_errors.is_empty() => {
            (symbols::WARNING, colors::WARNING, "Indexing Completed with Warnings")
        }
        _ => (symbols::SUCCESS, colors::SUCCESS, "Indexing Successful"),
    };

    println!();
    ui::box_top(color, icon, title);
    ui::box_blank(color);
    ui::box_row(color, "Files Extracted:", &format!("{:>6}", report.files_extracted), colors::FG);
    ui::box_row(color, "Code Lines:", &format!("{:>6}", report.line_metrics.code_lines), colors::FG);
    ui::box_row(color, "Units Found:", &format!("{:>6}", report.units_extracted), colors::ACCENT);
    ui::box_row(color, "Units Embedded:", &format!("{:>6}", report.units_embedded), colors::FG);
    if !report.full_rebuild {
        ui::box_row(color, "Units Reused:", &format!("{:>6}", report.units_reused), colors::FG);
    }
    if !report.provider_name.is_empty() {
        ui::box_row(
            color,
            "Provider:",
            &format!("{} ({} dims)", report.provider_name, report.dimension),
            colors::MUTED,
        );
    }
    ui::box_row(
        color,
        "Time Elapsed:",
        &format!("{:.2}s", report.duration.as_secs_f64()),
        colors::FG,
    );

    if !report.extraction_errors.is_empty() || !report.embedding_errors.is_empty() || report.units_cancelled > 0 {
        ui::box_blank(color);
    }
    if !report.extraction_errors.is_empty() {
        ui::box_row(
            color,
            "Skipped Files:",
            &report.extraction_errors.len().to_string(),
            colors::ERROR,
        );
    }
    if !report.embedding_errors.is_empty() {
        ui::box_row(
            color,
            "Failed Units:",
            &report.embedding_errors.len().to_string(),
            colors::ERROR,
        );
    }
    if report.units_cancelled > 0 {
        ui::box_row(
            color,
            "Cancelled Units:",
            &report.units_cancelled.to_string(),
            colors::WARNING,
        );
    }

    ui::box_blank(color);
    if report.state == BuildState::Failed {
        ui::box_line(color, "Previous index left untouched.", colors::MUTED);
    } else {
        ui::box_line(
            color,
            &format!("Saved to {}", ui::truncate_path(index_path, 48)),
            colors::MUTED,
        );
    }
    ui::box_bottom(color);
    println!();

    if verbose {
        for err in &report.extraction_errors {
            println!("{}  {} {}{}", colors::MUTED, symbols::FILE, err, colors::RESET);
        }
        for err in &report.embedding_errors {
            println!("{}  {} {}{}", colors::MUTED, symbols::FUNCTION, err, colors::RESET);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("embedding"), "Embedding");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_no_changes_means_full_build() {
        let temp = TempDir::new().unwrap();
        assert!(changed_files(temp.path(), &[], None).unwrap().is_none());
    }
}
