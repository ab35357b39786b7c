//! Search command - rank indexed functions by similarity to one function

use anyhow::{bail, Context, Result};
use std::path::Path;

use codesim::config::Config;
use codesim::core::CodeUnit;
use codesim::embeddings::create_provider;
use codesim::search::{SimilarityResult, SimilaritySearch};

use super::ui::{self, colors, symbols};

pub async fn run(config: Config, file: &str, symbol: &str, limit: usize) -> Result<()> {
    let root = super::project_root(None)?;
    let search = SimilaritySearch::new(super::load_index(&root, &config)?);
    let relative = super::relative_to_root(&root, file)?;

    let (unit, results) = match search.index().find_symbol(&relative, symbol) {
        Some(entry) => {
            let ranked = search
                .search(&entry.vector, limit.saturating_add(1))
                .context("Search failed")?;
            (entry.unit.clone(), without(ranked, &entry.unit.id, limit))
        }
        None => {
            // Not indexed yet: embed the current source on the fly
            let extraction = super::extract(&root, &relative, &config)?;
            let Some((unit, text)) = extraction
                .units_with_text()
                .find(|(unit, _)| unit.symbol_name == symbol)
                .map(|(unit, text)| (unit.clone(), text))
            else {
                bail!("No function named `{}` in {}", symbol, relative);
            };

            let provider = create_provider(&config.embeddings)
                .context("No embedding provider available")?;
            let ranked = search
                .search_text(provider.as_ref(), &text, limit.saturating_add(1))
                .await
                .context("Search failed")?;
            (unit.clone(), without(ranked, &unit.id, limit))
        }
    };

    print_header(&unit, search.index().len());

    if results.is_empty() {
        ui::print_warning("No other functions in the index");
        return Ok(());
    }

    print_results(&root, &results);
    Ok(())
}

fn without(ranked: Vec<SimilarityResult>, id: &str, limit: usize) -> Vec<SimilarityResult> {
    ranked
        .into_iter()
        .filter(|r| r.unit.id != id)
        .take(limit)
        .collect()
}

fn print_header(unit: &CodeUnit, indexed: usize) {
    println!();
    ui::box_top(colors::PRIMARY, symbols::SEARCH, "Similar Functions");
    ui::box_blank(colors::PRIMARY);
    ui::box_row(colors::PRIMARY, "Function:", &unit.symbol_name, colors::HIGHLIGHT);
    ui::box_row(
        colors::PRIMARY,
        "Location:",
        &format!("{}:{}", unit.file_path, unit.start_line),
        colors::FG,
    );
    ui::box_row(colors::PRIMARY, "Indexed Units:", &indexed.to_string(), colors::MUTED);
    ui::box_blank(colors::PRIMARY);
    ui::box_bottom(colors::PRIMARY);
    println!();
}

fn print_results(root: &Path, results: &[SimilarityResult]) {
    for (i, result) in results.iter().enumerate() {
        let level = result.level();
        let color = ui::level_color(level);
        println!(
            "  {}{:>2}.{} {}{} {}{}{}  {}{:.3}{} {}({}){}",
            colors::MUTED,
            i + 1,
            colors::RESET,
            colors::ACCENT,
            symbols::FUNCTION,
            colors::BOLD,
            result.unit.symbol_name,
            colors::RESET,
            color,
            result.score,
            colors::RESET,
            colors::MUTED,
            level,
            colors::RESET
        );
        println!(
            "      {}{} {}:{}-{}{}",
            colors::MUTED,
            symbols::FILE,
            ui::truncate_path(&root.join(&result.unit.file_path), 50),
            result.unit.start_line,
            result.unit.end_line,
            colors::RESET
        );
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use codesim::core::Language;

    fn result(symbol: &str, score: f32) -> SimilarityResult {
        SimilarityResult {
            unit: CodeUnit::new("a.rs", symbol, 1, 2, Language::Rust, 1, 0),
            score,
        }
    }

    #[test]
    fn test_without_drops_self_and_limits() {
        let me = result("me", 1.0);
        let id = me.unit.id.clone();
        let ranked = vec![me, result("b", 0.9), result("c", 0.8)];

        let kept = without(ranked, &id, 1);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].unit.symbol_name, "b");
    }
}
