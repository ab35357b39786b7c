//! Terminal styling shared by the commands

use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

use codesim::search::SimilarityLevel;

// ANSI color codes from design system
pub mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const PRIMARY: &str = "\x1b[38;2;100;181;246m"; // #64B5F6
    pub const SUCCESS: &str = "\x1b[38;2;165;214;167m"; // #A5D6A7
    pub const WARNING: &str = "\x1b[38;2;255;245;157m"; // #FFF59D
    pub const ERROR: &str = "\x1b[38;2;239;154;154m"; // #EF9A9A
    pub const ACCENT: &str = "\x1b[38;2;255;202;40m"; // #FFCA28
    pub const MUTED: &str = "\x1b[38;2;84;110;122m"; // #546E7A
    pub const FG: &str = "\x1b[38;2;212;212;215m"; // #D4D4D7
    pub const HIGHLIGHT: &str = "\x1b[38;2;255;183;77m";
}

pub mod symbols {
    pub const LOADING: &str = "󰊍";
    pub const SUCCESS: &str = "󰄂";
    pub const WARNING: &str = "⚠";
    pub const ERROR: &str = "󰅚";
    pub const SEARCH: &str = "󰍉";
    pub const FILE: &str = "󰈙";
    pub const FUNCTION: &str = "󰊕";
    pub const MATCH: &str = "󰄬";
}

const BOX_WIDTH: usize = 62;

/// Color for a similarity band
pub fn level_color(level: SimilarityLevel) -> &'static str {
    match level {
        SimilarityLevel::NearIdentical => colors::ERROR,
        SimilarityLevel::VerySimilar => colors::WARNING,
        SimilarityLevel::Similar => colors::ACCENT,
        SimilarityLevel::SomewhatSimilar => colors::PRIMARY,
        SimilarityLevel::Different => colors::MUTED,
    }
}

/// Top border with a title
pub fn box_top(color: &str, icon: &str, title: &str) {
    let used = title.chars().count() + 5;
    println!(
        "{}{}╭─ {} {} {}╮{}",
        color,
        colors::BOLD,
        icon,
        title,
        "─".repeat(BOX_WIDTH.saturating_sub(used)),
        colors::RESET
    );
}

pub fn box_bottom(color: &str) {
    println!("{}╰{}╯{}", color, "─".repeat(BOX_WIDTH), colors::RESET);
}

pub fn box_blank(color: &str) {
    println!(
        "{}│{}{}{}│{}",
        color,
        colors::RESET,
        " ".repeat(BOX_WIDTH),
        color,
        colors::RESET
    );
}

/// `label: value` row inside a box
pub fn box_row(color: &str, label: &str, value: &str, value_color: &str) {
    let text = format!("  {:<18}{}", label, value);
    let pad = BOX_WIDTH.saturating_sub(text.chars().count());
    println!(
        "{}│{}  {}{:<18}{}{}{}{}{}│{}",
        color,
        colors::RESET,
        colors::MUTED,
        label,
        value_color,
        value,
        colors::RESET,
        " ".repeat(pad),
        color,
        colors::RESET
    );
}

/// Free text row inside a box
pub fn box_line(color: &str, text: &str, text_color: &str) {
    let pad = BOX_WIDTH.saturating_sub(text.chars().count() + 2);
    println!(
        "{}│{}  {}{}{}{}{}│{}",
        color,
        colors::RESET,
        text_color,
        text,
        colors::RESET,
        " ".repeat(pad),
        color,
        colors::RESET
    );
}

pub fn print_warning(message: &str) {
    println!(
        "\n{}  {} {}{}",
        colors::WARNING,
        symbols::WARNING,
        message,
        colors::RESET
    );
}

/// Create a styled progress bar
pub fn progress_bar(total: u64, prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);

    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.cyan} {prefix:.bold} [{bar:40.cyan/dim}] {pos}/{len} {msg:.dim}")
    {
        pb.set_style(
            style
                .progress_chars("█▓░")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
    }

    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));

    pb
}

/// Truncate a path for display
pub fn truncate_path(path: &Path, max_len: usize) -> String {
    let s = path.display().to_string();
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max_len {
        s
    } else if max_len <= 3 {
        ".".repeat(max_len)
    } else {
        let tail: String = chars[chars.len() - (max_len - 3)..].iter().collect();
        format!("...{}", tail)
    }
}
