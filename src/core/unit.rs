//! Code units: the per-function records that flow through the pipeline

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::parser::Language;

/// One extracted function or method, with identity and structural metrics.
///
/// Created by the extractor and never mutated afterwards. Downstream stages
/// refer to units by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeUnit {
    pub id: String,
    pub file_path: String,
    pub symbol_name: String,
    pub start_line: usize,
    pub end_line: usize,
    pub language: Language,
    pub loc: usize,
    #[serde(rename = "complexity")]
    pub cyclomatic_complexity: usize,
    pub parameter_count: usize,
}

impl CodeUnit {
    /// Build a unit for a function spanning `start_line..=end_line` (1-based).
    pub fn new(
        file_path: &str,
        symbol_name: &str,
        start_line: usize,
        end_line: usize,
        language: Language,
        cyclomatic_complexity: usize,
        parameter_count: usize,
    ) -> Self {
        Self {
            id: unit_id(file_path, symbol_name, start_line),
            file_path: file_path.to_string(),
            symbol_name: symbol_name.to_string(),
            start_line,
            end_line,
            language,
            loc: end_line.saturating_sub(start_line) + 1,
            cyclomatic_complexity,
            parameter_count,
        }
    }

    /// Slice this unit's lines out of the file it was extracted from.
    pub fn source_text(&self, file_source: &str) -> String {
        let skip = self.start_line.saturating_sub(1);
        let take = self.end_line.saturating_sub(skip);
        file_source
            .lines()
            .skip(skip)
            .take(take)
            .collect::<Vec<&str>>()
            .join("\n")
    }

    /// Text handed to the embedding provider.
    pub fn embedding_text(&self, file_source: &str) -> String {
        format!(
            "// Language: {}\n{}",
            self.language.name(),
            self.source_text(file_source)
        )
    }
}

/// Deterministic id over `(file_path, symbol_name, start_line)`.
///
/// First 8 bytes of SHA-256, hex encoded.
pub fn unit_id(file_path: &str, symbol_name: &str, start_line: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}:{}", file_path, symbol_name, start_line).as_bytes());
    let digest = hasher.finalize();
    digest[..8].iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_id_is_stable() {
        let a = unit_id("src/lib.rs", "parse", 10);
        let b = unit_id("src/lib.rs", "parse", 10);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert_ne!(a, unit_id("src/lib.rs", "parse", 11));
        assert_ne!(a, unit_id("src/main.rs", "parse", 10));
    }

    #[test]
    fn test_loc_is_inclusive() {
        let unit = CodeUnit::new("a.py", "f", 3, 7, Language::Python, 1, 0);
        assert_eq!(unit.loc, 5);

        let single = CodeUnit::new("a.py", "g", 4, 4, Language::Python, 1, 0);
        assert_eq!(single.loc, 1);
    }

    #[test]
    fn test_source_text_slices_lines() {
        let source = "line1\nline2\nline3\nline4\n";
        let unit = CodeUnit::new("a.rs", "f", 2, 3, Language::Rust, 1, 0);
        assert_eq!(unit.source_text(source), "line2\nline3");
        assert!(unit.embedding_text(source).starts_with("// Language: Rust\n"));
    }
}
