//! Duplicate classification
//!
//! Results are advisory. Nothing here blocks or rewrites code.

use serde::Serialize;
use std::fmt;

use super::{SimilarityResult, SimilaritySearch};
use crate::core::unit::CodeUnit;
use crate::embeddings::EmbeddingProvider;
use crate::error::ClassifierError;

pub const DEFAULT_THRESHOLD: f32 = 0.85;

/// Presentation bands for a similarity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SimilarityLevel {
    Different,
    SomewhatSimilar,
    Similar,
    VerySimilar,
    NearIdentical,
}

impl SimilarityLevel {
    pub fn from_score(score: f32) -> Self {
        if score >= 0.95 {
            SimilarityLevel::NearIdentical
        } else if score >= 0.85 {
            SimilarityLevel::VerySimilar
        } else if score >= 0.75 {
            SimilarityLevel::Similar
        } else if score >= 0.60 {
            SimilarityLevel::SomewhatSimilar
        } else {
            SimilarityLevel::Different
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SimilarityLevel::NearIdentical => "Nearly Identical",
            SimilarityLevel::VerySimilar => "Very Similar",
            SimilarityLevel::Similar => "Similar",
            SimilarityLevel::SomewhatSimilar => "Somewhat Similar",
            SimilarityLevel::Different => "Different",
        }
    }
}

impl fmt::Display for SimilarityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateMatch {
    pub unit: CodeUnit,
    pub score: f32,
    pub level: SimilarityLevel,
}

impl From<SimilarityResult> for DuplicateMatch {
    fn from(result: SimilarityResult) -> Self {
        let level = result.level();
        Self {
            unit: result.unit,
            score: result.score,
            level,
        }
    }
}

pub struct DuplicateClassifier<'a> {
    search: &'a SimilaritySearch,
    threshold: f32,
}

impl<'a> DuplicateClassifier<'a> {
    pub fn new(search: &'a SimilaritySearch) -> Self {
        Self {
            search,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    pub fn with_threshold(search: &'a SimilaritySearch, threshold: f32) -> Result<Self, ClassifierError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ClassifierError::InvalidThreshold(threshold));
        }
        Ok(Self { search, threshold })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Indexed units scoring at or above the threshold against `unit`,
    /// best first. `unit` itself is never included.
    pub fn detect_duplicates(&self, unit: &CodeUnit) -> Result<Vec<DuplicateMatch>, ClassifierError> {
        let entry = self
            .search
            .index()
            .get(&unit.id)
            .ok_or_else(|| ClassifierError::UnitNotIndexed(unit.id.clone()))?;

        let ranked = self.search.rank_all(&entry.vector)?;
        Ok(self.classify(ranked, &unit.id))
    }

    /// Same as `detect_duplicates` for a unit that is not in the index,
    /// embedding `text` on the fly.
    pub async fn detect_duplicates_for_text(
        &self,
        provider: &dyn EmbeddingProvider,
        unit: &CodeUnit,
        text: &str,
    ) -> Result<Vec<DuplicateMatch>, ClassifierError> {
        let query = self.search.embed_query(provider, text).await?;
        let ranked = self.search.rank_all(&query)?;
        Ok(self.classify(ranked, &unit.id))
    }

    fn classify(&self, ranked: Vec<SimilarityResult>, self_id: &str) -> Vec<DuplicateMatch> {
        ranked
            .into_iter()
            .filter(|r| r.unit.id != self_id)
            .take_while(|r| r.score >= self.threshold)
            .map(DuplicateMatch::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::Language;
    use crate::embeddings::testing::HashingEmbedder;
    use crate::index::{BuildOptions, CancelToken, Index, IndexBuilder, IndexEntry};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn entry(file: &str, symbol: &str, vector: Vec<f32>) -> IndexEntry {
        IndexEntry {
            unit: CodeUnit::new(file, symbol, 1, 5, Language::Rust, 1, 0),
            vector,
        }
    }

    #[test]
    fn test_levels() {
        assert_eq!(SimilarityLevel::from_score(0.90), SimilarityLevel::VerySimilar);
        assert_eq!(SimilarityLevel::from_score(0.96), SimilarityLevel::NearIdentical);
        assert_eq!(SimilarityLevel::from_score(0.50), SimilarityLevel::Different);
        assert_eq!(SimilarityLevel::from_score(0.75), SimilarityLevel::Similar);
        assert_eq!(SimilarityLevel::from_score(0.60), SimilarityLevel::SomewhatSimilar);
        assert_eq!(SimilarityLevel::NearIdentical.to_string(), "Nearly Identical");
    }

    #[test]
    fn test_never_matches_itself() {
        let search = SimilaritySearch::new(Index::new(
            "hashing",
            2,
            true,
            vec![
                entry("a.rs", "a", vec![1.0, 0.0]),
                entry("b.rs", "b", vec![1.0, 0.01]),
                entry("c.rs", "c", vec![0.0, 1.0]),
            ],
        ));
        let classifier = DuplicateClassifier::new(&search);
        let unit = search.index().find_symbol("a.rs", "a").unwrap().unit.clone();

        let matches = classifier.detect_duplicates(&unit).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].unit.symbol_name, "b");
        assert!(matches.iter().all(|m| m.unit.id != unit.id));
    }

    #[test]
    fn test_same_function_different_units_are_distinct() {
        // Two units of one function name at different lines have different ids
        let first = CodeUnit::new("a.rs", "f", 1, 5, Language::Rust, 1, 0);
        let second = CodeUnit::new("a.rs", "f", 20, 25, Language::Rust, 1, 0);
        let search = SimilaritySearch::new(Index::new(
            "hashing",
            2,
            true,
            vec![
                IndexEntry { unit: first.clone(), vector: vec![1.0, 0.0] },
                IndexEntry { unit: second.clone(), vector: vec![1.0, 0.0] },
            ],
        ));

        let matches = DuplicateClassifier::new(&search).detect_duplicates(&first).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].unit.id, second.id);
    }

    #[test]
    fn test_threshold_validation_and_unknown_unit() {
        let search = SimilaritySearch::new(Index::new("hashing", 2, true, Vec::new()));
        assert!(matches!(
            DuplicateClassifier::with_threshold(&search, 1.2),
            Err(ClassifierError::InvalidThreshold(_))
        ));

        let classifier = DuplicateClassifier::with_threshold(&search, 0.5).unwrap();
        assert_eq!(classifier.threshold(), 0.5);
        let stranger = CodeUnit::new("x.rs", "x", 1, 1, Language::Rust, 1, 0);
        assert!(matches!(
            classifier.detect_duplicates(&stranger),
            Err(ClassifierError::UnitNotIndexed(_))
        ));
    }

    const CART: &str = r#"fn cart_total(items: &[Item], discount: u32) -> u32 {
    let mut total = 0;
    for item in items {
        if item.quantity > 0 {
            total += item.price * item.quantity;
        }
    }
    if discount > 0 && total > discount {
        total -= discount;
    }
    total
}
"#;

    const INVOICE: &str = r#"fn invoice_amount(items: &[Item], discount: u32) -> u32 {
    let mut total = 0;
    for item in items {
        if item.quantity > 0 {
            total += item.price * item.quantity;
        }
    }
    if discount > 0 && total > discount {
        total -= discount;
    }
    total
}
"#;

    #[tokio::test]
    async fn test_identical_bodies_are_near_identical() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("src/billing")).unwrap();
        std::fs::write(temp.path().join("src/cart.rs"), CART).unwrap();
        std::fs::write(temp.path().join("src/billing/invoice.rs"), INVOICE).unwrap();
        std::fs::write(
            temp.path().join("src/names.py"),
            "def greet(name):\n    return 'hello ' + name\n",
        )
        .unwrap();

        let provider = Arc::new(HashingEmbedder::new());
        let outcome = IndexBuilder::new(provider.clone(), BuildOptions::new(temp.path()))
            .build(&CancelToken::new())
            .await
            .unwrap();
        let search = SimilaritySearch::new(outcome.index.unwrap());
        let classifier = DuplicateClassifier::new(&search);

        let cart = search.index().find_symbol("src/cart.rs", "cart_total").unwrap().unit.clone();
        let invoice = search
            .index()
            .find_symbol("src/billing/invoice.rs", "invoice_amount")
            .unwrap()
            .unit
            .clone();

        for (unit, other) in [(&cart, &invoice), (&invoice, &cart)] {
            let matches = classifier.detect_duplicates(unit).unwrap();
            assert_eq!(matches[0].unit.id, other.id);
            assert!(matches[0].score > 0.95);
            assert_eq!(matches[0].level, SimilarityLevel::NearIdentical);
        }

        // Unindexed copy of the same code
        let pasted = CodeUnit::new("scratch.rs", "pasted", 1, 12, Language::Rust, 4, 2);
        let text = format!("// Language: Rust\n{}", CART.replace("cart_total", "pasted"));
        let matches = classifier
            .detect_duplicates_for_text(provider.as_ref(), &pasted, &text)
            .await
            .unwrap();
        assert_eq!(matches.len(), 2);
        assert!(matches.iter().all(|m| m.level == SimilarityLevel::NearIdentical));
    }
}
