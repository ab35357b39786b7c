//! Core extraction: parsing, structural metrics and code units

pub mod metrics;
pub mod parser;
pub mod unit;

pub use metrics::LineMetrics;
pub use parser::{CodeParser, FileExtraction, Language};
pub use unit::{unit_id, CodeUnit};
