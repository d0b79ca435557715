// Analyzer module: aggregates submodules for different aspects of the review analysis.

pub mod keywords;
pub mod kpi;
pub mod review_stats;

// Re-export the main analyzer implementation for ease of use.
pub use review_stats::{Analyzer, ReviewAnalyzer, ReviewSummary};
