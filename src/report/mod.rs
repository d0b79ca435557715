pub mod markdown;

pub use markdown::{render, write_report, ReportInput};
