use crate::model::{CleanedReview, CsvError, DropReason, RawReview, PLAY_STORE_SOURCE};
use crate::utils::{normalize_text, parse_review_date};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleaningReport {
    pub original_count: usize,
    pub duplicates_removed: usize,
    /// Rows dropped for a missing field, an unparseable date or an out-of-range rating.
    pub missing_dropped: usize,
    pub drops: BTreeMap<DropReason, usize>,
    pub final_count: usize,
}

impl CleaningReport {
    pub fn total_removed(&self) -> usize {
        self.duplicates_removed + self.missing_dropped
    }

    pub fn total_loss_fraction(&self) -> f64 {
        if self.original_count == 0 {
            return 0.0;
        }
        self.total_removed() as f64 / self.original_count as f64
    }

    pub fn dropped(&self, reason: DropReason) -> usize {
        self.drops.get(&reason).copied().unwrap_or(0)
    }

    fn record(&mut self, reason: DropReason) {
        *self.drops.entry(reason).or_default() += 1;
        match reason {
            DropReason::Duplicate => self.duplicates_removed += 1,
            _ => self.missing_dropped += 1,
        }
    }
}

/// Persists the report next to the processed CSV so later stages can quote it.
pub fn save_report(path: &Path, report: &CleaningReport) -> Result<(), CsvError> {
    let io_err = |source| CsvError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let json = serde_json::to_string_pretty(report).map_err(|e| CsvError::InvalidValue {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    fs::write(path, json).map_err(io_err)
}

pub fn load_report(path: &Path) -> Result<CleaningReport, CsvError> {
    let content = fs::read_to_string(path).map_err(|source| CsvError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|e| CsvError::InvalidValue {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// A raw review with its text already normalized; `None` text means absent.
struct Staged {
    text: Option<String>,
    raw: RawReview,
}

fn stage(raw: RawReview) -> Staged {
    let text = raw
        .review_text
        .as_deref()
        .map(normalize_text)
        .filter(|t| !t.is_empty());
    Staged { text, raw }
}

/// Keeps the first occurrence of every (text, bank) pair.
fn remove_duplicates(rows: Vec<Staged>, report: &mut CleaningReport) -> Vec<Staged> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut kept = Vec::with_capacity(rows.len());
    for row in rows {
        if let Some(text) = &row.text {
            if !seen.insert((text.clone(), row.raw.bank_code.clone())) {
                report.record(DropReason::Duplicate);
                continue;
            }
        }
        kept.push(row);
    }
    kept
}

fn finish_row(row: Staged) -> Result<CleanedReview, DropReason> {
    let Staged { text, raw } = row;

    let (Some(review), Some(rating), Some(date_str)) =
        (text, raw.rating, raw.review_date.as_deref())
    else {
        return Err(DropReason::MissingField);
    };
    if date_str.trim().is_empty() || raw.bank_code.trim().is_empty() {
        return Err(DropReason::MissingField);
    }

    let date = parse_review_date(date_str).ok_or(DropReason::DateParseFailure)?;

    if rating.fract() != 0.0 || !(1.0..=5.0).contains(&rating) {
        return Err(DropReason::InvalidRating);
    }

    Ok(CleanedReview {
        review,
        rating: rating as u8,
        date,
        bank_code: raw.bank_code,
        source: raw.source.unwrap_or_else(|| PLAY_STORE_SOURCE.to_string()),
        reply: raw.reply_content.as_deref().map(normalize_text).unwrap_or_default(),
    })
}

/// Runs the full cleaning pass over the concatenated raw records of every bank.
pub fn clean(raw: Vec<RawReview>) -> (Vec<CleanedReview>, CleaningReport) {
    let mut report = CleaningReport {
        original_count: raw.len(),
        ..CleaningReport::default()
    };

    let staged: Vec<Staged> = raw.into_iter().map(stage).collect();
    let deduped = remove_duplicates(staged, &mut report);
    info!(
        "Removed {} duplicates. Remaining records: {}",
        report.duplicates_removed,
        deduped.len()
    );

    let mut cleaned = Vec::with_capacity(deduped.len());
    for row in deduped {
        match finish_row(row) {
            Ok(r) => cleaned.push(r),
            Err(reason) => report.record(reason),
        }
    }

    report.final_count = cleaned.len();
    for (reason, count) in &report.drops {
        if *reason != DropReason::Duplicate {
            info!("Dropped {} rows: {}", count, reason);
        }
    }
    info!(
        "Cleaning done: {} -> {} rows ({:.2}% loss)",
        report.original_count,
        report.final_count,
        report.total_loss_fraction() * 100.0
    );

    (cleaned, report)
}

/// Re-cleans already cleaned rows, e.g. after reading the processed CSV back in.
pub fn reclean(rows: Vec<CleanedReview>) -> (Vec<CleanedReview>, CleaningReport) {
    let raw = rows
        .into_iter()
        .map(|r| RawReview {
            review_text: Some(r.review),
            rating: Some(f64::from(r.rating)),
            review_date: Some(r.date.format("%Y-%m-%d").to_string()),
            reply_content: Some(r.reply),
            bank_code: r.bank_code,
            source: Some(r.source),
            ..RawReview::default()
        })
        .collect();
    clean(raw)
}
