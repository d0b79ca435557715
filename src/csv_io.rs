// CSV artifacts passed between pipeline stages
use crate::model::{
    CleanedReview, CsvError, RawReview, SentimentLabel, SentimentResult, TaggedReview,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const FINAL_COLUMNS: [&str; 6] = [
    "bank_code",
    "review_text",
    "rating",
    "review_date",
    "sentiment_label",
    "sentiment_score",
];

#[derive(Debug, Serialize, Deserialize)]
struct ProcessedRow {
    review: String,
    rating: u8,
    date: NaiveDate,
    bank: String,
    source: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct FinalRow {
    bank_code: String,
    review_text: String,
    rating: u8,
    review_date: NaiveDate,
    sentiment_label: SentimentLabel,
    sentiment_score: f64,
}

fn ensure_parent(path: &Path) -> Result<(), CsvError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| CsvError::Io {
            path: parent.display().to_string(),
            source,
        })?;
    }
    Ok(())
}

fn write_rows<T: Serialize>(
    path: &Path,
    rows: impl IntoIterator<Item = T>,
) -> Result<(), CsvError> {
    ensure_parent(path)?;
    let mut wtr = csv::Writer::from_path(path)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush().map_err(|source| CsvError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(())
}

fn check_columns(
    path: &Path,
    rdr: &mut csv::Reader<fs::File>,
    expected: &[&str],
) -> Result<(), CsvError> {
    let headers = rdr.headers()?;
    let missing: Vec<String> = expected
        .iter()
        .filter(|col| !headers.iter().any(|h| h == **col))
        .map(|col| col.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(CsvError::MissingColumns {
            path: path.display().to_string(),
            missing,
        })
    }
}

fn invalid(path: &Path, reason: String) -> CsvError {
    CsvError::InvalidValue {
        path: path.display().to_string(),
        reason,
    }
}

pub fn write_raw(path: &Path, reviews: &[RawReview]) -> Result<(), CsvError> {
    write_rows(path, reviews)
}

pub fn read_raw(path: &Path) -> Result<Vec<RawReview>, CsvError> {
    let mut rdr = csv::Reader::from_path(path)?;
    check_columns(path, &mut rdr, &["review_text", "rating", "review_date", "bank_code"])?;
    let mut reviews = Vec::new();
    for result in rdr.deserialize() {
        reviews.push(result?);
    }
    Ok(reviews)
}

/// The `bank` column carries the full bank name; `bank_name` resolves it from the code.
pub fn write_processed<F>(
    path: &Path,
    reviews: &[CleanedReview],
    bank_name: F,
) -> Result<(), CsvError>
where
    F: Fn(&str) -> String,
{
    write_rows(
        path,
        reviews.iter().map(|r| ProcessedRow {
            review: r.review.clone(),
            rating: r.rating,
            date: r.date,
            bank: bank_name(&r.bank_code),
            source: r.source.clone(),
        }),
    )
}

/// Reads the processed CSV back, turning bank names into codes with `bank_code`.
/// The reply column is not part of that artifact.
pub fn read_processed<F>(path: &Path, bank_code: F) -> Result<Vec<CleanedReview>, CsvError>
where
    F: Fn(&str) -> String,
{
    let mut rdr = csv::Reader::from_path(path)?;
    check_columns(path, &mut rdr, &["review", "rating", "date", "bank", "source"])?;
    let mut reviews = Vec::new();
    for result in rdr.deserialize() {
        let row: ProcessedRow = result?;
        if !(1..=5).contains(&row.rating) || row.review.is_empty() {
            return Err(invalid(path, format!("bad processed row: {:?}", row)));
        }
        reviews.push(CleanedReview {
            review: row.review,
            rating: row.rating,
            date: row.date,
            bank_code: bank_code(&row.bank),
            source: row.source,
            reply: String::new(),
        });
    }
    Ok(reviews)
}

pub fn write_final(path: &Path, reviews: &[TaggedReview]) -> Result<(), CsvError> {
    write_rows(
        path,
        reviews.iter().map(|t| FinalRow {
            bank_code: t.review.bank_code.clone(),
            review_text: t.review.review.clone(),
            rating: t.review.rating,
            review_date: t.review.date,
            sentiment_label: t.sentiment.label,
            sentiment_score: t.sentiment.score,
        }),
    )
}

pub fn read_final(path: &Path) -> Result<Vec<TaggedReview>, CsvError> {
    let mut rdr = csv::Reader::from_path(path)?;
    check_columns(path, &mut rdr, &FINAL_COLUMNS)?;
    let mut reviews = Vec::new();
    for result in rdr.deserialize() {
        let row: FinalRow = result?;
        if !(0.0..=1.0).contains(&row.sentiment_score) {
            return Err(invalid(
                path,
                format!("sentiment score out of range: {}", row.sentiment_score),
            ));
        }
        reviews.push(TaggedReview {
            review: CleanedReview {
                review: row.review_text,
                rating: row.rating,
                date: row.review_date,
                bank_code: row.bank_code,
                source: crate::model::PLAY_STORE_SOURCE.to_string(),
                reply: String::new(),
            },
            sentiment: SentimentResult {
                label: row.sentiment_label,
                score: row.sentiment_score,
            },
        });
    }
    Ok(reviews)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("bank-review-etl-{}-{}", std::process::id(), name))
            .join("out.csv")
    }

    fn cleaned(text: &str) -> CleanedReview {
        CleanedReview {
            review: text.into(),
            rating: 4,
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            bank_code: "BOA".into(),
            source: "Google Play Store".into(),
            reply: "thanks".into(),
        }
    }

    fn name_of(code: &str) -> String {
        match code {
            "BOA" => "Bank of Abyssinia".into(),
            other => other.into(),
        }
    }

    fn code_of(name: &str) -> String {
        match name {
            "Bank of Abyssinia" => "BOA".into(),
            other => other.into(),
        }
    }

    #[test]
    fn test_processed_csv_columns_and_read_back() {
        let path = temp_path("processed");
        write_processed(&path, &[cleaned("good, but \"slow\" app")], name_of).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("review,rating,date,bank,source\n"));
        assert!(content.contains("2024-05-01,Bank of Abyssinia,Google Play Store"));
        assert!(!content.contains(",BOA,"));

        let back = read_processed(&path, code_of).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].review, "good, but \"slow\" app");
        assert_eq!(back[0].bank_code, "BOA");
        assert_eq!(back[0].reply, "");
        fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_final_csv_round_trip() {
        let path = temp_path("final");
        let tagged = TaggedReview {
            review: cleaned("works"),
            sentiment: SentimentResult {
                label: SentimentLabel::Positive,
                score: 0.875,
            },
        };
        write_final(&path, &[tagged]).unwrap();
        let back = read_final(&path).unwrap();
        assert_eq!(back[0].sentiment.label, SentimentLabel::Positive);
        assert_eq!(back[0].sentiment.score, 0.875);
        assert_eq!(back[0].review.review, "works");
        fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_final_csv_missing_columns_rejected() {
        let path = temp_path("missing-cols");
        ensure_parent(&path).unwrap();
        fs::write(&path, "bank_code,review_text,rating\nCBE,ok,5\n").unwrap();
        match read_final(&path) {
            Err(CsvError::MissingColumns { missing, .. }) => {
                assert_eq!(missing, vec!["review_date", "sentiment_label", "sentiment_score"]);
            }
            other => panic!("expected MissingColumns, got {:?}", other),
        }
        fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_raw_csv_tolerates_blank_and_bad_cells() {
        let path = temp_path("raw");
        ensure_parent(&path).unwrap();
        fs::write(
            &path,
            "review_id,user_name,review_text,rating,review_date,thumbs_up_count,\
             reply_content,bank_code,bank_name,app_id,source\n\
             r1,a,Nice,5,2024-05-01 10:00:00,3,,CBE,\
             Commercial Bank of Ethiopia,1.0,Google Play Store\n\
             r2,b,,five,2024-05-01,,,CBE,,,\n",
        )
        .unwrap();
        let raw = read_raw(&path).unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0].rating, Some(5.0));
        assert_eq!(raw[0].reply_content, None);
        assert_eq!(raw[1].review_text, None);
        assert_eq!(raw[1].rating, None);
        assert_eq!(raw[1].thumbs_up_count, None);
        fs::remove_dir_all(path.parent().unwrap()).ok();
    }
}
