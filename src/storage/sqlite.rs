use crate::model::{Bank, SentimentLabel, SentimentResult, StorageError, StoredReview, TaggedReview};
use rusqlite::{params, Connection, Row};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct LoadSummary {
    pub inserted: BTreeMap<String, usize>,
    pub failures: Vec<StorageError>,
}

impl LoadSummary {
    pub fn total_inserted(&self) -> usize {
        self.inserted.values().sum()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens the database (":memory:" for an in-process one) and creates the schema.
    pub fn new(db_path: &str) -> Result<Self, StorageError> {
        if db_path != ":memory:" {
            let parent = Path::new(db_path).parent();
            if let Some(parent) = parent.filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;

        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS banks (
                bank_id INTEGER PRIMARY KEY AUTOINCREMENT,
                bank_code TEXT NOT NULL UNIQUE,
                bank_name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS reviews (
                review_id INTEGER PRIMARY KEY AUTOINCREMENT,
                bank_id INTEGER NOT NULL REFERENCES banks(bank_id) ON DELETE CASCADE,
                review_text TEXT NOT NULL,
                rating INTEGER NOT NULL CHECK (rating >= 1 AND rating <= 5),
                review_date TEXT NOT NULL,
                sentiment_label TEXT NOT NULL,
                sentiment_score REAL NOT NULL CHECK (sentiment_score >= 0 AND sentiment_score <= 1)
            );

            CREATE INDEX IF NOT EXISTS idx_reviews_bank ON reviews(bank_id);
            ",
        )?;

        Ok(Self { conn })
    }

    /// Inserts the bank if its code is new and returns its id either way.
    pub fn upsert_bank(&self, bank_code: &str, bank_name: &str) -> Result<i64, StorageError> {
        self.conn.execute(
            "INSERT INTO banks (bank_code, bank_name) VALUES (?1, ?2)
             ON CONFLICT(bank_code) DO NOTHING",
            params![bank_code, bank_name],
        )?;
        let id = self.conn.query_row(
            "SELECT bank_id FROM banks WHERE bank_code = ?1",
            params![bank_code],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn check_required(review: &TaggedReview) -> Result<(), String> {
        let r = &review.review;
        if r.review.trim().is_empty() {
            return Err("review_text is empty".into());
        }
        if !(1..=5).contains(&r.rating) {
            return Err(format!("rating {} out of range", r.rating));
        }
        let score = review.sentiment.score;
        if !score.is_finite() || !(0.0..=1.0).contains(&score) {
            return Err(format!("sentiment_score {} out of range", score));
        }
        Ok(())
    }

    /// Inserts one bank's reviews in a single transaction; any bad row rolls the whole batch back.
    pub fn insert_bank_batch(
        &mut self,
        bank_id: i64,
        bank_code: &str,
        reviews: &[&TaggedReview],
    ) -> Result<usize, StorageError> {
        let fail = |reason: String| StorageError::LoadFailure {
            bank_code: bank_code.to_string(),
            reason,
        };

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO reviews (
                    bank_id, review_text, rating, review_date, sentiment_label, sentiment_score
                 )
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;

            for review in reviews {
                Self::check_required(review).map_err(fail)?;
                stmt.execute(params![
                    bank_id,
                    &review.review.review,
                    review.review.rating,
                    review.review.date,
                    review.sentiment.label.as_str(),
                    review.sentiment.score,
                ])
                .map_err(|e| fail(e.to_string()))?;
            }
        }
        tx.commit()?;
        Ok(reviews.len())
    }

    /// Upserts every bank seen in the batch, then loads each bank's reviews atomically.
    /// A failed bank is reported in the summary and does not stop the others.
    pub fn load<F>(&mut self, reviews: &[TaggedReview], bank_name: F) -> LoadSummary
    where
        F: Fn(&str) -> String,
    {
        let mut by_bank: BTreeMap<&str, Vec<&TaggedReview>> = BTreeMap::new();
        for r in reviews {
            by_bank.entry(r.review.bank_code.as_str()).or_default().push(r);
        }

        let mut summary = LoadSummary::default();
        for (code, batch) in by_bank {
            let result = self
                .upsert_bank(code, &bank_name(code))
                .and_then(|bank_id| self.insert_bank_batch(bank_id, code, &batch));
            match result {
                Ok(n) => {
                    info!("Inserted {} reviews for {}", n, code);
                    summary.inserted.insert(code.to_string(), n);
                }
                Err(e) => {
                    warn!("Load failed for {}: {}", code, e);
                    summary.failures.push(e);
                }
            }
        }
        summary
    }

    pub fn fetch_banks(&self) -> Result<Vec<Bank>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT bank_id, bank_code, bank_name FROM banks ORDER BY bank_code ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(Bank {
                bank_id: row.get(0)?,
                bank_code: row.get(1)?,
                bank_name: row.get(2)?,
            })
        })?;

        let mut banks = Vec::new();
        for bank in rows {
            banks.push(bank?);
        }
        Ok(banks)
    }

    /// Returns every stored review joined with its bank, in insertion order.
    pub fn fetch_reviews(&self) -> Result<Vec<StoredReview>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT r.review_id, b.bank_code, b.bank_name, r.review_text, r.rating,
                    r.review_date, r.sentiment_label, r.sentiment_score
             FROM reviews r JOIN banks b ON b.bank_id = r.bank_id
             ORDER BY r.review_id ASC",
        )?;

        let rows = stmt.query_map([], Self::map_review)?;
        let mut reviews = Vec::new();
        for review in rows {
            reviews.push(review?);
        }
        Ok(reviews)
    }

    pub fn count_reviews(&self) -> Result<usize, StorageError> {
        let n: i64 = self.conn.query_row("SELECT COUNT(*) FROM reviews", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    pub fn count_banks(&self) -> Result<usize, StorageError> {
        let n: i64 = self.conn.query_row("SELECT COUNT(*) FROM banks", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    fn map_review(row: &Row) -> Result<StoredReview, rusqlite::Error> {
        let label_str: String = row.get(6)?;
        let label = SentimentLabel::parse(&label_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                6,
                rusqlite::types::Type::Text,
                format!("unknown sentiment label {}", label_str).into(),
            )
        })?;

        Ok(StoredReview {
            review_id: row.get(0)?,
            bank_code: row.get(1)?,
            bank_name: row.get(2)?,
            review_text: row.get(3)?,
            rating: row.get(4)?,
            review_date: row.get(5)?,
            sentiment: SentimentResult {
                label,
                score: row.get(7)?,
            },
        })
    }
}
