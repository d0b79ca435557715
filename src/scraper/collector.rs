use crate::config::BankConfig;
use crate::model::RawReview;
use crate::scraper::ReviewSource;

use futures::future::join_all;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// A bank that came back with fewer reviews than requested. Logged, never fatal.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeShortfall {
    pub bank_code: String,
    pub collected: usize,
    pub target: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CollectionReport {
    pub per_bank: BTreeMap<String, usize>,
    pub shortfalls: Vec<ScrapeShortfall>,
}

impl CollectionReport {
    pub fn total(&self) -> usize {
        self.per_bank.values().sum()
    }
}

/// Fetches every bank concurrently and joins before returning, in config order.
pub async fn collect_all(
    source: &dyn ReviewSource,
    banks: &[BankConfig],
    target: usize,
) -> (Vec<RawReview>, CollectionReport) {
    info!("Collecting {} reviews per bank from {} ({} banks)", target, source.name(), banks.len());

    let tasks = banks.iter().map(|bank| async move {
        let result = source.fetch_reviews(bank, target).await;
        (bank, result)
    });
    let results = join_all(tasks).await;

    let mut all_reviews = Vec::new();
    let mut report = CollectionReport::default();

    for (bank, result) in results {
        let (reviews, error) = match result {
            Ok(r) => (r, None),
            Err(e) => {
                warn!("Skipping {}: {}", bank.code, e);
                (Vec::new(), Some(e.to_string()))
            }
        };

        let collected = reviews.len();
        info!("  {}: {} reviews", bank.name, collected);
        if collected < target {
            warn!(
                "Scrape shortfall for {}: {} of {} reviews",
                bank.code, collected, target
            );
            report.shortfalls.push(ScrapeShortfall {
                bank_code: bank.code.clone(),
                collected,
                target,
                error,
            });
        }
        report.per_bank.insert(bank.code.clone(), collected);
        all_reviews.extend(reviews);
    }

    info!("Total reviews collected: {}", report.total());
    (all_reviews, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScraperError;

    struct FakeSource;

    #[async_trait::async_trait]
    impl ReviewSource for FakeSource {
        async fn fetch_reviews(
            &self,
            bank: &BankConfig,
            count: usize,
        ) -> Result<Vec<RawReview>, ScraperError> {
            let available = match bank.code.as_str() {
                "FULL" => count + 10,
                "SHORT" => 3,
                _ => return Err(ScraperError::Timeout),
            };
            Ok((0..available.min(count))
                .map(|i| RawReview {
                    review_id: Some(format!("{}-{}", bank.code, i)),
                    review_text: Some(format!("review {}", i)),
                    bank_code: bank.code.clone(),
                    ..RawReview::default()
                })
                .collect())
        }

        fn name(&self) -> &'static str {
            "fake"
        }
    }

    fn bank(code: &str) -> BankConfig {
        BankConfig {
            code: code.into(),
            name: format!("{} Bank", code),
            app_id: format!("com.{}", code.to_lowercase()),
        }
    }

    #[tokio::test]
    async fn test_shortfall_and_failure_do_not_abort() {
        let banks = vec![bank("FULL"), bank("SHORT"), bank("DOWN")];
        let (reviews, report) = collect_all(&FakeSource, &banks, 5).await;

        assert_eq!(reviews.len(), 8);
        assert_eq!(report.per_bank["FULL"], 5);
        assert_eq!(report.per_bank["SHORT"], 3);
        assert_eq!(report.per_bank["DOWN"], 0);
        assert_eq!(report.total(), 8);

        assert_eq!(report.shortfalls.len(), 2);
        assert_eq!(report.shortfalls[0].bank_code, "SHORT");
        assert!(report.shortfalls[0].error.is_none());
        assert_eq!(report.shortfalls[1].bank_code, "DOWN");
        assert!(report.shortfalls[1].error.is_some());
    }

    #[tokio::test]
    async fn test_reviews_keep_bank_order() {
        let banks = vec![bank("SHORT"), bank("FULL")];
        let (reviews, report) = collect_all(&FakeSource, &banks, 2).await;
        assert!(report.shortfalls.is_empty());
        let codes: Vec<&str> = reviews.iter().map(|r| r.bank_code.as_str()).collect();
        assert_eq!(codes, vec!["SHORT", "SHORT", "FULL", "FULL"]);
    }
}
