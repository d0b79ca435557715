use crate::config::{BankConfig, ScrapingConfig};
use crate::model::{RawReview, ScraperError};
use crate::parser::{Parser, PlayStoreParser, ReviewPage};
use crate::scraper::ReviewSource;

use rand::Rng;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

const BATCH_EXECUTE_URL: &str = "https://play.google.com/_/PlayStoreUi/data/batchexecute";
const REVIEWS_RPC_ID: &str = "UsvDTd";
const MAX_PAGE_SIZE: usize = 199;
const SORT_NEWEST: u8 = 2;
/// Backoff stops doubling after this many retries (64x the base).
const MAX_BACKOFF_EXP: u32 = 6;

pub struct PlayStoreScraper {
    client: Client,
    parser: PlayStoreParser,
    base_url: String,
    lang: String,
    country: String,
    max_retries: u32,
    backoff_base: Duration,
    max_jitter_ms: u64,
}

impl PlayStoreScraper {
    pub fn new(cfg: &ScrapingConfig) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) BankReviewEtl/0.1")
            .timeout(Duration::from_secs(cfg.request_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            parser: PlayStoreParser::new(),
            base_url: BATCH_EXECUTE_URL.to_string(),
            lang: cfg.lang.clone(),
            country: cfg.country.clone(),
            max_retries: cfg.max_retries.max(1),
            backoff_base: Duration::from_secs(1),
            max_jitter_ms: 500,
        })
    }

    /// Same scraper aimed at another endpoint with no backoff delay.
    #[cfg(test)]
    fn with_base_url(cfg: &ScrapingConfig, base_url: &str) -> Result<Self, ScraperError> {
        Ok(Self {
            base_url: base_url.to_string(),
            backoff_base: Duration::ZERO,
            max_jitter_ms: 0,
            ..Self::new(cfg)?
        })
    }

    /// Builds the `f.req` form value for one page of newest-first reviews.
    fn build_request_body(app_id: &str, page_size: usize, token: Option<&str>) -> String {
        let inner = json!([
            null,
            null,
            [2, SORT_NEWEST, [page_size, null, token], null, []],
            [app_id, 7]
        ]);
        json!([[[REVIEWS_RPC_ID, inner.to_string(), null, "generic"]]]).to_string()
    }

    async fn fetch_page_once(
        &self,
        bank: &BankConfig,
        page_size: usize,
        token: Option<&str>,
    ) -> Result<ReviewPage, ScraperError> {
        let body = Self::build_request_body(&bank.app_id, page_size, token);
        let response = self
            .client
            .post(&self.base_url)
            .query(&[("hl", self.lang.as_str()), ("gl", self.country.as_str())])
            .form(&[("f.req", body)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::InvalidResponse(status.as_u16()));
        }

        let text = response.text().await?;
        Ok(self.parser.parse(&text, bank)?)
    }

    async fn fetch_page(
        &self,
        bank: &BankConfig,
        page_size: usize,
        token: Option<&str>,
    ) -> Result<ReviewPage, ScraperError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.fetch_page_once(bank, page_size, token).await {
                Ok(page) => return Ok(page),
                Err(e) if attempt < self.max_retries => {
                    let jitter_ms = rand::rng().random_range(0..=self.max_jitter_ms);
                    let exp = (attempt - 1).min(MAX_BACKOFF_EXP);
                    let wait = self.backoff_base * 2u32.pow(exp) + Duration::from_millis(jitter_ms);
                    warn!(
                        "Scrape failed for {} (attempt {}/{}): {}. Retrying in {:?}",
                        bank.code, attempt, self.max_retries, e, wait
                    );
                    sleep(wait).await;
                }
                Err(e) => {
                    warn!("Max retries reached for {}: {}", bank.code, e);
                    return Err(e);
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl ReviewSource for PlayStoreScraper {
    /// Pages through the newest reviews until `count` is reached or the token runs out.
    /// A page that still fails after its retries ends the walk; what was collected so far
    /// is kept, and the error only surfaces when nothing was collected at all.
    async fn fetch_reviews(
        &self,
        bank: &BankConfig,
        count: usize,
    ) -> Result<Vec<RawReview>, ScraperError> {
        info!("Scraping {} ({})", bank.name, bank.app_id);
        let mut collected: Vec<RawReview> = Vec::with_capacity(count);
        let mut token: Option<String> = None;

        while collected.len() < count {
            let page_size = (count - collected.len()).min(MAX_PAGE_SIZE);
            let page = match self.fetch_page(bank, page_size, token.as_deref()).await {
                Ok(page) => page,
                Err(e) if collected.is_empty() => return Err(e),
                Err(e) => {
                    warn!(
                        "Stopping {} after {} reviews, page failed: {}",
                        bank.code,
                        collected.len(),
                        e
                    );
                    break;
                }
            };
            let got = page.reviews.len();
            collected.extend(page.reviews);
            info!("  {}: page of {} reviews ({} total)", bank.code, got, collected.len());

            match page.next_token {
                Some(next) if got > 0 => token = Some(next),
                _ => break,
            }
        }

        collected.truncate(count);
        Ok(collected)
    }

    fn name(&self) -> &'static str {
        "google-play"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves the queued (status, body) replies in order, one per connection, and records
    /// each request body it receives.
    struct Responder {
        url: String,
        requests: Arc<Mutex<Vec<String>>>,
    }

    async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(head_end) = text.find("\r\n\r\n") {
                let content_length = text[..head_end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())?
                    })
                    .unwrap_or(0);
                if buf.len() >= head_end + 4 + content_length {
                    return text[head_end + 4..].to_string();
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    async fn spawn_responder(replies: Vec<(u16, String)>) -> Responder {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/batchexecute", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = requests.clone();
        let mut queue: VecDeque<(u16, String)> = replies.into();

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let body = read_request(&mut stream).await;
                seen.lock().unwrap().push(body);
                let (status, reply) = queue.pop_front().unwrap_or((500, String::new()));
                let response = format!(
                    "HTTP/1.1 {} X\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    reply.len(),
                    reply
                );
                stream.write_all(response.as_bytes()).await.unwrap();
                stream.shutdown().await.ok();
            }
        });

        Responder { url, requests }
    }

    /// A batchexecute reply holding `n` reviews numbered from `start`.
    fn page(start: usize, n: usize, token: Option<&str>) -> (u16, String) {
        let reviews: Vec<Value> = (start..start + n)
            .map(|i| {
                json!([
                    format!("gp:{}", i),
                    ["user"],
                    4,
                    null,
                    format!("review number {}", i),
                    [1714521600, 0],
                    0
                ])
            })
            .collect();
        let payload = json!([reviews, [null, token]]);
        let envelope = json!([[
            "wrb.fr",
            "UsvDTd",
            payload.to_string(),
            null,
            null,
            null,
            "generic"
        ]]);
        (200, format!(")]}}'\n\n{}", envelope))
    }

    fn bank() -> BankConfig {
        BankConfig {
            code: "BOA".into(),
            name: "Bank of Abyssinia".into(),
            app_id: "com.boa.boaMobileBanking".into(),
        }
    }

    fn scraper(url: &str, max_retries: u32) -> PlayStoreScraper {
        let cfg = ScrapingConfig {
            max_retries,
            ..ScrapingConfig::default()
        };
        PlayStoreScraper::with_base_url(&cfg, url).unwrap()
    }

    #[tokio::test]
    async fn test_pages_are_chained_until_count() {
        let server = spawn_responder(vec![
            page(0, 2, Some("tok1")),
            page(2, 2, Some("tok2")),
            page(4, 2, Some("tok3")),
        ])
        .await;

        let reviews = scraper(&server.url, 1).fetch_reviews(&bank(), 5).await.unwrap();
        assert_eq!(reviews.len(), 5);
        assert_eq!(reviews[0].review_id.as_deref(), Some("gp:0"));
        assert_eq!(reviews[4].review_id.as_deref(), Some("gp:4"));
        assert!(reviews.iter().all(|r| r.bank_code == "BOA"));

        let requests = server.requests.lock().unwrap();
        assert_eq!(requests.len(), 3);
        assert!(!requests[0].contains("tok1"));
        assert!(requests[1].contains("tok1"));
        assert!(requests[2].contains("tok2"));
    }

    #[tokio::test]
    async fn test_missing_token_ends_collection() {
        let server = spawn_responder(vec![page(0, 3, None), page(3, 3, Some("never"))]).await;

        let reviews = scraper(&server.url, 1).fetch_reviews(&bank(), 10).await.unwrap();
        assert_eq!(reviews.len(), 3);
        assert_eq!(server.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_late_page_keeps_collected_reviews() {
        let server = spawn_responder(vec![
            page(0, 2, Some("tok1")),
            (503, "busy".into()),
            (503, "busy".into()),
        ])
        .await;

        let reviews = scraper(&server.url, 2).fetch_reviews(&bank(), 10).await.unwrap();
        assert_eq!(reviews.len(), 2);
        assert_eq!(server.requests.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_retry_recovers_and_first_page_failure_is_an_error() {
        let server = spawn_responder(vec![(500, String::new()), page(0, 2, None)]).await;
        let reviews = scraper(&server.url, 3).fetch_reviews(&bank(), 2).await.unwrap();
        assert_eq!(reviews.len(), 2);

        let down = spawn_responder(vec![(500, String::new()), (500, String::new())]).await;
        let result = scraper(&down.url, 2).fetch_reviews(&bank(), 2).await;
        assert!(matches!(result, Err(ScraperError::InvalidResponse(500))));
    }

    #[test]
    fn test_request_body_first_page() {
        let body = PlayStoreScraper::build_request_body("com.boa.boaMobileBanking", 199, None);
        let outer: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(outer[0][0][0], "UsvDTd");
        assert_eq!(outer[0][0][3], "generic");

        let inner: Value = serde_json::from_str(outer[0][0][1].as_str().unwrap()).unwrap();
        assert_eq!(inner[2][1], 2);
        assert_eq!(inner[2][2][0], 199);
        assert!(inner[2][2][2].is_null());
        assert_eq!(inner[3][0], "com.boa.boaMobileBanking");
    }

    #[test]
    fn test_request_body_carries_token() {
        let body = PlayStoreScraper::build_request_body("app", 50, Some("tok"));
        let outer: Value = serde_json::from_str(&body).unwrap();
        let inner: Value = serde_json::from_str(outer[0][0][1].as_str().unwrap()).unwrap();
        assert_eq!(inner[2][2][2], "tok");
    }

    #[test]
    fn test_new_clamps_retries() {
        let cfg = ScrapingConfig {
            max_retries: 0,
            ..ScrapingConfig::default()
        };
        let scraper = PlayStoreScraper::new(&cfg).unwrap();
        assert_eq!(scraper.max_retries, 1);
        assert_eq!(scraper.name(), "google-play");
    }
}
