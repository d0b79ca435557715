use crate::model::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// The Collector always asks for at least this many reviews per bank.
pub const MIN_REVIEWS_PER_BANK: usize = 500;

#[derive(Debug, Clone, Deserialize)]
pub struct BankConfig {
    pub code: String,
    pub name: String,
    pub app_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    pub reviews_per_bank: usize,
    pub max_retries: u32,
    pub lang: String,
    pub country: String,
    pub request_timeout_seconds: u64,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            reviews_per_bank: 600,
            max_retries: 3,
            lang: "en".into(),
            country: "et".into(),
            request_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub raw_reviews: String,
    pub processed_reviews: String,
    pub final_results: String,
    pub cleaning_report: String,
    pub database: String,
    pub report: String,
    pub charts_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_reviews: "data/raw/reviews_raw.csv".into(),
            processed_reviews: "data/processed/reviews_processed.csv".into(),
            final_results: "data/processed/reviews_final.csv".into(),
            cleaning_report: "data/processed/cleaning_report.json".into(),
            database: "data/bank_reviews.db".into(),
            report: "reports/final_report.md".into(),
            charts_dir: "charts".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentBackend {
    Lexicon,
    InferenceApi,
}

impl SentimentBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentBackend::Lexicon => "lexicon",
            SentimentBackend::InferenceApi => "inference-api",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SentimentConfig {
    pub backend: SentimentBackend,
    pub endpoint: String,
    pub neutral_threshold: f64,
    #[serde(skip)]
    pub api_token: Option<String>,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            backend: SentimentBackend::Lexicon,
            endpoint: concat!(
                "https://api-inference.huggingface.co/models/",
                "distilbert-base-uncased-finetuned-sst-2-english"
            )
            .into(),
            neutral_threshold: 0.6,
            api_token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KpiConfig {
    pub min_reviews: usize,
    pub max_loss_pct: f64,
}

impl Default for KpiConfig {
    fn default() -> Self {
        Self {
            min_reviews: 1200,
            max_loss_pct: 5.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub top_keywords: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self { top_keywords: 10 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub banks: Vec<BankConfig>,
    pub scraping: ScrapingConfig,
    pub paths: PathsConfig,
    pub sentiment: SentimentConfig,
    pub kpi: KpiConfig,
    pub report: ReportConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            banks: vec![
                BankConfig {
                    code: "CBE".into(),
                    name: "Commercial Bank of Ethiopia".into(),
                    app_id: "com.combanketh.mobilebanking".into(),
                },
                BankConfig {
                    code: "BOA".into(),
                    name: "Bank of Abyssinia".into(),
                    app_id: "com.boa.boaMobileBanking".into(),
                },
                BankConfig {
                    code: "Dashen".into(),
                    name: "Dashen Bank".into(),
                    app_id: "com.dashen.dashensuperapp".into(),
                },
            ],
            scraping: ScrapingConfig::default(),
            paths: PathsConfig::default(),
            sentiment: SentimentConfig::default(),
            kpi: KpiConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl AppConfig {
    /// Full bank name for a code, falling back to the code itself.
    pub fn bank_name(&self, code: &str) -> String {
        self.banks
            .iter()
            .find(|b| b.code == code)
            .map(|b| b.name.clone())
            .unwrap_or_else(|| code.to_string())
    }

    /// Bank code for a full name, falling back to the name itself.
    pub fn bank_code(&self, name: &str) -> String {
        self.banks
            .iter()
            .find(|b| b.name == name)
            .map(|b| b.code.clone())
            .unwrap_or_else(|| name.to_string())
    }

    /// Applies the environment overrides. `lookup` is `std::env::var` in production.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        for bank in self.banks.iter_mut() {
            let key = format!("{}_APP_ID", bank.code.to_ascii_uppercase());
            if let Some(app_id) = lookup(&key).filter(|v| !v.trim().is_empty()) {
                bank.app_id = app_id;
            }
        }

        if let Some(v) = lookup("REVIEWS_PER_BANK") {
            self.scraping.reviews_per_bank = v
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("REVIEWS_PER_BANK={}", v)))?;
        }
        if let Some(v) = lookup("MAX_RETRIES") {
            self.scraping.max_retries = v
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("MAX_RETRIES={}", v)))?;
        }
        if let Some(v) = lookup("BANK_REVIEWS_DB") {
            self.paths.database = v;
        }
        if let Some(v) = lookup("SENTIMENT_API_TOKEN") {
            self.sentiment.api_token = Some(v);
        }

        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.banks.is_empty() {
            return Err(ConfigError::Invalid("no banks configured".into()));
        }
        if self.scraping.reviews_per_bank < MIN_REVIEWS_PER_BANK {
            return Err(ConfigError::Invalid(format!(
                "reviews_per_bank is {}, at least {} are required",
                self.scraping.reviews_per_bank, MIN_REVIEWS_PER_BANK
            )));
        }
        if !(0.0..=1.0).contains(&self.sentiment.neutral_threshold) {
            return Err(ConfigError::Invalid(
                "sentiment.neutral_threshold must be within [0, 1]".into(),
            ));
        }
        let mut codes: Vec<&str> = self.banks.iter().map(|b| b.code.as_str()).collect();
        codes.sort_unstable();
        codes.dedup();
        if codes.len() != self.banks.len() {
            return Err(ConfigError::Invalid("duplicate bank codes".into()));
        }
        Ok(())
    }
}

/// Loads the config file if present, otherwise starts from the built-in defaults,
/// then layers environment overrides on top.
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let mut config: AppConfig = if Path::new(path).exists() {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content)?
    } else {
        tracing::info!("Config {} not found, using defaults", path);
        AppConfig::default()
    };
    config.apply_overrides(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_cover_three_banks() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.banks.len(), 3);
        assert_eq!(cfg.scraping.reviews_per_bank, 600);
        assert_eq!(cfg.bank_name("BOA"), "Bank of Abyssinia");
        assert_eq!(cfg.bank_name("XYZ"), "XYZ");
        assert_eq!(cfg.bank_code("Dashen Bank"), "Dashen");
        assert_eq!(cfg.bank_code("XYZ"), "XYZ");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{
            "scraping": { "reviews_per_bank": 800 },
            "kpi": { "max_loss_pct": 10.0 }
        }"#;
        let cfg: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.scraping.reviews_per_bank, 800);
        assert_eq!(cfg.scraping.max_retries, 3);
        assert_eq!(cfg.kpi.min_reviews, 1200);
        assert_eq!(cfg.kpi.max_loss_pct, 10.0);
        assert_eq!(cfg.banks.len(), 3);
        assert_eq!(cfg.sentiment.backend, SentimentBackend::Lexicon);
    }

    #[test]
    fn test_env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("CBE_APP_ID", "com.example.cbe"),
            ("REVIEWS_PER_BANK", "700"),
            ("MAX_RETRIES", "5"),
            ("SENTIMENT_API_TOKEN", "secret"),
        ]);
        let mut cfg = AppConfig::default();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(cfg.banks[0].app_id, "com.example.cbe");
        assert_eq!(cfg.banks[1].app_id, "com.boa.boaMobileBanking");
        assert_eq!(cfg.scraping.reviews_per_bank, 700);
        assert_eq!(cfg.scraping.max_retries, 5);
        assert_eq!(cfg.sentiment.api_token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_bad_override_is_rejected() {
        let mut cfg = AppConfig::default();
        let result = cfg.apply_overrides(|k| (k == "REVIEWS_PER_BANK").then(|| "lots".to_string()));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_reviews_per_bank_below_minimum_rejected() {
        let mut cfg = AppConfig::default();
        cfg.apply_overrides(|k| (k == "REVIEWS_PER_BANK").then(|| "10".to_string()))
            .unwrap();
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));

        let cfg: AppConfig =
            serde_json::from_str(r#"{ "scraping": { "reviews_per_bank": 499 } }"#).unwrap();
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));

        let cfg: AppConfig =
            serde_json::from_str(r#"{ "scraping": { "reviews_per_bank": 500 } }"#).unwrap();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_duplicate_bank_codes_fail_validation() {
        let mut cfg = AppConfig::default();
        cfg.banks[1].code = "CBE".into();
        assert!(cfg.validate().is_err());
    }
}
