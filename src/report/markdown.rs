use crate::analyzer::kpi::KpiRow;
use crate::analyzer::review_stats::percent;
use crate::analyzer::ReviewSummary;
use crate::cleaner::CleaningReport;
use crate::model::{DropReason, ReportError, SentimentLabel};
use chrono::NaiveDate;
use std::fs;
use std::path::Path;
use tracing::info;

const SENTIMENT_CHART: &str = "sentiment_distribution.png";
const SENTIMENT_BY_BANK_CHART: &str = "sentiment_by_bank.png";
const RATING_CHART: &str = "rating_distribution_by_bank.png";
const AVG_RATING_CHART: &str = "average_rating_by_bank.png";
const KEYWORDS_CHART: &str = "top_keywords.png";

/// Everything the report needs. The analyzer and KPI rows are computed by the caller.
pub struct ReportInput<'a> {
    pub summary: &'a ReviewSummary,
    pub kpis: &'a [KpiRow],
    pub cleaning: Option<&'a CleaningReport>,
    pub charts_dir: &'a str,
    pub sentiment_model: &'a str,
    pub generated_on: NaiveDate,
}

fn chart(dir: &str, alt: &str, file: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        format!("![{}]({})\n\n", alt, file)
    } else {
        format!("![{}]({}/{})\n\n", alt, dir, file)
    }
}

/// Table cells must not break the row.
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn keyword_table(title: &str, keywords: &[(String, usize)]) -> String {
    let mut out = format!("### {}\n\n", title);
    if keywords.is_empty() {
        out.push_str("_No reviews in this group._\n\n");
        return out;
    }
    out.push_str("| Rank | Keyword | Mentions |\n|---:|---|---:|\n");
    for (i, (word, count)) in keywords.iter().enumerate() {
        out.push_str(&format!("| {} | {} | {} |\n", i + 1, cell(word), count));
    }
    out.push('\n');
    out
}

pub fn render(input: &ReportInput<'_>) -> String {
    let summary = input.summary;
    let mut md = String::new();

    md.push_str("# Customer Experience Analytics: Mobile Banking App Reviews\n\n");
    md.push_str(&format!("_Generated on {}._\n\n", input.generated_on.format("%Y-%m-%d")));

    md.push_str("## 1. Overview\n\n");
    md.push_str(&format!(
        "This report covers **{}** Google Play reviews across **{}** banks. \
         Reviews were scraped, cleaned, tagged with the `{}` sentiment model \
         and loaded into SQLite.\n\n",
        summary.total_reviews,
        summary.banks.len(),
        input.sentiment_model
    ));
    if !summary.banks.is_empty() {
        md.push_str("| Bank | Code | Reviews |\n|---|---|---:|\n");
        for bank in &summary.banks {
            md.push_str(&format!(
                "| {} | {} | {} |\n",
                cell(&bank.bank_name),
                cell(&bank.bank_code),
                bank.review_count
            ));
        }
        md.push('\n');
    }

    md.push_str("## 2. Data Quality KPIs\n\n");
    md.push_str("| KPI | Target | Actual | Status |\n|---|---|---|---|\n");
    for row in input.kpis {
        md.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            row.name, row.target, row.actual, row.status
        ));
    }
    md.push('\n');
    if let Some(cleaning) = input.cleaning {
        md.push_str(&format!(
            "Cleaning started from {} raw records: {} duplicates removed, \
             {} dropped for missing fields, {} for unparseable dates and {} for invalid ratings, \
             leaving {} ({:.2}% loss).\n\n",
            cleaning.original_count,
            cleaning.duplicates_removed,
            cleaning.dropped(DropReason::MissingField),
            cleaning.dropped(DropReason::DateParseFailure),
            cleaning.dropped(DropReason::InvalidRating),
            cleaning.final_count,
            cleaning.total_loss_fraction() * 100.0
        ));
    }

    md.push_str("## 3. Sentiment Overview\n\n");
    md.push_str("| Sentiment | Reviews | Share |\n|---|---:|---:|\n");
    for label in SentimentLabel::ALL {
        let count = summary.sentiment_counts.get(&label).copied().unwrap_or(0);
        md.push_str(&format!(
            "| {} | {} | {:.1}% |\n",
            label,
            count,
            percent(count, summary.total_reviews)
        ));
    }
    md.push('\n');
    md.push_str(&chart(input.charts_dir, "Sentiment distribution", SENTIMENT_CHART));

    md.push_str("### Sentiment by bank\n\n");
    md.push_str("| Bank | Positive | Negative | Neutral |\n|---|---:|---:|---:|\n");
    for bank in &summary.banks {
        md.push_str(&format!(
            "| {} | {:.1}% | {:.1}% | {:.1}% |\n",
            cell(&bank.bank_name),
            bank.sentiment_pct(SentimentLabel::Positive),
            bank.sentiment_pct(SentimentLabel::Negative),
            bank.sentiment_pct(SentimentLabel::Neutral)
        ));
    }
    md.push('\n');
    md.push_str(&chart(input.charts_dir, "Sentiment by bank", SENTIMENT_BY_BANK_CHART));

    md.push_str("## 4. Ratings by Bank\n\n");
    md.push_str("| Bank | Reviews | Avg rating | 1★ | 2★ | 3★ | 4★ | 5★ |\n");
    md.push_str("|---|---:|---:|---:|---:|---:|---:|---:|\n");
    for bank in &summary.banks {
        let d = bank.rating_distribution;
        md.push_str(&format!(
            "| {} | {} | {:.2} | {} | {} | {} | {} | {} |\n",
            cell(&bank.bank_name),
            bank.review_count,
            bank.avg_rating,
            d[0],
            d[1],
            d[2],
            d[3],
            d[4]
        ));
    }
    md.push('\n');
    md.push_str(&chart(input.charts_dir, "Rating distribution by bank", RATING_CHART));
    md.push_str(&chart(input.charts_dir, "Average rating by bank", AVG_RATING_CHART));

    md.push_str("## 5. Keyword Drivers\n\n");
    md.push_str(&keyword_table("Positive reviews", &summary.top_positive_keywords));
    md.push_str(&keyword_table("Negative reviews", &summary.top_negative_keywords));
    md.push_str(&chart(input.charts_dir, "Top keywords", KEYWORDS_CHART));

    md.push_str("## 6. Limitations\n\n");
    md.push_str(
        "- Only English-language Google Play reviews are collected; \
         Amharic feedback is not represented.\n",
    );
    md.push_str(
        "- Store reviews skew toward users with strong opinions \
         and may not reflect the whole customer base.\n",
    );
    md.push_str(
        "- Sentiment is inferred automatically \
         and can misread sarcasm, slang or mixed reviews.\n",
    );
    md.push_str("- Keywords are raw frequency counts without stemming or phrase detection.\n");
    if input.cleaning.is_none() {
        md.push_str(
            "- No cleaning report was found, so data loss could not be measured for this run.\n",
        );
    }

    md
}

pub fn write_report(path: &Path, content: &str) -> Result<(), ReportError> {
    let io_err = |source| ReportError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, content).map_err(io_err)?;
    info!("Report written to {}", path.display());
    Ok(())
}
