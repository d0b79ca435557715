use crate::model::{SentimentError, SentimentLabel, SentimentResult};
use crate::sentiment::SentimentModel;
use crate::utils::tokenize;
use std::collections::{HashMap, HashSet};

/// Net scores inside this band are Neutral.
const NEUTRAL_BAND: f64 = 0.5;
/// How many following tokens a negator flips.
const NEGATION_WINDOW: usize = 3;

/// Offline word-weight classifier tuned for app-store review vocabulary.
pub struct LexiconModel {
    weights: HashMap<&'static str, f64>,
    negators: HashSet<&'static str>,
}

impl LexiconModel {
    pub fn new() -> Self {
        let positive: &[(&str, f64)] = &[
            ("good", 1.0),
            ("great", 1.5),
            ("excellent", 2.0),
            ("best", 1.5),
            ("nice", 1.0),
            ("amazing", 2.0),
            ("awesome", 2.0),
            ("love", 1.5),
            ("like", 0.5),
            ("easy", 1.0),
            ("fast", 1.0),
            ("smooth", 1.0),
            ("helpful", 1.0),
            ("perfect", 2.0),
            ("wonderful", 2.0),
            ("fantastic", 2.0),
            ("convenient", 1.0),
            ("reliable", 1.0),
            ("simple", 0.5),
            ("useful", 1.0),
            ("thanks", 0.5),
            ("thank", 0.5),
            ("wow", 1.0),
            ("super", 1.0),
            ("efficient", 1.0),
            ("secure", 0.5),
            ("work", 0.5),
            ("works", 0.5),
        ];
        let negative: &[(&str, f64)] = &[
            ("bad", -1.0),
            ("worst", -2.0),
            ("poor", -1.0),
            ("terrible", -2.0),
            ("horrible", -2.0),
            ("useless", -2.0),
            ("slow", -1.0),
            ("crash", -1.5),
            ("crashes", -1.5),
            ("crashing", -1.5),
            ("bug", -1.0),
            ("bugs", -1.0),
            ("error", -1.0),
            ("errors", -1.0),
            ("fail", -1.5),
            ("fails", -1.5),
            ("failed", -1.5),
            ("failure", -1.5),
            ("problem", -1.0),
            ("problems", -1.0),
            ("issue", -0.5),
            ("issues", -0.5),
            ("annoying", -1.0),
            ("disappointed", -1.5),
            ("disappointing", -1.5),
            ("hate", -2.0),
            ("stuck", -1.0),
            ("freeze", -1.0),
            ("freezes", -1.0),
            ("waste", -1.5),
            ("unable", -1.0),
            ("fix", -0.5),
        ];
        let negators = [
            "not", "no", "never", "don't", "doesn't", "isn't", "wasn't", "can't", "cannot",
            "won't", "didn't", "dont", "doesnt", "cant", "wont", "without",
        ];

        Self {
            weights: positive.iter().chain(negative.iter()).copied().collect(),
            negators: negators.into_iter().collect(),
        }
    }

    /// Net polarity of the text; positive numbers lean Positive.
    pub fn score(&self, text: &str) -> f64 {
        let mut total = 0.0;
        let mut negate_left = 0usize;
        for token in tokenize(text) {
            if self.negators.contains(token.as_str()) {
                negate_left = NEGATION_WINDOW;
                continue;
            }
            if let Some(&w) = self.weights.get(token.as_str()) {
                total += if negate_left > 0 { -w } else { w };
            }
            negate_left = negate_left.saturating_sub(1);
        }
        total
    }

    fn result_for(score: f64) -> SentimentResult {
        let magnitude = score.abs().tanh();
        if score.abs() < NEUTRAL_BAND {
            SentimentResult {
                label: SentimentLabel::Neutral,
                score: 1.0 - magnitude,
            }
        } else {
            SentimentResult {
                label: if score > 0.0 {
                    SentimentLabel::Positive
                } else {
                    SentimentLabel::Negative
                },
                score: 0.5 + 0.5 * magnitude,
            }
        }
    }
}

impl Default for LexiconModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SentimentModel for LexiconModel {
    async fn classify(&self, text: &str) -> Result<SentimentResult, SentimentError> {
        Ok(Self::result_for(self.score(text)))
    }

    fn name(&self) -> &'static str {
        "lexicon"
    }
}
