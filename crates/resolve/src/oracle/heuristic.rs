//! Heuristic oracle: decides without calling out anywhere.
//!
//! Used when no LLM is configured. It never invents a value: it fills only
//! from what the user typed and reuses only what an earlier occurrence set.

use async_trait::async_trait;

use super::{Decision, DecisionOracle, OracleError, OracleRequest};

/// Label words that mark a blank as money-like. Money-like blanks are asked
/// for every time instead of reusing the label's global value.
const MONEY_WORDS: [&str; 6] = ["AMOUNT", "PRICE", "CAP", "VALUATION", "PURCHASE", "FEE"];

const FILL_CONFIDENCE: f64 = 0.9;
const REUSE_CONFIDENCE: f64 = 0.8;
const ASK_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicOracle;

impl HeuristicOracle {
    pub fn new() -> Self {
        Self
    }
}

/// Whether a label looks like an independent per-occurrence amount.
pub fn is_money_like(label: &str) -> bool {
    if label.contains('$') {
        return true;
    }
    let upper = label.to_uppercase();
    upper
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| MONEY_WORDS.contains(&word))
}

#[async_trait]
impl DecisionOracle for HeuristicOracle {
    async fn decide(&self, request: &OracleRequest) -> Result<Decision, OracleError> {
        let input = request.user_input.trim();
        if !input.is_empty() {
            return Ok(Decision::fill(input, FILL_CONFIDENCE));
        }

        let label = request.placeholder_label.as_str();
        if !request.previous_global_value.trim().is_empty() && !is_money_like(label) {
            return Ok(Decision::reuse(REUSE_CONFIDENCE));
        }

        Ok(Decision::ask(question_for(label, &request.occurrence_context), ASK_CONFIDENCE))
    }
}

fn question_for(label: &str, context: &str) -> String {
    let what = if is_money_like(label) {
        "the amount"
    } else {
        "the value"
    };
    if context.trim().is_empty() {
        format!("Please provide {} for {}.", what, label)
    } else {
        format!("Please provide {} for {} (in: \"{}\").", what, label, snippet(context))
    }
}

/// A short excerpt of the context, at most 12 words.
fn snippet(context: &str) -> String {
    let words: Vec<&str> = context.split_whitespace().collect();
    if words.len() <= 12 {
        words.join(" ")
    } else {
        format!("{} ...", words[..12].join(" "))
    }
}
