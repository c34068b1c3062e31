//! Built-in reference evaluators. All of them are pure pattern matchers over
//! the raw utterance; anything that needs live data belongs in an action or
//! an enrichment provider instead.

use agora_core::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

use crate::evaluator::{DispatchContext, Evaluator, EvaluatorResult};

static ADDRESS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"0x[a-fA-F0-9]{40}").unwrap());
static TICKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$([A-Za-z][A-Za-z0-9]{1,9})\b").unwrap());

/// First contract address in the utterance, if any.
pub fn extract_address(utterance: &str) -> Option<String> {
    ADDRESS_RE
        .find(utterance)
        .map(|m| m.as_str().to_lowercase())
}

/// First `$TICKER` mention in the utterance, uppercased.
pub fn extract_ticker(utterance: &str) -> Option<String> {
    TICKER_RE
        .captures(utterance)
        .map(|c| c[1].to_uppercase())
}

/// Detects a concrete token mention: a contract address, a `$TICKER`, or a
/// weaker bare-keyword hint that stays below the dispatch threshold.
pub struct TokenMentionEvaluator;

#[async_trait]
impl Evaluator for TokenMentionEvaluator {
    fn name(&self) -> &'static str {
        "token_mention"
    }

    async fn evaluate(&self, ctx: &DispatchContext) -> Result<EvaluatorResult> {
        if let Some(address) = extract_address(&ctx.utterance) {
            let mut data = json!({ "address": address });
            if let Some(symbol) = extract_ticker(&ctx.utterance) {
                data["symbol"] = json!(symbol);
            }
            return Ok(EvaluatorResult::matched(0.95, "contract address present").with_data(data));
        }
        if let Some(symbol) = extract_ticker(&ctx.utterance) {
            return Ok(EvaluatorResult::matched(0.9, "ticker mention")
                .with_data(json!({ "symbol": symbol })));
        }

        let lower = ctx.utterance.to_lowercase();
        for keyword in ["token", "contract", " ca ", "coin"] {
            if lower.contains(keyword) {
                return Ok(EvaluatorResult::matched(0.3, "vague token talk"));
            }
        }
        Ok(EvaluatorResult::no_match("no token reference"))
    }
}

const PRICE_KEYWORDS: &[&str] = &[
    "price", "worth", "chart", "mcap", "market cap", "pump", "dump", "how much is",
    "all time high", "volume",
];

/// Detects a price or market-stats question.
pub struct PriceQueryEvaluator;

#[async_trait]
impl Evaluator for PriceQueryEvaluator {
    fn name(&self) -> &'static str {
        "price_query"
    }

    async fn evaluate(&self, ctx: &DispatchContext) -> Result<EvaluatorResult> {
        let lower = ctx.utterance.to_lowercase();
        let keyword_hit = PRICE_KEYWORDS.iter().any(|k| lower.contains(k));
        if !keyword_hit {
            return Ok(EvaluatorResult::no_match("no price language"));
        }
        // A concrete token alongside the question makes the intent firm.
        if extract_address(&ctx.utterance).is_some() || extract_ticker(&ctx.utterance).is_some() {
            return Ok(EvaluatorResult::matched(0.85, "price question about a named token"));
        }
        Ok(EvaluatorResult::matched(0.7, "price question"))
    }
}

const SCAN_KEYWORDS: &[&str] = &[
    "scan", "rug", "honeypot", "is this safe", "is it safe", "audit", "lp locked", "renounced",
];

/// Detects a request to inspect a token or contract for risk.
pub struct ScanRequestEvaluator;

#[async_trait]
impl Evaluator for ScanRequestEvaluator {
    fn name(&self) -> &'static str {
        "scan_request"
    }

    async fn evaluate(&self, ctx: &DispatchContext) -> Result<EvaluatorResult> {
        let lower = ctx.utterance.to_lowercase();
        if !SCAN_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return Ok(EvaluatorResult::no_match("no scan language"));
        }
        let mut result = if extract_address(&ctx.utterance).is_some() {
            EvaluatorResult::matched(0.9, "scan request with contract address")
        } else {
            EvaluatorResult::matched(0.8, "scan request")
        };
        if let Some(address) = extract_address(&ctx.utterance) {
            result = result.with_data(json!({ "address": address }));
        } else if let Some(symbol) = extract_ticker(&ctx.utterance) {
            result = result.with_data(json!({ "symbol": symbol }));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(utterance: &str) -> DispatchContext {
        DispatchContext::new("finn", utterance)
    }

    #[tokio::test]
    async fn test_token_mention_by_address() {
        let result = TokenMentionEvaluator
            .evaluate(&ctx("is 0x1234567890abcdef1234567890abcdef12345678 legit?"))
            .await
            .unwrap();
        assert!(result.score >= 0.9);
        assert_eq!(
            result.data.unwrap()["address"],
            "0x1234567890abcdef1234567890abcdef12345678"
        );
    }

    #[tokio::test]
    async fn test_token_mention_by_ticker() {
        let result = TokenMentionEvaluator
            .evaluate(&ctx("what do you think of $MINO today"))
            .await
            .unwrap();
        assert!(result.score >= 0.5);
        assert_eq!(result.data.unwrap()["symbol"], "MINO");
    }

    #[tokio::test]
    async fn test_vague_token_talk_stays_below_threshold() {
        let result = TokenMentionEvaluator
            .evaluate(&ctx("any good token launches lately?"))
            .await
            .unwrap();
        assert!(result.score > 0.0);
        assert!(result.score < 0.5);
    }

    #[tokio::test]
    async fn test_no_match_scores_zero() {
        let result = TokenMentionEvaluator
            .evaluate(&ctx("good morning everyone"))
            .await
            .unwrap();
        assert_eq!(result.score, 0.0);
    }

    #[tokio::test]
    async fn test_price_query() {
        let vague = PriceQueryEvaluator
            .evaluate(&ctx("what's the price looking like"))
            .await
            .unwrap();
        assert_eq!(vague.score, 0.7);

        let firm = PriceQueryEvaluator
            .evaluate(&ctx("what's the price of $MINO"))
            .await
            .unwrap();
        assert_eq!(firm.score, 0.85);
    }

    #[tokio::test]
    async fn test_scan_request() {
        let result = ScanRequestEvaluator
            .evaluate(&ctx("scan 0x1234567890abcdef1234567890abcdef12345678 please"))
            .await
            .unwrap();
        assert_eq!(result.score, 0.9);
        assert!(result.data.is_some());

        let no_match = ScanRequestEvaluator.evaluate(&ctx("gm")).await.unwrap();
        assert_eq!(no_match.score, 0.0);
    }
}
