//! Best-effort recovery of a [`Decision`] from model output.
//!
//! Each layer is a plain `&str -> Option<Decision>` function. Callers fold an
//! ordered slice of them and keep the first hit:
//!
//! 1. [`parse_strict`] - the whole text is one JSON object.
//! 2. [`parse_loose`] - the first `{` through the last `}` is one JSON object.
//! 3. [`scrape_fields`] - per-key pattern matching over broken JSON.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::domain::decision::Decision;

pub type DecisionParser = fn(&str) -> Option<Decision>;

pub const STRUCTURED_PARSERS: [DecisionParser; 2] = [parse_strict, parse_loose];
pub const ALL_PARSERS: [DecisionParser; 3] = [parse_strict, parse_loose, scrape_fields];

pub const PREVIEW_CHARS: usize = 200;

pub fn parse_with(parsers: &[DecisionParser], raw: &str) -> Option<Decision> {
    parsers.iter().find_map(|parser| parser(raw))
}

pub fn parse_structured(raw: &str) -> Option<Decision> {
    parse_with(&STRUCTURED_PARSERS, raw)
}

pub fn parse_decision(raw: &str) -> Option<Decision> {
    parse_with(&ALL_PARSERS, raw)
}

pub fn parse_strict(raw: &str) -> Option<Decision> {
    match serde_json::from_str::<Value>(raw).ok()? {
        Value::Object(map) => Some(decision_from_object(&map)),
        _ => None,
    }
}

pub fn parse_loose(raw: &str) -> Option<Decision> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    parse_strict(&raw[start..=end])
}

pub fn scrape_fields(raw: &str) -> Option<Decision> {
    let decision = Decision {
        complexity: scrape_string(raw, StringKey::Complexity),
        payment_required: scrape_payment_required(raw),
        amount_usdc: scrape_amount(raw),
        reason: scrape_string(raw, StringKey::Reason),
        analysis: scrape_string(raw, StringKey::Analysis),
    };
    decision.has_any_field().then_some(decision)
}

/// True when the text looks like a JSON object cut off mid-stream.
pub fn looks_truncated(raw: &str) -> bool {
    if raw.contains('{') && !raw.contains('}') {
        return true;
    }

    let trimmed = raw.trim();
    trimmed.starts_with('{') && trimmed.ends_with(['"', ':', '_', ','])
}

/// First [`PREVIEW_CHARS`] characters of `raw`, and whether anything was cut.
pub fn raw_preview(raw: &str) -> (String, bool) {
    let mut chars = raw.chars();
    let preview: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    (preview, chars.next().is_some())
}

// Wrong-typed fields read as absent instead of failing the whole object.
fn decision_from_object(map: &Map<String, Value>) -> Decision {
    let string_field = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);

    Decision {
        complexity: string_field("complexity"),
        payment_required: map.get("payment_required").and_then(Value::as_bool),
        amount_usdc: map.get("amount_usdc").and_then(Value::as_f64),
        reason: string_field("reason"),
        analysis: string_field("analysis"),
    }
}

#[derive(Clone, Copy)]
enum StringKey {
    Complexity,
    Reason,
    Analysis,
}

fn string_opener(key: StringKey) -> &'static Regex {
    static COMPLEXITY: OnceLock<Regex> = OnceLock::new();
    static REASON: OnceLock<Regex> = OnceLock::new();
    static ANALYSIS: OnceLock<Regex> = OnceLock::new();

    match key {
        StringKey::Complexity => COMPLEXITY.get_or_init(|| {
            Regex::new(r#""complexity"\s*:\s*""#).expect("complexity opener regex is valid")
        }),
        StringKey::Reason => REASON.get_or_init(|| {
            Regex::new(r#""reason"\s*:\s*""#).expect("reason opener regex is valid")
        }),
        StringKey::Analysis => ANALYSIS.get_or_init(|| {
            Regex::new(r#""analysis"\s*:\s*""#).expect("analysis opener regex is valid")
        }),
    }
}

fn scrape_string(raw: &str, key: StringKey) -> Option<String> {
    string_opener(key)
        .find_iter(raw)
        .find_map(|opening| {
            let body = &raw[opening.end()..];
            body.match_indices('"')
                .find(|(index, _)| closes_string_value(&body[index + 1..]))
                .map(|(index, _)| &body[..index])
        })
        .map(|value| value.replace('\r', "").trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Whether a quote followed by `rest` ends a string value: next comes another
/// `, "key"`, a closing brace, or a line/text end.
fn closes_string_value(rest: &str) -> bool {
    let after_whitespace = rest.trim_start();
    let whitespace = &rest[..rest.len() - after_whitespace.len()];

    if after_whitespace.is_empty() || whitespace.contains(['\n', '\r']) {
        return true;
    }
    if after_whitespace.starts_with('}') {
        return true;
    }
    after_whitespace
        .strip_prefix(',')
        .is_some_and(|next| next.trim_start().starts_with('"'))
}

fn scrape_payment_required(raw: &str) -> Option<bool> {
    static PAYMENT_REQUIRED: OnceLock<Regex> = OnceLock::new();
    let pattern = PAYMENT_REQUIRED.get_or_init(|| {
        Regex::new(r#"(?i)"payment_required"\s*:\s*(true|false)"#)
            .expect("payment_required regex is valid")
    });
    let captures = pattern.captures(raw)?;
    Some(captures.get(1)?.as_str().eq_ignore_ascii_case("true"))
}

fn scrape_amount(raw: &str) -> Option<f64> {
    static AMOUNT_USDC: OnceLock<Regex> = OnceLock::new();
    let pattern = AMOUNT_USDC.get_or_init(|| {
        Regex::new(r#"(?i)"amount_usdc"\s*:\s*([0-9]+(?:\.[0-9]+)?)"#)
            .expect("amount_usdc regex is valid")
    });
    let captures = pattern.captures(raw)?;
    captures.get(1)?.as_str().parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::{
        looks_truncated, parse_decision, parse_loose, parse_strict, parse_structured, raw_preview,
        scrape_fields, PREVIEW_CHARS,
    };
    use crate::domain::decision::Decision;

    const FULL: &str = r#"{"complexity":"HIGH","payment_required":true,"amount_usdc":0.1,"reason":"r","analysis":"a"}"#;

    #[test]
    fn strict_parse_returns_the_exact_object() {
        let decision = parse_strict(FULL).expect("strict parse");
        assert_eq!(
            decision,
            Decision {
                complexity: Some("HIGH".to_string()),
                payment_required: Some(true),
                amount_usdc: Some(0.1),
                reason: Some("r".to_string()),
                analysis: Some("a".to_string()),
            }
        );
    }

    #[test]
    fn strict_parse_rejects_prose_and_non_objects() {
        assert_eq!(parse_strict("Here: {\"complexity\":\"LOW\"}"), None);
        assert_eq!(parse_strict("[1, 2]"), None);
        assert_eq!(parse_strict("null"), None);
        assert_eq!(parse_strict(""), None);
    }

    #[test]
    fn strict_parse_treats_wrong_types_as_absent() {
        let decision =
            parse_strict(r#"{"complexity": 3, "payment_required": "yes", "reason": "ok"}"#)
                .expect("object parses");
        assert_eq!(decision.complexity, None);
        assert_eq!(decision.payment_required, None);
        assert_eq!(decision.reason.as_deref(), Some("ok"));
    }

    #[test]
    fn loose_extraction_strips_surrounding_prose() {
        let raw = r#"Sure! Here you go: {"complexity":"MEDIUM","reason":"ok"} Thanks."#;
        assert_eq!(parse_strict(raw), None);

        let decision = parse_loose(raw).expect("loose parse");
        assert_eq!(
            decision,
            Decision {
                complexity: Some("MEDIUM".to_string()),
                reason: Some("ok".to_string()),
                ..Decision::default()
            }
        );
    }

    #[test]
    fn loose_extraction_handles_markdown_fences() {
        let raw = "```json\n{\"complexity\": \"LOW\", \"analysis\": \"fine\"}\n```";
        let decision = parse_structured(raw).expect("fenced json");
        assert_eq!(decision.complexity.as_deref(), Some("LOW"));
        assert_eq!(decision.analysis.as_deref(), Some("fine"));
    }

    #[test]
    fn loose_extraction_needs_ordered_braces() {
        assert_eq!(parse_loose("no braces here"), None);
        assert_eq!(parse_loose("} backwards {"), None);
        assert_eq!(parse_loose("{\"complexity\": \"HIGH\""), None);
    }

    #[test]
    fn scraping_recovers_fields_from_truncated_output() {
        let raw = "{\"complexity\": \"HIGH\", \"reason\": \"long text with\nunescaped newline and no closing brace";
        assert_eq!(parse_structured(raw), None);

        let decision = scrape_fields(raw).expect("scraped");
        assert_eq!(decision.complexity.as_deref(), Some("HIGH"));
        assert_eq!(decision.reason, None);
        assert_eq!(decision.payment_required, None);
        assert_eq!(decision.amount_usdc, None);
    }

    #[test]
    fn scraping_reads_multiline_values_and_strips_carriage_returns() {
        let raw = "{\"complexity\": \"MEDIUM\", \"analysis\": \"line one\r\nline \"two\" here\r\n\", \"reason\": \"why\"";
        let decision = scrape_fields(raw).expect("scraped");

        assert_eq!(decision.complexity.as_deref(), Some("MEDIUM"));
        assert_eq!(decision.analysis.as_deref(), Some("line one\nline \"two\" here"));
        assert_eq!(decision.reason.as_deref(), Some("why"));
    }

    #[test]
    fn scraping_reads_boolean_and_amount_case_insensitively() {
        let raw = "{\"PAYMENT_REQUIRED\": TRUE, \"Amount_USDC\": 0.05, broken";
        let decision = scrape_fields(raw).expect("scraped");

        assert_eq!(decision.payment_required, Some(true));
        assert_eq!(decision.amount_usdc, Some(0.05));
        assert_eq!(decision.complexity, None);
    }

    #[test]
    fn scraping_patterns_are_reused_across_calls() {
        let first = "{\"complexity\": \"LOW\", \"reason\": \"short\", \"analysis\": \"x\", \"amount_usdc\": 1";
        let second = "{\"complexity\": \"HIGH\", \"payment_required\": false, \"reason\": \"deep";

        for _ in 0..3 {
            let decision = scrape_fields(first).expect("first scraped");
            assert_eq!(decision.complexity.as_deref(), Some("LOW"));
            assert_eq!(decision.reason.as_deref(), Some("short"));
            assert_eq!(decision.analysis.as_deref(), Some("x"));
            assert_eq!(decision.amount_usdc, Some(1.0));

            let decision = scrape_fields(second).expect("second scraped");
            assert_eq!(decision.complexity.as_deref(), Some("HIGH"));
            assert_eq!(decision.payment_required, Some(false));
            assert_eq!(decision.reason, None);
        }
    }

    #[test]
    fn scraping_fails_when_nothing_is_recognisable() {
        assert_eq!(scrape_fields("I cannot help with that."), None);
        assert_eq!(scrape_fields("{\"complexity\": \"\", \"other\": 1"), None);
        assert_eq!(parse_decision("totally unrelated"), None);
    }

    #[test]
    fn full_chain_prefers_structured_results() {
        let decision = parse_decision(FULL).expect("parsed");
        assert_eq!(decision.analysis.as_deref(), Some("a"));
    }

    #[test]
    fn truncation_heuristic() {
        assert!(looks_truncated("{\"complexity\": \"HIGH\", \"reason\": \"cut"));
        assert!(looks_truncated("{\"complexity\": \"HIGH\"} {\"reason\":"));
        assert!(looks_truncated("  {\"complexity\": \"HIGH\", \"amount_"));
        assert!(looks_truncated("{\"complexity\": \"HIGH\","));
        assert!(!looks_truncated(FULL));
        assert!(!looks_truncated("plain prose without braces"));
        assert!(!looks_truncated("prefix {\"a\": 1} \"tail\":"));
    }

    #[test]
    fn preview_is_bounded() {
        let (short, cut) = raw_preview("tiny");
        assert_eq!(short, "tiny");
        assert!(!cut);

        let long = "é".repeat(PREVIEW_CHARS + 20);
        let (preview, cut) = raw_preview(&long);
        assert_eq!(preview.chars().count(), PREVIEW_CHARS);
        assert!(cut);

        let (exact, cut) = raw_preview(&"x".repeat(PREVIEW_CHARS));
        assert_eq!(exact.len(), PREVIEW_CHARS);
        assert!(!cut);
    }
}
