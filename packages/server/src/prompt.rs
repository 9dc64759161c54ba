//! Prompt construction and reply parsing for the AI proxy endpoint.

use std::sync::LazyLock;

use ocp_explorer_ai_models::ProxyContext;
use ocp_explorer_plan_models::Coordinates;
use regex::Regex;
use serde::Deserialize;

/// Confidence reported when the model's reply is not the requested JSON.
pub const FALLBACK_CONFIDENCE: f64 = 0.5;

static POLICY_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{1,2}\.\d{1,2}\b").expect("valid regex"));

static JSON_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*\})\s*```").expect("valid regex"));

/// System prompt grounding the model in the plan context.
#[must_use]
pub fn build_system_prompt(context: &ProxyContext, location: Option<Coordinates>) -> String {
    let plan_name = if context.plan_name.is_empty() {
        "the municipality"
    } else {
        context.plan_name.as_str()
    };

    let categories = context
        .categories
        .iter()
        .map(|c| {
            let designations = c
                .designations
                .iter()
                .map(|d| format!("{} ({})", d.code, d.name))
                .collect::<Vec<_>>()
                .join(", ");
            format!("- {}: {designations}", c.category)
        })
        .collect::<Vec<_>>()
        .join("\n");

    let policies = context
        .policy_samples
        .iter()
        .map(|p| format!("- {}: {}", p.path, p.title))
        .collect::<Vec<_>>()
        .join("\n");

    let matches = if context.local_matches.is_empty() {
        "none".to_string()
    } else {
        context
            .local_matches
            .iter()
            .map(|m| format!("- {} {}: {}", m.kind, m.id, m.name))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let location = location.map_or_else(
        || "not specified".to_string(),
        |c| format!("{:.5}, {:.5}", c.lat, c.lng),
    );

    format!(
        r#"You are a planning assistant for the {plan_name} Official Community Plan. You answer residents' questions about land-use designations, zoning and plan policies.

## Plan Context
Land-use categories and designations:
{categories}

All designation codes: {codes}

Policy samples:
{policies}

Local search matches for this question:
{matches}

Location of interest: {location}

## Instructions
1. Base your answer on the plan context above. Do NOT invent designations, zones or policy numbers.
2. Refer to designations by their codes (e.g. RD, MH) and to policies by number (e.g. 1.2).
3. If the plan context does not answer the question, say so.
4. Reply with a single JSON object and nothing else:
{{"answer": string, "confidence": number between 0 and 1, "mentionedAreas": [designation codes], "mentionedPolicies": [policy numbers], "citations": [short source references]}}"#,
        codes = context.land_use_codes.join(", "),
    )
}

/// The JSON object the model is asked to reply with.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ModelReply {
    answer: String,
    confidence: Option<f64>,
    mentioned_areas: Vec<String>,
    mentioned_policies: Vec<String>,
    citations: Vec<String>,
}

/// A model reply, parsed or recovered from free text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReply {
    /// Answer text.
    pub answer: String,
    /// Confidence in `0.0..=1.0`.
    pub confidence: f64,
    /// Designation codes mentioned.
    pub mentioned_areas: Vec<String>,
    /// Policy numbers mentioned.
    pub mentioned_policies: Vec<String>,
    /// Citations.
    pub citations: Vec<String>,
}

/// Parses the model's reply.
///
/// A JSON object (bare or in a code fence) is used as-is. Anything else is
/// taken as the answer text, with [`FALLBACK_CONFIDENCE`] and mentions
/// scanned out of the text.
#[must_use]
pub fn parse_reply(text: &str, context: &ProxyContext) -> ParsedReply {
    if let Some(reply) = extract_json(text)
        && !reply.answer.trim().is_empty()
    {
        return ParsedReply {
            answer: reply.answer,
            confidence: reply
                .confidence
                .filter(|c| c.is_finite())
                .map_or(FALLBACK_CONFIDENCE, |c| c.clamp(0.0, 1.0)),
            mentioned_areas: reply.mentioned_areas,
            mentioned_policies: reply.mentioned_policies,
            citations: reply.citations,
        };
    }

    log::debug!("Model reply was not JSON, using raw text");
    let answer = text.trim().to_string();
    ParsedReply {
        mentioned_areas: mentioned_areas(&answer, &context.land_use_codes),
        mentioned_policies: mentioned_policies(&answer),
        answer,
        confidence: FALLBACK_CONFIDENCE,
        citations: Vec::new(),
    }
}

fn extract_json(text: &str) -> Option<ModelReply> {
    let text = text.trim();
    let candidate = JSON_FENCE_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map_or_else(
            || {
                let start = text.find('{')?;
                let end = text.rfind('}')?;
                (start < end).then(|| &text[start..=end])
            },
            |m| Some(m.as_str()),
        )?;
    serde_json::from_str(candidate).ok()
}

/// Known designation codes appearing as whole words in `text`.
fn mentioned_areas(text: &str, codes: &[String]) -> Vec<String> {
    codes
        .iter()
        .filter(|code| {
            Regex::new(&format!(r"\b{}\b", regex::escape(code)))
                .is_ok_and(|re| re.is_match(text))
        })
        .cloned()
        .collect()
}

/// `N.N` policy numbers in `text`, in order of first appearance.
fn mentioned_policies(text: &str) -> Vec<String> {
    let mut policies: Vec<String> = Vec::new();
    for m in POLICY_NUMBER_RE.find_iter(text) {
        if !policies.iter().any(|p| p == m.as_str()) {
            policies.push(m.as_str().to_string());
        }
    }
    policies
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocp_explorer_ai_models::{CategorySample, DesignationSample, LocalMatch, PolicySample};

    fn context() -> ProxyContext {
        ProxyContext {
            plan_name: "New Westminster".to_string(),
            categories: vec![CategorySample {
                category: "residential".to_string(),
                designations: vec![DesignationSample {
                    code: "RD".to_string(),
                    name: "Residential - Detached".to_string(),
                }],
            }],
            land_use_codes: vec!["RD".to_string(), "MH".to_string(), "C".to_string()],
            policy_samples: vec![PolicySample {
                path: "housing.1.1".to_string(),
                title: "Housing Choice".to_string(),
            }],
            local_matches: vec![LocalMatch {
                kind: "land-use".to_string(),
                id: "RD".to_string(),
                name: "Residential - Detached".to_string(),
            }],
        }
    }

    #[test]
    fn prompt_includes_context() {
        let prompt = build_system_prompt(&context(), Some(Coordinates::new(49.2057, -122.911)));
        assert!(prompt.contains("New Westminster Official Community Plan"));
        assert!(prompt.contains("- residential: RD (Residential - Detached)"));
        assert!(prompt.contains("All designation codes: RD, MH, C"));
        assert!(prompt.contains("- housing.1.1: Housing Choice"));
        assert!(prompt.contains("- land-use RD: Residential - Detached"));
        assert!(prompt.contains("49.20570, -122.91100"));
        assert!(prompt.contains(r#"{"answer": string"#));
    }

    #[test]
    fn prompt_without_location_or_matches() {
        let ctx = ProxyContext::default();
        let prompt = build_system_prompt(&ctx, None);
        assert!(prompt.contains("the municipality Official Community Plan"));
        assert!(prompt.contains("Location of interest: not specified"));
        assert!(prompt.contains("Local search matches for this question:\nnone"));
    }

    #[test]
    fn parses_json_reply() {
        let reply = parse_reply(
            r#"{"answer":"Towers go in MH.","confidence":0.9,"mentionedAreas":["MH"],"mentionedPolicies":["2.1"],"citations":["OCP 2.1"]}"#,
            &context(),
        );
        assert_eq!(reply.answer, "Towers go in MH.");
        assert!((reply.confidence - 0.9).abs() < f64::EPSILON);
        assert_eq!(reply.mentioned_areas, vec!["MH"]);
        assert_eq!(reply.citations, vec!["OCP 2.1"]);
    }

    #[test]
    fn parses_fenced_json_and_clamps_confidence() {
        let reply = parse_reply(
            "Here you go:\n```json\n{\"answer\": \"Yes.\", \"confidence\": 3}\n```",
            &context(),
        );
        assert_eq!(reply.answer, "Yes.");
        assert!((reply.confidence - 1.0).abs() < f64::EPSILON);
        assert!(reply.mentioned_areas.is_empty());
    }

    #[test]
    fn missing_confidence_defaults() {
        let reply = parse_reply(r#"{"answer":"Yes."}"#, &context());
        assert!((reply.confidence - FALLBACK_CONFIDENCE).abs() < f64::EPSILON);
    }

    #[test]
    fn plain_text_reply_extracts_mentions() {
        let reply = parse_reply(
            "Laneway houses are allowed in RD areas under policy 1.3 and 1.3, not in MHX.",
            &context(),
        );
        assert_eq!(
            reply.answer,
            "Laneway houses are allowed in RD areas under policy 1.3 and 1.3, not in MHX."
        );
        assert!((reply.confidence - FALLBACK_CONFIDENCE).abs() < f64::EPSILON);
        assert_eq!(reply.mentioned_areas, vec!["RD"]);
        assert_eq!(reply.mentioned_policies, vec!["1.3"]);
    }

    #[test]
    fn json_with_empty_answer_is_treated_as_text() {
        let reply = parse_reply(r#"{"answer":""}"#, &context());
        assert_eq!(reply.answer, r#"{"answer":""}"#);
    }
}
