use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock};

use futures::FutureExt;
use rand::Rng;
use regex::Regex;
use serde_json::{json, Value};
use tracing::debug;

use crate::math::{parse_fraction_text, Fraction};

use super::grading::coerce_int;
use super::level_config::level_config;
use super::llm_provider::GenerativeBackend;
use super::problem::{DifficultyLabel, Locale, OperationKind, Problem, SequenceMeta, Solution};
use super::synthesizer::{self, integer_steps};

// Operands a phrasing model may hand back before we stop trusting them.
const MAX_SANITIZED_OPERAND: i64 = 1_000_000;

/// Problem source for sessions and batches: deterministic synthesis, optionally
/// rephrased by the generative backend. Every path ends in a valid problem.
pub struct ProblemGenerator {
    backend: Arc<GenerativeBackend>,
}

impl ProblemGenerator {
    pub fn new(backend: Arc<GenerativeBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &GenerativeBackend {
        &self.backend
    }

    pub fn synthesize_local(&self, op: OperationKind, level: u8, locale: Locale) -> Problem {
        synthesizer::synthesize(op, level, locale, &mut rand::rng())
    }

    pub async fn generate_one(
        &self,
        op: OperationKind,
        level: u8,
        locale: Locale,
        prefer_generative: bool,
    ) -> Problem {
        if !op.is_integer() || !prefer_generative {
            return self.synthesize_local(op, level, locale);
        }
        let Some(generator) = self.backend.generator() else {
            return self.synthesize_local(op, level, locale);
        };

        let planned = {
            let mut rng = rand::rng();
            let cfg = level_config(op, level);
            let forced = rng.random_bool(cfg.carry_borrow_bias);
            let (a, b) = synthesizer::draw_operands(op, cfg.max_magnitude, forced, &mut rng);
            synthesizer::integer_problem(op, a, b, forced, locale, &mut rng)
        };

        let prompt = build_prompt(&planned, locale);
        let attempt = AssertUnwindSafe(generator.complete(&prompt, self.backend.max_tokens()))
            .catch_unwind()
            .await;

        match attempt {
            Ok(Ok(raw)) => {
                let parsed = extract_json(raw.trim());
                if parsed.is_none() {
                    debug!(
                        op = op.as_str(),
                        "unparseable generative output, using planned problem"
                    );
                }
                sanitize_problems(parsed.as_ref(), std::slice::from_ref(&planned), locale)
                    .into_iter()
                    .next()
                    .unwrap_or(planned)
            }
            Ok(Err(err)) => {
                debug!(
                    error = %err,
                    op = op.as_str(),
                    "generative call failed, using planned problem"
                );
                planned
            }
            Err(_) => {
                debug!(op = op.as_str(), "generative call panicked, using planned problem");
                planned
            }
        }
    }

    /// Stateless batch. Fraction and sequence kinds never touch the backend.
    pub async fn generate_batch(
        &self,
        op: OperationKind,
        level: u8,
        locale: Locale,
        count: usize,
    ) -> Vec<Problem> {
        if !op.is_integer() || !self.backend.is_ready() {
            return synthesizer::synthesize_batch(op, level, locale, count, &mut rand::rng());
        }
        let mut problems = Vec::with_capacity(count);
        for _ in 0..count {
            problems.push(self.generate_one(op, level, locale, true).await);
        }
        problems
    }
}

/// The model only rephrases: operands and the solution are fixed before prompting.
pub fn build_prompt(planned: &Problem, locale: Locale) -> String {
    let template = json!({
        "problems": [{
            "id": planned.id,
            "op": planned.op,
            "a": planned.a,
            "b": planned.b,
            "questionText": format!(
                "{} {} {} {}?",
                locale.pick("¿Cuánto es", "What is"),
                planned.a,
                planned.op.symbol(),
                planned.b
            ),
            "difficulty": planned.difficulty,
            "solution": planned.solution,
            "steps": [],
        }]
    });
    format!("Return ONLY JSON for ONE problem.\n{template}\n")
}

fn problems_object_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?s)\{.*"problems".*\}"#).ok()).as_ref()
}

/// Pulls a JSON value out of free-form model output. Tries, in order: the span
/// between the first `{` and last `}`, the text with code fences stripped, and
/// an object mentioning `"problems"`.
pub fn extract_json(text: &str) -> Option<Value> {
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if end > start {
            if let Ok(value) = serde_json::from_str(&text[start..=end]) {
                return Some(value);
            }
        }
    }

    let unfenced = text.replace("```json", "").replace("```", "");
    if let Ok(value) = serde_json::from_str(unfenced.trim()) {
        return Some(value);
    }

    let found = problems_object_regex()?.find(text)?;
    serde_json::from_str(found.as_str()).ok()
}

/// Validates untrusted `{"problems": [...]}` output field by field. `defaults`
/// holds one synthesized problem per expected item; any field that is missing
/// or malformed is taken from the matching default, and a missing or empty
/// `problems` array yields the defaults unchanged.
pub fn sanitize_problems(
    parsed: Option<&Value>,
    defaults: &[Problem],
    locale: Locale,
) -> Vec<Problem> {
    let items = match parsed.and_then(|v| v.get("problems")).and_then(Value::as_array) {
        Some(items) if !items.is_empty() => items,
        _ => return defaults.to_vec(),
    };

    defaults
        .iter()
        .enumerate()
        .map(|(i, default)| match items.get(i) {
            Some(item) if item.is_object() => sanitize_item(item, default, locale),
            _ => default.clone(),
        })
        .collect()
}

fn sanitize_item(raw: &Value, default: &Problem, locale: Locale) -> Problem {
    let id = non_empty_str(raw.get("id")).unwrap_or_else(|| default.id.clone());
    let question_text =
        non_empty_str(raw.get("questionText")).unwrap_or_else(|| default.question_text.clone());
    let difficulty = raw
        .get("difficulty")
        .and_then(Value::as_str)
        .and_then(DifficultyLabel::parse)
        .unwrap_or(default.difficulty);
    let steps = string_list(raw.get("steps"));

    match default.op {
        OperationKind::Frac => Problem {
            id,
            op: OperationKind::Frac,
            a: 0,
            b: 0,
            question_text,
            difficulty,
            solution: raw
                .get("solution")
                .and_then(fraction_from_value)
                .map(Solution::Fraction)
                .unwrap_or(default.solution),
            steps: steps.unwrap_or_else(|| default.steps.clone()),
            meta: None,
        },
        OperationKind::Seq => Problem {
            id,
            op: OperationKind::Seq,
            a: 0,
            b: 0,
            question_text,
            difficulty,
            solution: raw
                .get("solution")
                .and_then(coerce_int)
                .map(Solution::Integer)
                .unwrap_or(default.solution),
            steps: steps.unwrap_or_else(|| default.steps.clone()),
            meta: raw
                .get("meta")
                .and_then(|m| serde_json::from_value::<SequenceMeta>(m.clone()).ok())
                .or_else(|| default.meta.clone()),
        },
        op => {
            let (a, b) = sanitize_operands(op, raw, default);
            let solution = op.apply(a, b);
            if let Some(claimed) = raw.get("solution").and_then(coerce_int) {
                if claimed != solution {
                    debug!(claimed, solution, "generated solution disagrees with operands");
                }
            }
            let operands_kept = (a, b) == (default.a, default.b);
            Problem {
                id,
                op,
                a,
                b,
                question_text: if operands_kept {
                    question_text
                } else {
                    default_question(op, a, b, locale)
                },
                difficulty,
                solution: Solution::Integer(solution),
                steps: steps.unwrap_or_else(|| {
                    if operands_kept {
                        default.steps.clone()
                    } else {
                        integer_steps(op, a, b, solution, false, locale)
                    }
                }),
                meta: None,
            }
        }
    }
}

fn sanitize_operands(op: OperationKind, raw: &Value, default: &Problem) -> (i64, i64) {
    let operand = |key: &str, fallback: i64| {
        raw.get(key)
            .and_then(coerce_int)
            .filter(|v| (0..=MAX_SANITIZED_OPERAND).contains(v))
            .unwrap_or(fallback)
    };
    let (mut a, mut b) = (operand("a", default.a), operand("b", default.b));

    match op {
        OperationKind::Sub if a < b => std::mem::swap(&mut a, &mut b),
        OperationKind::Div => {
            let divisor = b.max(1);
            let quotient = (a / divisor).max(1);
            a = divisor * quotient;
            b = divisor;
        }
        _ => {}
    }
    (a, b)
}

fn default_question(op: OperationKind, a: i64, b: i64, locale: Locale) -> String {
    format!("{} {a} {} {b}?", locale.pick("¿Cuánto es", "What is"), op.symbol())
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    let items = value?.as_array()?;
    let list: Vec<String> = items
        .iter()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .filter(|s| !s.trim().is_empty())
        .collect();
    (!list.is_empty()).then_some(list)
}

fn fraction_from_value(value: &Value) -> Option<Fraction> {
    match value {
        Value::String(s) => parse_fraction_text(s),
        Value::Object(_) => serde_json::from_value::<Fraction>(value.clone()).ok(),
        _ => None,
    }
}
