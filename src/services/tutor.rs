use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Number, Value};
use thiserror::Error;

use super::problem::Locale;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TutorError {
    #[error("missing expression")]
    MissingExpression,
    #[error("unrecognized expression")]
    Unparseable,
    #[error("division by zero")]
    DivisionByZero,
}

impl TutorError {
    pub fn message(&self, locale: Locale) -> &'static str {
        match self {
            Self::MissingExpression => {
                locale.pick("Falta el campo 'expression'.", "Missing field 'expression'.")
            }
            Self::Unparseable => locale.pick(
                "No pude entender la operación. Usa algo como: 7 + 8, 25 - 9, 6 x 7, 56 / 8.",
                "Could not understand the operation. Try something like: 7 + 8, 25 - 9, 6 x 7, 56 / 8.",
            ),
            Self::DivisionByZero => {
                locale.pick("No se puede dividir entre 0.", "Cannot divide by 0.")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorExplanation {
    pub question_text: String,
    pub solution: Value,
    pub steps: Vec<String>,
}

fn expression_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(-?\d+(?:\.\d+)?)\s*([+\-−×÷])\s*(-?\d+(?:\.\d+)?)$").ok())
        .as_ref()
}

/// Rewrites the separators people actually type (`6x7`, `6*7`, `56/8`, `2,5`)
/// into the canonical symbols.
pub fn normalize_expression(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            ',' => '.',
            'x' | 'X' | '*' => '×',
            '/' => '÷',
            other => other,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Explains a single binary expression in three numbered steps.
pub fn explain(expression: Option<&str>, locale: Locale) -> Result<TutorExplanation, TutorError> {
    let expression = expression.ok_or(TutorError::MissingExpression)?;
    let normalized = normalize_expression(expression);

    let caps = expression_regex()
        .and_then(|re| re.captures(&normalized))
        .ok_or(TutorError::Unparseable)?;
    let a: f64 = caps[1].parse().map_err(|_| TutorError::Unparseable)?;
    let b: f64 = caps[3].parse().map_err(|_| TutorError::Unparseable)?;
    let symbol = match &caps[2] {
        "-" | "−" => "−",
        "+" => "+",
        "×" => "×",
        _ => "÷",
    };

    let (solution, verb_es, verb_en) = match symbol {
        "+" => (a + b, "Suma los números", "Add the numbers"),
        "−" => (a - b, "Resta el segundo número al primero", "Subtract second from first"),
        "×" => (a * b, "Multiplica los números", "Multiply the numbers"),
        _ => {
            if b == 0.0 {
                return Err(TutorError::DivisionByZero);
            }
            (
                a / b,
                "Divide el primer número entre el segundo",
                "Divide the first number by the second",
            )
        }
    };

    let a = format_number(a);
    let b = format_number(b);
    let result = format_number(solution);
    let operation = format!("{a} {symbol} {b}");

    let steps = if locale.is_es() {
        vec![
            format!("1) Escribe la operación: {operation}."),
            format!("2) {verb_es}: {operation} = {result}."),
            format!("3) El resultado final es {result}."),
        ]
    } else {
        vec![
            format!("1) Write the operation: {operation}."),
            format!("2) {verb_en}: {operation} = {result}."),
            format!("3) Final result is {result}."),
        ]
    };

    Ok(TutorExplanation {
        question_text: format!("{} {operation}?", locale.pick("¿Cuánto es", "What is")),
        solution: number_value(solution),
        steps,
    })
}

fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    value.to_string()
}

// Whole results serialize as JSON integers, the rest as floats.
fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        return Value::Number(Number::from(value as i64));
    }
    Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}
