use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::math::{parse_user_fraction, Fraction};

use super::problem::{Locale, OperationKind, Problem, Solution};
use super::synthesizer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ExpectedAnswer {
    Integer(i64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeOutcome {
    pub correct: bool,
    pub expected: ExpectedAnswer,
    pub feedback: String,
    pub next_hint: String,
}

/// Reads an integer the way a lenient form field would: JSON numbers are
/// truncated, strings contribute their leading signed digits (`"12abc"` → 12).
pub fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => leading_int(s),
        Value::Bool(_) | Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn leading_int(text: &str) -> Option<i64> {
    let trimmed = text.trim_start();
    let (sign, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (-1, &trimmed[1..]),
        Some(b'+') => (1, &trimmed[1..]),
        _ => (1, trimmed),
    };
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<i64>().ok().map(|v| sign * v)
}

/// True when `answer` matches the problem's canonical solution. Unparseable
/// answers are simply incorrect.
pub fn is_correct(problem: &Problem, answer: &Value) -> bool {
    if problem.expects_fraction() {
        let expected = match problem.solution {
            Solution::Fraction(f) => f,
            Solution::Integer(v) => Fraction::from_integer(v),
        };
        return parse_user_fraction(answer).is_some_and(|got| got.equals(&expected));
    }

    match problem.solution {
        Solution::Integer(expected) => coerce_int(answer) == Some(expected),
        Solution::Fraction(_) => false,
    }
}

pub fn expected_answer(problem: &Problem) -> ExpectedAnswer {
    match (problem.expects_fraction(), problem.solution) {
        (false, Solution::Integer(v)) => ExpectedAnswer::Integer(v),
        (true, Solution::Integer(v)) => ExpectedAnswer::Text(Fraction::from_integer(v).to_string()),
        (_, Solution::Fraction(f)) => ExpectedAnswer::Text(f.to_string()),
    }
}

pub fn grade(problem: &Problem, answer: &Value, locale: Locale) -> GradeOutcome {
    let correct = is_correct(problem, answer);
    GradeOutcome {
        correct,
        expected: expected_answer(problem),
        feedback: feedback(problem, correct, locale),
        next_hint: next_hint(problem.op, correct, locale),
    }
}

pub fn correct_message(locale: Locale) -> &'static str {
    locale.pick("¡Excelente! Respuesta correcta.", "Great job! Correct answer.")
}

fn feedback(problem: &Problem, correct: bool, locale: Locale) -> String {
    if correct {
        return correct_message(locale).to_string();
    }
    let almost = locale.pick("Casi.", "Almost.");
    if let ExpectedAnswer::Text(answer) = expected_answer(problem) {
        return format!("{almost} {} {answer}.", locale.pick("La respuesta es", "The answer is"));
    }
    if problem.op == OperationKind::Seq {
        return format!(
            "{almost} {} {}.",
            locale.pick("La respuesta era", "The answer was"),
            problem.solution
        );
    }
    format!(
        "{almost} {} {} {} = {}.",
        problem.a,
        problem.op.symbol(),
        problem.b,
        problem.solution
    )
}

/// Largest operand magnitude the `/grade` alias accepts; keeps every product in `i64`.
pub const MAX_DETACHED_OPERAND: i64 = 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DetachedGradeError {
    #[error("operand {0} is out of range")]
    OperandOutOfRange(i64),
}

impl DetachedGradeError {
    pub fn message(&self, locale: Locale) -> String {
        match self {
            Self::OperandOutOfRange(value) => {
                let limit = MAX_DETACHED_OPERAND;
                if locale.is_es() {
                    format!("Operando fuera de rango: {value} (máximo ±{limit}).")
                } else {
                    format!("Operand out of range: {value} (limit ±{limit}).")
                }
            }
        }
    }
}

/// Result of the session-less `/grade` alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetachedGrade {
    pub op: OperationKind,
    pub correct: bool,
    pub expected: ExpectedAnswer,
    pub feedback: String,
    pub next_hint: String,
}

/// Grades an answer without a session. Integer kinds recompute the answer from
/// the raw operands (subtraction reordered, divisor at least 1, floor
/// division). Fraction and sequence kinds carry no operands, so the answer is
/// checked against a freshly synthesized level-1 example.
///
/// Integer operands beyond [`MAX_DETACHED_OPERAND`] are rejected.
pub fn grade_detached<R: Rng + ?Sized>(
    op: OperationKind,
    a: Option<&Value>,
    b: Option<&Value>,
    answer: &Value,
    locale: Locale,
    rng: &mut R,
) -> Result<DetachedGrade, DetachedGradeError> {
    let ok = correct_message(locale).to_string();
    let almost = locale.pick("Casi.", "Almost.");

    let (correct, expected, miss) = match op {
        OperationKind::Frac | OperationKind::Seq => {
            let example = synthesizer::synthesize(op, 1, locale, rng);
            let expected = expected_answer(&example);
            let lead = if op == OperationKind::Frac {
                locale.pick("Ejemplo de respuesta:", "Example answer:")
            } else {
                locale.pick("La respuesta era", "The answer was")
            };
            let miss = format!("{almost} {lead} {}.", example.solution);
            (is_correct(&example, answer), expected, miss)
        }
        _ => {
            let mut a = bounded_operand(a)?;
            let mut b = bounded_operand(b)?;
            if op == OperationKind::Sub && a < b {
                std::mem::swap(&mut a, &mut b);
            }
            if op == OperationKind::Div {
                b = b.max(1);
            }
            let solution = op.apply(a, b);
            let miss = format!("{almost} {a} {} {b} = {solution}.", op.symbol());
            (coerce_int(answer) == Some(solution), ExpectedAnswer::Integer(solution), miss)
        }
    };

    Ok(DetachedGrade {
        op,
        correct,
        expected,
        feedback: if correct { ok } else { miss },
        next_hint: String::new(),
    })
}

fn bounded_operand(value: Option<&Value>) -> Result<i64, DetachedGradeError> {
    let operand = value.and_then(coerce_int).unwrap_or(0);
    if operand.unsigned_abs() > MAX_DETACHED_OPERAND.unsigned_abs() {
        return Err(DetachedGradeError::OperandOutOfRange(operand));
    }
    Ok(operand)
}

pub fn next_hint(op: OperationKind, correct: bool, locale: Locale) -> String {
    if correct {
        return locale
            .pick("Subiremos un poco la dificultad.", "We will increase the difficulty a bit.")
            .to_string();
    }
    let hint = match op {
        OperationKind::Add => {
            locale.pick("Suma unidades; si ≥10, lleva 1.", "Add ones; if ≥10, carry 1.")
        }
        OperationKind::Sub => locale.pick(
            "Si no alcanzan unidades, pide prestado.",
            "If ones too small, borrow.",
        ),
        OperationKind::Mul => locale.pick(
            "Multiplica por columnas y suma parciales.",
            "Multiply columns; add partials.",
        ),
        OperationKind::Div => locale.pick(
            "Divide y toma cociente entero.",
            "Divide and take integer quotient.",
        ),
        OperationKind::Frac => locale.pick(
            "Usa m.c.m. o extremos y medios; simplifica.",
            "Find common denominator or multiply across; simplify.",
        ),
        OperationKind::Seq => locale.pick(
            "Identifica diferencia o razón; aplica la fórmula correspondiente.",
            "Identify common difference or ratio; apply the right formula.",
        ),
    };
    hint.to_string()
}
