use rand::seq::IndexedRandom;
use rand::Rng;

use crate::math::{Fraction, Sequence};

use super::level_config::{level_config, LevelConfig};
use super::problem::{
    DifficultyLabel, Locale, OperationKind, Problem, SequenceMeta, SequenceTask, Solution,
};

const SUM_TASK_MIN_LEVEL: u8 = 3;
const SUM_TASK_PROBABILITY: f64 = 0.45;
const HARD_QUOTIENT_FLOOR: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FractionOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl FractionOp {
    const ALL: [FractionOp; 4] = [
        FractionOp::Add,
        FractionOp::Sub,
        FractionOp::Mul,
        FractionOp::Div,
    ];

    fn symbol(&self) -> &'static str {
        match self {
            FractionOp::Add => "+",
            FractionOp::Sub => "−",
            FractionOp::Mul => "×",
            FractionOp::Div => "÷",
        }
    }

    pub fn apply(&self, a: Fraction, b: Fraction) -> Fraction {
        match self {
            FractionOp::Add => a + b,
            FractionOp::Sub => a - b,
            FractionOp::Mul => a * b,
            FractionOp::Div => a / b,
        }
    }
}

/// Produces one problem for `op` at `level`. Never fails.
pub fn synthesize<R: Rng + ?Sized>(
    op: OperationKind,
    level: u8,
    locale: Locale,
    rng: &mut R,
) -> Problem {
    let cfg = level_config(op, level);
    let force_hard = rng.random_bool(cfg.carry_borrow_bias);

    match op {
        OperationKind::Frac => fraction_problem(&cfg, locale, rng),
        OperationKind::Seq => sequence_problem(&cfg, locale, rng),
        _ => {
            let (a, b) = draw_operands(op, cfg.max_magnitude, force_hard, rng);
            integer_problem(op, a, b, force_hard, locale, rng)
        }
    }
}

pub fn synthesize_batch<R: Rng + ?Sized>(
    op: OperationKind,
    level: u8,
    locale: Locale,
    count: usize,
    rng: &mut R,
) -> Vec<Problem> {
    (0..count).map(|_| synthesize(op, level, locale, rng)).collect()
}

/// Draws the two display operands of an integer problem. With `force_hard` the
/// pair is shaped to need a carry (add), a borrow (sub) or multi-digit partial
/// products (mul); division always builds `dividend = divisor * quotient`.
pub fn draw_operands<R: Rng + ?Sized>(
    op: OperationKind,
    max: i64,
    force_hard: bool,
    rng: &mut R,
) -> (i64, i64) {
    let max = max.max(1);
    match op {
        OperationKind::Sub => draw_sub(max, force_hard, rng),
        OperationKind::Mul => draw_mul(max, force_hard, rng),
        OperationKind::Div => draw_div(max, force_hard, rng),
        _ => draw_add(max, force_hard, rng),
    }
}

fn draw_add<R: Rng + ?Sized>(max: i64, force_carry: bool, rng: &mut R) -> (i64, i64) {
    if !force_carry {
        return (rng.random_range(0..=max), rng.random_range(0..=max));
    }

    if max < 10 {
        let a = rng.random_range(1..=max.min(9));
        return (a, (10 - a).min(max));
    }

    let mut a = rng.random_range(0..=max);
    if a % 10 == 0 {
        a = if a < max { a + 1 } else { a - 1 };
    }
    let need = 10 - a % 10;
    let mut b = rng.random_range(0..=max) / 10 * 10 + rng.random_range(need..=9);
    if b > max {
        b -= 10;
    }
    (a, b)
}

fn draw_sub<R: Rng + ?Sized>(max: i64, force_borrow: bool, rng: &mut R) -> (i64, i64) {
    let mut a = rng.random_range(0..=max);
    let mut b = rng.random_range(0..=max);
    if a < b {
        std::mem::swap(&mut a, &mut b);
    }

    if force_borrow && a >= 10 {
        if a % 10 == 9 {
            a = a / 10 * 10 + rng.random_range(0..=8);
        }
        let ones = rng.random_range(a % 10 + 1..=9);
        b = b / 10 * 10 + ones;
        if b > a {
            b = (a / 10 - 1) * 10 + ones;
        }
    }
    (a, b)
}

fn draw_mul<R: Rng + ?Sized>(max: i64, force_hard: bool, rng: &mut R) -> (i64, i64) {
    let a = rng.random_range(0..=max);
    let b = rng.random_range(0..=max);
    if !force_hard {
        return (a, b);
    }
    (widen_factor(a, max), widen_factor(b, max))
}

fn widen_factor(n: i64, max: i64) -> i64 {
    let mut n = n;
    if n < 10 && max >= 10 {
        n = 10 + n % 10;
    }
    let ones = n % 10;
    if ones < 6 {
        n += 6 - ones;
    }
    n.min(max)
}

fn draw_div<R: Rng + ?Sized>(max: i64, force_hard: bool, rng: &mut R) -> (i64, i64) {
    let divisor = rng.random_range(1..=max);
    let mut quotient = rng.random_range(1..=max);
    if force_hard {
        quotient = quotient.max((max as f64 * HARD_QUOTIENT_FLOOR) as i64);
    }
    (divisor * quotient, divisor)
}

/// Assembles an integer problem from already chosen operands.
pub fn integer_problem<R: Rng + ?Sized>(
    op: OperationKind,
    a: i64,
    b: i64,
    forced: bool,
    locale: Locale,
    rng: &mut R,
) -> Problem {
    let solution = op.apply(a, b);
    Problem {
        id: Problem::new_id(),
        op,
        a,
        b,
        question_text: integer_question(op, a, b, locale, rng),
        difficulty: DifficultyLabel::random(rng),
        solution: Solution::Integer(solution),
        steps: integer_steps(op, a, b, solution, forced, locale),
        meta: None,
    }
}

fn integer_question<R: Rng + ?Sized>(
    op: OperationKind,
    a: i64,
    b: i64,
    locale: Locale,
    rng: &mut R,
) -> String {
    let s = op.symbol();
    match (locale, rng.random_range(0..3)) {
        (Locale::Es, 0) => format!("¿Cuánto es {a} {s} {b}?"),
        (Locale::Es, 1) => format!("Resuelve: {a} {s} {b}"),
        (Locale::Es, _) => format!("Completa la operación: {a} {s} {b} = ?"),
        (Locale::En, 0) => format!("What is {a} {s} {b}?"),
        (Locale::En, 1) => format!("Solve: {a} {s} {b}"),
        (Locale::En, _) => format!("Complete: {a} {s} {b} = ?"),
    }
}

pub fn integer_steps(
    op: OperationKind,
    a: i64,
    b: i64,
    solution: i64,
    forced: bool,
    locale: Locale,
) -> Vec<String> {
    let es = locale.is_es();
    let mut steps: Vec<String> = match (op, forced) {
        (OperationKind::Add, true) => vec![
            locale.pick("Suma unidades con llevada.", "Add the ones and carry the ten.").into(),
            locale
                .pick("Suma decenas/centenas con llevada.", "Add tens/hundreds plus the carry.")
                .into(),
        ],
        (OperationKind::Add, false) => vec![
            locale.pick("Suma unidades.", "Add the ones.").into(),
            locale.pick("Suma decenas/centenas.", "Add the tens/hundreds.").into(),
        ],
        (OperationKind::Sub, true) => vec![
            locale
                .pick(
                    "Si no alcanzan unidades, pide prestado.",
                    "If the ones are too small, borrow a ten.",
                )
                .into(),
            locale.pick("Resta unidades y decenas.", "Subtract ones and tens.").into(),
        ],
        (OperationKind::Sub, false) => vec![
            locale.pick("Resta unidades.", "Subtract the ones.").into(),
            locale.pick("Resta decenas/centenas.", "Subtract the tens/hundreds.").into(),
        ],
        (OperationKind::Mul, _) => vec![
            locale.pick("Multiplica por columnas.", "Multiply column by column.").into(),
            locale.pick("Suma parciales.", "Add the partial products.").into(),
        ],
        (OperationKind::Div, _) => vec![
            if es {
                format!("Divide {a} entre {b}.")
            } else {
                format!("Divide {a} by {b}.")
            },
            locale.pick("Toma cociente entero.", "Take the integer quotient.").into(),
        ],
        _ => Vec::new(),
    };
    steps.push(result_step(&solution.to_string(), locale));
    steps
}

fn result_step(value: &str, locale: Locale) -> String {
    if locale.is_es() {
        format!("Resultado: {value}.")
    } else {
        format!("Result: {value}.")
    }
}

/// Proper fraction `n/d` with `d` drawn from `[2, max_denominator]` and
/// `1 <= n < d`. Earlier releases allowed `max_denominator + 1` as well; the
/// bound is now inclusive of `max_denominator` and nothing above it.
pub fn random_fraction<R: Rng + ?Sized>(max_denominator: i64, rng: &mut R) -> Fraction {
    let d = rng.random_range(2..=max_denominator.max(2));
    let n = rng.random_range(1..d);
    Fraction::new(n, d)
}

fn fraction_problem<R: Rng + ?Sized>(cfg: &LevelConfig, locale: Locale, rng: &mut R) -> Problem {
    let op = *FractionOp::ALL.choose(rng).unwrap_or(&FractionOp::Add);
    let a = random_fraction(cfg.max_magnitude, rng);
    let mut b = random_fraction(cfg.max_magnitude, rng);
    if op == FractionOp::Div && b.is_zero() {
        b = Fraction::new(1, b.denominator());
    }
    fraction_problem_from(op, a, b, locale, rng)
}

/// Builds a fraction problem for a chosen hidden operation. The public kind stays `frac`.
pub fn fraction_problem_from<R: Rng + ?Sized>(
    op: FractionOp,
    a: Fraction,
    b: Fraction,
    locale: Locale,
    rng: &mut R,
) -> Problem {
    let solution = op.apply(a, b);
    let s = op.symbol();
    let question_text = if locale.is_es() {
        format!("¿Cuánto es {a} {s} {b}?")
    } else {
        format!("What is {a} {s} {b}?")
    };

    let first_step = match op {
        FractionOp::Mul => locale.pick(
            "Multiplica numeradores y denominadores.",
            "Multiply numerators and denominators.",
        ),
        FractionOp::Div => locale.pick(
            "Multiplica por el inverso de la segunda fracción.",
            "Multiply by the reciprocal of the second fraction.",
        ),
        FractionOp::Add | FractionOp::Sub => locale.pick(
            "Encuentra denominador común y suma/resta numeradores.",
            "Find a common denominator and add/subtract the numerators.",
        ),
    };

    Problem {
        id: Problem::new_id(),
        op: OperationKind::Frac,
        a: 0,
        b: 0,
        question_text,
        difficulty: DifficultyLabel::random(rng),
        solution: Solution::Fraction(solution),
        steps: vec![
            first_step.to_string(),
            locale.pick("Simplifica la fracción.", "Simplify the fraction.").to_string(),
            result_step(&solution.to_string(), locale),
        ],
        meta: None,
    }
}

fn sequence_problem<R: Rng + ?Sized>(cfg: &LevelConfig, locale: Locale, rng: &mut R) -> Problem {
    let level = cfg.level;
    let max = cfg.max_magnitude;

    let a1 = rng.random_range(1..=(max / 5).clamp(1, 9));
    let sequence = if rng.random_bool(0.5) {
        Sequence::Arithmetic {
            a1,
            d: rng.random_range(1..=(max / 10).clamp(1, 9)),
        }
    } else {
        Sequence::Geometric {
            a1,
            r: rng.random_range(2..=5),
        }
    };

    let task = if level >= SUM_TASK_MIN_LEVEL && rng.random_bool(SUM_TASK_PROBABILITY) {
        SequenceTask::Sum
    } else {
        SequenceTask::Next
    };
    let visible = if level >= 3 { 5 } else { 4 };
    let sum_terms = (visible + u32::from(level >= 4)).clamp(4, 8);

    sequence_problem_from(sequence, task, visible, sum_terms, locale, rng)
}

/// Builds a sequence problem from explicit parameters.
pub fn sequence_problem_from<R: Rng + ?Sized>(
    sequence: Sequence,
    task: SequenceTask,
    visible: u32,
    sum_terms: u32,
    locale: Locale,
    rng: &mut R,
) -> Problem {
    let solution = match task {
        SequenceTask::Next => sequence.next_term(visible),
        SequenceTask::Sum => sequence.partial_sum(sum_terms),
    };

    let terms = sequence
        .terms(visible)
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let ask = match (task, locale) {
        (SequenceTask::Next, Locale::Es) => "¿Cuál es el siguiente término?".to_string(),
        (SequenceTask::Next, Locale::En) => "What is the next term?".to_string(),
        (SequenceTask::Sum, Locale::Es) => {
            format!("Calcula S{sum_terms} (suma de los primeros {sum_terms} términos).")
        }
        (SequenceTask::Sum, Locale::En) => {
            format!("Compute S{sum_terms} (sum of first {sum_terms} terms).")
        }
    };
    let label = locale.pick("Secuencia", "Sequence");

    let (formula_a, formula_b) = match (sequence, task) {
        (Sequence::Arithmetic { .. }, SequenceTask::Next) => (
            locale.pick("Identifica la diferencia común d.", "Find the common difference d."),
            locale.pick("Suma d al último término mostrado.", "Add d to the last shown term."),
        ),
        (Sequence::Arithmetic { .. }, SequenceTask::Sum) => (
            locale.pick("Usa S_n = n/2 * [2a1 + (n−1)d].", "Use S_n = n/2 * [2a1 + (n−1)d]."),
            locale.pick("Sustituye valores y simplifica.", "Substitute the values and simplify."),
        ),
        (Sequence::Geometric { .. }, SequenceTask::Next) => (
            locale.pick("Identifica la razón r.", "Find the common ratio r."),
            locale.pick("Multiplica el último término por r.", "Multiply the last term by r."),
        ),
        (Sequence::Geometric { .. }, SequenceTask::Sum) => (
            locale.pick(
                "Usa S_n = a1 * (r^n − 1) / (r − 1).",
                "Use S_n = a1 * (r^n − 1) / (r − 1).",
            ),
            locale.pick("Sustituye valores y simplifica.", "Substitute the values and simplify."),
        ),
    };

    let (d, r) = match sequence {
        Sequence::Arithmetic { d, .. } => (Some(d), None),
        Sequence::Geometric { r, .. } => (None, Some(r)),
    };

    Problem {
        id: Problem::new_id(),
        op: OperationKind::Seq,
        a: 0,
        b: 0,
        question_text: format!("{label}: {terms}. {ask}"),
        difficulty: DifficultyLabel::random(rng),
        solution: Solution::Integer(solution),
        steps: vec![
            formula_a.to_string(),
            formula_b.to_string(),
            result_step(&solution.to_string(), locale),
        ],
        meta: Some(SequenceMeta {
            seq_type: sequence.kind(),
            task,
            a1: sequence.first_term(),
            d,
            r,
            n: sum_terms,
            visible_terms: visible,
        }),
    }
}
