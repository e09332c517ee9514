use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::math::{Fraction, SequenceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    #[default]
    Add,
    Sub,
    Mul,
    Div,
    Frac,
    #[serde(alias = "sequence")]
    Seq,
}

impl OperationKind {
    pub const ALL: [OperationKind; 6] = [
        OperationKind::Add,
        OperationKind::Sub,
        OperationKind::Mul,
        OperationKind::Div,
        OperationKind::Frac,
        OperationKind::Seq,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "add" => Some(Self::Add),
            "sub" => Some(Self::Sub),
            "mul" => Some(Self::Mul),
            "div" => Some(Self::Div),
            "frac" => Some(Self::Frac),
            "seq" | "sequence" => Some(Self::Seq),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Frac => "frac",
            Self::Seq => "seq",
        }
    }

    /// Integer kinds are the only ones a generative backend may phrase.
    pub fn is_integer(&self) -> bool {
        matches!(self, Self::Add | Self::Sub | Self::Mul | Self::Div)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "−",
            Self::Mul => "×",
            Self::Div => "÷",
            Self::Frac | Self::Seq => "?",
        }
    }

    /// Canonical integer answer for `a ⊕ b`; division floors and treats a zero divisor as 1.
    pub fn apply(&self, a: i64, b: i64) -> i64 {
        match self {
            Self::Sub => a - b,
            Self::Mul => a * b,
            Self::Div => a.div_euclid(b.max(1)),
            Self::Add | Self::Frac | Self::Seq => a + b,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    Es,
    En,
}

impl Locale {
    /// `"es"` (or nothing) selects Spanish; every other tag falls back to English.
    pub fn parse(tag: Option<&str>) -> Self {
        match tag.map(str::trim) {
            None | Some("es") => Self::Es,
            Some(_) => Self::En,
        }
    }

    pub fn is_es(&self) -> bool {
        matches!(self, Self::Es)
    }

    pub fn pick<'a>(&self, es: &'a str, en: &'a str) -> &'a str {
        if self.is_es() {
            es
        } else {
            en
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyLabel {
    #[default]
    #[serde(alias = "fácil", alias = "facil")]
    Easy,
    #[serde(alias = "medio")]
    Medium,
    #[serde(alias = "difícil", alias = "dificil")]
    Hard,
}

impl DifficultyLabel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "easy" | "fácil" | "facil" => Some(Self::Easy),
            "medium" | "medio" => Some(Self::Medium),
            "hard" | "difícil" | "dificil" => Some(Self::Hard),
            _ => None,
        }
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        match rng.random_range(0..3) {
            0 => Self::Easy,
            1 => Self::Medium,
            _ => Self::Hard,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Solution {
    Integer(i64),
    Fraction(Fraction),
}

impl std::fmt::Display for Solution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Solution::Integer(v) => write!(f, "{v}"),
            Solution::Fraction(frac) => write!(f, "{frac}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SequenceTask {
    Next,
    Sum,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceMeta {
    pub seq_type: SequenceKind,
    pub task: SequenceTask,
    pub a1: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r: Option<i64>,
    pub n: u32,
    pub visible_terms: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub id: String,
    pub op: OperationKind,
    pub a: i64,
    pub b: i64,
    pub question_text: String,
    pub difficulty: DifficultyLabel,
    pub solution: Solution,
    pub steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<SequenceMeta>,
}

impl Problem {
    pub fn new_id() -> String {
        format!("pr-{}", uuid::Uuid::new_v4().simple())
    }

    /// Fraction problems are graded by rational equivalence, everything else by integer equality.
    pub fn expects_fraction(&self) -> bool {
        self.op == OperationKind::Frac || matches!(self.solution, Solution::Fraction(_))
    }
}
