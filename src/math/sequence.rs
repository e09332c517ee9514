use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SequenceKind {
    #[serde(rename = "arith")]
    Arithmetic,
    #[serde(rename = "geom")]
    Geometric,
}

/// Integer sequence defined by its first term and either a common difference
/// or an integer ratio (always >= 2 when produced by the synthesizer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sequence {
    Arithmetic { a1: i64, d: i64 },
    Geometric { a1: i64, r: i64 },
}

impl Sequence {
    pub fn kind(&self) -> SequenceKind {
        match self {
            Sequence::Arithmetic { .. } => SequenceKind::Arithmetic,
            Sequence::Geometric { .. } => SequenceKind::Geometric,
        }
    }

    pub fn first_term(&self) -> i64 {
        match *self {
            Sequence::Arithmetic { a1, .. } | Sequence::Geometric { a1, .. } => a1,
        }
    }

    /// Zero-based term `k`.
    pub fn term(&self, k: u32) -> i64 {
        match *self {
            Sequence::Arithmetic { a1, d } => a1 + k as i64 * d,
            Sequence::Geometric { a1, r } => a1 * r.pow(k),
        }
    }

    pub fn terms(&self, count: u32) -> Vec<i64> {
        (0..count).map(|k| self.term(k)).collect()
    }

    /// The term that follows `visible` shown terms.
    pub fn next_term(&self, visible: u32) -> i64 {
        self.term(visible)
    }

    /// Sum of the first `n` terms via the closed forms.
    pub fn partial_sum(&self, n: u32) -> i64 {
        let n_i = n as i64;
        match *self {
            Sequence::Arithmetic { a1, d } => n_i * (2 * a1 + (n_i - 1) * d) / 2,
            Sequence::Geometric { a1, r } if r == 1 => a1 * n_i,
            Sequence::Geometric { a1, r } => a1 * (r.pow(n) - 1) / (r - 1),
        }
    }
}
