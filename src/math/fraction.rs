use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Decimal answers are scaled by this factor before reduction, so anything
/// finer than three decimal digits is rounded away.
pub const DECIMAL_SCALE: i64 = 1000;

// Keeps user-supplied components far away from i64 overflow in cross products.
const MAX_COMPONENT: i64 = 1_000_000_000_000;

/// Canonical rational number: reduced, sign on the numerator, denominator > 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawFraction")]
pub struct Fraction {
    #[serde(rename = "n")]
    numerator: i64,
    #[serde(rename = "d")]
    denominator: i64,
}

#[derive(Deserialize)]
struct RawFraction {
    n: i64,
    d: i64,
}

impl From<RawFraction> for Fraction {
    fn from(raw: RawFraction) -> Self {
        Fraction::new(raw.n, raw.d)
    }
}

impl Fraction {
    pub const ZERO: Fraction = Fraction {
        numerator: 0,
        denominator: 1,
    };

    /// Builds the reduced form of `n/d`. A zero denominator yields `0/1`.
    pub fn new(n: i64, d: i64) -> Self {
        if d == 0 {
            return Self::ZERO;
        }
        let g = gcd(n, d) as i64;
        let sign = if d < 0 { -1 } else { 1 };
        Self {
            numerator: (n / g) * sign,
            denominator: (d / g).abs(),
        }
    }

    pub fn from_integer(value: i64) -> Self {
        Self::new(value, 1)
    }

    pub fn numerator(&self) -> i64 {
        self.numerator
    }

    pub fn denominator(&self) -> i64 {
        self.denominator
    }

    pub fn is_zero(&self) -> bool {
        self.numerator == 0
    }

    /// Exact cross-multiplication comparison.
    pub fn equals(&self, other: &Fraction) -> bool {
        self.numerator as i128 * other.denominator as i128
            == other.numerator as i128 * self.denominator as i128
    }

    fn from_scaled_decimal(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let scaled = (value * DECIMAL_SCALE as f64).round();
        if scaled.abs() > MAX_COMPONENT as f64 {
            return None;
        }
        Some(Self::new(scaled as i64, DECIMAL_SCALE))
    }
}

fn gcd(a: i64, b: i64) -> u64 {
    let (mut a, mut b) = (a.unsigned_abs(), b.unsigned_abs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.max(1)
}

impl Default for Fraction {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl Add for Fraction {
    type Output = Fraction;

    fn add(self, rhs: Fraction) -> Fraction {
        Fraction::new(
            self.numerator * rhs.denominator + rhs.numerator * self.denominator,
            self.denominator * rhs.denominator,
        )
    }
}

impl Sub for Fraction {
    type Output = Fraction;

    fn sub(self, rhs: Fraction) -> Fraction {
        Fraction::new(
            self.numerator * rhs.denominator - rhs.numerator * self.denominator,
            self.denominator * rhs.denominator,
        )
    }
}

impl Mul for Fraction {
    type Output = Fraction;

    fn mul(self, rhs: Fraction) -> Fraction {
        Fraction::new(
            self.numerator * rhs.numerator,
            self.denominator * rhs.denominator,
        )
    }
}

impl Div for Fraction {
    type Output = Fraction;

    /// A zero divisor numerator is treated as 1, so `x / 0` evaluates to `x / (1/d)`.
    fn div(self, rhs: Fraction) -> Fraction {
        let divisor_numerator = if rhs.numerator == 0 { 1 } else { rhs.numerator };
        Fraction::new(
            self.numerator * rhs.denominator,
            self.denominator * divisor_numerator,
        )
    }
}

/// Reads a submitted answer as a fraction: a JSON number, an `"n/d"` string, or a
/// decimal string using `.` or `,`. Decimals are rounded to [`DECIMAL_SCALE`].
pub fn parse_user_fraction(input: &Value) -> Option<Fraction> {
    match input {
        Value::Number(number) => number.as_f64().and_then(Fraction::from_scaled_decimal),
        Value::String(text) => parse_fraction_text(text),
        _ => None,
    }
}

pub fn parse_fraction_text(text: &str) -> Option<Fraction> {
    let normalized = text.trim().replacen(',', ".", 1);
    if normalized.is_empty() {
        return None;
    }

    if let Some((n, d)) = normalized.split_once('/') {
        let n = parse_signed_digits(n)?;
        let d = parse_signed_digits(d)?;
        return Some(Fraction::new(n, d));
    }

    let value: f64 = normalized.parse().ok()?;
    Fraction::from_scaled_decimal(value)
}

fn parse_signed_digits(part: &str) -> Option<i64> {
    let digits = part.strip_prefix('-').unwrap_or(part);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: i64 = part.parse().ok()?;
    (value.abs() <= MAX_COMPONENT).then_some(value)
}
