//! Property-based tests for fraction and sequence arithmetic.
//!
//! - Reduction: denominator positive, numerator and denominator coprime
//! - Equality: exact cross-multiplication, no tolerance
//! - Partial sums: closed forms agree with brute-force summation

use proptest::prelude::*;
use serde_json::json;

use adaptive_math_backend::math::{parse_user_fraction, Fraction, Sequence};

fn gcd(mut a: i64, mut b: i64) -> i64 {
    a = a.abs();
    b = b.abs();
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn arb_nonzero() -> impl Strategy<Value = i64> {
    prop_oneof![-100_000i64..=-1, 1i64..=100_000]
}

fn arb_fraction() -> impl Strategy<Value = Fraction> {
    (-1000i64..=1000, arb_nonzero().prop_map(|d| d % 1000).prop_filter("nonzero", |d| *d != 0))
        .prop_map(|(n, d)| Fraction::new(n, d))
}

proptest! {
    #[test]
    fn prop_reduce_is_canonical(n in -1_000_000i64..=1_000_000, d in arb_nonzero()) {
        let f = Fraction::new(n, d);
        prop_assert!(f.denominator() > 0);
        prop_assert_eq!(gcd(f.numerator(), f.denominator()), 1);
        // Same rational value as the input.
        prop_assert_eq!(f.numerator() as i128 * d as i128, n as i128 * f.denominator() as i128);
    }

    #[test]
    fn prop_equals_matches_cross_product(a in arb_fraction(), b in arb_fraction()) {
        let cross = a.numerator() as i128 * b.denominator() as i128
            == b.numerator() as i128 * a.denominator() as i128;
        prop_assert_eq!(a.equals(&b), cross);
        prop_assert_eq!(a.equals(&b), a == b);
    }

    #[test]
    fn prop_scaled_fraction_text_is_equal(n in -500i64..=500, d in 1i64..=500, k in 1i64..=20) {
        let parsed = parse_user_fraction(&json!(format!("{}/{}", n * k, d * k)));
        prop_assert_eq!(parsed, Some(Fraction::new(n, d)));
    }

    #[test]
    fn prop_add_then_sub_is_identity(a in arb_fraction(), b in arb_fraction()) {
        prop_assert!(((a + b) - b).equals(&a));
    }

    #[test]
    fn prop_arithmetic_sum_matches_brute_force(a1 in 1i64..=50, d in 1i64..=20, n in 1u32..=30) {
        let seq = Sequence::Arithmetic { a1, d };
        let brute: i64 = (0..n).map(|k| a1 + k as i64 * d).sum();
        prop_assert_eq!(seq.partial_sum(n), brute);
    }

    #[test]
    fn prop_geometric_sum_matches_brute_force(a1 in 1i64..=50, r in 2i64..=5, n in 1u32..=8) {
        let seq = Sequence::Geometric { a1, r };
        let brute: i64 = (0..n).map(|k| a1 * r.pow(k)).sum();
        prop_assert_eq!(seq.partial_sum(n), brute);
        prop_assert_eq!(seq.terms(n).iter().sum::<i64>(), brute);
    }
}

#[test]
fn decimal_answers_are_exact_not_tolerant() {
    let five_sixths = Fraction::new(5, 6);
    assert!(parse_user_fraction(&json!("5/6")).unwrap().equals(&five_sixths));
    let approx = parse_user_fraction(&json!("0.83")).unwrap();
    assert_eq!(approx, Fraction::new(83, 100));
    assert!(!approx.equals(&five_sixths));
}
