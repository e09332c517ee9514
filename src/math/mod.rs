pub mod fraction;
pub mod sequence;

pub use fraction::{parse_fraction_text, parse_user_fraction, Fraction};
pub use sequence::{Sequence, SequenceKind};
