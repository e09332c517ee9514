use super::problem::OperationKind;

pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 5;

// Per operation: magnitude bound for integer operands, max denominator for
// fractions, or parameter magnitude for sequences.
const ADD_SUB_MAGNITUDE: [i64; 5] = [9, 20, 50, 99, 999];
const MUL_DIV_MAGNITUDE: [i64; 5] = [5, 10, 12, 20, 50];
const FRAC_MAGNITUDE: [i64; 5] = [6, 8, 10, 12, 20];
const SEQ_MAGNITUDE: [i64; 5] = [20, 40, 80, 120, 200];

const ADD_SUB_BIAS: [f64; 5] = [0.0, 0.2, 0.4, 0.6, 0.8];
const MUL_DIV_FRAC_BIAS: [f64; 5] = [0.0, 0.15, 0.3, 0.45, 0.6];
const SEQ_BIAS: [f64; 5] = [0.0, 0.1, 0.2, 0.35, 0.5];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelConfig {
    pub level: u8,
    pub max_magnitude: i64,
    pub carry_borrow_bias: f64,
}

pub fn clamp_level(level: i64) -> u8 {
    level.clamp(MIN_LEVEL as i64, MAX_LEVEL as i64) as u8
}

pub fn level_config(op: OperationKind, level: u8) -> LevelConfig {
    let level = clamp_level(level as i64);
    let idx = (level - 1) as usize;

    let (magnitudes, biases) = match op {
        OperationKind::Add | OperationKind::Sub => (&ADD_SUB_MAGNITUDE, &ADD_SUB_BIAS),
        OperationKind::Mul | OperationKind::Div => (&MUL_DIV_MAGNITUDE, &MUL_DIV_FRAC_BIAS),
        OperationKind::Frac => (&FRAC_MAGNITUDE, &MUL_DIV_FRAC_BIAS),
        OperationKind::Seq => (&SEQ_MAGNITUDE, &SEQ_BIAS),
    };

    LevelConfig {
        level,
        max_magnitude: magnitudes[idx],
        carry_borrow_bias: biases[idx],
    }
}
