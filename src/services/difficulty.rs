use serde::{Deserialize, Serialize};

use super::level_config::{MAX_LEVEL, MIN_LEVEL};

const STREAK_TO_PROMOTE: u32 = 3;
const WRONG_ANSWERS_PER_DEMOTION: u32 = 2;

/// Per-session difficulty controller.
///
/// `wrong` is lifetime-cumulative: every second wrong answer of the session
/// demotes, regardless of how many promotions happened in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyState {
    pub level: u8,
    pub streak: u32,
    pub correct: u32,
    pub wrong: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelChange {
    Promoted { from: u8, to: u8 },
    Demoted { from: u8, to: u8 },
    Unchanged,
}

impl Default for DifficultyState {
    fn default() -> Self {
        Self {
            level: MIN_LEVEL,
            streak: 0,
            correct: 0,
            wrong: 0,
        }
    }
}

impl DifficultyState {
    pub fn record(&mut self, was_correct: bool) -> LevelChange {
        if was_correct {
            self.streak += 1;
            self.correct += 1;
            if self.streak >= STREAK_TO_PROMOTE && self.level < MAX_LEVEL {
                let from = self.level;
                self.level += 1;
                self.streak = 0;
                return LevelChange::Promoted { from, to: self.level };
            }
        } else {
            self.streak = self.streak.saturating_sub(1);
            self.wrong += 1;
            if self.wrong % WRONG_ANSWERS_PER_DEMOTION == 0 && self.level > MIN_LEVEL {
                let from = self.level;
                self.level -= 1;
                return LevelChange::Demoted { from, to: self.level };
            }
        }
        LevelChange::Unchanged
    }
}
