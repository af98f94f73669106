use serde::{Deserialize, Serialize};

/// Upper bound of the error discount; a lesson always pays at least 30% of its base reward.
pub const MAX_ERROR_RATIO: f64 = 0.7;

/// Default perfect-lesson bonus, in percent of the reward.
pub const DEFAULT_PERFECT_BONUS_PERCENT: u32 = 120;

/// How the perfect bonus combines with the error discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BonusPrecedence {
    /// Multiply the discounted reward by the bonus
    #[default]
    Compound,
    /// Add `base * (bonus - 100%)` on top of the discounted reward
    Additive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerfectBonus {
    /// 120 means x1.2, 100 disables the bonus
    pub percent: u32,
    pub precedence: BonusPrecedence,
}

impl PerfectBonus {
    pub fn disabled() -> Self {
        Self {
            percent: 100,
            precedence: BonusPrecedence::Compound,
        }
    }

    /// Builds the bonus from a float multiplier such as `1.2`.
    pub fn from_multiplier(multiplier: f64, precedence: BonusPrecedence) -> Self {
        let percent = (multiplier.max(1.0) * 100.0).round() as u32;
        Self {
            percent,
            precedence,
        }
    }

    fn apply(&self, base: u32, discounted: u32) -> u32 {
        match self.precedence {
            BonusPrecedence::Compound => scale(discounted, self.percent),
            BonusPrecedence::Additive => {
                discounted.saturating_add(scale(base, self.percent.saturating_sub(100)))
            }
        }
    }
}

impl Default for PerfectBonus {
    fn default() -> Self {
        Self {
            percent: DEFAULT_PERFECT_BONUS_PERCENT,
            precedence: BonusPrecedence::Compound,
        }
    }
}

fn scale(value: u32, percent: u32) -> u32 {
    let scaled = u64::from(value) * u64::from(percent) / 100;
    u32::try_from(scaled).unwrap_or(u32::MAX)
}

/// What a finished lesson pays out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonReward {
    pub exp: u32,
    pub money: u32,
    pub errors: u32,
    pub perfect: bool,
}

/// Share of the reward lost to mistakes: `errors / (activities * 0.5)`, capped at 0.7.
pub fn error_ratio(errors: u32, activity_count: usize) -> f64 {
    if errors == 0 {
        return 0.0;
    }
    if activity_count == 0 {
        return MAX_ERROR_RATIO;
    }
    let ratio = f64::from(errors) / (activity_count as f64 * 0.5);
    ratio.min(MAX_ERROR_RATIO)
}

fn discount(base: u32, ratio: f64) -> u32 {
    (f64::from(base) * (1.0 - ratio)).floor().max(0.0) as u32
}

/// Base rewards of a lesson plus the bonus policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardPolicy {
    pub base_exp: u32,
    pub base_money: u32,
    pub bonus: PerfectBonus,
}

impl RewardPolicy {
    pub fn new(base_exp: u32, base_money: u32) -> Self {
        Self {
            base_exp,
            base_money,
            bonus: PerfectBonus::default(),
        }
    }

    pub fn with_bonus(mut self, bonus: PerfectBonus) -> Self {
        self.bonus = bonus;
        self
    }

    /// Reward without the perfect bonus.
    pub fn base_reward(&self, activity_count: usize, errors: u32) -> LessonReward {
        let ratio = error_ratio(errors, activity_count);
        LessonReward {
            exp: discount(self.base_exp, ratio),
            money: discount(self.base_money, ratio),
            errors,
            perfect: errors == 0,
        }
    }

    /// Final reward; the bonus only applies to perfect lessons.
    pub fn compute(&self, activity_count: usize, errors: u32) -> LessonReward {
        let reward = self.base_reward(activity_count, errors);
        if !reward.perfect {
            return reward;
        }
        LessonReward {
            exp: self.bonus.apply(self.base_exp, reward.exp),
            money: self.bonus.apply(self.base_money, reward.money),
            ..reward
        }
    }
}
