pub mod curve;
pub mod discipline;
pub mod rewards;
pub mod streak;

use crate::engine::curve::{LevelProgress, ProgressionCurve, QuadraticCurve, ThresholdCurve};
use crate::engine::rewards::TaskRewardRule;
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Rule set the server runs with. One per deployment; never mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Curve A with flat task rewards.
    #[default]
    Threshold,
    /// Curve B with streak-scaled task rewards.
    Quadratic,
}

impl Variant {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "threshold" | "a" => Ok(Self::Threshold),
            "quadratic" | "b" => Ok(Self::Quadratic),
            _ => bail!("variant must be one of: threshold, quadratic"),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Threshold => "threshold",
            Self::Quadratic => "quadratic",
        }
    }
}

/// XP balance and the level stored alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Standing {
    pub xp: u64,
    pub level: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelChange {
    pub previous_level: u32,
    pub new_level: u32,
    pub total_xp: u64,
    pub level_up: bool,
}

pub struct Engine {
    variant: Variant,
    curve: Box<dyn ProgressionCurve>,
}

impl Engine {
    pub fn new(variant: Variant) -> Self {
        let curve: Box<dyn ProgressionCurve> = match variant {
            Variant::Threshold => Box::new(ThresholdCurve),
            Variant::Quadratic => Box::new(QuadraticCurve),
        };

        Self { variant, curve }
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn curve(&self) -> &dyn ProgressionCurve {
        self.curve.as_ref()
    }

    pub fn task_rule(&self) -> TaskRewardRule {
        match self.variant {
            Variant::Threshold => TaskRewardRule::Flat,
            Variant::Quadratic => TaskRewardRule::StreakScaled,
        }
    }

    pub fn progress(&self, standing: Standing) -> LevelProgress {
        self.curve.xp_to_next_level(standing.xp, standing.level)
    }

    /// Applies a signed XP delta. The level is recomputed from the new total
    /// and compared against the stored one; the balance never goes negative.
    pub fn apply(&self, standing: Standing, xp_delta: i64) -> LevelChange {
        let total_xp = if xp_delta >= 0 {
            standing.xp.saturating_add(xp_delta.unsigned_abs())
        } else {
            standing.xp.saturating_sub(xp_delta.unsigned_abs())
        };
        let new_level = self.curve.level_from_xp(total_xp);

        LevelChange {
            previous_level: standing.level,
            new_level,
            total_xp,
            level_up: new_level > standing.level,
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("variant", &self.variant)
            .field("curve", &self.curve.name())
            .finish()
    }
}
