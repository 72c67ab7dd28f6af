use serde::Serialize;

pub const QUADRATIC_MAX_LEVEL: u32 = 1000;

/// Progress inside the current level: XP earned since the level started and
/// the XP span of the whole level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelProgress {
    pub level: u32,
    pub current_xp: u64,
    pub next_level_xp: u64,
}

/// A level curve. `level_from_xp` must be non-decreasing in `total_xp` and
/// return 1 for a zero balance.
pub trait ProgressionCurve: Send + Sync {
    fn name(&self) -> &'static str;

    /// XP threshold shown for `level`. Curve-specific meaning, see the impls.
    fn xp_for_level(&self, level: u32) -> u64;

    fn level_from_xp(&self, total_xp: u64) -> u32;

    /// Smallest total at which `level` is reached.
    fn level_floor(&self, level: u32) -> u64;

    fn xp_to_next_level(&self, total_xp: u64, level: u32) -> LevelProgress;

    fn max_level(&self) -> Option<u32> {
        None
    }
}

/// Curve A. `xp_for_level(l)` is the cost of advancing from `l` to `l + 1`
/// and levels consume their cost from the running total.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThresholdCurve;

impl ProgressionCurve for ThresholdCurve {
    fn name(&self) -> &'static str {
        "threshold"
    }

    fn xp_for_level(&self, level: u32) -> u64 {
        // floor(100 * l^1.5) == floor(sqrt(10_000 * l^3))
        let level = u128::from(level.max(1));
        let scaled = 10_000 * level * level * level;
        u64::try_from(isqrt(scaled)).unwrap_or(u64::MAX)
    }

    fn level_from_xp(&self, total_xp: u64) -> u32 {
        let mut remainder = total_xp;
        let mut level = 1_u32;

        loop {
            let cost = self.xp_for_level(level);
            if remainder < cost {
                return level;
            }
            remainder -= cost;
            level += 1;
        }
    }

    fn level_floor(&self, level: u32) -> u64 {
        (1..level.max(1))
            .map(|previous| self.xp_for_level(previous))
            .fold(0_u64, u64::saturating_add)
    }

    fn xp_to_next_level(&self, total_xp: u64, level: u32) -> LevelProgress {
        let level = level.max(1);

        LevelProgress {
            level,
            current_xp: total_xp.saturating_sub(self.level_floor(level)),
            next_level_xp: self.xp_for_level(level),
        }
    }
}

/// Curve B. XP is a running total and the level is its closed-form inverse,
/// capped at [`QUADRATIC_MAX_LEVEL`]. `xp_for_level(l)` is the total at which
/// level `l + 1` starts; at the cap `xp_to_next_level` reports a zero span.
#[derive(Debug, Default, Clone, Copy)]
pub struct QuadraticCurve;

impl QuadraticCurve {
    fn level_start(level: u32) -> u64 {
        let previous = u64::from(level.max(1) - 1);
        previous * previous * 100
    }
}

impl ProgressionCurve for QuadraticCurve {
    fn name(&self) -> &'static str {
        "quadratic"
    }

    fn xp_for_level(&self, level: u32) -> u64 {
        let level = u64::from(level);
        level.saturating_mul(level).saturating_mul(100)
    }

    fn level_from_xp(&self, total_xp: u64) -> u32 {
        // floor(sqrt(x / 100)) == isqrt(floor(x / 100)) for integer x
        let root = isqrt(u128::from(total_xp / 100));
        let level = u32::try_from(root.saturating_add(1)).unwrap_or(QUADRATIC_MAX_LEVEL);
        level.clamp(1, QUADRATIC_MAX_LEVEL)
    }

    fn level_floor(&self, level: u32) -> u64 {
        Self::level_start(level.clamp(1, QUADRATIC_MAX_LEVEL))
    }

    fn xp_to_next_level(&self, total_xp: u64, level: u32) -> LevelProgress {
        let level = level.clamp(1, QUADRATIC_MAX_LEVEL);
        let start = Self::level_start(level);
        let span = if level >= QUADRATIC_MAX_LEVEL {
            0
        } else {
            Self::level_start(level + 1) - start
        };

        LevelProgress {
            level,
            current_xp: total_xp.saturating_sub(start),
            next_level_xp: span,
        }
    }

    fn max_level(&self) -> Option<u32> {
        Some(QUADRATIC_MAX_LEVEL)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CurveRow {
    pub level: u32,
    pub total_xp: u64,
    pub level_span: u64,
}

/// First `levels` levels of `curve`, stopping early at its cap.
pub fn curve_table(curve: &dyn ProgressionCurve, levels: u32) -> Vec<CurveRow> {
    let last = curve.max_level().map_or(levels, |cap| levels.min(cap));

    (1..=last)
        .map(|level| {
            let total_xp = curve.level_floor(level);
            CurveRow {
                level,
                total_xp,
                level_span: curve.xp_to_next_level(total_xp, level).next_level_xp,
            }
        })
        .collect()
}

fn isqrt(value: u128) -> u128 {
    if value < 2 {
        return value;
    }

    let mut root = (value as f64).sqrt() as u128;
    while root.checked_mul(root).is_none_or(|square| square > value) {
        root -= 1;
    }
    while (root + 1)
        .checked_mul(root + 1)
        .is_some_and(|square| square <= value)
    {
        root += 1;
    }
    root
}
