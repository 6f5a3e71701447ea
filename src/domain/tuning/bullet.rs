/// Gameplay tuning for bullets.

#[derive(Debug, Clone, Copy)]
pub struct BulletTuning {
    /// Travel speed in units per tick.
    pub speed: f32,

    /// Collision radius in units.
    pub size: f32,

    /// Whether a bullet may hit the player who fired it.
    pub self_hit: SelfHitRule,
}

impl Default for BulletTuning {
    fn default() -> Self {
        Self {
            speed: 6.0,
            size: 5.0,
            self_hit: SelfHitRule::AfterTicks(30),
        }
    }
}

/// Self-hit policy for bullets and their firer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelfHitRule {
    /// A bullet never hits its firer.
    Never,
    /// A bullet can hit its firer from the tick it spawns.
    Always,
    /// A bullet can hit its firer once it is at least this many ticks old.
    AfterTicks(u32),
}

impl SelfHitRule {
    pub fn allows(self, bullet_age_ticks: u64) -> bool {
        match self {
            SelfHitRule::Never => false,
            SelfHitRule::Always => true,
            SelfHitRule::AfterTicks(grace) => bullet_age_ticks >= u64::from(grace),
        }
    }
}
