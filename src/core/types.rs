use serde::{Deserialize, Serialize};

/// Trajectories simulated per evaluation.
pub const DEFAULT_TRAJECTORIES: u32 = 1_000;
/// Half-width scale of the monthly income/spending perturbation, as a share of the mean.
pub const DEFAULT_VARIANCE_RATIO: f64 = 0.10;
/// Probability (percent) below which a savings increase is recommended.
pub const TARGET_CONFIDENCE: f64 = 75.0;
/// Multiplier applied to the naive monthly requirement when recommending an increase.
pub const SAFETY_BUFFER: f64 = 1.15;

/// Inputs for one goal evaluation. No field is validated here; negative
/// savings, non-positive goals and past deadlines all flow through the
/// arithmetic unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalScenario {
    pub monthly_income: f64,
    pub monthly_spending: f64,
    pub current_savings: f64,
    pub goal_amount: f64,
    /// Rounded and clamped to at least one month before use.
    pub months_to_goal: f64,
}

impl GoalScenario {
    pub fn monthly_savings(&self) -> f64 {
        self.monthly_income - self.monthly_spending
    }

    /// `max(1, round(months_to_goal))`, unbounded. NaN maps to one month.
    /// The deterministic projection uses this value.
    pub fn horizon(&self) -> f64 {
        let rounded = self.months_to_goal.round();
        if rounded.is_nan() || rounded < 1.0 {
            1.0
        } else {
            rounded
        }
    }

    /// Simulated step count; saturates at `u32::MAX`.
    pub fn horizon_months(&self) -> u32 {
        self.horizon() as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbabilityResult {
    /// Percentage of trajectories that reached the goal, in [0, 100].
    pub probability: f64,
    pub monthly_shortfall: f64,
    pub recommended_increase: f64,
    pub projected_amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub trajectories: u32,
    pub variance_ratio: f64,
    pub target_confidence: f64,
    pub safety_buffer: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trajectories: DEFAULT_TRAJECTORIES,
            variance_ratio: DEFAULT_VARIANCE_RATIO,
            target_confidence: TARGET_CONFIDENCE,
            safety_buffer: SAFETY_BUFFER,
        }
    }
}
