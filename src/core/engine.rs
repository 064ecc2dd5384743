use tracing::debug;

use super::random::{RandomSource, SystemRandom};
use super::types::{EngineConfig, GoalScenario, ProbabilityResult};

/// Monte Carlo estimator for savings goals. Holds only configuration; every
/// call is independent and draws from the random source it is handed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProbabilityEngine {
    config: EngineConfig,
}

impl ProbabilityEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    pub fn evaluate(&self, scenario: &GoalScenario) -> ProbabilityResult {
        self.evaluate_with(scenario, &mut SystemRandom::new())
    }

    pub fn evaluate_with<R: RandomSource + ?Sized>(
        &self,
        scenario: &GoalScenario,
        rng: &mut R,
    ) -> ProbabilityResult {
        let months = scenario.horizon();
        let monthly_savings = scenario.monthly_savings();
        let LinearProjection {
            projected_amount,
            monthly_shortfall,
        } = linear_projection(scenario);

        let probability = self.simulate_probability(scenario, 0.0, rng);

        let recommended_increase = if probability < self.config.target_confidence {
            let monthly_needed = (scenario.goal_amount - scenario.current_savings) / months;
            let safe_monthly_needed = monthly_needed * self.config.safety_buffer;
            (safe_monthly_needed - monthly_savings).round().max(0.0)
        } else {
            0.0
        };

        debug!(
            months,
            probability, monthly_shortfall, recommended_increase, "evaluated goal scenario"
        );

        ProbabilityResult {
            probability,
            monthly_shortfall,
            recommended_increase,
            projected_amount: projected_amount.round(),
        }
    }

    /// Percentage of trajectories that end at or above the goal when
    /// `extra_monthly` is saved on top of the scenario's income surplus each month.
    pub(crate) fn simulate_probability<R: RandomSource + ?Sized>(
        &self,
        scenario: &GoalScenario,
        extra_monthly: f64,
        rng: &mut R,
    ) -> f64 {
        let trajectories = self.config.trajectories.max(1);
        let months = scenario.horizon_months();

        let mut successes = 0_u32;
        for _ in 0..trajectories {
            let final_savings = simulate_trajectory(
                scenario,
                months,
                extra_monthly,
                self.config.variance_ratio,
                rng,
            );
            if final_savings >= scenario.goal_amount {
                successes += 1;
            }
        }

        let probability = 100.0 * successes as f64 / trajectories as f64;
        if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 100.0)
        }
    }
}

/// Evaluates with the default contract (1000 trajectories, 75% target) and
/// thread-local randomness.
pub fn evaluate(scenario: &GoalScenario) -> ProbabilityResult {
    ProbabilityEngine::default().evaluate(scenario)
}

#[derive(Debug, Clone, Copy)]
struct LinearProjection {
    projected_amount: f64,
    monthly_shortfall: f64,
}

// Variance-free forecast over the full f64 horizon, independent of the step counter.
fn linear_projection(scenario: &GoalScenario) -> LinearProjection {
    let months = scenario.horizon();
    let projected_amount = scenario.current_savings + scenario.monthly_savings() * months;
    LinearProjection {
        projected_amount,
        monthly_shortfall: ((scenario.goal_amount - projected_amount) / months).max(0.0),
    }
}

// Uniform perturbation of ±(2 × variance) around each mean; two draws per month.
fn simulate_trajectory<R: RandomSource + ?Sized>(
    scenario: &GoalScenario,
    months: u32,
    extra_monthly: f64,
    variance_ratio: f64,
    rng: &mut R,
) -> f64 {
    let income_variance = scenario.monthly_income * variance_ratio;
    let spending_variance = scenario.monthly_spending * variance_ratio;

    let mut savings = scenario.current_savings;
    for _ in 0..months {
        let income = scenario.monthly_income + rng.next_signed_unit() * 2.0 * income_variance;
        let spending =
            scenario.monthly_spending + rng.next_signed_unit() * 2.0 * spending_variance;
        savings += income - spending + extra_monthly;
    }
    savings
}
