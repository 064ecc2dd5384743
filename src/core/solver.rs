use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use super::engine::ProbabilityEngine;
use super::random::SeededRng;
use super::types::{EngineConfig, GoalScenario, TARGET_CONFIDENCE};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncreaseSolveConfig {
    /// Probability in percent the solved increase must reach.
    pub target_probability: f64,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
    pub trajectories_per_iteration: u32,
    pub final_trajectories: u32,
    pub seed: u64,
}

impl IncreaseSolveConfig {
    /// Search up to the gap between what the goal needs and what is already saved,
    /// with a floor so tiny goals still get a usable bracket.
    pub fn for_scenario(scenario: &GoalScenario, seed: u64) -> Self {
        let months = scenario.horizon();
        let gap = (scenario.goal_amount - scenario.current_savings) / months;
        let spread = scenario.monthly_income.abs() + scenario.monthly_spending.abs();
        let search_max = (gap - scenario.monthly_savings() + spread).max(100.0);
        Self {
            target_probability: TARGET_CONFIDENCE,
            search_min: 0.0,
            search_max: if search_max.is_finite() { search_max } else { 100.0 },
            tolerance: 1.0,
            max_iterations: 40,
            trajectories_per_iteration: 1_000,
            final_trajectories: 5_000,
            seed,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncreaseSolveIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_increase: f64,
    pub probability: f64,
    pub probability_ci_half_width: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncreaseSolveResult {
    pub target_probability: f64,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub solved_increase: Option<f64>,
    pub achieved_probability: Option<f64>,
    pub achieved_probability_ci_half_width: Option<f64>,
    pub iterations: Vec<IncreaseSolveIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum SolveError {
    #[error("target_probability must be between 0 and 100, got {0}")]
    TargetOutOfRange(f64),
    #[error("search bounds must be finite")]
    NonFiniteBounds,
    #[error("search_max must be greater than search_min")]
    EmptySearchRange,
    #[error("tolerance must be > 0")]
    InvalidTolerance,
    #[error("max_iterations must be > 0")]
    NoIterations,
    #[error("trajectories_per_iteration and final_trajectories must be > 0")]
    NoTrajectories,
}

/// Bisects for the smallest extra monthly saving whose simulated probability
/// reaches the target. Every candidate replays the same seeded draws, so the
/// success count is monotone in the candidate and the bracket stays valid.
pub fn solve_required_increase(
    scenario: &GoalScenario,
    config: IncreaseSolveConfig,
) -> Result<IncreaseSolveResult, SolveError> {
    validate_config(config)?;

    let mut iterations = Vec::with_capacity(config.max_iterations.min(64) as usize);
    let low_eval = evaluate_candidate(
        scenario,
        config.search_min,
        config.trajectories_per_iteration,
        config.seed,
    );
    let high_eval = evaluate_candidate(
        scenario,
        config.search_max,
        config.trajectories_per_iteration,
        config.seed,
    );

    let mut solved_increase = None;
    let mut converged = false;
    let feasible;
    let message;

    if low_eval.probability + 1e-12 >= config.target_probability {
        solved_increase = Some(config.search_min);
        converged = true;
        feasible = true;
        message = "Already meets target at lower increase bound.".to_string();
    } else if high_eval.probability + 1e-12 < config.target_probability {
        feasible = false;
        message = "No feasible increase found within the search bounds.".to_string();
    } else {
        let mut lo = config.search_min;
        let mut hi = config.search_max;
        let mut it = 0;
        while it < config.max_iterations {
            it += 1;
            let mid = (lo + hi) * 0.5;
            let eval =
                evaluate_candidate(scenario, mid, config.trajectories_per_iteration, config.seed);
            iterations.push(IncreaseSolveIteration {
                iteration: it,
                lower_bound: lo,
                upper_bound: hi,
                candidate_increase: mid,
                probability: eval.probability,
                probability_ci_half_width: eval.ci_half_width,
            });
            debug!(
                iteration = it,
                candidate = mid,
                probability = eval.probability,
                "increase solver step"
            );

            if eval.probability + 1e-12 >= config.target_probability {
                hi = mid;
            } else {
                lo = mid;
            }

            if (hi - lo).abs() <= config.tolerance {
                converged = true;
                solved_increase = Some(hi);
                break;
            }
        }
        if solved_increase.is_none() {
            solved_increase = Some(hi);
        }
        feasible = true;
        message = if converged {
            "Solved required monthly increase.".to_string()
        } else {
            "Reached max iterations before tolerance was met; returning best estimate.".to_string()
        };
    }

    let mut achieved_probability = None;
    let mut achieved_probability_ci_half_width = None;
    if let Some(value) = solved_increase {
        let final_eval =
            evaluate_candidate(scenario, value, config.final_trajectories, config.seed);
        achieved_probability = Some(final_eval.probability);
        achieved_probability_ci_half_width = Some(final_eval.ci_half_width);
    }

    Ok(IncreaseSolveResult {
        target_probability: config.target_probability,
        search_min: config.search_min,
        search_max: config.search_max,
        tolerance: config.tolerance,
        solved_increase,
        achieved_probability,
        achieved_probability_ci_half_width,
        iterations,
        converged,
        feasible,
        message,
    })
}

#[derive(Debug, Clone, Copy)]
struct CandidateEval {
    probability: f64,
    ci_half_width: f64,
}

fn evaluate_candidate(
    scenario: &GoalScenario,
    increase: f64,
    trajectories: u32,
    seed: u64,
) -> CandidateEval {
    let engine = ProbabilityEngine::new(EngineConfig {
        trajectories: trajectories.max(1),
        ..EngineConfig::default()
    });
    let probability = engine.simulate_probability(scenario, increase, &mut SeededRng::new(seed));
    CandidateEval {
        probability,
        ci_half_width: binomial_ci_half_width(probability, trajectories),
    }
}

/// 95% normal-approximation half-width, in percentage points.
fn binomial_ci_half_width(probability: f64, n: u32) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = (probability / 100.0).clamp(0.0, 1.0);
    100.0 * 1.96 * (p * (1.0 - p) / n as f64).sqrt()
}

fn validate_config(config: IncreaseSolveConfig) -> Result<(), SolveError> {
    if !(0.0..=100.0).contains(&config.target_probability) {
        return Err(SolveError::TargetOutOfRange(config.target_probability));
    }
    if !config.search_min.is_finite() || !config.search_max.is_finite() {
        return Err(SolveError::NonFiniteBounds);
    }
    if config.search_max <= config.search_min {
        return Err(SolveError::EmptySearchRange);
    }
    if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
        return Err(SolveError::InvalidTolerance);
    }
    if config.max_iterations == 0 {
        return Err(SolveError::NoIterations);
    }
    if config.trajectories_per_iteration == 0 || config.final_trajectories == 0 {
        return Err(SolveError::NoTrajectories);
    }
    Ok(())
}
