mod engine;
mod random;
mod solver;
mod types;

pub use engine::{ProbabilityEngine, evaluate};
pub use random::{RandomSource, SeededRng, SystemRandom, derive_seed};
pub use solver::{
    IncreaseSolveConfig, IncreaseSolveIteration, IncreaseSolveResult, SolveError,
    solve_required_increase,
};
pub use types::{
    DEFAULT_TRAJECTORIES, DEFAULT_VARIANCE_RATIO, EngineConfig, GoalScenario, ProbabilityResult,
    SAFETY_BUFFER, TARGET_CONFIDENCE,
};
