use axum::{
    Router,
    extract::{
        Json, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::core::{
    GoalScenario, IncreaseSolveConfig, IncreaseSolveResult, ProbabilityEngine, ProbabilityResult,
    SeededRng, SolveError, TARGET_CONFIDENCE, evaluate, solve_required_increase,
};

/// Longest horizon the boundary accepts: 100 years.
const MAX_MONTHS_TO_GOAL: f64 = 1_200.0;
/// Solver work limits accepted from callers.
const MAX_SOLVER_ITERATIONS: u32 = 200;
const MAX_TRAJECTORIES: u32 = 100_000;

#[derive(Parser, Debug)]
#[command(
    name = "goalprob",
    about = "Monte Carlo estimator for reaching a savings goal by a deadline"
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        env = "GOALPROB_LOG",
        default_value = "info",
        help = "tracing filter directive, e.g. debug or goalprob=trace"
    )]
    pub log_filter: String,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Estimate the probability of reaching the goal and the recommended increase
    Evaluate(EvaluateArgs),
    /// Search for the smallest extra monthly saving that reaches a target probability
    Solve(SolveArgs),
    /// Serve the JSON API
    Serve {
        #[arg(long, env = "GOALPROB_PORT", default_value_t = 8080)]
        port: u16,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ScenarioArgs {
    #[arg(long, help = "Average monthly income")]
    pub monthly_income: f64,
    #[arg(long, help = "Average monthly spending")]
    pub monthly_spending: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        allow_hyphen_values = true,
        help = "Savings already put toward the goal"
    )]
    pub current_savings: f64,
    #[arg(long, help = "Target savings amount")]
    pub goal_amount: f64,
    #[arg(
        long,
        allow_hyphen_values = true,
        help = "Whole months until the deadline; 0 or less is treated as 1"
    )]
    pub months_to_goal: f64,
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub scenario: ScenarioArgs,
    #[arg(long, help = "Seed for a reproducible run; omitted means system randomness")]
    pub seed: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct SolveArgs {
    #[command(flatten)]
    pub scenario: ScenarioArgs,
    #[command(flatten)]
    pub options: SolveOptions,
}

#[derive(Args, Debug, Clone, Copy)]
pub struct SolveOptions {
    #[arg(long, default_value_t = TARGET_CONFIDENCE, help = "Target probability in percent")]
    pub target_probability: f64,
    #[arg(long, help = "Upper bound for the monthly increase; derived from the goal if omitted")]
    pub search_max: Option<f64>,
    #[arg(long, default_value_t = 1.0)]
    pub tolerance: f64,
    #[arg(long, default_value_t = 40)]
    pub max_iterations: u32,
    #[arg(long, default_value_t = 1_000)]
    pub trajectories: u32,
    #[arg(long, default_value_t = 5_000)]
    pub final_trajectories: u32,
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

#[derive(Debug, Error, PartialEq)]
pub enum ScenarioError {
    #[error("{0} must be a finite number")]
    NonFinite(&'static str),
    #[error("{0} must be >= 0")]
    Negative(&'static str),
    #[error("--goal-amount must be > 0")]
    NonPositiveGoal,
    #[error("--months-to-goal must be between 0 and 1200, got {0}")]
    HorizonOutOfRange(f64),
}

#[derive(Debug, Error, PartialEq)]
pub enum SolveOptionsError {
    #[error("--max-iterations must be at most 200, got {0}")]
    TooManyIterations(u32),
    #[error("{0} must be at most 100000, got {1}")]
    TooManyTrajectories(&'static str, u32),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid scenario: {0}")]
    Scenario(#[from] ScenarioError),
    #[error("invalid solver options: {0}")]
    SolveOptions(#[from] SolveOptionsError),
    #[error("invalid solver options: {0}")]
    Solve(#[from] SolveError),
    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProbabilityBand {
    Severe,
    Caution,
    OnTrack,
}

impl ProbabilityBand {
    pub fn from_probability(probability: f64) -> Self {
        if probability < 50.0 {
            ProbabilityBand::Severe
        } else if probability < 70.0 {
            ProbabilityBand::Caution
        } else {
            ProbabilityBand::OnTrack
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ScenarioPayload {
    monthly_income: Option<f64>,
    monthly_spending: Option<f64>,
    current_savings: Option<f64>,
    goal_amount: Option<f64>,
    months_to_goal: Option<f64>,
}

// Flat on purpose: query-string decoding cannot parse numbers through `flatten`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct EvaluatePayload {
    monthly_income: Option<f64>,
    monthly_spending: Option<f64>,
    current_savings: Option<f64>,
    goal_amount: Option<f64>,
    months_to_goal: Option<f64>,
    seed: Option<u64>,
}

impl EvaluatePayload {
    fn scenario(&self) -> ScenarioPayload {
        ScenarioPayload {
            monthly_income: self.monthly_income,
            monthly_spending: self.monthly_spending,
            current_savings: self.current_savings,
            goal_amount: self.goal_amount,
            months_to_goal: self.months_to_goal,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SolvePayload {
    #[serde(flatten)]
    scenario: ScenarioPayload,
    target_probability: Option<f64>,
    search_max: Option<f64>,
    tolerance: Option<f64>,
    max_iterations: Option<u32>,
    trajectories: Option<u32>,
    final_trajectories: Option<u32>,
    seed: Option<u64>,
}

#[derive(Debug)]
struct EvaluateRequest {
    scenario: GoalScenario,
    seed: Option<u64>,
}

#[derive(Debug)]
struct SolveRequest {
    scenario: GoalScenario,
    config: IncreaseSolveConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResponse {
    scenario: GoalScenario,
    months_evaluated: u32,
    target_confidence: f64,
    probability: f64,
    monthly_shortfall: f64,
    recommended_increase: f64,
    projected_amount: f64,
    band: ProbabilityBand,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveResponse {
    scenario: GoalScenario,
    months_evaluated: u32,
    #[serde(flatten)]
    result: IncreaseSolveResult,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Boundary validation in front of the permissive core.
pub fn build_scenario(args: &ScenarioArgs) -> Result<GoalScenario, ScenarioError> {
    for (name, value) in [
        ("--monthly-income", args.monthly_income),
        ("--monthly-spending", args.monthly_spending),
        ("--current-savings", args.current_savings),
        ("--goal-amount", args.goal_amount),
        ("--months-to-goal", args.months_to_goal),
    ] {
        if !value.is_finite() {
            return Err(ScenarioError::NonFinite(name));
        }
    }

    if args.monthly_income < 0.0 {
        return Err(ScenarioError::Negative("--monthly-income"));
    }
    if args.monthly_spending < 0.0 {
        return Err(ScenarioError::Negative("--monthly-spending"));
    }
    if args.goal_amount <= 0.0 {
        return Err(ScenarioError::NonPositiveGoal);
    }
    if !(0.0..=MAX_MONTHS_TO_GOAL).contains(&args.months_to_goal) {
        return Err(ScenarioError::HorizonOutOfRange(args.months_to_goal));
    }

    Ok(GoalScenario {
        monthly_income: args.monthly_income,
        monthly_spending: args.monthly_spending,
        current_savings: args.current_savings,
        goal_amount: args.goal_amount,
        months_to_goal: args.months_to_goal,
    })
}

/// Applies caller options over the scenario-derived defaults, capping the
/// amount of simulation work a single request can ask for.
pub fn build_solve_config(
    scenario: &GoalScenario,
    options: SolveOptions,
) -> Result<IncreaseSolveConfig, SolveOptionsError> {
    if options.max_iterations > MAX_SOLVER_ITERATIONS {
        return Err(SolveOptionsError::TooManyIterations(options.max_iterations));
    }
    for (name, value) in [
        ("--trajectories", options.trajectories),
        ("--final-trajectories", options.final_trajectories),
    ] {
        if value > MAX_TRAJECTORIES {
            return Err(SolveOptionsError::TooManyTrajectories(name, value));
        }
    }

    let defaults = IncreaseSolveConfig::for_scenario(scenario, options.seed);
    Ok(IncreaseSolveConfig {
        target_probability: options.target_probability,
        search_max: options.search_max.unwrap_or(defaults.search_max),
        tolerance: options.tolerance,
        max_iterations: options.max_iterations,
        trajectories_per_iteration: options.trajectories,
        final_trajectories: options.final_trajectories,
        ..defaults
    })
}

pub fn run_evaluation(scenario: &GoalScenario, seed: Option<u64>) -> ProbabilityResult {
    match seed {
        Some(seed) => ProbabilityEngine::default().evaluate_with(scenario, &mut SeededRng::new(seed)),
        None => evaluate(scenario),
    }
}

pub fn build_evaluate_response(
    scenario: &GoalScenario,
    result: &ProbabilityResult,
) -> EvaluateResponse {
    EvaluateResponse {
        scenario: *scenario,
        months_evaluated: scenario.horizon_months(),
        target_confidence: TARGET_CONFIDENCE,
        probability: result.probability,
        monthly_shortfall: result.monthly_shortfall,
        recommended_increase: result.recommended_increase,
        projected_amount: result.projected_amount,
        band: ProbabilityBand::from_probability(result.probability),
    }
}

fn build_solve_response(scenario: &GoalScenario, result: IncreaseSolveResult) -> SolveResponse {
    SolveResponse {
        scenario: *scenario,
        months_evaluated: scenario.horizon_months(),
        result,
    }
}

pub async fn run_cli(cli: Cli) -> Result<(), AppError> {
    match cli.command {
        Command::Evaluate(args) => {
            let scenario = build_scenario(&args.scenario)?;
            let result = run_evaluation(&scenario, args.seed);
            let response = build_evaluate_response(&scenario, &result);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Solve(args) => {
            let scenario = build_scenario(&args.scenario)?;
            let config = build_solve_config(&scenario, args.options)?;
            let result = solve_required_increase(&scenario, config)?;
            let response = build_solve_response(&scenario, result);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Serve { port } => run_http_server(port).await?,
    }
    Ok(())
}

fn router() -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/evaluate",
            get(evaluate_get_handler).post(evaluate_post_handler),
        )
        .route("/api/solve", post(solve_post_handler))
        .fallback(not_found_handler)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "goal probability API listening");

    axum::serve(listener, router()).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, serde_json::json!({ "status": "ok" }))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn evaluate_get_handler(
    payload: Result<Query<EvaluatePayload>, QueryRejection>,
) -> Response {
    match payload {
        Ok(Query(payload)) => evaluate_handler_impl(payload).await,
        Err(rejection) => {
            warn!(error = %rejection, "malformed evaluate query");
            error_response(rejection.status(), &rejection.body_text())
        }
    }
}

async fn evaluate_post_handler(
    payload: Result<Json<EvaluatePayload>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(payload)) => evaluate_handler_impl(payload).await,
        Err(rejection) => {
            warn!(error = %rejection, "malformed evaluate body");
            error_response(rejection.status(), &rejection.body_text())
        }
    }
}

async fn evaluate_handler_impl(payload: EvaluatePayload) -> Response {
    let request = match evaluate_request_from_payload(payload) {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "rejected evaluate request");
            return error_response(StatusCode::BAD_REQUEST, &err.to_string());
        }
    };

    let scenario = request.scenario;
    let seed = request.seed;
    match tokio::task::spawn_blocking(move || run_evaluation(&scenario, seed)).await {
        Ok(result) => json_response(StatusCode::OK, build_evaluate_response(&scenario, &result)),
        Err(err) => {
            error!(error = %err, "evaluation task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Evaluation failed")
        }
    }
}

async fn solve_post_handler(payload: Result<Json<SolvePayload>, JsonRejection>) -> Response {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            warn!(error = %rejection, "malformed solve body");
            return error_response(rejection.status(), &rejection.body_text());
        }
    };
    let request = match solve_request_from_payload(payload) {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "rejected solve request");
            return error_response(StatusCode::BAD_REQUEST, &err.to_string());
        }
    };

    let scenario = request.scenario;
    let config = request.config;
    match tokio::task::spawn_blocking(move || solve_required_increase(&scenario, config)).await {
        Ok(Ok(result)) => json_response(StatusCode::OK, build_solve_response(&scenario, result)),
        Ok(Err(err)) => error_response(StatusCode::BAD_REQUEST, &err.to_string()),
        Err(err) => {
            error!(error = %err, "solver task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Solver failed")
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

fn default_scenario_args() -> ScenarioArgs {
    ScenarioArgs {
        monthly_income: 5_000.0,
        monthly_spending: 4_000.0,
        current_savings: 2_000.0,
        goal_amount: 15_000.0,
        months_to_goal: 12.0,
    }
}

fn default_solve_options() -> SolveOptions {
    SolveOptions {
        target_probability: TARGET_CONFIDENCE,
        search_max: None,
        tolerance: 1.0,
        max_iterations: 40,
        trajectories: 1_000,
        final_trajectories: 5_000,
        seed: 42,
    }
}

fn scenario_args_from_payload(payload: ScenarioPayload) -> ScenarioArgs {
    let mut args = default_scenario_args();
    if let Some(v) = payload.monthly_income {
        args.monthly_income = v;
    }
    if let Some(v) = payload.monthly_spending {
        args.monthly_spending = v;
    }
    if let Some(v) = payload.current_savings {
        args.current_savings = v;
    }
    if let Some(v) = payload.goal_amount {
        args.goal_amount = v;
    }
    if let Some(v) = payload.months_to_goal {
        args.months_to_goal = v;
    }
    args
}

fn evaluate_request_from_payload(payload: EvaluatePayload) -> Result<EvaluateRequest, AppError> {
    let scenario = build_scenario(&scenario_args_from_payload(payload.scenario()))?;
    Ok(EvaluateRequest {
        scenario,
        seed: payload.seed,
    })
}

fn solve_request_from_payload(payload: SolvePayload) -> Result<SolveRequest, AppError> {
    let scenario = build_scenario(&scenario_args_from_payload(payload.scenario))?;

    let mut options = default_solve_options();
    if let Some(v) = payload.target_probability {
        options.target_probability = v;
    }
    if payload.search_max.is_some() {
        options.search_max = payload.search_max;
    }
    if let Some(v) = payload.tolerance {
        options.tolerance = v;
    }
    if let Some(v) = payload.max_iterations {
        options.max_iterations = v;
    }
    if let Some(v) = payload.trajectories {
        options.trajectories = v;
    }
    if let Some(v) = payload.final_trajectories {
        options.final_trajectories = v;
    }
    if let Some(v) = payload.seed {
        options.seed = v;
    }

    Ok(SolveRequest {
        config: build_solve_config(&scenario, options)?,
        scenario,
    })
}

#[cfg(test)]
fn evaluate_request_from_json(json: &str) -> Result<EvaluateRequest, String> {
    let payload = serde_json::from_str::<EvaluatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    evaluate_request_from_payload(payload).map_err(|e| e.to_string())
}

#[cfg(test)]
fn solve_request_from_json(json: &str) -> Result<SolveRequest, String> {
    let payload = serde_json::from_str::<SolvePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    solve_request_from_payload(payload).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn build_scenario_accepts_defaults_and_negative_savings() {
        let mut args = default_scenario_args();
        args.current_savings = -250.0;
        let scenario = build_scenario(&args).expect("valid scenario");
        assert_approx(scenario.current_savings, -250.0);
        assert_approx(scenario.goal_amount, 15_000.0);
    }

    #[test]
    fn build_scenario_rejects_non_positive_goal() {
        let mut args = default_scenario_args();
        args.goal_amount = 0.0;
        let err = build_scenario(&args).expect_err("must reject zero goal");
        assert_eq!(err, ScenarioError::NonPositiveGoal);
        assert!(err.to_string().contains("--goal-amount"));
    }

    #[test]
    fn build_scenario_rejects_negative_cash_flows() {
        let mut args = default_scenario_args();
        args.monthly_spending = -1.0;
        let err = build_scenario(&args).expect_err("must reject negative spending");
        assert!(err.to_string().contains("--monthly-spending"));

        let mut args = default_scenario_args();
        args.monthly_income = -1.0;
        let err = build_scenario(&args).expect_err("must reject negative income");
        assert!(err.to_string().contains("--monthly-income"));
    }

    #[test]
    fn build_scenario_rejects_non_finite_values() {
        let mut args = default_scenario_args();
        args.current_savings = f64::NAN;
        let err = build_scenario(&args).expect_err("must reject NaN");
        assert_eq!(err, ScenarioError::NonFinite("--current-savings"));
    }

    #[test]
    fn build_scenario_bounds_the_horizon() {
        let mut args = default_scenario_args();
        args.months_to_goal = -1.0;
        assert!(matches!(
            build_scenario(&args),
            Err(ScenarioError::HorizonOutOfRange(_))
        ));

        args.months_to_goal = 1_201.0;
        assert!(matches!(
            build_scenario(&args),
            Err(ScenarioError::HorizonOutOfRange(_))
        ));

        args.months_to_goal = 0.0;
        let scenario = build_scenario(&args).expect("zero months is allowed");
        assert_eq!(scenario.horizon_months(), 1);
    }

    #[test]
    fn probability_bands_follow_presentation_thresholds() {
        assert_eq!(ProbabilityBand::from_probability(0.0), ProbabilityBand::Severe);
        assert_eq!(ProbabilityBand::from_probability(49.9), ProbabilityBand::Severe);
        assert_eq!(ProbabilityBand::from_probability(50.0), ProbabilityBand::Caution);
        assert_eq!(ProbabilityBand::from_probability(69.9), ProbabilityBand::Caution);
        assert_eq!(ProbabilityBand::from_probability(70.0), ProbabilityBand::OnTrack);
        assert_eq!(ProbabilityBand::from_probability(100.0), ProbabilityBand::OnTrack);
    }

    #[test]
    fn evaluate_request_from_json_parses_web_keys() {
        let json = r#"{
          "monthlyIncome": 6200,
          "monthlySpending": 4100.5,
          "currentSavings": 800,
          "goalAmount": 30000,
          "monthsToGoal": 24,
          "seed": 9
        }"#;
        let request = evaluate_request_from_json(json).expect("json should parse");
        assert_approx(request.scenario.monthly_income, 6_200.0);
        assert_approx(request.scenario.monthly_spending, 4_100.5);
        assert_approx(request.scenario.current_savings, 800.0);
        assert_approx(request.scenario.goal_amount, 30_000.0);
        assert_approx(request.scenario.months_to_goal, 24.0);
        assert_eq!(request.seed, Some(9));
    }

    #[test]
    fn evaluate_request_from_json_fills_defaults() {
        let request = evaluate_request_from_json(r#"{ "goalAmount": 20000 }"#)
            .expect("json should parse");
        assert_approx(request.scenario.monthly_income, 5_000.0);
        assert_approx(request.scenario.goal_amount, 20_000.0);
        assert_eq!(request.seed, None);
    }

    #[test]
    fn evaluate_request_from_json_reports_validation_errors() {
        let err = evaluate_request_from_json(r#"{ "goalAmount": -5 }"#)
            .expect_err("must reject negative goal");
        assert!(err.contains("--goal-amount"));
    }

    #[test]
    fn solve_request_from_json_overrides_options() {
        let json = r#"{
          "monthlyIncome": 3000,
          "monthlySpending": 2900,
          "goalAmount": 12000,
          "monthsToGoal": 10,
          "targetProbability": 90,
          "searchMax": 2500,
          "tolerance": 0.25,
          "trajectories": 400,
          "seed": 3
        }"#;
        let request = solve_request_from_json(json).expect("json should parse");
        assert_approx(request.config.target_probability, 90.0);
        assert_approx(request.config.search_max, 2_500.0);
        assert_approx(request.config.tolerance, 0.25);
        assert_eq!(request.config.trajectories_per_iteration, 400);
        assert_eq!(request.config.final_trajectories, 5_000);
        assert_eq!(request.config.seed, 3);
        assert_approx(request.config.search_min, 0.0);
    }

    #[test]
    fn solve_request_from_json_rejects_oversized_solver_options() {
        let err = solve_request_from_json(
            r#"{ "maxIterations": 4294967295, "trajectories": 1, "finalTrajectories": 1 }"#,
        )
        .err()
        .expect("must reject huge iteration count");
        assert!(err.contains("--max-iterations"), "{err}");

        let err = solve_request_from_json(r#"{ "finalTrajectories": 100001 }"#)
            .err()
            .expect("must reject huge trajectory count");
        assert!(err.contains("--final-trajectories"), "{err}");

        let request = solve_request_from_json(
            r#"{ "maxIterations": 200, "trajectories": 100000, "finalTrajectories": 100000 }"#,
        )
        .expect("limits are inclusive");
        assert_eq!(request.config.max_iterations, 200);
    }

    #[test]
    fn build_solve_config_rejects_oversized_trajectories() {
        let scenario = build_scenario(&default_scenario_args()).expect("valid scenario");
        let mut options = default_solve_options();
        options.trajectories = u32::MAX;
        assert_eq!(
            build_solve_config(&scenario, options).err(),
            Some(SolveOptionsError::TooManyTrajectories(
                "--trajectories",
                u32::MAX
            ))
        );
    }

    #[test]
    fn solve_config_derives_search_bound_when_missing() {
        let scenario = build_scenario(&default_scenario_args()).expect("valid scenario");
        let config =
            build_solve_config(&scenario, default_solve_options()).expect("default options");
        let derived = IncreaseSolveConfig::for_scenario(&scenario, 42);
        assert_approx(config.search_max, derived.search_max);
        assert!(config.search_max > 0.0);
    }

    #[test]
    fn seeded_evaluation_is_reproducible() {
        let scenario = build_scenario(&default_scenario_args()).expect("valid scenario");
        let a = run_evaluation(&scenario, Some(17));
        let b = run_evaluation(&scenario, Some(17));
        assert_eq!(a, b);
    }

    #[test]
    fn evaluate_response_serialization_contains_expected_fields() {
        let scenario = build_scenario(&default_scenario_args()).expect("valid scenario");
        let result = run_evaluation(&scenario, Some(5));
        let response = build_evaluate_response(&scenario, &result);
        let json = serde_json::to_string(&response).expect("response should serialize");

        for key in [
            "\"scenario\"",
            "\"monthlyIncome\"",
            "\"monthsToGoal\"",
            "\"monthsEvaluated\":12",
            "\"targetConfidence\":75.0",
            "\"probability\"",
            "\"monthlyShortfall\"",
            "\"recommendedIncrease\":246.0",
            "\"projectedAmount\":14000.0",
            "\"band\":\"severe\"",
        ] {
            assert!(json.contains(key), "missing {key} in {json}");
        }
    }

    #[test]
    fn solve_response_serialization_flattens_solver_result() {
        let scenario = GoalScenario {
            monthly_income: 0.0,
            monthly_spending: 0.0,
            current_savings: 0.0,
            goal_amount: 600.0,
            months_to_goal: 6.0,
        };
        let mut options = default_solve_options();
        options.trajectories = 10;
        options.final_trajectories = 10;
        let config = build_solve_config(&scenario, options).expect("small options");
        let result = solve_required_increase(&scenario, config).expect("must solve");
        let json = serde_json::to_string(&build_solve_response(&scenario, result))
            .expect("response should serialize");

        for key in [
            "\"monthsEvaluated\":6",
            "\"solvedIncrease\"",
            "\"achievedProbability\":100.0",
            "\"iterations\"",
            "\"feasible\":true",
            "\"converged\":true",
        ] {
            assert!(json.contains(key), "missing {key} in {json}");
        }
    }

    #[test]
    fn cli_parses_evaluate_subcommand() {
        let cli = Cli::try_parse_from([
            "goalprob",
            "evaluate",
            "--monthly-income",
            "5000",
            "--monthly-spending",
            "4000",
            "--current-savings",
            "-100",
            "--goal-amount",
            "15000",
            "--months-to-goal",
            "12",
            "--seed",
            "4",
        ])
        .expect("cli should parse");

        let Command::Evaluate(args) = cli.command else {
            panic!("expected evaluate subcommand");
        };
        assert_approx(args.scenario.current_savings, -100.0);
        assert_eq!(args.seed, Some(4));
        assert_eq!(cli.log_filter, "info");
    }

    #[test]
    fn cli_parses_solve_defaults() {
        let cli = Cli::try_parse_from([
            "goalprob",
            "solve",
            "--monthly-income",
            "3000",
            "--monthly-spending",
            "2500",
            "--goal-amount",
            "9000",
            "--months-to-goal",
            "12",
        ])
        .expect("cli should parse");

        let Command::Solve(args) = cli.command else {
            panic!("expected solve subcommand");
        };
        assert_approx(args.options.target_probability, 75.0);
        assert_eq!(args.options.search_max, None);
        assert_eq!(args.options.trajectories, 1_000);
        assert_approx(args.scenario.current_savings, 0.0);
    }

    async fn send(
        request: axum::http::Request<axum::body::Body>,
    ) -> (StatusCode, String, serde_json::Value) {
        use tower::ServiceExt;

        let response = router().oneshot(request).await.expect("router is infallible");
        let status = response.status();
        let cache = response
            .headers()
            .get(header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        let json = serde_json::from_slice(&bytes).expect("body should be JSON");
        (status, cache, json)
    }

    fn get_request(uri: &str) -> axum::http::Request<axum::body::Body> {
        axum::http::Request::builder()
            .uri(uri)
            .body(axum::body::Body::empty())
            .expect("request should build")
    }

    fn post_json(uri: &str, body: &str) -> axum::http::Request<axum::body::Body> {
        axum::http::Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from(body.to_string()))
            .expect("request should build")
    }

    #[tokio::test]
    async fn health_route_reports_ok() {
        let (status, cache, json) = send(get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cache, "no-store");
        assert_eq!(json, serde_json::json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn unknown_route_returns_json_not_found() {
        let (status, cache, json) = send(get_request("/api/unknown")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(cache, "no-store");
        assert_eq!(json["error"], "Not found");
    }

    #[tokio::test]
    async fn evaluate_route_serves_seeded_query() {
        let (status, cache, json) =
            send(get_request("/api/evaluate?seed=3&monthsToGoal=12")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cache, "no-store");
        assert_eq!(json["projectedAmount"], 14_000.0);
        assert_eq!(json["monthsEvaluated"], 12);
    }

    #[tokio::test]
    async fn evaluate_route_rejects_invalid_scenario_as_json() {
        let (status, cache, json) =
            send(post_json("/api/evaluate", r#"{ "goalAmount": -5 }"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(cache, "no-store");
        let message = json["error"].as_str().expect("error message");
        assert!(message.contains("--goal-amount"), "{message}");
    }

    #[tokio::test]
    async fn malformed_bodies_are_reported_as_json_errors() {
        for uri in ["/api/evaluate", "/api/solve"] {
            let (status, cache, json) = send(post_json(uri, "{ not json")).await;
            assert!(status.is_client_error(), "{uri}: {status}");
            assert_eq!(cache, "no-store");
            assert!(json["error"].is_string(), "{uri}: {json}");
        }

        let (status, _, json) = send(get_request("/api/evaluate?monthlyIncome=lots")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn solve_route_rejects_oversized_work() {
        let (status, cache, json) = send(post_json(
            "/api/solve",
            r#"{ "maxIterations": 4294967295, "trajectories": 1, "finalTrajectories": 1 }"#,
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(cache, "no-store");
        let message = json["error"].as_str().expect("error message");
        assert!(message.contains("--max-iterations"), "{message}");
    }
}
