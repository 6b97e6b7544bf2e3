mod cashflow;
mod diagnosis;
mod engine;
mod profile;
mod returns;
mod solver;
mod types;

pub use cashflow::project_cash_flows;
pub use diagnosis::{
    classify_required_return, classify_ruin, required_return_message, ruin_message,
};
pub use engine::{
    DEFAULT_TRIALS, MonteCarloConfig, ReturnPath, percentile, ruin_probability_percent,
    run_monte_carlo, run_monte_carlo_with_cancel, run_monte_carlo_with_rng, simulate_wealth_path,
};
pub use profile::FinancialProfile;
pub use returns::{
    ReturnBucket, ReturnSampler, return_bucket, return_buckets, sample_annual_returns,
};
pub use solver::{RequiredReturnConfig, solve_required_return, solve_required_return_with_cancel};
pub use types::{
    CashFlowAssumptions, HealthCheckError, PercentileBands, PlanningHorizon, RequiredReturnResult,
    RequiredReturnTier, RiskProfile, RuinTier, SimulationResult, SolveIteration, TerminalOutcome,
    WealthTrajectory, YearCashFlow, YearlyCashFlowSeries,
};
