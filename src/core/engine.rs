use std::sync::atomic::{AtomicBool, Ordering};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::debug;

use super::cashflow::project_cash_flows;
use super::diagnosis::{classify_ruin, ruin_message};
use super::returns::ReturnSampler;
use super::types::{
    CashFlowAssumptions, HealthCheckError, PercentileBands, PlanningHorizon, RiskProfile,
    SimulationResult, TerminalOutcome, WealthTrajectory, YearlyCashFlowSeries,
};

pub const DEFAULT_TRIALS: u32 = 5_000;

#[derive(Debug, Clone, Copy)]
pub enum ReturnPath<'a> {
    PerYear(&'a [f64]),
    Constant(f64),
}

impl ReturnPath<'_> {
    fn rate(&self, year: usize) -> f64 {
        match self {
            ReturnPath::PerYear(rates) => rates[year],
            ReturnPath::Constant(rate) => *rate,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MonteCarloConfig {
    pub trials: u32,
    pub seed: u64,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            trials: DEFAULT_TRIALS,
            seed: 42,
        }
    }
}

/// Rolls `initial_savings` forward one year at a time. Returns are only
/// applied while the balance is non-negative; debt is carried flat.
pub fn simulate_wealth_path(
    cash_flows: &YearlyCashFlowSeries,
    returns: ReturnPath<'_>,
    initial_savings: f64,
) -> Result<WealthTrajectory, HealthCheckError> {
    let covered = match returns {
        ReturnPath::PerYear(rates) => rates.len(),
        ReturnPath::Constant(_) => cash_flows.len(),
    };
    if covered < cash_flows.len() {
        return Err(HealthCheckError::InvalidSimulationInput(format!(
            "return path covers {covered} years but the cash flow series has {}",
            cash_flows.len()
        )));
    }

    let mut balances = Vec::with_capacity(cash_flows.len());
    let mut balance = initial_savings;
    for (year, flow) in cash_flows.years.iter().enumerate() {
        balance = step_balance(balance, returns.rate(year), flow.income, flow.spending);
        balances.push(balance);
    }
    Ok(WealthTrajectory(balances))
}

fn step_balance(balance: f64, rate: f64, income: f64, spending: f64) -> f64 {
    if balance < 0.0 {
        balance + income - spending
    } else {
        balance * (1.0 + rate) + income - spending
    }
}

/// Monte Carlo health check. Trial `i` draws from its own generator seeded
/// from `config.seed` and `i`, so results do not depend on thread scheduling.
pub fn run_monte_carlo(
    assumptions: &CashFlowAssumptions,
    risk: RiskProfile,
    horizon: &PlanningHorizon,
    savings: f64,
    config: MonteCarloConfig,
) -> Result<SimulationResult, HealthCheckError> {
    let never = AtomicBool::new(false);
    run_monte_carlo_with_cancel(assumptions, risk, horizon, savings, config, &never)
}

/// Same as [`run_monte_carlo`], but trials not yet started are skipped once
/// `cancel` is set and the run fails with [`HealthCheckError::Cancelled`].
pub fn run_monte_carlo_with_cancel(
    assumptions: &CashFlowAssumptions,
    risk: RiskProfile,
    horizon: &PlanningHorizon,
    savings: f64,
    config: MonteCarloConfig,
    cancel: &AtomicBool,
) -> Result<SimulationResult, HealthCheckError> {
    let (cash_flows, sampler) = prepare(assumptions, risk, horizon, savings, config.trials)?;
    debug!(
        trials = config.trials,
        years = cash_flows.len(),
        risk_level = risk.risk_level,
        seed = config.seed,
        "running monte carlo health check"
    );

    let trajectories = (0..config.trials)
        .into_par_iter()
        .map(|trial| {
            if cancel.load(Ordering::Relaxed) {
                return Err(HealthCheckError::Cancelled);
            }
            let mut rng = StdRng::seed_from_u64(derive_seed(config.seed, trial));
            run_trial(&cash_flows, &sampler, savings, &mut rng)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(summarize(trajectories, config.trials, Some(config.seed)))
}

/// Sequential variant drawing every trial from one caller-owned generator.
pub fn run_monte_carlo_with_rng<R: Rng + ?Sized>(
    assumptions: &CashFlowAssumptions,
    risk: RiskProfile,
    horizon: &PlanningHorizon,
    savings: f64,
    trials: u32,
    rng: &mut R,
) -> Result<SimulationResult, HealthCheckError> {
    let (cash_flows, sampler) = prepare(assumptions, risk, horizon, savings, trials)?;
    let trajectories = (0..trials)
        .map(|_| run_trial(&cash_flows, &sampler, savings, &mut *rng))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(summarize(trajectories, trials, None))
}

fn prepare(
    assumptions: &CashFlowAssumptions,
    risk: RiskProfile,
    horizon: &PlanningHorizon,
    savings: f64,
    trials: u32,
) -> Result<(YearlyCashFlowSeries, ReturnSampler), HealthCheckError> {
    if trials == 0 {
        return Err(HealthCheckError::InvalidSimulationInput(
            "trials must be > 0".to_string(),
        ));
    }
    if horizon.years() == 0 {
        return Err(HealthCheckError::InvalidSimulationInput(
            "planning horizon must span at least one year".to_string(),
        ));
    }
    if !savings.is_finite() {
        return Err(HealthCheckError::InvalidSimulationInput(
            "savings must be finite".to_string(),
        ));
    }
    let cash_flows = project_cash_flows(assumptions, horizon)?;
    let sampler = ReturnSampler::new(risk)?;
    Ok((cash_flows, sampler))
}

fn run_trial<R: Rng + ?Sized>(
    cash_flows: &YearlyCashFlowSeries,
    sampler: &ReturnSampler,
    savings: f64,
    rng: &mut R,
) -> Result<WealthTrajectory, HealthCheckError> {
    let returns = sampler.sample(cash_flows.len(), rng);
    simulate_wealth_path(cash_flows, ReturnPath::PerYear(&returns), savings)
}

fn summarize(
    trajectories: Vec<WealthTrajectory>,
    trials: u32,
    seed: Option<u64>,
) -> SimulationResult {
    let years = trajectories.first().map_or(0, |t| t.balances().len());
    let mut worst = Vec::with_capacity(years);
    let mut poor = Vec::with_capacity(years);
    let mut average = Vec::with_capacity(years);

    let mut column = Vec::with_capacity(trajectories.len());
    for year in 0..years {
        column.clear();
        column.extend(trajectories.iter().map(|t| t.balances()[year]));
        worst.push(percentile(&mut column, 5.0));
        poor.push(percentile(&mut column, 25.0));
        average.push(percentile(&mut column, 50.0));
    }

    let mut terminal = trajectories
        .iter()
        .filter_map(WealthTrajectory::terminal)
        .collect::<Vec<_>>();
    let outcome = terminal_outcome(&mut terminal);
    let message = ruin_message(
        outcome.tier,
        outcome.p5_terminal_wealth,
        outcome.prob_ruin_percent,
    );

    SimulationResult {
        trials,
        seed,
        trajectories,
        bands: PercentileBands {
            worst,
            poor,
            average,
        },
        outcome,
        message,
    }
}

fn terminal_outcome(terminal: &mut [f64]) -> TerminalOutcome {
    let p5_terminal_wealth = percentile(terminal, 5.0);
    let median_terminal_wealth = percentile(terminal, 50.0);
    let prob_ruin_percent = ruin_probability_percent(terminal);
    TerminalOutcome {
        p5_terminal_wealth,
        median_terminal_wealth,
        prob_ruin_percent,
        tier: classify_ruin(prob_ruin_percent),
    }
}

/// Share of trials, in percent, ending with zero or negative wealth.
pub fn ruin_probability_percent(terminal: &[f64]) -> f64 {
    if terminal.is_empty() {
        return 0.0;
    }
    let ruined = terminal.iter().filter(|w| **w <= 0.0).count();
    100.0 * ruined as f64 / terminal.len() as f64
}

fn derive_seed(base_seed: u64, trial: u32) -> u64 {
    splitmix64(base_seed ^ trial as u64)
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Linear interpolation between closest ranks.
pub fn percentile(values: &mut [f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    values.sort_by(|a, b| a.total_cmp(b));

    let n = values.len();
    if n == 1 {
        return values[0];
    }

    let rank = (p / 100.0) * (n as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    if lower == upper {
        values[lower]
    } else {
        let w = rank - lower as f64;
        values[lower] * (1.0 - w) + values[upper] * w
    }
}
