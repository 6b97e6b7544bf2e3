use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use super::cashflow::project_cash_flows;
use super::diagnosis::{classify_required_return, required_return_message};
use super::engine::{ReturnPath, simulate_wealth_path};
use super::types::{
    CashFlowAssumptions, HealthCheckError, PlanningHorizon, RequiredReturnResult, SolveIteration,
};

#[derive(Debug, Clone, Copy)]
pub struct RequiredReturnConfig {
    pub max_iterations: u32,
    /// Terminal wealth within `±tolerance` counts as exhausted savings.
    pub tolerance: f64,
    pub search_min: f64,
    pub search_max: f64,
}

impl Default for RequiredReturnConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1.0,
            search_min: 0.0,
            search_max: 0.2,
        }
    }
}

/// Bisection search for the constant annual return that leaves terminal
/// wealth at zero. If the iteration cap is hit first, the last midpoint is
/// returned with `converged == false`.
pub fn solve_required_return(
    assumptions: &CashFlowAssumptions,
    horizon: &PlanningHorizon,
    savings: f64,
    config: RequiredReturnConfig,
) -> Result<RequiredReturnResult, HealthCheckError> {
    let never = AtomicBool::new(false);
    solve_required_return_with_cancel(assumptions, horizon, savings, config, &never)
}

/// Same as [`solve_required_return`], checking `cancel` before each iteration.
pub fn solve_required_return_with_cancel(
    assumptions: &CashFlowAssumptions,
    horizon: &PlanningHorizon,
    savings: f64,
    config: RequiredReturnConfig,
    cancel: &AtomicBool,
) -> Result<RequiredReturnResult, HealthCheckError> {
    validate_config(config)?;
    if !savings.is_finite() {
        return Err(HealthCheckError::InvalidSimulationInput(
            "savings must be finite".to_string(),
        ));
    }
    let cash_flows = project_cash_flows(assumptions, horizon)?;

    let mut iterations = Vec::with_capacity(config.max_iterations as usize);

    // A plan that already balances at the floor needs no higher return.
    let floor = simulate_wealth_path(
        &cash_flows,
        ReturnPath::Constant(config.search_min),
        savings,
    )?
    .terminal()
    .unwrap_or(savings);
    if floor.abs() <= config.tolerance {
        iterations.push(SolveIteration {
            iteration: 1,
            lower_bound: config.search_min,
            upper_bound: config.search_max,
            rate: config.search_min,
            terminal_wealth: floor,
        });
        debug!(rate = config.search_min, "plan balances at the search floor");
        let tier = classify_required_return(config.search_min);
        return Ok(RequiredReturnResult {
            rate: config.search_min,
            tier,
            message: required_return_message(tier, config.search_min),
            converged: true,
            terminal_wealth: floor,
            iterations,
        });
    }

    let mut lo = config.search_min;
    let mut hi = config.search_max;
    let mut rate = (lo + hi) * 0.5;
    let mut terminal = savings;
    let mut converged = false;

    for iteration in 1..=config.max_iterations {
        if cancel.load(Ordering::Relaxed) {
            return Err(HealthCheckError::Cancelled);
        }
        rate = (lo + hi) * 0.5;
        let path = simulate_wealth_path(&cash_flows, ReturnPath::Constant(rate), savings)?;
        terminal = path.terminal().unwrap_or(savings);
        iterations.push(SolveIteration {
            iteration,
            lower_bound: lo,
            upper_bound: hi,
            rate,
            terminal_wealth: terminal,
        });

        if terminal.abs() <= config.tolerance {
            converged = true;
            break;
        } else if terminal > config.tolerance {
            hi = rate;
        } else if terminal < config.tolerance {
            // Compared against +tolerance like the branch above; NaN moves neither bound.
            lo = rate;
        }
    }

    if converged {
        debug!(rate, iterations = iterations.len(), "required return solved");
    } else {
        warn!(
            rate,
            terminal_wealth = terminal,
            max_iterations = config.max_iterations,
            "required return search did not converge; returning last midpoint"
        );
    }

    let tier = classify_required_return(rate);
    Ok(RequiredReturnResult {
        rate,
        tier,
        message: required_return_message(tier, rate),
        converged,
        terminal_wealth: terminal,
        iterations,
    })
}

fn validate_config(config: RequiredReturnConfig) -> Result<(), HealthCheckError> {
    let invalid = |msg: &str| Err(HealthCheckError::InvalidSolverConfig(msg.to_string()));
    if config.max_iterations == 0 {
        return invalid("max_iterations must be > 0");
    }
    if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
        return invalid("tolerance must be > 0");
    }
    if !config.search_min.is_finite() || !config.search_max.is_finite() {
        return invalid("search bounds must be finite");
    }
    if config.search_max <= config.search_min {
        return invalid("search_max must be greater than search_min");
    }
    if config.search_min <= -1.0 {
        return invalid("search_min must be > -1");
    }
    Ok(())
}
