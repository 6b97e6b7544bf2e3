use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HealthCheckError {
    #[error(
        "invalid planning horizon: current age {current_age}, death age {death_age}, retirement age {retirement_age}"
    )]
    InvalidHorizon {
        current_age: u32,
        death_age: u32,
        retirement_age: u32,
    },
    #[error("invalid simulation input: {0}")]
    InvalidSimulationInput(String),
    #[error("invalid cash flow assumptions: {0}")]
    InvalidAssumptions(String),
    #[error("invalid solver configuration: {0}")]
    InvalidSolverConfig(String),
    #[error("return distribution: {0}")]
    ReturnDistribution(#[from] rand_distr::NormalError),
    #[error("computation cancelled")]
    Cancelled,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningHorizon {
    pub current_age: u32,
    pub death_age: u32,
    pub retirement_age: u32,
}

impl PlanningHorizon {
    pub fn new(
        current_age: u32,
        death_age: u32,
        retirement_age: u32,
    ) -> Result<Self, HealthCheckError> {
        let horizon = Self {
            current_age,
            death_age,
            retirement_age,
        };
        horizon.validate()?;
        Ok(horizon)
    }

    pub fn validate(&self) -> Result<(), HealthCheckError> {
        if self.current_age > self.retirement_age || self.current_age >= self.death_age {
            return Err(HealthCheckError::InvalidHorizon {
                current_age: self.current_age,
                death_age: self.death_age,
                retirement_age: self.retirement_age,
            });
        }
        Ok(())
    }

    /// Number of projected years, `death_age - current_age`. Zero for an invalid horizon.
    pub fn years(&self) -> usize {
        self.death_age.saturating_sub(self.current_age) as usize
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CashFlowAssumptions {
    pub income: f64,
    pub income_growth_rate: f64,
    pub spending: f64,
    pub inflation_rate: f64,
}

impl CashFlowAssumptions {
    pub fn validate(&self) -> Result<(), HealthCheckError> {
        for (name, value) in [("income", self.income), ("spending", self.spending)] {
            if !value.is_finite() || value < 0.0 {
                return Err(HealthCheckError::InvalidAssumptions(format!(
                    "{name} must be a finite value >= 0"
                )));
            }
        }
        for (name, rate) in [
            ("income growth rate", self.income_growth_rate),
            ("inflation rate", self.inflation_rate),
        ] {
            if !rate.is_finite() {
                return Err(HealthCheckError::InvalidAssumptions(format!(
                    "{name} must be finite"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskProfile {
    pub risk_level: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearCashFlow {
    pub income: f64,
    pub spending: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyCashFlowSeries {
    pub start_age: u32,
    pub years: Vec<YearCashFlow>,
}

impl YearlyCashFlowSeries {
    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    pub fn incomes(&self) -> impl Iterator<Item = f64> + '_ {
        self.years.iter().map(|y| y.income)
    }

    pub fn spendings(&self) -> impl Iterator<Item = f64> + '_ {
        self.years.iter().map(|y| y.spending)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct WealthTrajectory(pub Vec<f64>);

impl WealthTrajectory {
    pub fn balances(&self) -> &[f64] {
        &self.0
    }

    pub fn terminal(&self) -> Option<f64> {
        self.0.last().copied()
    }
}

/// Per-year wealth percentiles handed to the charting collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentileBands {
    /// 5th percentile.
    pub worst: Vec<f64>,
    /// 25th percentile.
    pub poor: Vec<f64>,
    /// Median.
    pub average: Vec<f64>,
}

impl PercentileBands {
    /// Offsets from the start age, one per band entry.
    pub fn year_offsets(&self) -> std::ops::Range<usize> {
        0..self.average.len()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuinTier {
    Excellent,
    Safe,
    Decent,
    NotBad,
    Shaky,
    NotRobust,
    Lousy,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequiredReturnTier {
    Awesome,
    VerySecure,
    PrettyGood,
    Adequate,
    NeedsAttention,
    Dangerous,
    VeryDangerous,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalOutcome {
    pub p5_terminal_wealth: f64,
    pub median_terminal_wealth: f64,
    pub prob_ruin_percent: f64,
    pub tier: RuinTier,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub trials: u32,
    pub seed: Option<u64>,
    pub trajectories: Vec<WealthTrajectory>,
    pub bands: PercentileBands,
    pub outcome: TerminalOutcome,
    pub message: String,
}

impl SimulationResult {
    pub fn terminal_wealth(&self) -> impl Iterator<Item = f64> + '_ {
        self.trajectories.iter().filter_map(WealthTrajectory::terminal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub rate: f64,
    pub terminal_wealth: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredReturnResult {
    pub rate: f64,
    pub tier: RequiredReturnTier,
    pub message: String,
    pub converged: bool,
    pub terminal_wealth: f64,
    pub iterations: Vec<SolveIteration>,
}
