use std::sync::atomic::AtomicBool;

use serde::{Deserialize, Serialize};

use super::engine::{MonteCarloConfig, run_monte_carlo, run_monte_carlo_with_cancel};
use super::solver::{
    RequiredReturnConfig, solve_required_return, solve_required_return_with_cancel,
};
use super::types::{
    CashFlowAssumptions, HealthCheckError, PlanningHorizon, RequiredReturnResult, RiskProfile,
    SimulationResult,
};

/// A stored financial profile. Rates are fractions, e.g. `0.03` for 3%.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialProfile {
    pub income: f64,
    pub income_growth: f64,
    pub spending: f64,
    pub inflation: f64,
    pub savings: f64,
    pub risk_level: i32,
    pub current_age: u32,
    pub death_age: u32,
    pub retirement_age: u32,
}

impl FinancialProfile {
    pub fn assumptions(&self) -> CashFlowAssumptions {
        CashFlowAssumptions {
            income: self.income,
            income_growth_rate: self.income_growth,
            spending: self.spending,
            inflation_rate: self.inflation,
        }
    }

    pub fn horizon(&self) -> Result<PlanningHorizon, HealthCheckError> {
        PlanningHorizon::new(self.current_age, self.death_age, self.retirement_age)
    }

    pub fn risk(&self) -> RiskProfile {
        RiskProfile {
            risk_level: self.risk_level,
        }
    }

    pub fn run_monte_carlo_health_check(
        &self,
        config: MonteCarloConfig,
    ) -> Result<SimulationResult, HealthCheckError> {
        run_monte_carlo(
            &self.assumptions(),
            self.risk(),
            &self.horizon()?,
            self.savings,
            config,
        )
    }

    pub fn solve_required_return(
        &self,
        config: RequiredReturnConfig,
    ) -> Result<RequiredReturnResult, HealthCheckError> {
        solve_required_return(&self.assumptions(), &self.horizon()?, self.savings, config)
    }

    /// Health check that gives up with `Cancelled` once `cancel` is set.
    pub fn run_monte_carlo_health_check_with_cancel(
        &self,
        config: MonteCarloConfig,
        cancel: &AtomicBool,
    ) -> Result<SimulationResult, HealthCheckError> {
        run_monte_carlo_with_cancel(
            &self.assumptions(),
            self.risk(),
            &self.horizon()?,
            self.savings,
            config,
            cancel,
        )
    }

    pub fn solve_required_return_with_cancel(
        &self,
        config: RequiredReturnConfig,
        cancel: &AtomicBool,
    ) -> Result<RequiredReturnResult, HealthCheckError> {
        solve_required_return_with_cancel(
            &self.assumptions(),
            &self.horizon()?,
            self.savings,
            config,
            cancel,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_deserializes_from_camel_case_record() {
        let json = r#"{
          "income": 100,
          "incomeGrowth": 0.05,
          "spending": 90,
          "inflation": 0.03,
          "savings": 2000,
          "riskLevel": 5,
          "currentAge": 50,
          "deathAge": 100,
          "retirementAge": 70
        }"#;
        let profile: FinancialProfile = serde_json::from_str(json).expect("valid profile");
        assert_eq!(profile.risk().risk_level, 5);
        assert_eq!(profile.horizon().expect("valid horizon").years(), 50);
        assert_eq!(profile.assumptions().inflation_rate, 0.03);
    }

    #[test]
    fn invalid_profile_horizon_is_rejected_before_simulating() {
        let profile = FinancialProfile {
            income: 1.0,
            income_growth: 0.0,
            spending: 1.0,
            inflation: 0.0,
            savings: 0.0,
            risk_level: 1,
            current_age: 40,
            death_age: 90,
            retirement_age: 30,
        };
        let err = profile
            .run_monte_carlo_health_check(MonteCarloConfig::default())
            .expect_err("must reject");
        assert!(matches!(err, HealthCheckError::InvalidHorizon { .. }));
        let err = profile
            .solve_required_return(RequiredReturnConfig::default())
            .expect_err("must reject");
        assert!(matches!(err, HealthCheckError::InvalidHorizon { .. }));
    }
}
