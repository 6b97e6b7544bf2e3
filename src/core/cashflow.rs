use super::types::{
    CashFlowAssumptions, HealthCheckError, PlanningHorizon, YearCashFlow, YearlyCashFlowSeries,
};

/// Extrapolates income and spending for every year from `current_age` up to,
/// but excluding, `death_age`. Income stops after `retirement_age`; spending
/// keeps growing with inflation until the end of the horizon.
pub fn project_cash_flows(
    assumptions: &CashFlowAssumptions,
    horizon: &PlanningHorizon,
) -> Result<YearlyCashFlowSeries, HealthCheckError> {
    horizon.validate()?;
    assumptions.validate()?;

    let years = (horizon.current_age..horizon.death_age)
        .enumerate()
        .map(|(offset, age)| YearCashFlow {
            income: income_for_year(assumptions, horizon, offset, age),
            spending: grow(assumptions.spending, assumptions.inflation_rate, offset),
        })
        .collect();

    Ok(YearlyCashFlowSeries {
        start_age: horizon.current_age,
        years,
    })
}

fn income_for_year(
    assumptions: &CashFlowAssumptions,
    horizon: &PlanningHorizon,
    offset: usize,
    age: u32,
) -> f64 {
    if age <= horizon.retirement_age {
        grow(assumptions.income, assumptions.income_growth_rate, offset)
    } else {
        0.0
    }
}

fn grow(base: f64, rate: f64, years: usize) -> f64 {
    base * (1.0 + rate).powi(years as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn assumptions() -> CashFlowAssumptions {
        CashFlowAssumptions {
            income: 100.0,
            income_growth_rate: 0.05,
            spending: 90.0,
            inflation_rate: 0.03,
        }
    }

    #[test]
    fn income_grows_until_retirement_then_stops() {
        let horizon = PlanningHorizon::new(50, 55, 52).expect("valid horizon");
        let series = project_cash_flows(&assumptions(), &horizon).expect("must project");

        let incomes = series.incomes().collect::<Vec<_>>();
        assert_eq!(incomes.len(), 5);
        assert_approx(incomes[0], 100.0);
        assert_approx(incomes[1], 105.0);
        assert_approx(incomes[2], 110.25);
        assert_approx(incomes[3], 0.0);
        assert_approx(incomes[4], 0.0);
    }

    #[test]
    fn spending_inflates_through_the_whole_horizon() {
        let horizon = PlanningHorizon::new(50, 53, 50).expect("valid horizon");
        let series = project_cash_flows(&assumptions(), &horizon).expect("must project");

        let spending = series.spendings().collect::<Vec<_>>();
        assert_approx(spending[0], 90.0);
        assert_approx(spending[1], 92.7);
        assert_approx(spending[2], 95.481);
        assert_eq!(series.start_age, 50);
    }

    #[test]
    fn retirement_at_current_age_still_earns_first_year() {
        let horizon = PlanningHorizon::new(60, 62, 60).expect("valid horizon");
        let series = project_cash_flows(&assumptions(), &horizon).expect("must project");
        assert_approx(series.years[0].income, 100.0);
        assert_approx(series.years[1].income, 0.0);
    }

    #[test]
    fn rejects_retirement_before_current_age() {
        let horizon = PlanningHorizon {
            current_age: 50,
            death_age: 90,
            retirement_age: 40,
        };
        let err = project_cash_flows(&assumptions(), &horizon).expect_err("must reject");
        assert!(matches!(err, HealthCheckError::InvalidHorizon { .. }));
    }

    #[test]
    fn rejects_death_age_not_after_current_age() {
        let err = PlanningHorizon::new(50, 50, 50).expect_err("must reject");
        assert!(matches!(
            err,
            HealthCheckError::InvalidHorizon {
                current_age: 50,
                death_age: 50,
                ..
            }
        ));
    }

    #[test]
    fn rejects_negative_spending() {
        let mut bad = assumptions();
        bad.spending = -1.0;
        let horizon = PlanningHorizon::new(50, 60, 55).expect("valid horizon");
        let err = project_cash_flows(&bad, &horizon).expect_err("must reject");
        assert!(matches!(err, HealthCheckError::InvalidAssumptions(_)));
    }

    proptest! {
        #[test]
        fn prop_series_length_matches_horizon(
            current_age in 0_u32..90,
            span in 1_u32..60,
            retire_offset in 0_u32..70,
            income in 0.0_f64..1e6,
            growth in -0.5_f64..0.5,
            spending in 0.0_f64..1e6,
            inflation in -0.5_f64..0.5,
        ) {
            let horizon = PlanningHorizon::new(
                current_age,
                current_age + span,
                current_age + retire_offset,
            ).expect("valid horizon");
            let assumptions = CashFlowAssumptions {
                income,
                income_growth_rate: growth,
                spending,
                inflation_rate: inflation,
            };
            let series = project_cash_flows(&assumptions, &horizon).expect("must project");
            prop_assert_eq!(series.len(), span as usize);
        }

        #[test]
        fn prop_income_monotone_then_zero_after_retirement(
            current_age in 18_u32..70,
            span in 1_u32..50,
            retire_offset in 0_u32..50,
            income in 0.0_f64..1e6,
            growth in 0.0_f64..0.2,
        ) {
            let horizon = PlanningHorizon::new(
                current_age,
                current_age + span,
                current_age + retire_offset,
            ).expect("valid horizon");
            let assumptions = CashFlowAssumptions {
                income,
                income_growth_rate: growth,
                spending: 1.0,
                inflation_rate: 0.0,
            };
            let series = project_cash_flows(&assumptions, &horizon).expect("must project");

            let mut previous = 0.0_f64;
            for (offset, year) in series.years.iter().enumerate() {
                let age = current_age + offset as u32;
                prop_assert!(year.income >= 0.0);
                if age <= horizon.retirement_age {
                    prop_assert!(year.income >= previous);
                    previous = year.income;
                } else {
                    prop_assert_eq!(year.income, 0.0);
                }
            }
        }

        #[test]
        fn prop_spending_positive_and_non_decreasing(
            span in 1_u32..80,
            spending in 0.01_f64..1e6,
            inflation in 0.0_f64..0.2,
        ) {
            let horizon = PlanningHorizon::new(20, 20 + span, 20).expect("valid horizon");
            let assumptions = CashFlowAssumptions {
                income: 0.0,
                income_growth_rate: 0.0,
                spending,
                inflation_rate: inflation,
            };
            let series = project_cash_flows(&assumptions, &horizon).expect("must project");
            let spendings = series.spendings().collect::<Vec<_>>();
            for pair in spendings.windows(2) {
                prop_assert!(pair[0] > 0.0);
                prop_assert!(pair[1] >= pair[0]);
            }
        }
    }
}
