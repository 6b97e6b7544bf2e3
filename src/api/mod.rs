use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core::{
    FinancialProfile, HealthCheckError, MonteCarloConfig, PercentileBands, RequiredReturnConfig,
    RequiredReturnTier, ReturnBucket, RuinTier, project_cash_flows, return_buckets,
};

/// Wall-clock budget for one engine call made on behalf of an HTTP request.
const ENGINE_BUDGET: Duration = Duration::from_secs(30);
const RETRY_AFTER_SECS: &str = "5";

const MAX_TRIALS: u32 = 100_000;
const MAX_HORIZON_YEARS: u32 = 150;
const MAX_ITERATIONS: u32 = 10_000;

#[derive(Parser, Debug)]
#[command(
    name = "wealth-check",
    about = "Lifetime financial health check (Monte Carlo + required return)"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the JSON API.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Run the Monte Carlo health check and print the diagnosis as JSON.
    Simulate(PlanArgs),
    /// Solve for the constant return that exhausts savings at death age.
    RequiredReturn(PlanArgs),
    /// Print the projected yearly income and spending.
    Project(PlanArgs),
}

#[derive(Args, Debug, Clone)]
struct PlanArgs {
    #[arg(long, help = "Current annual income")]
    income: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Annual income growth until retirement in percent"
    )]
    income_growth: f64,
    #[arg(long, help = "Current annual spending")]
    spending: f64,
    #[arg(
        long,
        default_value_t = 2.0,
        help = "Annual spending growth (inflation) in percent"
    )]
    inflation: f64,
    #[arg(long, default_value_t = 0.0, help = "Current savings")]
    savings: f64,
    #[arg(
        long,
        default_value_t = 5,
        help = "Investment risk level: 1 extremely safe, 3 low, 5 moderate, 7 risky, 9 very risky"
    )]
    risk_level: i32,
    #[arg(long)]
    current_age: u32,
    #[arg(long, default_value_t = 90, help = "Age at which the projection ends")]
    death_age: u32,
    #[arg(long, default_value_t = 65)]
    retirement_age: u32,
    #[arg(long, default_value_t = 5000, help = "Number of Monte Carlo trials")]
    trials: u32,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    #[arg(long, default_value_t = 200, help = "Bisection iteration cap")]
    max_iterations: u32,
    #[arg(
        long,
        default_value_t = 1.0,
        help = "Terminal wealth treated as zero by the required return search"
    )]
    tolerance: f64,
    #[arg(long, default_value_t = 0.0, help = "Lowest return searched, in percent")]
    search_min: f64,
    #[arg(long, default_value_t = 20.0, help = "Highest return searched, in percent")]
    search_max: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CheckPayload {
    income: Option<f64>,
    income_growth: Option<f64>,
    spending: Option<f64>,
    inflation: Option<f64>,
    savings: Option<f64>,
    risk_level: Option<i32>,
    current_age: Option<u32>,
    death_age: Option<u32>,
    retirement_age: Option<u32>,
    trials: Option<u32>,
    seed: Option<u64>,
    max_iterations: Option<u32>,
    tolerance: Option<f64>,
    search_min: Option<f64>,
    search_max: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
struct HealthCheckRequest {
    profile: FinancialProfile,
    monte_carlo: MonteCarloConfig,
    solver: RequiredReturnConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    trials: u32,
    seed: Option<u64>,
    risk: ReturnBucket,
    start_age: u32,
    bands: PercentileBands,
    p5_terminal_wealth: f64,
    median_terminal_wealth: f64,
    prob_ruin_percent: f64,
    tier: RuinTier,
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequiredReturnResponse {
    rate: f64,
    rate_percent: f64,
    tier: RequiredReturnTier,
    message: String,
    converged: bool,
    iterations: usize,
    terminal_wealth: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CashflowYear {
    age: u32,
    income: f64,
    spending: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CashflowResponse {
    start_age: u32,
    years: Vec<CashflowYear>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_request(args: PlanArgs) -> Result<HealthCheckRequest, String> {
    if args.death_age <= args.current_age {
        return Err("--death-age must be > --current-age".to_string());
    }

    if args.retirement_age < args.current_age {
        return Err("--retirement-age must be >= --current-age".to_string());
    }

    if args.death_age - args.current_age > MAX_HORIZON_YEARS {
        return Err(format!("--death-age - --current-age must be <= {MAX_HORIZON_YEARS}"));
    }

    for (name, amount) in [
        ("--income", args.income),
        ("--spending", args.spending),
        ("--savings", args.savings),
    ] {
        if !amount.is_finite() || amount < 0.0 {
            return Err(format!("{name} must be >= 0"));
        }
    }

    for (name, rate) in [
        ("--income-growth", args.income_growth),
        ("--inflation", args.inflation),
    ] {
        if !rate.is_finite() || rate <= -100.0 {
            return Err(format!("{name} must be > -100"));
        }
    }

    if args.trials == 0 {
        return Err("--trials must be > 0".to_string());
    }

    if args.trials > MAX_TRIALS {
        return Err(format!("--trials must be <= {MAX_TRIALS}"));
    }

    if args.max_iterations == 0 {
        return Err("--max-iterations must be > 0".to_string());
    }

    if args.max_iterations > MAX_ITERATIONS {
        return Err(format!("--max-iterations must be <= {MAX_ITERATIONS}"));
    }

    if !args.tolerance.is_finite() || args.tolerance <= 0.0 {
        return Err("--tolerance must be > 0".to_string());
    }

    if !args.search_min.is_finite() || !args.search_max.is_finite() {
        return Err("--search-min and --search-max must be finite".to_string());
    }

    if args.search_min <= -100.0 {
        return Err("--search-min must be > -100".to_string());
    }

    if args.search_max <= args.search_min {
        return Err("--search-max must be > --search-min".to_string());
    }

    Ok(HealthCheckRequest {
        profile: FinancialProfile {
            income: args.income,
            income_growth: args.income_growth / 100.0,
            spending: args.spending,
            inflation: args.inflation / 100.0,
            savings: args.savings,
            risk_level: args.risk_level,
            current_age: args.current_age,
            death_age: args.death_age,
            retirement_age: args.retirement_age,
        },
        monte_carlo: MonteCarloConfig {
            trials: args.trials,
            seed: args.seed,
        },
        solver: RequiredReturnConfig {
            max_iterations: args.max_iterations,
            tolerance: args.tolerance,
            search_min: args.search_min / 100.0,
            search_max: args.search_max / 100.0,
        },
    })
}

pub async fn run(cli: Cli) -> Result<(), String> {
    let output = match cli.command {
        Command::Serve { port } => {
            return run_http_server(port).await.map_err(|e| e.to_string());
        }
        Command::Simulate(args) => render(args, simulate)?,
        Command::RequiredReturn(args) => render(args, required_return)?,
        Command::Project(args) => render(args, cashflows)?,
    };
    println!("{output}");
    Ok(())
}

type Compute<T> = fn(&HealthCheckRequest, &AtomicBool) -> Result<T, HealthCheckError>;

fn render<T: Serialize>(args: PlanArgs, compute: Compute<T>) -> Result<String, String> {
    let request = build_request(args)?;
    let body = compute(&request, &AtomicBool::new(false)).map_err(|e| e.to_string())?;
    serde_json::to_string_pretty(&body).map_err(|e| format!("failed to encode output: {e}"))
}

fn simulate(
    request: &HealthCheckRequest,
    cancel: &AtomicBool,
) -> Result<SimulateResponse, HealthCheckError> {
    let result = request
        .profile
        .run_monte_carlo_health_check_with_cancel(request.monte_carlo, cancel)?;
    Ok(SimulateResponse {
        trials: result.trials,
        seed: result.seed,
        risk: request.profile.risk().bucket(),
        start_age: request.profile.current_age,
        bands: result.bands,
        p5_terminal_wealth: result.outcome.p5_terminal_wealth,
        median_terminal_wealth: result.outcome.median_terminal_wealth,
        prob_ruin_percent: result.outcome.prob_ruin_percent,
        tier: result.outcome.tier,
        message: result.message,
    })
}

fn required_return(
    request: &HealthCheckRequest,
    cancel: &AtomicBool,
) -> Result<RequiredReturnResponse, HealthCheckError> {
    let result = request
        .profile
        .solve_required_return_with_cancel(request.solver, cancel)?;
    Ok(RequiredReturnResponse {
        rate: result.rate,
        rate_percent: result.rate * 100.0,
        tier: result.tier,
        message: result.message,
        converged: result.converged,
        iterations: result.iterations.len(),
        terminal_wealth: result.terminal_wealth,
    })
}

fn cashflows(
    request: &HealthCheckRequest,
    _cancel: &AtomicBool,
) -> Result<CashflowResponse, HealthCheckError> {
    let profile = &request.profile;
    let series = project_cash_flows(&profile.assumptions(), &profile.horizon()?)?;
    Ok(CashflowResponse {
        start_age: series.start_age,
        years: series
            .years
            .iter()
            .zip(series.start_age..)
            .map(|(year, age)| CashflowYear {
                age,
                income: year.income,
                spending: year.spending,
            })
            .collect(),
    })
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router();

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "health check API listening");

    axum::serve(listener, app).await
}

fn router() -> Router {
    Router::new()
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route(
            "/api/required-return",
            get(required_return_get_handler).post(required_return_post_handler),
        )
        .route(
            "/api/cashflows",
            get(cashflows_get_handler).post(cashflows_post_handler),
        )
        .route("/api/risk-levels", get(risk_levels_handler))
        .fallback(not_found_handler)
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn risk_levels_handler() -> Response {
    json_response(StatusCode::OK, return_buckets().collect::<Vec<_>>())
}

async fn simulate_get_handler(Query(payload): Query<CheckPayload>) -> Response {
    engine_handler(payload, simulate).await
}

async fn simulate_post_handler(Json(payload): Json<CheckPayload>) -> Response {
    engine_handler(payload, simulate).await
}

async fn required_return_get_handler(Query(payload): Query<CheckPayload>) -> Response {
    engine_handler(payload, required_return).await
}

async fn required_return_post_handler(Json(payload): Json<CheckPayload>) -> Response {
    engine_handler(payload, required_return).await
}

async fn cashflows_get_handler(Query(payload): Query<CheckPayload>) -> Response {
    engine_handler(payload, cashflows).await
}

async fn cashflows_post_handler(Json(payload): Json<CheckPayload>) -> Response {
    engine_handler(payload, cashflows).await
}

async fn engine_handler<T>(payload: CheckPayload, compute: Compute<T>) -> Response
where
    T: Serialize + Send + 'static,
{
    engine_handler_within(payload, compute, ENGINE_BUDGET).await
}

/// Runs engine work off the async executor. Past `budget` the work is told
/// to stop and the caller gets a 503.
async fn engine_handler_within<T>(
    payload: CheckPayload,
    compute: Compute<T>,
    budget: Duration,
) -> Response
where
    T: Serialize + Send + 'static,
{
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let cancel = Arc::new(AtomicBool::new(false));
    let task = {
        let cancel = Arc::clone(&cancel);
        tokio::task::spawn_blocking(move || compute(&request, &cancel))
    };
    match tokio::time::timeout(budget, task).await {
        Ok(Ok(Ok(body))) => json_response(StatusCode::OK, body),
        Ok(Ok(Err(e))) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
        Ok(Err(e)) => {
            warn!(error = %e, "engine task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Engine task failed")
        }
        Err(_) => {
            cancel.store(true, Ordering::Relaxed);
            warn!(budget = ?budget, "engine budget exceeded");
            let mut response = error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Computation exceeded its time budget; retry with fewer trials or later",
            );
            response.headers_mut().insert(
                header::RETRY_AFTER,
                header::HeaderValue::from_static(RETRY_AFTER_SECS),
            );
            response
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

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<HealthCheckRequest, String> {
    let payload = serde_json::from_str::<CheckPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: CheckPayload) -> Result<HealthCheckRequest, String> {
    let mut args = default_args_for_api();

    if let Some(v) = payload.income {
        args.income = v;
    }
    if let Some(v) = payload.income_growth {
        args.income_growth = v;
    }
    if let Some(v) = payload.spending {
        args.spending = v;
    }
    if let Some(v) = payload.inflation {
        args.inflation = v;
    }
    if let Some(v) = payload.savings {
        args.savings = v;
    }
    if let Some(v) = payload.risk_level {
        args.risk_level = v;
    }
    if let Some(v) = payload.current_age {
        args.current_age = v;
    }
    if let Some(v) = payload.death_age {
        args.death_age = v;
    }
    if let Some(v) = payload.retirement_age {
        args.retirement_age = v;
    }
    if let Some(v) = payload.trials {
        args.trials = v;
    }
    if let Some(v) = payload.seed {
        args.seed = v;
    }
    if let Some(v) = payload.max_iterations {
        args.max_iterations = v;
    }
    if let Some(v) = payload.tolerance {
        args.tolerance = v;
    }
    if let Some(v) = payload.search_min {
        args.search_min = v;
    }
    if let Some(v) = payload.search_max {
        args.search_max = v;
    }

    build_request(args)
}

fn default_args_for_api() -> PlanArgs {
    PlanArgs {
        income: 100.0,
        income_growth: 5.0,
        spending: 90.0,
        inflation: 3.0,
        savings: 2_000.0,
        risk_level: 5,
        current_age: 50,
        death_age: 100,
        retirement_age: 70,
        trials: 5_000,
        seed: 42,
        max_iterations: 200,
        tolerance: 1.0,
        search_min: 0.0,
        search_max: 20.0,
    }
}
