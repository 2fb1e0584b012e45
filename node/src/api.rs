//! HTTP API for a FlightSurety node
//!
//! Callers identify themselves with a hex `caller` field; the node trusts it
//! and treats the configured operator address as privileged.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use flightsurety_consensus::ReportOutcome;
use flightsurety_core::{
    Address, Amount, ErrorKind, FlightKey, StatusCode as FlightStatus, SuretyError, SuretyResult,
    Timestamp,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::runtime::NodeRuntime;

/// API state containing node runtime
pub type ApiState = Arc<NodeRuntime>;

/// API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: impl ToString) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
        }
    }
}

type ApiResult<T> = (StatusCode, Json<ApiResponse<T>>);

/// HTTP status for an error class
fn http_status(error: &SuretyError) -> StatusCode {
    match error.kind() {
        ErrorKind::Authorization => StatusCode::FORBIDDEN,
        ErrorKind::StateConflict => StatusCode::CONFLICT,
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Resource => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Fatal | ErrorKind::Infrastructure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond<T: Serialize>(result: SuretyResult<T>) -> ApiResult<T> {
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::ok(data))),
        Err(e) => (http_status(&e), Json(ApiResponse::err(e))),
    }
}

fn parse_address(raw: &str) -> SuretyResult<Address> {
    Address::from_hex(raw).map_err(|e| SuretyError::InvalidAddress(e.to_string()))
}

/// Amounts travel as decimal strings of base units
fn parse_amount(raw: &str) -> SuretyResult<Amount> {
    raw.parse::<u128>()
        .map(Amount::new)
        .map_err(|e| SuretyError::InvalidInput(format!("amount {:?}: {}", raw, e)))
}

fn parse_status(code: u8) -> SuretyResult<FlightStatus> {
    FlightStatus::from_code(code)
        .ok_or_else(|| SuretyError::InvalidInput(format!("status code {}", code)))
}

/// Flight identity as sent by clients
#[derive(Deserialize)]
pub struct FlightRef {
    pub airline: String,
    pub flight: String,
    pub timestamp: u64,
}

impl FlightRef {
    fn key(&self) -> SuretyResult<FlightKey> {
        Ok(FlightKey::new(
            parse_address(&self.airline)?,
            self.flight.clone(),
            Timestamp::from_millis(self.timestamp),
        ))
    }
}

#[derive(Deserialize)]
pub struct ProposeAirlineRequest {
    pub caller: String,
    pub candidate: String,
    pub name: String,
}

#[derive(Deserialize)]
pub struct AmountRequest {
    pub caller: String,
    pub amount: String,
}

#[derive(Deserialize)]
pub struct RegisterFlightRequest {
    pub caller: String,
    pub flight: String,
    pub timestamp: u64,
}

#[derive(Deserialize)]
pub struct BuyInsuranceRequest {
    pub caller: String,
    pub airline: String,
    pub flight: String,
    pub premium: String,
}

#[derive(Deserialize)]
pub struct StatusRequestRequest {
    pub caller: String,
    #[serde(flatten)]
    pub flight: FlightRef,
}

#[derive(Deserialize)]
pub struct ReportRequest {
    pub caller: String,
    pub index: u8,
    #[serde(flatten)]
    pub flight: FlightRef,
    pub status: u8,
}

#[derive(Deserialize)]
pub struct OperationalRequest {
    pub caller: String,
    pub operational: bool,
}

/// Node status response
#[derive(Serialize)]
pub struct NodeStatusResponse {
    pub name: String,
    pub state_version: u64,
    pub state_root: String,
    pub operational: bool,
    pub airlines: usize,
    pub treasury: String,
}

#[derive(Serialize)]
pub struct AdmissionResponse {
    pub admitted: bool,
    pub vote_count: usize,
}

#[derive(Serialize)]
pub struct AirlineResponse {
    pub address: String,
    pub name: String,
    pub registered: bool,
    pub funded: bool,
    pub fund: String,
}

#[derive(Serialize)]
pub struct FlightResponse {
    pub name: String,
    pub airline: String,
    pub status: u8,
    pub status_name: String,
    pub updated_at: u64,
}

#[derive(Serialize)]
pub struct BalanceResponse {
    pub address: String,
    pub amount: String,
    pub display: String,
}

#[derive(Serialize)]
pub struct IndexResponse {
    pub index: u8,
}

#[derive(Serialize)]
pub struct IndexesResponse {
    pub indexes: [u8; 3],
}

#[derive(Serialize)]
pub struct ReportResponse {
    pub outcome: String,
    pub count: Option<usize>,
}

impl BalanceResponse {
    fn new(address: &Address, amount: Amount) -> Self {
        Self {
            address: address.to_hex(),
            amount: amount.0.to_string(),
            display: amount.to_string(),
        }
    }
}

/// Create API router
pub fn create_router(state: ApiState) -> Router {
    let enable_cors = state.config().api.enable_cors;

    let router = Router::new()
        // Health
        .route("/health", get(health))
        .route("/status", get(status))
        // Airlines
        .route("/airlines", post(propose_airline))
        .route("/airlines/fund", post(fund_airline))
        .route("/airlines/:address", get(get_airline))
        // Flights and insurance
        .route("/flights", post(register_flight))
        .route("/flights/:name", get(get_flight))
        .route("/insurance", post(buy_insurance))
        .route("/insurance/:passenger/:flight", get(get_premium))
        .route("/credit/:address", get(get_credit))
        .route("/withdraw", post(withdraw))
        // Attestation
        .route("/status-requests", post(request_status))
        .route("/reporters", post(register_reporter))
        .route("/reporters/:address/indexes", get(get_reporter_indexes))
        .route("/reports", post(submit_report))
        // Operator
        .route("/operational", post(set_operational))
        .route("/settlements", post(settle_status))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    }
}

/// Health check
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// Node status
async fn status(State(runtime): State<ApiState>) -> impl IntoResponse {
    let result: SuretyResult<_> = async {
        Ok(NodeStatusResponse {
            name: runtime.config().name.clone(),
            state_version: runtime.state_version().await.0,
            state_root: runtime.state_root().await?.to_hex(),
            operational: runtime.is_operational().await?,
            airlines: runtime.airline_count().await?,
            treasury: runtime.treasury().await?.0.to_string(),
        })
    }
    .await;
    respond(result)
}

async fn propose_airline(
    State(runtime): State<ApiState>,
    Json(req): Json<ProposeAirlineRequest>,
) -> impl IntoResponse {
    let result: SuretyResult<_> = async {
        let ctx = runtime.context(parse_address(&req.caller)?);
        let candidate = parse_address(&req.candidate)?;
        let admission = runtime.propose_airline(ctx, candidate, &req.name).await?;
        Ok(AdmissionResponse {
            admitted: admission.admitted,
            vote_count: admission.vote_count,
        })
    }
    .await;
    respond(result)
}

async fn fund_airline(
    State(runtime): State<ApiState>,
    Json(req): Json<AmountRequest>,
) -> impl IntoResponse {
    let result: SuretyResult<_> = async {
        let ctx = runtime.context(parse_address(&req.caller)?);
        runtime.fund_airline(ctx, parse_amount(&req.amount)?).await
    }
    .await;
    respond(result)
}

async fn get_airline(
    State(runtime): State<ApiState>,
    Path(address): Path<String>,
) -> impl IntoResponse {
    let address = match parse_address(&address) {
        Ok(address) => address,
        Err(e) => return respond(Err(e)),
    };
    match runtime.airline(&address).await {
        Ok(Some(record)) => respond(Ok(AirlineResponse {
            address: address.to_hex(),
            name: record.name,
            registered: record.registered,
            funded: record.funded,
            fund: record.fund.0.to_string(),
        })),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::err(format!("Airline {} not found", address))),
        ),
        Err(e) => respond(Err(e)),
    }
}

async fn register_flight(
    State(runtime): State<ApiState>,
    Json(req): Json<RegisterFlightRequest>,
) -> impl IntoResponse {
    let result: SuretyResult<_> = async {
        let ctx = runtime.context(parse_address(&req.caller)?);
        let record = runtime
            .register_flight(ctx, &req.flight, Timestamp::from_millis(req.timestamp))
            .await?;
        Ok(flight_response(record))
    }
    .await;
    respond(result)
}

fn flight_response(record: flightsurety_state::FlightRecord) -> FlightResponse {
    FlightResponse {
        name: record.name,
        airline: record.airline.to_hex(),
        status: record.status.code(),
        status_name: record.status.to_string(),
        updated_at: record.updated_at.as_millis(),
    }
}

async fn get_flight(
    State(runtime): State<ApiState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match runtime.flight(&name).await {
        Ok(Some(record)) => respond(Ok(flight_response(record))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::err(format!("Flight {} not found", name))),
        ),
        Err(e) => respond(Err(e)),
    }
}

async fn buy_insurance(
    State(runtime): State<ApiState>,
    Json(req): Json<BuyInsuranceRequest>,
) -> impl IntoResponse {
    let result: SuretyResult<_> = async {
        let ctx = runtime.context(parse_address(&req.caller)?);
        let airline = parse_address(&req.airline)?;
        let premium = parse_amount(&req.premium)?;
        runtime
            .buy_insurance(ctx, airline, &req.flight, premium)
            .await
    }
    .await;
    respond(result)
}

async fn get_premium(
    State(runtime): State<ApiState>,
    Path((passenger, flight)): Path<(String, String)>,
) -> impl IntoResponse {
    let result: SuretyResult<_> = async {
        let passenger = parse_address(&passenger)?;
        let premium = runtime.premium(&passenger, &flight).await?;
        Ok(BalanceResponse::new(&passenger, premium))
    }
    .await;
    respond(result)
}

async fn get_credit(
    State(runtime): State<ApiState>,
    Path(address): Path<String>,
) -> impl IntoResponse {
    let result: SuretyResult<_> = async {
        let passenger = parse_address(&address)?;
        let credit = runtime.credit(&passenger).await?;
        Ok(BalanceResponse::new(&passenger, credit))
    }
    .await;
    respond(result)
}

async fn withdraw(
    State(runtime): State<ApiState>,
    Json(req): Json<AmountRequest>,
) -> impl IntoResponse {
    let result: SuretyResult<_> = async {
        let ctx = runtime.context(parse_address(&req.caller)?);
        runtime.withdraw(ctx, parse_amount(&req.amount)?).await
    }
    .await;
    respond(result)
}

async fn request_status(
    State(runtime): State<ApiState>,
    Json(req): Json<StatusRequestRequest>,
) -> impl IntoResponse {
    let result: SuretyResult<_> = async {
        let ctx = runtime.context(parse_address(&req.caller)?);
        let index = runtime.request_status(ctx, &req.flight.key()?).await?;
        Ok(IndexResponse { index })
    }
    .await;
    respond(result)
}

async fn register_reporter(
    State(runtime): State<ApiState>,
    Json(req): Json<AmountRequest>,
) -> impl IntoResponse {
    let result: SuretyResult<_> = async {
        let ctx = runtime.context(parse_address(&req.caller)?);
        let indexes = runtime
            .register_reporter(ctx, parse_amount(&req.amount)?)
            .await?;
        Ok(IndexesResponse { indexes })
    }
    .await;
    respond(result)
}

async fn get_reporter_indexes(
    State(runtime): State<ApiState>,
    Path(address): Path<String>,
) -> impl IntoResponse {
    let result: SuretyResult<_> = async {
        let indexes = runtime.reporter_indexes(&parse_address(&address)?).await?;
        Ok(IndexesResponse { indexes })
    }
    .await;
    respond(result)
}

async fn submit_report(
    State(runtime): State<ApiState>,
    Json(req): Json<ReportRequest>,
) -> impl IntoResponse {
    let result: SuretyResult<_> = async {
        let ctx = runtime.context(parse_address(&req.caller)?);
        let status = parse_status(req.status)?;
        let outcome = runtime
            .submit_report(ctx, req.index, &req.flight.key()?, status)
            .await?;
        Ok(match outcome {
            ReportOutcome::Recorded { count } => ReportResponse {
                outcome: "recorded".into(),
                count: Some(count),
            },
            ReportOutcome::Duplicate => ReportResponse {
                outcome: "duplicate".into(),
                count: None,
            },
            ReportOutcome::Settled { .. } => ReportResponse {
                outcome: "settled".into(),
                count: None,
            },
        })
    }
    .await;
    respond(result)
}

async fn set_operational(
    State(runtime): State<ApiState>,
    Json(req): Json<OperationalRequest>,
) -> impl IntoResponse {
    let result: SuretyResult<_> = async {
        let ctx = runtime.context(parse_address(&req.caller)?);
        runtime.set_operational(ctx, req.operational).await
    }
    .await;
    respond(result)
}

async fn settle_status(
    State(runtime): State<ApiState>,
    Json(req): Json<ReportRequest>,
) -> impl IntoResponse {
    let result: SuretyResult<_> = async {
        let ctx = runtime.context(parse_address(&req.caller)?);
        let status = parse_status(req.status)?;
        runtime.settle_status(ctx, &req.flight.key()?, status).await
    }
    .await;
    respond(result)
}

/// Start API server
pub async fn start_api_server(runtime: Arc<NodeRuntime>, listen_addr: &str) -> anyhow::Result<()> {
    let router = create_router(runtime);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    info!("API server listening on {}", listen_addr);

    axum::serve(listener, router).await?;

    Ok(())
}
