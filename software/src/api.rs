use std::sync::Arc;
use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    extract::{Path, State},
    http::StatusCode,
    response::{Html, Json},
    routing::{get, post},
    Router,
};
use log::{error, info};
use webgpio_common::hal::{HalError, HalErrorKind};
use webgpio_common::protocol::gpio::{PinResult, SetupRequest, WriteRequest};
use webgpio_common::protocol::{GpioInfo, PinInfo, PinTable};
use crate::controller::{ControlError, ControlResult, Outcome, PinController};

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Response of every `/api/pin/...` route, failures included.
type Reply = (StatusCode, Json<PinResult>);

#[derive(Clone)]
pub struct AppState {
    controller: Arc<PinController>,
}

pub fn router(controller: Arc<PinController>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/pins", get(list_pins))
        .route("/api/gpio-info", get(gpio_info))
        .route("/api/pin/:pin/setup", post(setup_pin))
        .route("/api/pin/:pin/write", post(write_pin))
        .route("/api/pin/:pin/read", get(read_pin))
        .with_state(AppState { controller })
}

fn status_code(e: &ControlError) -> StatusCode {
    match e {
        ControlError::InvalidPin(_) => StatusCode::NOT_FOUND,
        ControlError::InvalidDirection(_) => StatusCode::BAD_REQUEST,
        ControlError::NotConfiguredAsOutput { .. } => StatusCode::CONFLICT,
        ControlError::HardwareFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reply(status: StatusCode, body: PinResult) -> Reply {
    info!("API: pin {:?} -> {} success={} message='{}'", body.physical_pin, status, body.success, body.message);
    (status, Json(body))
}

fn failed(pin: Option<i64>, e: &ControlError) -> Reply {
    reply(status_code(e), PinResult::new(pin, false, e.to_string()))
}

fn rejected(pin: Option<i64>, status: StatusCode, message: String) -> Reply {
    error!("API: rejected request for pin {:?}: {}", pin, message);
    reply(status, PinResult::new(pin, false, message))
}

/// Header position named by the `:pin` segment.
///
/// A segment that is not a number is a bad request. Any number that is not a
/// header position is an invalid pin, the same as a position that exists but
/// cannot be controlled.
fn position(path: Result<Path<String>, PathRejection>) -> Result<u8, Reply> {
    let Path(segment) = path.map_err(|e| rejected(None, e.status(), e.body_text()))?;
    let number = segment.trim().parse::<i64>()
        .map_err(|_| rejected(None, StatusCode::BAD_REQUEST, format!("Invalid pin '{}'", segment)))?;
    u8::try_from(number).map_err(|_| {
        let e = ControlError::InvalidPin(number);
        error!("invalid pin {}, not a header position", number);
        failed(Some(number), &e)
    })
}

/// Request body, rendered as a failed result when it is missing or malformed.
fn body<T>(pin: u8, body: Result<Json<T>, JsonRejection>) -> Result<T, Reply> {
    body.map(|Json(request)| request)
        .map_err(|e| rejected(Some(pin.into()), e.status(), e.body_text()))
}

/// Runs `f` on the blocking pool: controller calls wait on the GPIO lock
/// and on the driver.
async fn with_controller<F, T>(state: &AppState, f: F) -> Result<T, HalError>
where
    F: FnOnce(&PinController) -> T + Send + 'static,
    T: Send + 'static,
{
    let controller = state.controller.clone();
    tokio::task::spawn_blocking(move || f(&controller)).await.map_err(|e| {
        error!("GPIO task failed: {}", e);
        HalError::new(HalErrorKind::Other, format!("GPIO task failed: {}", e))
    })
}

/// Runs one pin operation and renders its result.
async fn pin_operation<F>(state: &AppState, pin: u8, report_level: bool, f: F) -> Reply
where
    F: FnOnce(&PinController) -> ControlResult<Outcome> + Send + 'static,
{
    let joined = with_controller(state, move |controller| {
        let result = f(controller);
        (result, controller.pin_info(pin))
    }).await;
    let (result, pin_info): (ControlResult<Outcome>, Option<PinInfo>) = match joined {
        Ok(done) => done,
        Err(e) => (Err(e.into()), None),
    };

    let (status, body) = match result {
        Ok(outcome) => {
            let body = PinResult::new(Some(pin.into()), true, outcome.message);
            let body = if report_level { body.with_state(outcome.state.level) } else { body };
            (StatusCode::OK, body)
        },
        Err(e) => (status_code(&e), PinResult::new(Some(pin.into()), false, e.to_string())),
    };
    reply(status, body.with_pin_info(pin_info))
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn list_pins(State(state): State<AppState>) -> Result<Json<PinTable>, StatusCode> {
    info!("API: /api/pins");
    let table = with_controller(&state, |controller| controller.snapshot()).await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(table))
}

async fn gpio_info(State(state): State<AppState>) -> Json<GpioInfo> {
    info!("API: /api/gpio-info");
    Json(state.controller.gpio_info())
}

async fn setup_pin(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    request: Result<Json<SetupRequest>, JsonRejection>,
) -> Result<Reply, Reply> {
    let pin = position(path)?;
    let request = body(pin, request)?;
    info!("API: /api/pin/{}/setup direction='{}'", pin, request.direction);
    Ok(pin_operation(&state, pin, false, move |controller| controller.setup_token(pin, &request.direction)).await)
}

async fn write_pin(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    request: Result<Json<WriteRequest>, JsonRejection>,
) -> Result<Reply, Reply> {
    let pin = position(path)?;
    let request = body(pin, request)?;
    let level = request.level();
    info!("API: /api/pin/{}/write state={} -> {}", pin, request.state, level);
    Ok(pin_operation(&state, pin, false, move |controller| controller.write(pin, level)).await)
}

async fn read_pin(State(state): State<AppState>, path: Result<Path<String>, PathRejection>) -> Result<Reply, Reply> {
    let pin = position(path)?;
    info!("API: /api/pin/{}/read", pin);
    Ok(pin_operation(&state, pin, true, move |controller| controller.read(pin)).await)
}
