//! # Device Endpoints
//!
//! The JSON protocol polled by the firmware. All endpoints are POST with the
//! bearer token in the body and camelCase field names on the wire.
//!
//! ## Endpoints
//! ```text
//! POST /api/devices/verify        firmware check-in, calibration self-report
//! POST /api/devices/action        "what should I do right now"
//! POST /api/devices/progress      poured ml / measured g of the current dose
//! POST /api/devices/error         hardware fault → order failed
//! POST /api/devices/weight        scale telemetry + HX711 wiring answer
//! POST /api/devices/cancel/order  device-side cancel of its own order
//! POST /api/devices/token         enrollment: issue a fresh bearer token
//! ```

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use barkeep_core::NextAction;

use crate::auth::authenticate;
use crate::error::{ApiError, ApiResult};
use crate::orchestrator::{self, Acknowledgement, ProgressAmount};
use crate::state::SharedState;
use crate::telemetry::WeightSample;

// =============================================================================
// verify
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub token: Option<String>,
    pub firmware_version: String,
    #[serde(default)]
    pub needs_calibration: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub token_valid: bool,
    pub message: String,
    pub need_calibration: bool,
}

/// Firmware check-in: proves the token, records the firmware version and
/// latches the calibration flag when the device self-reports it.
pub async fn verify(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(req): Json<VerifyRequest>,
) -> ApiResult<Json<VerifyResponse>> {
    let device = authenticate(&state, &headers, req.token.as_deref()).await?;

    let self_reports = req.needs_calibration.unwrap_or(false);
    state
        .db
        .devices()
        .record_verify(&device.id, &req.firmware_version, self_reports, Utc::now())
        .await?;

    Ok(Json(VerifyResponse {
        token_valid: true,
        message: "Token verified".to_string(),
        need_calibration: device.needs_calibration || self_reports,
    }))
}

// =============================================================================
// action
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub token: Option<String>,
}

/// Wire form of [`NextAction`]: one `action` discriminator plus only the
/// fields that variant carries.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Milliseconds the firmware should idle before the next poll.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dose_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingredient_id: Option<String>,
    /// Milliliters still to pour (ingredient-addressed mode).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity_left: Option<f64>,
    /// GPIO pin of the resolved pump (pump-addressed mode).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pump_gpio: Option<i64>,
    /// Full dose target in grams (pump-addressed mode).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dose_weight: Option<f64>,
    /// Grams already poured (pump-addressed mode).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dose_weight_progress: Option<f64>,
}

impl ActionResponse {
    fn from_action(action: NextAction, idle_ms: u64) -> Self {
        let mut response = ActionResponse {
            action: "standby",
            message: None,
            idle: None,
            order_id: None,
            dose_id: None,
            ingredient_id: None,
            quantity_left: None,
            pump_gpio: None,
            dose_weight: None,
            dose_weight_progress: None,
        };

        match action {
            NextAction::Standby { message } => {
                response.message = message;
                response.idle = Some(idle_ms);
            }
            NextAction::Pour {
                order_id,
                dose_id,
                ingredient_id,
                quantity_left_ml,
                pump,
            } => {
                response.action = "pour";
                response.order_id = Some(order_id);
                response.dose_id = Some(dose_id);
                response.ingredient_id = Some(ingredient_id);
                response.quantity_left = Some(quantity_left_ml);
                if let Some(target) = pump {
                    response.pump_gpio = Some(target.gpio);
                    response.dose_weight = Some(target.dose_weight_g);
                    response.dose_weight_progress = Some(target.dose_weight_progress_g);
                }
            }
            NextAction::Completed { order_id } => {
                response.action = "completed";
                response.order_id = Some(order_id);
            }
        }

        response
    }
}

/// The poll: hands the device its next instruction.
pub async fn action(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(req): Json<ActionRequest>,
) -> ApiResult<Json<ActionResponse>> {
    let device = authenticate(&state, &headers, req.token.as_deref()).await?;
    let next = orchestrator::next_action(&state, &device).await?;
    Ok(Json(ActionResponse::from_action(
        next,
        state.config.standby_idle_ms,
    )))
}

// =============================================================================
// progress
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRequest {
    pub token: Option<String>,
    pub order_id: String,
    pub dose_id: String,
    /// Poured milliliters (volume-direct mode).
    #[serde(default)]
    pub progress: Option<f64>,
    /// Measured grams (weight-derived mode).
    #[serde(default)]
    pub weight_progress: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub message: String,
    #[serde(rename = "continue")]
    pub continue_pouring: bool,
}

/// Progress report for the current dose; the response's `continue` flag is
/// the device's stop signal.
pub async fn progress(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(req): Json<ProgressRequest>,
) -> ApiResult<Json<ProgressResponse>> {
    let device = authenticate(&state, &headers, req.token.as_deref()).await?;

    let amount = match (req.progress, req.weight_progress) {
        (Some(ml), None) => ProgressAmount::VolumeMl(ml),
        (None, Some(grams)) => ProgressAmount::WeightG(grams),
        _ => {
            return Err(ApiError::BadRequest(
                "Exactly one of progress and weightProgress is required".to_string(),
            ))
        }
    };

    let outcome =
        orchestrator::report_progress(&state, &device, &req.order_id, &req.dose_id, amount).await?;
    Ok(Json(ProgressResponse {
        message: outcome.message,
        continue_pouring: outcome.continue_pouring,
    }))
}

// =============================================================================
// error
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRequest {
    pub token: Option<String>,
    pub order_id: String,
    pub error_code: i64,
    #[serde(default)]
    pub message: String,
}

/// Hardware fault report: fails the order with a formatted error message.
pub async fn error(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(req): Json<ErrorRequest>,
) -> ApiResult<Json<Acknowledgement>> {
    let device = authenticate(&state, &headers, req.token.as_deref()).await?;
    let ack =
        orchestrator::report_error(&state, &device, &req.order_id, req.error_code, &req.message)
            .await?;
    Ok(Json(ack))
}

// =============================================================================
// weight
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightRequest {
    pub token: Option<String>,
    /// Calibrated grams.
    pub weight: f64,
    /// Raw HX711 measure, used by the calibration workflow.
    pub raw_measure: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightResponse {
    pub need_calibration: bool,
    pub hx711_dt: Option<i64>,
    pub hx711_sck: Option<i64>,
    pub hx711_offset: i64,
    pub hx711_scale: f64,
}

/// Scale telemetry: caches the reading and answers with the device's HX711
/// wiring and calibration parameters.
pub async fn weight(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(req): Json<WeightRequest>,
) -> ApiResult<Json<WeightResponse>> {
    let device = authenticate(&state, &headers, req.token.as_deref()).await?;

    state.weights.store(
        &device.id,
        WeightSample {
            weight_g: req.weight,
            raw_measure: req.raw_measure,
        },
    );

    Ok(Json(WeightResponse {
        need_calibration: device.needs_calibration,
        hx711_dt: device.hx711_dt,
        hx711_sck: device.hx711_sck,
        hx711_offset: device.hx711_offset,
        hx711_scale: device.hx711_scale,
    }))
}

// =============================================================================
// cancel/order
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderRequest {
    pub token: Option<String>,
    pub order_id: String,
}

/// Device-side cancel; only the order assigned to the calling device.
pub async fn cancel_order(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(req): Json<CancelOrderRequest>,
) -> ApiResult<Json<Acknowledgement>> {
    let device = authenticate(&state, &headers, req.token.as_deref()).await?;
    let ack = orchestrator::cancel(&state, &device, &req.order_id).await?;
    Ok(Json(ack))
}

// =============================================================================
// token
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    pub device_id: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Enrollment: issues a fresh bearer token for a device, replacing any
/// previous one. Reached through the owner's session (resolved upstream),
/// not with a device token.
pub async fn token(
    State(state): State<SharedState>,
    Json(req): Json<TokenRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let token = state.db.devices().issue_token(&req.device_id).await?;
    Ok(Json(TokenResponse { token }))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use barkeep_core::PumpTarget;

    #[test]
    fn test_standby_wire_shape() {
        let response = ActionResponse::from_action(NextAction::Standby { message: None }, 1000);
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["action"], "standby");
        assert_eq!(value["idle"], 1000);
        assert!(value.get("orderId").is_none());
        assert!(value.get("message").is_none());
    }

    #[test]
    fn test_pour_wire_shape_with_pump() {
        let action = NextAction::Pour {
            order_id: "o1".to_string(),
            dose_id: "do1".to_string(),
            ingredient_id: "i1".to_string(),
            quantity_left_ml: 25.0,
            pump: Some(PumpTarget {
                gpio: 17,
                dose_weight_g: 40.0,
                dose_weight_progress_g: 15.0,
            }),
        };
        let value = serde_json::to_value(ActionResponse::from_action(action, 1000)).unwrap();
        assert_eq!(value["action"], "pour");
        assert_eq!(value["orderId"], "o1");
        assert_eq!(value["doseId"], "do1");
        assert_eq!(value["ingredientId"], "i1");
        assert_eq!(value["quantityLeft"], 25.0);
        assert_eq!(value["pumpGpio"], 17);
        assert_eq!(value["doseWeight"], 40.0);
        assert_eq!(value["doseWeightProgress"], 15.0);
        assert!(value.get("idle").is_none());
    }

    #[test]
    fn test_pour_wire_shape_without_pump() {
        let action = NextAction::Pour {
            order_id: "o1".to_string(),
            dose_id: "do1".to_string(),
            ingredient_id: "i1".to_string(),
            quantity_left_ml: 25.0,
            pump: None,
        };
        let value = serde_json::to_value(ActionResponse::from_action(action, 1000)).unwrap();
        assert_eq!(value["action"], "pour");
        assert!(value.get("pumpGpio").is_none());
        assert!(value.get("doseWeight").is_none());
    }

    #[test]
    fn test_completed_wire_shape() {
        let action = NextAction::Completed {
            order_id: "o1".to_string(),
        };
        let value = serde_json::to_value(ActionResponse::from_action(action, 1000)).unwrap();
        assert_eq!(value["action"], "completed");
        assert_eq!(value["orderId"], "o1");
        assert!(value.get("quantityLeft").is_none());
    }

    #[test]
    fn test_progress_response_uses_continue_keyword() {
        let response = ProgressResponse {
            message: "Keep pouring".to_string(),
            continue_pouring: true,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["continue"], true);
    }
}
