//! # Live Update Feeds
//!
//! Server-sent event streams mirroring order and telemetry state to the
//! customer's browser. The session → profile resolution happens upstream;
//! these routes receive the already-verified profile id as a path segment.
//!
//! ## my-bar
//! Re-queries the customer's active orders on an adaptive cadence (1 s while
//! anything is in_progress, 5 s otherwise) and emits
//! `{activeOrders, completedOrders?}`. Terminal transitions are detected by
//! diffing active order ids between ticks; the first tick instead looks back
//! a fixed 10 s window so a cancellation racing the stream setup is not
//! lost.
//!
//! ## calibration
//! Fixed 1 s cadence emitting `{weight}` from the weight cache, gated on
//! device ownership.
//!
//! Both feeds are plain pull-based streams: when the client disconnects the
//! stream value is dropped and no further tick (or store access) runs.

use std::collections::HashSet;
use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use chrono::Utc;
use futures_util::stream::{self, Stream, StreamExt};
use serde::Serialize;
use tokio_stream::wrappers::IntervalStream;
use tracing::warn;

use barkeep_core::OrderStatus;
use barkeep_db::ActiveOrderView;

use crate::error::{ApiError, ApiResult};
use crate::state::SharedState;

/// Cadence while at least one order is being poured.
const FAST_TICK: Duration = Duration::from_secs(1);

/// Cadence while the customer's queue is quiet.
const SLOW_TICK: Duration = Duration::from_secs(5);

/// First-tick lookback for terminations that raced the stream setup.
const TERMINATED_LOOKBACK_SECS: i64 = 10;

/// Calibration feed cadence.
const CALIBRATION_TICK: Duration = Duration::from_secs(1);

// =============================================================================
// my-bar Feed
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MyBarEvent {
    active_orders: Vec<ActiveOrderView>,
    /// Orders that just left the active set, so the client can show a final
    /// status without a reload.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    completed_orders: Vec<String>,
}

struct MyBarFeed {
    previous_active: HashSet<String>,
    first_tick: bool,
    delay: Duration,
}

/// Live order feed for one customer.
pub async fn my_bar(
    State(state): State<SharedState>,
    Path(customer_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let feed = MyBarFeed {
        previous_active: HashSet::new(),
        first_tick: true,
        delay: FAST_TICK,
    };

    let stream = stream::unfold(
        (state, customer_id, feed),
        |(state, customer_id, mut feed)| async move {
            loop {
                if !feed.first_tick {
                    tokio::time::sleep(feed.delay).await;
                }
                match my_bar_tick(&state, &customer_id, &mut feed).await {
                    Ok(event) => return Some((Ok(event), (state, customer_id, feed))),
                    Err(err) => {
                        // Skip the tick; the next one re-queries from scratch
                        warn!(customer = %customer_id, error = %err, "Live feed tick failed");
                        feed.first_tick = false;
                        tokio::time::sleep(feed.delay).await;
                    }
                }
            }
        },
    );

    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn my_bar_tick(
    state: &SharedState,
    customer_id: &str,
    feed: &mut MyBarFeed,
) -> ApiResult<Event> {
    let views = state.db.orders().active_for_customer(customer_id).await?;
    let current: HashSet<String> = views.iter().map(|view| view.order_id.clone()).collect();

    let completed_orders: Vec<String> = if feed.first_tick {
        let since = Utc::now() - chrono::Duration::seconds(TERMINATED_LOOKBACK_SECS);
        state.db.orders().terminated_since(customer_id, since).await?
    } else {
        feed.previous_active.difference(&current).cloned().collect()
    };

    feed.delay = if views
        .iter()
        .any(|view| view.status == OrderStatus::InProgress)
    {
        FAST_TICK
    } else {
        SLOW_TICK
    };
    feed.previous_active = current;
    feed.first_tick = false;

    Event::default()
        .json_data(&MyBarEvent {
            active_orders: views,
            completed_orders,
        })
        .map_err(|err| ApiError::Internal(err.to_string()))
}

// =============================================================================
// Calibration Feed
// =============================================================================

#[derive(Debug, Serialize)]
struct CalibrationEvent {
    /// Last cached scale reading in grams; null once the reading is stale.
    weight: Option<f64>,
}

/// Live scale weight for the calibration page, 1 s cadence.
///
/// Gated on ownership: the device must belong to the requesting profile.
pub async fn calibration(
    State(state): State<SharedState>,
    Path((profile_id, device_id)): Path<(String, String)>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    let device = state
        .db
        .devices()
        .get_by_id(&device_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Device", device_id.clone()))?;
    if device.profile_id != profile_id {
        return Err(ApiError::Forbidden(
            "Device does not belong to this profile".to_string(),
        ));
    }

    // First tick fires immediately, then every second
    let ticks = IntervalStream::new(tokio::time::interval(CALIBRATION_TICK));
    let stream = ticks.map(move |_| {
        let weight = state.weights.get(&device_id).map(|sample| sample.weight_g);
        Event::default().json_data(&CalibrationEvent { weight })
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

// =============================================================================
// Unit Tests
// =============================================================================
