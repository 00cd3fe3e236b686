//! Timeout Sweeper (C9): expires stale open `TripRequest`s and force-cancels
//! no-show `accepted` trips, one read-then-per-document-transaction sweep at
//! a time. Grounded on the periodic-check shape of the teacher's
//! `driver_offduty_check_system` — a scheduled scan of matching documents
//! that does not let one bad document abort the rest of the batch.

use async_trait::async_trait;
use chrono::Duration;
use tracing::{error, info};

use crate::clock::Clock;
use crate::config::ConfigReader;
use crate::error::CoreResult;
use crate::model::{TripRequestStatus, TripStatus};
use crate::state_machine;
use crate::store::Store;

/// Abstracts "when does the sweeper run" so tests and the scenario harness
/// can drive it synchronously instead of waiting on a real interval timer.
/// `dispatch_service` implements this over `tokio::time::interval`.
#[async_trait]
pub trait TickSource: Send {
    /// Blocks (or suspends) until the next tick is due.
    async fn wait_for_tick(&mut self);
}

/// A tick source that fires once per call with no delay — used by tests and
/// the scenario harness to drive the sweeper deterministically.
#[derive(Debug, Default)]
pub struct ImmediateTickSource;

#[async_trait]
impl TickSource for ImmediateTickSource {
    async fn wait_for_tick(&mut self) {}
}

/// Runs both sweeps once. Returns the number of documents transitioned by
/// each sweep, for logging/metrics.
pub struct SweepReport {
    pub expired_requests: usize,
    pub no_show_trips: usize,
    pub expired_offers: usize,
}

pub async fn run_sweep_once<S: Store>(
    store: &S,
    clock: &dyn Clock,
    config: &ConfigReader<S>,
) -> CoreResult<SweepReport> {
    let system_config = config.get().await?;
    let now = clock.now();

    let search_cutoff = now - Duration::seconds(system_config.search_timeout_secs);
    let open_requests = store
        .query_open_trip_requests_created_before(search_cutoff)
        .await?;

    let mut expired_requests = 0;
    for (request_id, mut request) in open_requests {
        let mut tx = match store.begin_transaction().await {
            Ok(tx) => tx,
            Err(err) => {
                error!(error = %err, request_id = %request_id, "sweeper: failed to open transaction");
                continue;
            }
        };

        let fresh = match tx.get_trip_request(&request_id).await {
            Ok(Some(fresh)) => fresh,
            Ok(None) => continue,
            Err(err) => {
                error!(error = %err, request_id = %request_id, "sweeper: failed to re-read request");
                continue;
            }
        };
        if fresh.status != TripRequestStatus::Open {
            continue; // matched or cancelled concurrently; nothing to do
        }

        request = fresh;
        request.status = TripRequestStatus::Expired;
        tx.put_trip_request(&request_id, request).await;

        if let Err(err) = tx.commit().await {
            error!(error = %err, request_id = %request_id, "sweeper: failed to expire request");
            continue;
        }
        expired_requests += 1;
        info!(request_id = %request_id, "sweeper: expired unmatched trip request");
    }

    let arrival_cutoff = now - Duration::seconds(system_config.driver_arrival_timeout_secs);
    let accepted_trips = store.query_accepted_trips_before(arrival_cutoff).await?;

    let mut no_show_trips = 0;
    for (trip_id, _trip) in accepted_trips {
        match state_machine::system_cancel_no_show(store, clock, &trip_id).await {
            Ok(trip) if trip.status == TripStatus::CancelledBySystem => {
                no_show_trips += 1;
                info!(trip_id = %trip_id, "sweeper: cancelled no-show trip");
            }
            Ok(_) => {}
            Err(err) => {
                error!(error = %err, trip_id = %trip_id, "sweeper: failed to cancel no-show trip");
            }
        }
    }

    // `DriverOffer.expiresAt` is already an absolute timestamp (set at offer
    // creation as `created_at + driverResponseTimeout`), unlike the two
    // sweeps above — so the cutoff here is `now` itself, not `now - timeout`.
    let stale_offers = store.query_pending_driver_offers_before(now).await?;

    let mut expired_offers = 0;
    for (driver_id, trip_id, _offer) in stale_offers {
        match state_machine::system_expire_offer(store, clock, &trip_id, &driver_id).await {
            Ok(trip) if trip.status == TripStatus::NoDriverAvailable => {
                expired_offers += 1;
                info!(trip_id = %trip_id, driver_id = %driver_id, "sweeper: expired stale driver offer");
            }
            Ok(_) => {}
            Err(err) => {
                error!(error = %err, trip_id = %trip_id, driver_id = %driver_id, "sweeper: failed to expire stale offer");
            }
        }
    }

    Ok(SweepReport {
        expired_requests,
        no_show_trips,
        expired_offers,
    })
}

/// Drives `run_sweep_once` forever off a [`TickSource`]. `dispatch_service`
/// calls this with a `tokio::time::interval`-backed tick source; tests and
/// the scenario harness drive it with [`ImmediateTickSource`] instead.
pub async fn run_sweeper_loop<S: Store, T: TickSource>(
    store: &S,
    clock: &dyn Clock,
    config: &ConfigReader<S>,
    mut ticks: T,
    mut should_continue: impl FnMut() -> bool,
) {
    while should_continue() {
        ticks.wait_for_tick().await;
        if let Err(err) = run_sweep_once(store, clock, config).await {
            error!(error = %err, "sweeper: sweep cycle failed");
        }
    }
}
