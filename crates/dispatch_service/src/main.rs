//! Dispatch service: wires an in-memory `Store` to the admission layer and
//! drives the timeout sweeper on a fixed interval. Grounded on the
//! keeper-rs poll loop — parse CLI config, init tracing, build the
//! long-lived services, loop forever doing the scheduled work.
//!
//! There is no RPC transport in this pilot binary (`spec.md` treats the
//! callable surface as an interface, not a wire protocol); `AdmissionService`
//! is exercised directly by `dispatch_experiments` and by tests. This binary
//! demonstrates the process that would sit behind such a transport: it owns
//! the `Store`, the `AdmissionService`, and the sweeper loop for the
//! lifetime of the process.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use dispatch_core::admission::AdmissionService;
use dispatch_core::auth::RoleRegistry;
use dispatch_core::clock::{Clock, SystemClock};
use dispatch_core::config::ConfigReader;
use dispatch_core::store::memory::MemoryStore;
use dispatch_core::sweeper::{run_sweeper_loop, TickSource};
use eyre::Result;
use futures::FutureExt;

#[derive(Parser, Debug)]
#[command(name = "dispatch_service", version, about = "Ride dispatch engine worker process")]
struct Args {
    /// Sweeper polling interval, in seconds.
    #[arg(long, default_value_t = 60)]
    sweep_interval_seconds: u64,
}

/// Drives the sweeper off a real `tokio::time::interval`, in contrast to
/// [`dispatch_core::sweeper::ImmediateTickSource`] used by tests and the
/// scenario harness.
struct IntervalTickSource {
    interval: tokio::time::Interval,
}

impl IntervalTickSource {
    fn new(period: Duration) -> Self {
        Self {
            interval: tokio::time::interval(period),
        }
    }
}

#[async_trait]
impl TickSource for IntervalTickSource {
    async fn wait_for_tick(&mut self) {
        self.interval.tick().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let store = Arc::new(MemoryStore::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let roles = RoleRegistry::new();
    let _admission = AdmissionService::new(Arc::clone(&store), Arc::clone(&clock), roles);
    let config = ConfigReader::new(Arc::clone(&store), Arc::clone(&clock));

    tracing::info!(
        sweep_interval_seconds = args.sweep_interval_seconds,
        "dispatch_service starting"
    );

    let ticks = IntervalTickSource::new(Duration::from_secs(args.sweep_interval_seconds));
    let mut shutdown = Box::pin(tokio::signal::ctrl_c());
    let mut running = true;

    run_sweeper_loop(store.as_ref(), clock.as_ref(), &config, ticks, || {
        if running && shutdown.as_mut().now_or_never().is_some() {
            tracing::info!("dispatch_service: received shutdown signal");
            running = false;
        }
        running
    })
    .await;

    Ok(())
}
