//! Periodic closing of discovery results nobody negotiated.

use chrono::TimeDelta;
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info};

use super::{BrokerError, BrokerOperation, BrokerResult};
use crate::bridge::ports::BridgeStore;

const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Closes bridges whose discovery results outlived `max_age`.
pub struct BridgeCleaner<S, C>
where
    S: BridgeStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    clock: Arc<C>,
    max_age: Duration,
    interval: Duration,
}

impl<S, C> BridgeCleaner<S, C>
where
    S: BridgeStore,
    C: Clock + Send + Sync,
{
    /// Creates a cleaner running every `interval`.
    #[must_use]
    pub const fn new(store: Arc<S>, clock: Arc<C>, max_age: Duration, interval: Duration) -> Self {
        Self {
            store,
            clock,
            max_age,
            interval,
        }
    }

    /// Runs one sweep and returns how many discovery rows it closed.
    ///
    /// Failures closing a single row are logged and do not stop the sweep.
    ///
    /// # Errors
    ///
    /// Returns an internal error when stale rows cannot be listed.
    pub async fn run_once(&self) -> BrokerResult<usize> {
        let Some(threshold) = TimeDelta::from_std(self.max_age)
            .ok()
            .and_then(|age| self.clock.utc().checked_sub_signed(age))
        else {
            return Err(BrokerError::invalid_parameter(
                "Discovery max age is out of range",
            )
            .with_origin(BrokerOperation::Cleanup));
        };
        let stale = self
            .store
            .discoveries_created_before(threshold)
            .await
            .map_err(|err| BrokerError::from(err).with_origin(BrokerOperation::Cleanup))?;
        let mut closed = 0_usize;
        for discovery in &stale {
            let outcome = self.store.close_obsolete(discovery).await;
            if let Err(err) = &outcome {
                error!(bridge_id = %discovery.bridge_id, %err, "could not close obsolete discovery");
            }
            closed = closed.saturating_add(usize::from(outcome.is_ok()));
        }
        if closed > 0 {
            info!(closed, "closed obsolete discoveries");
        } else {
            debug!("no obsolete discoveries");
        }
        Ok(closed)
    }

    /// Spawns the periodic sweep on the current runtime.
    ///
    /// A sweep that outlasts the interval delays the next one; ticks are
    /// skipped rather than queued, so sweeps never overlap.
    pub fn spawn(self) -> JoinHandle<()>
    where
        S: 'static,
        C: 'static,
    {
        tokio::spawn(async move {
            let mut ticker = time::interval(self.interval.max(MIN_INTERVAL));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(err) = self.run_once().await {
                    error!(%err, "bridge cleanup failed");
                }
            }
        })
    }
}
