//! Single-flight coordination of token refreshes

use super::error::RefreshFailure;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Outcome of one refresh cycle: the new access token or why there is none
pub(crate) type RefreshOutcome = Result<String, RefreshFailure>;

type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// At most one refresh cycle runs at a time; everyone who needs a token while
/// it runs awaits that same cycle
///
/// A started cycle is also driven by its own task, so it settles and clears
/// the marker even when every caller waiting on it has given up.
#[derive(Default)]
pub(crate) struct SingleFlight {
    in_flight: Arc<Mutex<Option<SharedRefresh>>>,
}

impl SingleFlight {
    /// Join the running cycle, or start one with `start`
    pub(crate) async fn run<F>(&self, start: F) -> RefreshOutcome
    where
        F: FnOnce() -> BoxFuture<'static, RefreshOutcome>,
    {
        let cycle = {
            let mut slot = self.in_flight.lock().await;
            match slot.as_ref() {
                Some(cycle) => {
                    debug!("Joining in-flight token refresh");
                    cycle.clone()
                }
                None => {
                    debug!("Starting token refresh");
                    let cycle = start().shared();
                    *slot = Some(cycle.clone());

                    let driver = cycle.clone();
                    let in_flight = self.in_flight.clone();
                    tokio::spawn(async move {
                        let _ = driver.clone().await;
                        release(&in_flight, &driver).await;
                    });
                    cycle
                }
            }
        };

        let outcome = cycle.clone().await;
        release(&self.in_flight, &cycle).await;
        outcome
    }

    pub(crate) async fn is_refreshing(&self) -> bool {
        self.in_flight.lock().await.is_some()
    }
}

/// Clear the marker if it still holds `cycle`; a settled cycle never blocks
/// the next one
async fn release(in_flight: &Mutex<Option<SharedRefresh>>, cycle: &SharedRefresh) {
    let mut slot = in_flight.lock().await;
    if slot.as_ref().is_some_and(|current| current.ptr_eq(cycle)) {
        *slot = None;
    }
}
