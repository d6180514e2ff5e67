// Prefetch driver
//
// Background task that re-runs the orchestrator whenever its inputs change.
// Inputs arrive on a watch channel and bursts of updates coalesce to the
// latest value: a quick A -> B -> A switch is seen as no switch at all and
// does not clear the store. A change of production line or of the context's
// view clears the store before the next run.

use crate::orchestrator::{PrefetchContext, PrefetchOrchestrator, RunOutcome};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Everything the diagnostics view feeds into prefetching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverInput {
    /// Production line key
    pub line: String,
    /// Carries the view; tile URLs and the reset check both read `context.view`
    pub context: PrefetchContext,
}

/// Re-runs the orchestrator on every input change.
///
/// Inputs coalesce: only the latest value is guaranteed to be observed, so
/// intermediate line/view switches that are overwritten before the driver
/// wakes up never trigger a reset.
pub struct PrefetchDriver {
    orchestrator: Arc<PrefetchOrchestrator>,
    input_tx: watch::Sender<Option<DriverInput>>,
    outcome_rx: watch::Receiver<Option<RunOutcome>>,
    task: JoinHandle<()>,
}

impl PrefetchDriver {
    pub fn spawn(orchestrator: Arc<PrefetchOrchestrator>) -> Self {
        let (input_tx, mut input_rx) = watch::channel(None::<DriverInput>);
        let (outcome_tx, outcome_rx) = watch::channel(None::<RunOutcome>);
        let outcome_tx = Arc::new(outcome_tx);
        let orch = Arc::clone(&orchestrator);

        let task = tokio::spawn(async move {
            let mut previous: Option<(String, String)> = None;
            while input_rx.changed().await.is_ok() {
                let Some(input) = input_rx.borrow_and_update().clone() else {
                    continue;
                };

                let key = (input.line.clone(), input.context.view.clone());
                if previous.as_ref().is_some_and(|p| *p != key) {
                    info!(target: "prefetch.driver", line = %input.line, view = %input.context.view, "Line or view changed; clearing prefetch cache");
                    orch.store().reset().await;
                }
                previous = Some(key);

                let orch = Arc::clone(&orch);
                let outcome_tx = Arc::clone(&outcome_tx);
                tokio::spawn(async move {
                    let outcome = orch.run(&input.context).await;
                    debug!(target: "prefetch.driver", ?outcome, "Run outcome");
                    outcome_tx.send_replace(Some(outcome));
                });
            }
            debug!(target: "prefetch.driver", "Input channel closed; driver stopped");
        });

        Self {
            orchestrator,
            input_tx,
            outcome_rx,
            task,
        }
    }

    /// Publish new inputs; triggers a run
    pub fn update(&self, input: DriverInput) {
        self.input_tx.send_replace(Some(input));
    }

    /// Latest run outcome; `changed()` fires after every finished trigger
    pub fn outcomes(&self) -> watch::Receiver<Option<RunOutcome>> {
        self.outcome_rx.clone()
    }

    /// Explicit "clear local cache" action
    pub async fn clear_local_cache(&self) {
        self.orchestrator.store().reset().await;
    }

    pub fn orchestrator(&self) -> &Arc<PrefetchOrchestrator> {
        &self.orchestrator
    }

    /// Stop reacting to inputs. Runs and loads already started finish on their own.
    pub async fn shutdown(self) {
        drop(self.input_tx);
        let _ = self.task.await;
    }
}
