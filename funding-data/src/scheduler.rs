use crate::refresh::{RefreshState, RefreshTrigger, Refresher};
use chrono::Utc;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, watch},
    task::{JoinHandle, JoinSet},
    time::MissedTickBehavior,
};
use tracing::{debug, info, warn};

/// Default period between refresh policy checks.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Capacity of the operator trigger channel.
const TRIGGER_BUFFER: usize = 8;

/// Owns the [`RefreshState`] and drives [`Refresher`] cycles, at most one at a time.
///
/// Operator triggers arrive on an mpsc channel and the policy is re-checked on a fixed tick.
/// Triggers that arrive while a cycle is in flight are dropped, not queued.
#[derive(Debug)]
pub struct Scheduler {
    refresher: Arc<Refresher>,
    state: RefreshState,
    tick: Duration,
}

/// Handle to a running [`Scheduler`]. Dropping every trigger sender stops it.
#[derive(Debug)]
pub struct SchedulerHandle {
    triggers: mpsc::Sender<RefreshTrigger>,
    state: watch::Receiver<RefreshState>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Request a manual refresh. Returns false if the scheduler has stopped or is saturated.
    pub fn refresh(&self) -> bool {
        self.triggers.try_send(RefreshTrigger::Manual).is_ok()
    }

    pub fn state(&self) -> watch::Receiver<RefreshState> {
        self.state.clone()
    }

    /// Stop the scheduler. A cycle in flight is aborted with it.
    pub async fn shutdown(self) {
        let Self { triggers, task, .. } = self;
        drop(triggers);
        if let Err(error) = task.await {
            warn!(%error, "scheduler task failed");
        }
    }
}

impl Scheduler {
    pub fn new(refresher: Arc<Refresher>, state: RefreshState) -> Self {
        Self {
            refresher,
            state,
            tick: DEFAULT_TICK,
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn spawn(self) -> SchedulerHandle {
        let (triggers_tx, triggers_rx) = mpsc::channel(TRIGGER_BUFFER);
        let (state_tx, state_rx) = watch::channel(self.state.clone());

        SchedulerHandle {
            triggers: triggers_tx,
            state: state_rx,
            task: tokio::spawn(self.run(triggers_rx, state_tx)),
        }
    }

    async fn run(
        self,
        mut triggers: mpsc::Receiver<RefreshTrigger>,
        state_tx: watch::Sender<RefreshState>,
    ) {
        let Self {
            refresher,
            mut state,
            tick,
        } = self;

        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut cycle = JoinSet::new();

        loop {
            tokio::select! {
                trigger = triggers.recv() => {
                    let Some(trigger) = trigger else {
                        info!("trigger channel closed, stopping scheduler");
                        break;
                    };

                    if cycle.is_empty() {
                        start_cycle(&mut cycle, &refresher, &state, trigger);
                    } else {
                        debug!(?trigger, "refresh in flight, dropping trigger");
                    }
                }

                _ = interval.tick() => {
                    if !cycle.is_empty() {
                        state.pending_symbol_count = Some(refresher.pending_symbol_count());
                        state_tx.send_replace(state.clone());
                    } else if refresher.is_due(&state, RefreshTrigger::Scheduled, Utc::now()) {
                        start_cycle(&mut cycle, &refresher, &state, RefreshTrigger::Scheduled);
                    }
                }

                Some(result) = cycle.join_next(), if !cycle.is_empty() => {
                    match result {
                        Ok(next) => state = next,
                        Err(error) => {
                            warn!(%error, "refresh cycle panicked");
                            state.pending_symbol_count = None;
                        }
                    }
                    state_tx.send_replace(state.clone());
                }
            }
        }
    }
}

fn start_cycle(
    cycle: &mut JoinSet<RefreshState>,
    refresher: &Arc<Refresher>,
    state: &RefreshState,
    trigger: RefreshTrigger,
) {
    let refresher = Arc::clone(refresher);
    let state = state.clone();
    cycle.spawn(async move { refresher.refresh(state, trigger).await });
}
