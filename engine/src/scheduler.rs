//! Background sweep task.
//!
//! One tokio task runs sweeps one at a time. A sweep starts when the
//! interval elapses, when [`SweeperHandle::trigger`] is called, when the
//! device comes back online, when the user's entitlement is upgraded, or
//! when a user signs in. Local reads never trigger a sweep.

use crate::{
    reconcile::{Reconciler, ReconciliationReport},
    User,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// When the background task sweeps.
#[derive(Debug)]
pub struct SweepSchedule {
    interval: Duration,
    connectivity: Option<watch::Receiver<bool>>,
    upgrades: Option<watch::Receiver<u64>>,
    session: Option<watch::Receiver<Option<User>>>,
}

impl SweepSchedule {
    /// Sweep every `interval`, starting immediately.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            connectivity: None,
            upgrades: None,
            session: None,
        }
    }

    /// Also sweep on every offline to online transition.
    pub fn on_connectivity(mut self, rx: watch::Receiver<bool>) -> Self {
        self.connectivity = Some(rx);
        self
    }

    /// Also sweep after every entitlement upgrade.
    pub fn on_upgrades(mut self, rx: watch::Receiver<u64>) -> Self {
        self.upgrades = Some(rx);
        self
    }

    /// Also sweep whenever a user signs in.
    pub fn on_sign_in(mut self, rx: watch::Receiver<Option<User>>) -> Self {
        self.session = Some(rx);
        self
    }
}

/// Handle to a running sweep task.
#[derive(Debug)]
pub struct SweeperHandle {
    trigger: Arc<Notify>,
    cancel: CancellationToken,
    reports: watch::Receiver<Option<ReconciliationReport>>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Request a sweep. Requests made while a sweep runs collapse into one
    /// follow-up sweep.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    /// Report of the most recent finished sweep.
    pub fn last_report(&self) -> Option<ReconciliationReport> {
        self.reports.borrow().clone()
    }

    /// Receives every finished sweep's report.
    pub fn subscribe_reports(&self) -> watch::Receiver<Option<ReconciliationReport>> {
        self.reports.clone()
    }

    /// Stop the task. A sweep in progress stops before its next record.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(err) = self.task.await {
            tracing::error!(error = %err, "sweep task ended abnormally");
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum SweepCause {
    Interval,
    Triggered,
    ConnectivityRegained,
    EntitlementUpgraded,
    SignedIn,
}

/// Spawn the background sweep task on the current tokio runtime.
pub fn spawn_sweeper(reconciler: Arc<Reconciler>, schedule: SweepSchedule) -> SweeperHandle {
    let trigger = Arc::new(Notify::new());
    let cancel = CancellationToken::new();
    let (reports_tx, reports) = watch::channel(None);

    let task = tokio::spawn(run(
        reconciler,
        schedule,
        trigger.clone(),
        cancel.clone(),
        reports_tx,
    ));

    SweeperHandle {
        trigger,
        cancel,
        reports,
        task,
    }
}

async fn run(
    reconciler: Arc<Reconciler>,
    mut schedule: SweepSchedule,
    trigger: Arc<Notify>,
    cancel: CancellationToken,
    reports: watch::Sender<Option<ReconciliationReport>>,
) {
    let mut ticker = tokio::time::interval(schedule.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut was_online = schedule
        .connectivity
        .as_mut()
        .map(|rx| *rx.borrow_and_update())
        .unwrap_or(false);
    if let Some(rx) = schedule.upgrades.as_mut() {
        rx.borrow_and_update();
    }
    if let Some(rx) = schedule.session.as_mut() {
        rx.borrow_and_update();
    }

    tracing::info!(interval = ?schedule.interval, "sweep task started");

    loop {
        let cause = tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => SweepCause::Interval,
            _ = trigger.notified() => SweepCause::Triggered,
            online = next_value(&mut schedule.connectivity) => {
                let regained = online && !was_online;
                was_online = online;
                if !regained {
                    continue;
                }
                SweepCause::ConnectivityRegained
            }
            _ = next_value(&mut schedule.upgrades) => SweepCause::EntitlementUpgraded,
            user = next_value(&mut schedule.session) => {
                if user.is_none() {
                    continue;
                }
                SweepCause::SignedIn
            }
        };

        tracing::debug!(?cause, "starting sweep");
        let report = reconciler.reconcile_with_cancel(&cancel).await;
        reports.send_replace(Some(report));
    }

    tracing::info!("sweep task stopped");
}

/// Wait for the next value on an optional watch channel. A missing or
/// closed channel never yields.
async fn next_value<T: Clone>(rx: &mut Option<watch::Receiver<T>>) -> T {
    let Some(receiver) = rx.as_mut() else {
        return std::future::pending().await;
    };
    if receiver.changed().await.is_err() {
        *rx = None;
        return std::future::pending().await;
    }
    receiver.borrow_and_update().clone()
}
