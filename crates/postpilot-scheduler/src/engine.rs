use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::error::Result;
use crate::executor::{ExecutionReport, Executor};
use crate::prealert::PreAlertNotifier;

/// Third tick phase: replies to incoming comments and messages.
#[async_trait]
pub trait AutoReplyProcessor: Send + Sync {
    /// Process pending items. Returns how many replies were sent.
    async fn process(&self, now: DateTime<Utc>) -> Result<usize>;
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub reminders: usize,
    pub executed: ExecutionReport,
    pub auto_replies: usize,
}

/// Clonable stop handle for a running [`SchedulerEngine`].
#[derive(Clone)]
pub struct SchedulerControl {
    tx: Arc<watch::Sender<bool>>,
}

impl SchedulerControl {
    /// Returns the handle and the receiver to pass to [`SchedulerEngine::run`].
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { tx: Arc::new(tx) }, rx)
    }

    /// Ask the loop to exit after the tick in progress, if any.
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// The scheduler loop: pre-alerts, due posts, auto-replies, in that order.
pub struct SchedulerEngine {
    prealert: PreAlertNotifier,
    executor: Executor,
    auto_reply: Option<Arc<dyn AutoReplyProcessor>>,
    period: Duration,
}

impl SchedulerEngine {
    pub fn new(prealert: PreAlertNotifier, executor: Executor, tick_secs: u64) -> Self {
        Self {
            prealert,
            executor,
            auto_reply: None,
            period: Duration::from_secs(tick_secs.max(1)),
        }
    }

    pub fn with_auto_reply(mut self, processor: Arc<dyn AutoReplyProcessor>) -> Self {
        self.auto_reply = Some(processor);
        self
    }

    /// Main event loop. Ticks every `tick_secs` until `shutdown` broadcasts `true`.
    ///
    /// Shutdown is only observed between ticks; an in-flight publish is
    /// allowed to finish.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(period_secs = self.period.as_secs(), "scheduler engine started");

        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick_at(Utc::now()).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Run one tick as of `now`. Phase errors are logged; the tick always completes.
    pub async fn tick_at(&mut self, now: DateTime<Utc>) -> TickSummary {
        let mut summary = TickSummary::default();

        match self.prealert.scan(now) {
            Ok(n) => summary.reminders = n,
            Err(e) => error!("pre-alert scan failed: {e}"),
        }

        match self.executor.run_due(now).await {
            Ok(report) => summary.executed = report,
            Err(e) => error!("due-post scan failed: {e}"),
        }

        if let Some(processor) = &self.auto_reply {
            match processor.process(now).await {
                Ok(n) => summary.auto_replies = n,
                Err(e) => error!("auto-reply processing failed: {e}"),
            }
        }
        summary
    }
}
