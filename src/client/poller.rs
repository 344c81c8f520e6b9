//! Client-side payment status poller
//!
//! Turns the gateway's push model into a pull model: after an STK push is
//! accepted, the client reads the status endpoint on a fixed interval until
//! the payment completes, fails, the ceiling is reached, or the user cancels.
//!
//! Tick `n` fires at `n * interval` after start. Only the tick result
//! decides the outcome; a read that errors is logged and the clock keeps
//! running.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::{ConfigError, POLL_CEILING_SECS};
use crate::payments::types::{PaymentStatus, PaymentStatusView};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

pub const TIMEOUT_MESSAGE: &str = "Payment request timed out. Please try again.";

#[derive(Debug, Error)]
pub enum PollError {
    #[error("status request failed: {0}")]
    Transport(String),

    #[error("status endpoint returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("could not decode status response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub interval: Duration,
    pub max_duration: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_duration: Duration::from_secs(POLL_CEILING_SECS),
        }
    }
}

impl PollerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "poll interval cannot be 0".to_string(),
            ));
        }

        if self.max_duration < self.interval {
            return Err(ConfigError::ValidationFailed(
                "poll ceiling must be at least one interval".to_string(),
            ));
        }

        Ok(())
    }
}

/// Where the poller reads payment status from.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self, checkout_request_id: &str) -> Result<PaymentStatusView, PollError>;
}

/// Receives poller events. Each session reports exactly one of success,
/// failure or cancel.
pub trait PollObserver: Send {
    fn on_tick(&mut self, _progress: &PollProgress, _view: Option<&PaymentStatusView>) {}

    fn on_success(&mut self, _view: &PaymentStatusView) {}

    fn on_failure(&mut self, _failure: &PollFailure) {}

    fn on_cancel(&mut self) {}
}

impl PollObserver for () {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollProgress {
    pub polls: u32,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollFailure {
    /// Gateway reported a non-successful terminal status.
    Rejected {
        status: PaymentStatus,
        result_code: Option<i32>,
        description: String,
    },
    /// Ceiling reached while the payment was still pending.
    TimedOut { polls: u32, elapsed: Duration },
}

impl PollFailure {
    pub fn message(&self) -> String {
        match self {
            PollFailure::Rejected { description, .. } => description.clone(),
            PollFailure::TimedOut { .. } => TIMEOUT_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Completed(PaymentStatusView),
    Failed(PollFailure),
    Cancelled,
}

/// Verdict on a single status read.
#[derive(Debug, Clone, PartialEq)]
pub enum TickVerdict {
    Succeeded,
    Rejected(PollFailure),
    Pending,
}

/// `status` decides; a completed payment only succeeds with result code 0.
pub fn classify(view: &PaymentStatusView) -> TickVerdict {
    let description = || {
        view.result_desc
            .clone()
            .unwrap_or_else(|| view.status.description().to_string())
    };

    if !view.status.is_terminal() {
        return TickVerdict::Pending;
    }
    match view.status {
        PaymentStatus::Completed if view.result_code == Some(0) => TickVerdict::Succeeded,
        status => TickVerdict::Rejected(PollFailure::Rejected {
            status,
            result_code: view.result_code,
            description: description(),
        }),
    }
}

pub struct PaymentStatusPoller {
    checkout_request_id: String,
    source: Arc<dyn StatusSource>,
    config: PollerConfig,
}

impl PaymentStatusPoller {
    pub fn new(
        checkout_request_id: impl Into<String>,
        source: Arc<dyn StatusSource>,
        config: PollerConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            checkout_request_id: checkout_request_id.into(),
            source,
            config,
        })
    }

    pub fn checkout_request_id(&self) -> &str {
        &self.checkout_request_id
    }

    /// Polls until a terminal state. Setting `cancel` to `true` stops the
    /// session at once, even mid-read. The ceiling also bounds a read that
    /// never returns.
    pub async fn run<O: PollObserver>(
        self,
        observer: &mut O,
        mut cancel: watch::Receiver<bool>,
    ) -> PollOutcome {
        let started = Instant::now();
        let deadline = started + self.config.max_duration;
        let mut ticker = interval_at(started + self.config.interval, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut polls: u32 = 0;

        info!(
            checkout_request_id = %self.checkout_request_id,
            interval_ms = self.config.interval.as_millis() as u64,
            max_duration_secs = self.config.max_duration.as_secs(),
            "payment status polling started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => return self.cancel(observer, polls),
                _ = ticker.tick() => {}
                _ = sleep_until(deadline) => return self.time_out(observer, polls, started),
            }

            let fetched = tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => return self.cancel(observer, polls),
                result = self.source.fetch_status(&self.checkout_request_id) => result,
                _ = sleep_until(deadline) => return self.time_out(observer, polls, started),
            };

            polls += 1;
            let progress = PollProgress {
                polls,
                elapsed: started.elapsed(),
            };

            match fetched {
                Ok(view) => {
                    observer.on_tick(&progress, Some(&view));
                    match classify(&view) {
                        TickVerdict::Succeeded => {
                            info!(
                                checkout_request_id = %self.checkout_request_id,
                                polls,
                                "payment completed"
                            );
                            observer.on_success(&view);
                            return PollOutcome::Completed(view);
                        }
                        TickVerdict::Rejected(failure) => {
                            info!(
                                checkout_request_id = %self.checkout_request_id,
                                polls,
                                reason = %failure.message(),
                                "payment failed"
                            );
                            observer.on_failure(&failure);
                            return PollOutcome::Failed(failure);
                        }
                        TickVerdict::Pending => {
                            debug!(checkout_request_id = %self.checkout_request_id, polls, "still pending");
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        checkout_request_id = %self.checkout_request_id,
                        polls,
                        error = %e,
                        "status read failed, will retry on next tick"
                    );
                    observer.on_tick(&progress, None);
                }
            }

            if progress.elapsed >= self.config.max_duration {
                return self.time_out(observer, polls, started);
            }
        }
    }

    /// Runs the session on its own task.
    pub fn spawn<O>(self, mut observer: O) -> PollHandle
    where
        O: PollObserver + 'static,
    {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(async move { self.run(&mut observer, cancel_rx).await });
        PollHandle {
            cancel_tx,
            task: Some(task),
        }
    }

    fn time_out<O: PollObserver>(
        &self,
        observer: &mut O,
        polls: u32,
        started: Instant,
    ) -> PollOutcome {
        let failure = PollFailure::TimedOut {
            polls,
            elapsed: started.elapsed(),
        };
        warn!(
            checkout_request_id = %self.checkout_request_id,
            polls,
            elapsed_secs = started.elapsed().as_secs(),
            "payment status polling timed out"
        );
        observer.on_failure(&failure);
        PollOutcome::Failed(failure)
    }

    fn cancel<O: PollObserver>(&self, observer: &mut O, polls: u32) -> PollOutcome {
        info!(
            checkout_request_id = %self.checkout_request_id,
            polls,
            "payment status polling cancelled"
        );
        observer.on_cancel();
        PollOutcome::Cancelled
    }
}

/// Resolves once cancellation is requested. A closed channel can never
/// request it, so that case never resolves.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    let closed = rx.wait_for(|requested| *requested).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

/// Owns a spawned polling session. Dropping the handle aborts the task.
pub struct PollHandle {
    cancel_tx: watch::Sender<bool>,
    task: Option<JoinHandle<PollOutcome>>,
}

impl PollHandle {
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }

    pub async fn join(mut self) -> Result<PollOutcome, JoinError> {
        match self.task.take() {
            Some(task) => task.await,
            None => Ok(PollOutcome::Cancelled),
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
