//! Integration tests for the client-side payment status poller
//!
//! Timing tests run on tokio's paused clock, so a two-minute session
//! completes instantly and tick times are exact.

mod common;

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

use common::{app_with, memory_store, serve, FailingStore};
use payflow_backend::client::{
    HttpStatusSource, PaymentStatusPoller, PollError, PollFailure, PollObserver, PollOutcome,
    PollProgress, PollerConfig, StatusSource,
};
use payflow_backend::config::ConfigError;
use payflow_backend::correlation::CorrelationStore;
use payflow_backend::payments::types::{PaymentOutcome, PaymentStatus, PaymentStatusView};

type Script = Box<dyn Fn(usize) -> Result<PaymentStatusView, PollError> + Send + Sync>;

/// Answers each read from a script keyed by the 1-based call number.
struct ScriptedSource {
    calls: AtomicUsize,
    script: Script,
}

impl ScriptedSource {
    fn new(
        script: impl Fn(usize) -> Result<PaymentStatusView, PollError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            script: Box::new(script),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusSource for ScriptedSource {
    async fn fetch_status(&self, _checkout_request_id: &str) -> Result<PaymentStatusView, PollError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        (self.script)(call)
    }
}

/// A source whose reads never finish.
struct StalledSource;

#[async_trait]
impl StatusSource for StalledSource {
    async fn fetch_status(&self, _checkout_request_id: &str) -> Result<PaymentStatusView, PollError> {
        std::future::pending().await
    }
}

#[derive(Default)]
struct Events {
    ticks: Vec<PollProgress>,
    successes: usize,
    failures: Vec<PollFailure>,
    cancels: usize,
}

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Events>>);

impl PollObserver for Recorder {
    fn on_tick(&mut self, progress: &PollProgress, _view: Option<&PaymentStatusView>) {
        self.0.lock().unwrap().ticks.push(*progress);
    }

    fn on_success(&mut self, _view: &PaymentStatusView) {
        self.0.lock().unwrap().successes += 1;
    }

    fn on_failure(&mut self, failure: &PollFailure) {
        self.0.lock().unwrap().failures.push(failure.clone());
    }

    fn on_cancel(&mut self) {
        self.0.lock().unwrap().cancels += 1;
    }
}

fn pending() -> Result<PaymentStatusView, PollError> {
    Ok(PaymentStatusView::awaiting_confirmation())
}

fn settled(status: PaymentStatus) -> Result<PaymentStatusView, PollError> {
    Ok(PaymentStatusView::from(PaymentOutcome::from_status(
        "abc123",
        status,
        None,
        Utc::now(),
    )))
}

#[tokio::test(start_paused = true)]
async fn test_completion_on_third_tick_reports_success_once() {
    let source = ScriptedSource::new(|call| {
        if call < 3 {
            pending()
        } else {
            settled(PaymentStatus::Completed)
        }
    });
    let recorder = Recorder::default();
    let (_cancel_tx, cancel_rx) = watch::channel(false);

    let outcome = PaymentStatusPoller::new("abc123", source.clone(), PollerConfig::default())
        .unwrap()
        .run(&mut recorder.clone(), cancel_rx)
        .await;

    assert!(matches!(outcome, PollOutcome::Completed(ref view) if view.result_code == Some(0)));
    assert_eq!(source.calls(), 3);

    let events = recorder.0.lock().unwrap();
    assert_eq!(events.successes, 1);
    assert!(events.failures.is_empty());
    assert_eq!(events.cancels, 0);
    let tick_times: Vec<u64> = events.ticks.iter().map(|t| t.elapsed.as_secs()).collect();
    assert_eq!(tick_times, vec![3, 6, 9]);
}

#[tokio::test(start_paused = true)]
async fn test_pending_forever_times_out_after_forty_polls() {
    let source = ScriptedSource::new(|_| pending());
    let recorder = Recorder::default();
    let (_cancel_tx, cancel_rx) = watch::channel(false);

    let outcome = PaymentStatusPoller::new("abc123", source.clone(), PollerConfig::default())
        .unwrap()
        .run(&mut recorder.clone(), cancel_rx)
        .await;

    match outcome {
        PollOutcome::Failed(PollFailure::TimedOut { polls, elapsed }) => {
            assert_eq!(polls, 40);
            assert_eq!(elapsed, Duration::from_secs(120));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(source.calls(), 40);

    let events = recorder.0.lock().unwrap();
    assert_eq!(events.failures.len(), 1);
    assert_eq!(
        events.failures[0].message(),
        "Payment request timed out. Please try again."
    );
    assert_eq!(events.successes, 0);
}

#[tokio::test(start_paused = true)]
async fn test_gateway_failure_stops_with_its_description() {
    let source = ScriptedSource::new(|call| {
        if call == 1 {
            pending()
        } else {
            settled(PaymentStatus::Failed)
        }
    });
    let recorder = Recorder::default();
    let (_cancel_tx, cancel_rx) = watch::channel(false);

    let outcome = PaymentStatusPoller::new("abc123", source.clone(), PollerConfig::default())
        .unwrap()
        .run(&mut recorder.clone(), cancel_rx)
        .await;

    match outcome {
        PollOutcome::Failed(failure) => assert_eq!(failure.message(), "Payment failed"),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(source.calls(), 2);
    assert_eq!(recorder.0.lock().unwrap().failures.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_read_errors_do_not_stop_polling() {
    let source = ScriptedSource::new(|call| match call {
        1 => Err(PollError::Transport("connection reset".to_string())),
        2 => Err(PollError::Http {
            status: 503,
            body: "unavailable".to_string(),
        }),
        _ => settled(PaymentStatus::Completed),
    });
    let recorder = Recorder::default();
    let (_cancel_tx, cancel_rx) = watch::channel(false);

    let outcome = PaymentStatusPoller::new("abc123", source.clone(), PollerConfig::default())
        .unwrap()
        .run(&mut recorder.clone(), cancel_rx)
        .await;

    assert!(matches!(outcome, PollOutcome::Completed(_)));
    let events = recorder.0.lock().unwrap();
    assert_eq!(events.ticks.len(), 3);
    assert_eq!(events.successes, 1);
    assert!(events.failures.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_between_ticks() {
    let source = ScriptedSource::new(|_| pending());
    let recorder = Recorder::default();

    let handle = PaymentStatusPoller::new("abc123", source.clone(), PollerConfig::default())
        .unwrap()
        .spawn(recorder.clone());

    tokio::time::sleep(Duration::from_secs(4)).await;
    handle.cancel();
    let outcome = handle.join().await.unwrap();

    assert_eq!(outcome, PollOutcome::Cancelled);
    assert_eq!(source.calls(), 1);
    let events = recorder.0.lock().unwrap();
    assert_eq!(events.cancels, 1);
    assert!(events.failures.is_empty());
    assert_eq!(events.successes, 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_in_flight_read() {
    let recorder = Recorder::default();

    let handle =
        PaymentStatusPoller::new("abc123", Arc::new(StalledSource), PollerConfig::default())
        .unwrap()
            .spawn(recorder.clone());

    tokio::time::sleep(Duration::from_secs(5)).await;
    handle.cancel();
    let outcome = handle.join().await.unwrap();

    assert_eq!(outcome, PollOutcome::Cancelled);
    let events = recorder.0.lock().unwrap();
    assert_eq!(events.cancels, 1);
    assert!(events.ticks.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_the_handle_stops_the_session() {
    let source = ScriptedSource::new(|_| pending());

    let handle = PaymentStatusPoller::new("abc123", source.clone(), PollerConfig::default())
        .unwrap()
        .spawn(());

    tokio::time::sleep(Duration::from_secs(4)).await;
    drop(handle);
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(source.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_read_times_out_at_the_ceiling() {
    let recorder = Recorder::default();
    let (_cancel_tx, cancel_rx) = watch::channel(false);

    let outcome =
        PaymentStatusPoller::new("abc123", Arc::new(StalledSource), PollerConfig::default())
            .unwrap()
            .run(&mut recorder.clone(), cancel_rx)
            .await;

    match outcome {
        PollOutcome::Failed(PollFailure::TimedOut { polls, elapsed }) => {
            assert_eq!(polls, 0);
            assert_eq!(elapsed, Duration::from_secs(120));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    let events = recorder.0.lock().unwrap();
    assert_eq!(events.failures.len(), 1);
    assert_eq!(events.cancels, 0);
}

#[test]
fn test_zero_interval_is_refused_before_polling() {
    let config = PollerConfig {
        interval: Duration::ZERO,
        ..Default::default()
    };

    let result = PaymentStatusPoller::new("abc123", Arc::new(StalledSource), config);

    assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
}

#[tokio::test]
async fn test_http_source_follows_a_callback_end_to_end() {
    let store = memory_store();
    let base_url = serve(app_with(store.clone(), None)).await;
    let source = Arc::new(HttpStatusSource::new(&base_url, Duration::from_secs(5)).unwrap());
    let config = PollerConfig {
        interval: Duration::from_millis(50),
        max_duration: Duration::from_secs(10),
    };
    let recorder = Recorder::default();

    let handle = PaymentStatusPoller::new("abc123", source, config)
        .unwrap()
        .spawn(recorder.clone());

    tokio::time::sleep(Duration::from_millis(180)).await;
    store
        .put(
            "abc123",
            PaymentOutcome::from_status("abc123", PaymentStatus::Completed, None, Utc::now()),
        )
        .await
        .unwrap();

    let outcome = handle.join().await.unwrap();
    match outcome {
        PollOutcome::Completed(view) => {
            assert_eq!(view.status, PaymentStatus::Completed);
            assert_eq!(view.result_desc.as_deref(), Some("Payment successful"));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    let events = recorder.0.lock().unwrap();
    assert_eq!(events.successes, 1);
    assert!(events.ticks.len() >= 2);
}

#[tokio::test]
async fn test_http_source_reports_server_errors() {
    let base_url = serve(app_with(Arc::new(FailingStore), None)).await;
    let source = HttpStatusSource::new(&base_url, Duration::from_secs(5)).unwrap();

    let err = source.fetch_status("abc123").await.unwrap_err();

    assert!(matches!(err, PollError::Http { status: 500, .. }));
}
