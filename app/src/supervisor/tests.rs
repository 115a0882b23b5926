use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, sleep, timeout};

use super::*;

/// Scripted channel: results are popped in order, defaults apply once a
/// script runs dry. `open` tracks whether a stream would really be up.
#[derive(Default)]
struct FakeChannel {
    start_results: Mutex<VecDeque<Result<(), ChannelError>>>,
    probe_results: Mutex<VecDeque<Result<bool, ChannelError>>>,
    start_delay: Duration,
    stop_delay: Duration,
    open: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
    probes: AtomicUsize,
}

impl FakeChannel {
    fn with_starts(results: Vec<Result<(), ChannelError>>) -> Self {
        Self {
            start_results: Mutex::new(results.into()),
            ..Default::default()
        }
    }

    fn with_probes(self, results: Vec<Result<bool, ChannelError>>) -> Self {
        *self.probe_results.lock().unwrap() = results.into();
        self
    }

    fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl ChannelControl for FakeChannel {
    async fn start(&self) -> Result<(), ChannelError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if !self.start_delay.is_zero() {
            sleep(self.start_delay).await;
        }
        let result = self.start_results.lock().unwrap().pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            self.open.store(true, Ordering::SeqCst);
        }
        result
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if !self.stop_delay.is_zero() {
            sleep(self.stop_delay).await;
        }
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn probe(&self) -> Result<bool, ChannelError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.probe_results.lock().unwrap().pop_front().unwrap_or(Ok(false))
    }
}

fn refused() -> ChannelError {
    ChannelError::Start("connection refused".into())
}

async fn wait_for_state(rx: &mut watch::Receiver<SupervisorStatus>, state: ConnectionState) {
    timeout(Duration::from_secs(600), rx.wait_for(|s| s.state == state))
        .await
        .expect("timed out waiting for state")
        .expect("supervisor stopped");
}

#[tokio::test(start_paused = true)]
async fn failed_connect_polls_until_source_recovers() {
    let channel = Arc::new(
        FakeChannel::with_starts(vec![Err(refused()), Ok(())])
            .with_probes(vec![Ok(false), Ok(false), Ok(true)]),
    );
    let shutdown = CancellationToken::new();
    let (handle, _task) = spawn(channel.clone(), SupervisorTimings::default(), shutdown.clone());
    let mut status = handle.subscribe();
    let started = Instant::now();

    handle.connect().await.unwrap();
    wait_for_state(&mut status, ConnectionState::Polling).await;
    assert_eq!(handle.status().last_error, Some(refused()));

    wait_for_state(&mut status, ConnectionState::Connected).await;
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(91_000), "connected too early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(92_000), "connected too late: {elapsed:?}");

    assert_eq!(channel.start_count(), 2);
    assert_eq!(channel.probe_count(), 3);
    assert_eq!(handle.status().last_error, None);

    // polling is over once connected
    sleep(Duration::from_secs(120)).await;
    assert_eq!(channel.probe_count(), 3);

    shutdown.cancel();
}

#[tokio::test(start_paused = true)]
async fn concurrent_connects_start_channel_once() {
    let channel = Arc::new(FakeChannel {
        start_delay: Duration::from_millis(250),
        ..Default::default()
    });
    let shutdown = CancellationToken::new();
    let (handle, _task) = spawn(channel.clone(), SupervisorTimings::default(), shutdown.clone());
    let mut status = handle.subscribe();

    handle.connect().await.unwrap();
    handle.connect().await.unwrap();
    wait_for_state(&mut status, ConnectionState::Connected).await;
    handle.connect().await.unwrap();
    sleep(Duration::from_secs(1)).await;

    assert_eq!(channel.start_count(), 1);
    assert_eq!(handle.state(), ConnectionState::Connected);
    shutdown.cancel();
}

#[tokio::test(start_paused = true)]
async fn channel_down_falls_back_to_polling() {
    let channel = Arc::new(FakeChannel::default());
    let shutdown = CancellationToken::new();
    let (handle, _task) = spawn(channel.clone(), SupervisorTimings::default(), shutdown.clone());
    let mut status = handle.subscribe();

    handle.connect().await.unwrap();
    wait_for_state(&mut status, ConnectionState::Connected).await;

    handle.channel_down("stream ended").await.unwrap();
    wait_for_state(&mut status, ConnectionState::Polling).await;
    assert_eq!(
        handle.status().last_error,
        Some(ChannelError::Down("stream ended".into()))
    );

    // the first probe comes one interval after the drop
    sleep(Duration::from_millis(29_000)).await;
    assert_eq!(channel.probe_count(), 0);
    sleep(Duration::from_millis(2_000)).await;
    assert_eq!(channel.probe_count(), 1);
    assert_eq!(handle.state(), ConnectionState::Polling);

    shutdown.cancel();
}

#[tokio::test(start_paused = true)]
async fn disconnect_cancels_polling() {
    let channel = Arc::new(FakeChannel::with_starts(vec![Err(refused())]));
    let shutdown = CancellationToken::new();
    let (handle, _task) = spawn(channel.clone(), SupervisorTimings::default(), shutdown.clone());
    let mut status = handle.subscribe();

    handle.connect().await.unwrap();
    wait_for_state(&mut status, ConnectionState::Polling).await;

    handle.disconnect().await.unwrap();
    wait_for_state(&mut status, ConnectionState::Disconnected).await;
    sleep(Duration::from_secs(120)).await;

    assert_eq!(channel.probe_count(), 0);
    assert_eq!(channel.stop_count(), 1);
    assert_eq!(handle.state(), ConnectionState::Disconnected);
    shutdown.cancel();
}

#[tokio::test(start_paused = true)]
async fn disconnect_then_connect_leaves_channel_open() {
    let channel = Arc::new(FakeChannel {
        stop_delay: Duration::from_millis(100),
        ..Default::default()
    });
    let shutdown = CancellationToken::new();
    let (handle, _task) = spawn(channel.clone(), SupervisorTimings::default(), shutdown.clone());
    let mut status = handle.subscribe();

    handle.connect().await.unwrap();
    wait_for_state(&mut status, ConnectionState::Connected).await;
    assert!(channel.is_open());

    handle.disconnect().await.unwrap();
    handle.connect().await.unwrap();
    sleep(Duration::from_secs(5)).await;

    assert_eq!(handle.state(), ConnectionState::Connected);
    assert!(channel.is_open(), "stop must not land after the new start");
    assert_eq!(channel.start_count(), 2);
    assert_eq!(channel.stop_count(), 1);
    shutdown.cancel();
}

#[tokio::test(start_paused = true)]
async fn disconnect_during_start_leaves_channel_closed() {
    let channel = Arc::new(FakeChannel {
        start_delay: Duration::from_millis(250),
        stop_delay: Duration::from_millis(100),
        ..Default::default()
    });
    let shutdown = CancellationToken::new();
    let (handle, _task) = spawn(channel.clone(), SupervisorTimings::default(), shutdown.clone());
    let mut status = handle.subscribe();

    handle.connect().await.unwrap();
    wait_for_state(&mut status, ConnectionState::Connecting).await;
    handle.disconnect().await.unwrap();
    sleep(Duration::from_secs(5)).await;

    assert_eq!(handle.state(), ConnectionState::Disconnected);
    assert!(!channel.is_open(), "late start must be torn down");
    assert_eq!(channel.stop_count(), 1);
    shutdown.cancel();
}

#[tokio::test(start_paused = true)]
async fn rapid_toggling_settles_on_last_request() {
    let channel = Arc::new(FakeChannel {
        start_delay: Duration::from_millis(50),
        stop_delay: Duration::from_millis(80),
        ..Default::default()
    });
    let shutdown = CancellationToken::new();
    let (handle, _task) = spawn(channel.clone(), SupervisorTimings::default(), shutdown.clone());

    for _ in 0..3 {
        handle.connect().await.unwrap();
        handle.disconnect().await.unwrap();
    }
    handle.connect().await.unwrap();
    sleep(Duration::from_secs(5)).await;

    assert_eq!(handle.state(), ConnectionState::Connected);
    assert!(channel.is_open());
    shutdown.cancel();
}

#[tokio::test(start_paused = true)]
async fn explicit_reconnect_waits_for_settle_delay() {
    let channel = Arc::new(FakeChannel::default());
    let timings = SupervisorTimings {
        settle_delay: Duration::from_millis(1_000),
        ..Default::default()
    };
    let shutdown = CancellationToken::new();
    let (handle, _task) = spawn(channel.clone(), timings, shutdown.clone());
    let mut status = handle.subscribe();

    handle.connect().await.unwrap();
    wait_for_state(&mut status, ConnectionState::Connected).await;

    handle.reconnect().await.unwrap();
    wait_for_state(&mut status, ConnectionState::Disconnected).await;
    let torn_down = Instant::now();

    sleep(Duration::from_millis(900)).await;
    assert_eq!(channel.start_count(), 1);

    wait_for_state(&mut status, ConnectionState::Connected).await;
    assert!(torn_down.elapsed() >= Duration::from_millis(1_000));
    assert_eq!(channel.start_count(), 2);
    assert_eq!(channel.stop_count(), 1);
    shutdown.cancel();
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_channel_and_rejects_triggers() {
    let channel = Arc::new(FakeChannel::default());
    let shutdown = CancellationToken::new();
    let (handle, task) = spawn(channel.clone(), SupervisorTimings::default(), shutdown.clone());
    let mut status = handle.subscribe();

    handle.connect().await.unwrap();
    wait_for_state(&mut status, ConnectionState::Connected).await;

    shutdown.cancel();
    task.await.unwrap();

    assert_eq!(channel.stop_count(), 1);
    assert_eq!(handle.state(), ConnectionState::Disconnected);
    assert!(matches!(handle.connect().await, Err(SupervisorError::Stopped)));
}
