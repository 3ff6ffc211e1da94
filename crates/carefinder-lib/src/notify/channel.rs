//! Reconnect-bounded notification channel.
//!
//! ```text
//! Disconnected ─start─► Connecting ──ok──► Connected
//!                          ▲   │ error          │ error / close
//!                          │   ▼                ▼
//!                       Retrying{n} ◄──── attempts < max
//!                                           attempts >= max ──► Exhausted
//! ```
//!
//! The attempt counter resets on every successful connection. Once
//! exhausted the channel never reconnects; construct a new one to retry.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::event::NotificationEvent;
use super::subscribers::{SubscriberRegistry, Subscription};
use super::transport::{Connector, MessageStream};
use crate::error::{Error, Result};

/// Reconnect attempts allowed after a connection is lost.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Fixed delay before each reconnect attempt.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Connection lifecycle, observable through [`NotificationChannel::watch_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Not started.
    Disconnected,
    Connecting,
    Connected,
    /// Waiting to reconnect; `attempt` counts from 1.
    Retrying { attempt: u32 },
    /// Gave up for the rest of the session.
    Exhausted,
    /// Stopped by the owner.
    Stopped,
}

impl ChannelState {
    /// Notifications are not arriving and will not resume on their own.
    pub fn is_degraded(&self) -> bool {
        matches!(self, ChannelState::Exhausted)
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelState::Disconnected => write!(f, "disconnected"),
            ChannelState::Connecting => write!(f, "connecting"),
            ChannelState::Connected => write!(f, "connected"),
            ChannelState::Retrying { attempt } => write!(f, "retrying (attempt {attempt})"),
            ChannelState::Exhausted => write!(f, "exhausted"),
            ChannelState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Bounded fixed-delay reconnect policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Receive-only notification client.
///
/// Owned by whichever component needs notifications; `start` spawns the
/// connection task on the current Tokio runtime and `stop` (or dropping the
/// channel) tears it down.
pub struct NotificationChannel<C> {
    connector: Arc<C>,
    policy: ReconnectPolicy,
    subscribers: SubscriberRegistry<NotificationEvent>,
    state: Arc<watch::Sender<ChannelState>>,
    worker: Mutex<Option<Worker>>,
}

impl<C: Connector> NotificationChannel<C> {
    pub fn new(connector: C) -> Self {
        Self::with_policy(connector, ReconnectPolicy::default())
    }

    pub fn with_policy(connector: C, policy: ReconnectPolicy) -> Self {
        let (state, _) = watch::channel(ChannelState::Disconnected);
        Self {
            connector: Arc::new(connector),
            policy,
            subscribers: SubscriberRegistry::new(),
            state: Arc::new(state),
            worker: Mutex::new(None),
        }
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    /// Register a listener for delivered events.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&NotificationEvent) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.state.subscribe()
    }

    /// Fail with [`Error::ChannelExhausted`] if the channel has given up.
    pub fn ensure_live(&self) -> Result<()> {
        if self.state().is_degraded() {
            Err(Error::ChannelExhausted {
                attempts: self.policy.max_attempts,
            })
        } else {
            Ok(())
        }
    }

    /// Start the connection task. Returns false if it is already running or
    /// the channel is exhausted.
    pub fn start(&self) -> bool {
        let mut worker = lock(&self.worker);
        if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            debug!(endpoint = self.connector.endpoint(), "notification channel already running");
            return false;
        }
        if self.state().is_degraded() {
            warn!(
                endpoint = self.connector.endpoint(),
                "notification channel is exhausted; construct a new channel to reconnect"
            );
            return false;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_channel(
            Arc::clone(&self.connector),
            self.policy,
            self.subscribers.clone(),
            Arc::clone(&self.state),
            cancel.clone(),
        ));
        *worker = Some(Worker { cancel, handle });
        true
    }

    /// Stop the connection task. Subscribers are kept.
    pub fn stop(&self) {
        if let Some(worker) = lock(&self.worker).take() {
            worker.cancel.cancel();
        }
    }

    /// Stop and wait for the connection task to finish.
    pub async fn shutdown(&self) {
        let worker = lock(&self.worker).take();
        if let Some(worker) = worker {
            worker.cancel.cancel();
            if let Err(err) = worker.handle.await {
                warn!(error = %err, "notification task ended abnormally");
            }
        }
    }
}

impl<C> Drop for NotificationChannel<C> {
    fn drop(&mut self) {
        if let Some(worker) = lock(&self.worker).take() {
            worker.cancel.cancel();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

enum PumpExit {
    Cancelled,
    Closed,
    Failed(Error),
}

async fn run_channel<C: Connector>(
    connector: Arc<C>,
    policy: ReconnectPolicy,
    subscribers: SubscriberRegistry<NotificationEvent>,
    state: Arc<watch::Sender<ChannelState>>,
    cancel: CancellationToken,
) {
    let endpoint = connector.endpoint().to_string();
    let mut attempts: u32 = 0;

    loop {
        state.send_replace(ChannelState::Connecting);
        let connected = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = connector.connect() => result,
        };

        match connected {
            Ok(stream) => {
                attempts = 0;
                state.send_replace(ChannelState::Connected);
                info!(endpoint = %endpoint, "notification channel connected");
                match pump(stream, &subscribers, &cancel).await {
                    PumpExit::Cancelled => break,
                    PumpExit::Closed => info!(endpoint = %endpoint, "notification channel closed"),
                    PumpExit::Failed(err) => {
                        warn!(endpoint = %endpoint, error = %err, "notification channel lost")
                    }
                }
            }
            Err(err) => warn!(endpoint = %endpoint, error = %err, "notification channel failed to connect"),
        }

        if attempts >= policy.max_attempts {
            state.send_replace(ChannelState::Exhausted);
            warn!(
                endpoint = %endpoint,
                attempts,
                "notification channel gave up reconnecting; notifications stopped for this session"
            );
            return;
        }

        attempts += 1;
        state.send_replace(ChannelState::Retrying { attempt: attempts });
        info!(
            endpoint = %endpoint,
            attempt = attempts,
            max_attempts = policy.max_attempts,
            delay_secs = policy.delay.as_secs_f64(),
            "scheduling notification channel reconnect"
        );
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(policy.delay) => {}
        }
    }

    state.send_replace(ChannelState::Stopped);
    debug!(endpoint = %endpoint, "notification channel stopped");
}

async fn pump(
    mut stream: MessageStream,
    subscribers: &SubscriberRegistry<NotificationEvent>,
    cancel: &CancellationToken,
) -> PumpExit {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return PumpExit::Cancelled,
            item = stream.next() => item,
        };

        match next {
            Some(Ok(text)) => match serde_json::from_str::<NotificationEvent>(&text) {
                Ok(event) => {
                    let listeners = subscribers.deliver(&event);
                    debug!(id = %event.id, kind = %event.kind, listeners, "delivered notification");
                }
                Err(err) => warn!(error = %err, "dropping malformed notification"),
            },
            Some(Err(err)) => return PumpExit::Failed(err),
            None => return PumpExit::Closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::stream;

    use super::*;

    /// Connector whose every attempt fails.
    struct Refusing {
        attempts: Arc<AtomicUsize>,
    }

    impl Connector for Refusing {
        async fn connect(&self) -> Result<MessageStream> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(Error::Transport {
                message: "connection refused".to_string(),
            })
        }

        fn endpoint(&self) -> &str {
            "test://refusing"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn four_failures_mean_three_reconnects_then_exhausted() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let channel = NotificationChannel::new(Refusing {
            attempts: Arc::clone(&attempts),
        });
        let mut states = channel.watch_state();

        assert!(channel.start());
        states
            .wait_for(|state| *state == ChannelState::Exhausted)
            .await
            .expect("channel alive");

        // One initial connect plus three reconnects.
        assert_eq!(attempts.load(Ordering::SeqCst), 4);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        assert!(matches!(
            channel.ensure_live(),
            Err(Error::ChannelExhausted { attempts: 3 })
        ));

        assert!(!channel.start(), "exhausted channel must not restart");
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_wait_for_the_configured_delay() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let channel = NotificationChannel::new(Refusing {
            attempts: Arc::clone(&attempts),
        });
        channel.start();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(channel.state(), ChannelState::Retrying { attempt: 1 });

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    /// Connector whose connections succeed but close immediately.
    struct Flapping {
        attempts: Arc<AtomicUsize>,
    }

    impl Connector for Flapping {
        async fn connect(&self) -> Result<MessageStream> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Ok(stream::empty().boxed())
        }

        fn endpoint(&self) -> &str {
            "test://flapping"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn successful_connections_reset_the_attempt_counter() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let channel = NotificationChannel::new(Flapping {
            attempts: Arc::clone(&attempts),
        });
        channel.start();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(attempts.load(Ordering::SeqCst) > 4);
        assert_ne!(channel.state(), ChannelState::Exhausted);

        channel.shutdown().await;
        assert_eq!(channel.state(), ChannelState::Stopped);
    }

    /// Connector that serves one fixed batch of frames, then stays open.
    struct Scripted {
        frames: Vec<String>,
    }

    impl Connector for Scripted {
        async fn connect(&self) -> Result<MessageStream> {
            let frames = self.frames.clone().into_iter().map(Ok);
            Ok(stream::iter(frames).chain(stream::pending()).boxed())
        }

        fn endpoint(&self) -> &str {
            "test://scripted"
        }
    }

    fn frame(id: &str) -> String {
        format!(
            r#"{{"id":"{id}","type":"order","title":"Order {id}","message":"Shipped","timestamp":"2026-03-01T10:00:00Z"}}"#
        )
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_frames_are_dropped_without_disconnecting() {
        let channel = NotificationChannel::new(Scripted {
            frames: vec![frame("1"), "not json".to_string(), frame("2")],
        });
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        channel.subscribe(move |event| sink.lock().unwrap().push(event.id.clone()));

        channel.start();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(*received.lock().unwrap(), vec!["1", "2"]);
        assert_eq!(channel.state(), ChannelState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn listener_can_unsubscribe_itself_mid_stream() {
        let channel = NotificationChannel::new(Scripted {
            frames: vec![frame("1"), frame("2"), frame("3")],
        });
        let once_calls = Arc::new(AtomicUsize::new(0));
        let steady_calls = Arc::new(AtomicUsize::new(0));

        let own: Arc<std::sync::OnceLock<Subscription>> = Arc::new(std::sync::OnceLock::new());
        let handle = Arc::clone(&own);
        let counter = Arc::clone(&once_calls);
        let subscription = channel.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            if let Some(subscription) = handle.get() {
                subscription.unsubscribe();
            }
        });
        own.set(subscription).expect("set once");

        let counter = Arc::clone(&steady_calls);
        channel.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        channel.start();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(once_calls.load(Ordering::SeqCst), 1);
        assert_eq!(steady_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn start_twice_keeps_a_single_worker() {
        let channel = NotificationChannel::new(Scripted { frames: Vec::new() });
        assert!(channel.start());
        assert!(!channel.start());
        channel.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_prevents_further_reconnects() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let channel = NotificationChannel::new(Refusing {
            attempts: Arc::clone(&attempts),
        });
        channel.start();
        tokio::time::sleep(Duration::from_millis(10)).await;
        channel.shutdown().await;

        let seen = attempts.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), seen);
        assert_eq!(channel.state(), ChannelState::Stopped);
    }
}
