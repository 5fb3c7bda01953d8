//! Database readiness state machine.
//!
//! # States
//! - Uninitialized: no attempt made yet
//! - Connecting: one attempt in flight, shared by every waiting request
//! - Ready: connection established (terminal)
//! - Failed: last attempt failed; the next caller starts a new one
//!
//! # State Transitions
//! ```text
//! Uninitialized → Connecting: first ensure_ready()
//! Failed        → Connecting: next ensure_ready()
//! Connecting    → Ready:      attempt resolves Ok
//! Connecting    → Failed:     attempt resolves Err
//! ```
//!
//! # Design Decisions
//! - Lock-free fast path once ready (`OnceLock`, set exactly once)
//! - The mutex is never held across an await
//! - The in-flight attempt is a `Shared` future so every waiter sees the
//!   same outcome

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use futures_util::future::{BoxFuture, FutureExt, Shared};

use crate::database::connector::{DatabaseConnector, DatabaseError, DatabaseHandle};
use crate::observability::metrics;

type ConnectOutcome = Result<Arc<DatabaseHandle>, DatabaseError>;
type SharedAttempt = Shared<BoxFuture<'static, ConnectOutcome>>;

/// Observable readiness state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessState {
    Uninitialized,
    Connecting,
    Ready,
    Failed,
}

enum Cell {
    Uninitialized,
    Connecting { attempt: u64, future: SharedAttempt },
    Ready(Arc<DatabaseHandle>),
    Failed(DatabaseError),
}

/// Process-wide gate guarding the single database connection.
pub struct ReadinessGate {
    connector: Arc<dyn DatabaseConnector>,
    ready: OnceLock<Arc<DatabaseHandle>>,
    attempts: AtomicU64,
    cell: Mutex<Cell>,
}

impl ReadinessGate {
    pub fn new(connector: Arc<dyn DatabaseConnector>) -> Self {
        metrics::set_db_ready(false);
        Self {
            connector,
            ready: OnceLock::new(),
            attempts: AtomicU64::new(0),
            cell: Mutex::new(Cell::Uninitialized),
        }
    }

    /// Whether the connection has been established.
    pub fn is_ready(&self) -> bool {
        self.ready.get().is_some()
    }

    pub fn state(&self) -> ReadinessState {
        match &*self.cell.lock().expect("readiness mutex poisoned") {
            Cell::Uninitialized => ReadinessState::Uninitialized,
            Cell::Connecting { .. } => ReadinessState::Connecting,
            Cell::Ready(_) => ReadinessState::Ready,
            Cell::Failed(_) => ReadinessState::Failed,
        }
    }

    /// The established connection, if ready.
    pub fn handle(&self) -> Option<Arc<DatabaseHandle>> {
        self.ready.get().cloned()
    }

    /// Error from the most recent failed attempt, until a new one starts.
    pub fn last_error(&self) -> Option<DatabaseError> {
        match &*self.cell.lock().expect("readiness mutex poisoned") {
            Cell::Failed(err) => Some(err.clone()),
            _ => None,
        }
    }

    /// Number of connect attempts started so far.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Return the connection, establishing it if needed.
    ///
    /// Concurrent callers share one in-flight attempt and all observe its
    /// outcome. After a failure the next caller starts a fresh attempt.
    pub async fn ensure_ready(&self) -> ConnectOutcome {
        if let Some(handle) = self.ready.get() {
            return Ok(Arc::clone(handle));
        }

        let (attempt, future) = {
            let mut cell = self.cell.lock().expect("readiness mutex poisoned");
            match &*cell {
                Cell::Ready(handle) => return Ok(Arc::clone(handle)),
                Cell::Connecting { attempt, future } => (*attempt, future.clone()),
                Cell::Uninitialized | Cell::Failed(_) => {
                    let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
                    let future = self.start_attempt(attempt);
                    *cell = Cell::Connecting {
                        attempt,
                        future: future.clone(),
                    };
                    (attempt, future)
                }
            }
        };

        let outcome = future.await;
        self.settle(attempt, &outcome);
        outcome
    }

    fn start_attempt(&self, attempt: u64) -> SharedAttempt {
        let connector = Arc::clone(&self.connector);
        tracing::info!(
            attempt,
            target = %connector.describe(),
            "Connecting to database"
        );
        // A connector panic settles the attempt as an ordinary failure.
        async move {
            match AssertUnwindSafe(connector.connect()).catch_unwind().await {
                Ok(outcome) => outcome.map(Arc::new),
                Err(panic) => Err(DatabaseError::Other(format!(
                    "database connector panicked: {}",
                    panic_message(panic.as_ref())
                ))),
            }
        }
        .boxed()
        .shared()
    }

    /// Record the outcome of `attempt`. Only the first waiter to settle a
    /// given attempt changes state; later waiters find it already settled.
    fn settle(&self, attempt: u64, outcome: &ConnectOutcome) {
        let mut cell = self.cell.lock().expect("readiness mutex poisoned");
        let current = match &*cell {
            Cell::Connecting { attempt: current, .. } => *current,
            _ => return,
        };
        if current != attempt {
            return;
        }

        match outcome {
            Ok(handle) => {
                *cell = Cell::Ready(Arc::clone(handle));
                let _ = self.ready.set(Arc::clone(handle));
                metrics::record_db_connect("success");
                metrics::set_db_ready(true);
                tracing::info!(
                    attempt,
                    address = %handle.address(),
                    database = handle.database().unwrap_or("-"),
                    "Database connection established"
                );
            }
            Err(err) => {
                *cell = Cell::Failed(err.clone());
                metrics::record_db_connect("failure");
                tracing::error!(attempt, error = %err, "Database connection failed");
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    }
}

impl std::fmt::Debug for ReadinessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessGate")
            .field("target", &self.connector.describe())
            .field("ready", &self.is_ready())
            .field("attempts", &self.attempts())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Connector that replays scripted outcomes after a delay.
    struct ScriptedConnector {
        outcomes: Mutex<VecDeque<Result<(), DatabaseError>>>,
        calls: AtomicU64,
        delay: Duration,
    }

    impl ScriptedConnector {
        fn new(outcomes: Vec<Result<(), DatabaseError>>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: AtomicU64::new(0),
                delay,
            })
        }
    }

    #[async_trait]
    impl DatabaseConnector for ScriptedConnector {
        fn describe(&self) -> String {
            "scripted".to_string()
        }

        async fn connect(&self) -> Result<DatabaseHandle, DatabaseError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            let next = self.outcomes.lock().unwrap().pop_front().unwrap_or(Ok(()));
            next.map(|_| DatabaseHandle::new("scripted:27017", Some("finbug".to_string())))
        }
    }

    /// Connector that panics on its first call and succeeds afterwards.
    struct PanicOnce {
        calls: AtomicU64,
    }

    #[async_trait]
    impl DatabaseConnector for PanicOnce {
        fn describe(&self) -> String {
            "panic-once".to_string()
        }

        async fn connect(&self) -> Result<DatabaseHandle, DatabaseError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("driver bug");
            }
            Ok(DatabaseHandle::new("panic-once:27017", None))
        }
    }

    fn timeout_error() -> DatabaseError {
        DatabaseError::Timeout {
            addr: "scripted:27017".to_string(),
            secs: 10,
        }
    }

    #[tokio::test]
    async fn starts_uninitialized() {
        let gate = ReadinessGate::new(ScriptedConnector::new(vec![], Duration::ZERO));
        assert!(!gate.is_ready());
        assert_eq!(gate.state(), ReadinessState::Uninitialized);
        assert!(gate.handle().is_none());
        assert_eq!(gate.attempts(), 0);
    }

    #[tokio::test]
    async fn success_is_terminal() {
        let connector = ScriptedConnector::new(vec![Ok(())], Duration::ZERO);
        let gate = ReadinessGate::new(connector.clone());

        let handle = gate.ensure_ready().await.unwrap();
        assert_eq!(handle.database(), Some("finbug"));
        assert!(gate.is_ready());
        assert_eq!(gate.state(), ReadinessState::Ready);

        gate.ensure_ready().await.unwrap();
        assert_eq!(connector.calls.load(Ordering::SeqCst), 1);
        assert_eq!(gate.attempts(), 1);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_attempt() {
        let connector = ScriptedConnector::new(vec![Ok(())], Duration::from_millis(50));
        let gate = Arc::new(ReadinessGate::new(connector.clone()));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let gate = Arc::clone(&gate);
                tokio::spawn(async move { gate.ensure_ready().await })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }

        assert_eq!(connector.calls.load(Ordering::SeqCst), 1);
        assert!(gate.is_ready());
    }

    #[tokio::test]
    async fn concurrent_callers_share_a_failure() {
        let connector = ScriptedConnector::new(
            vec![Err(timeout_error())],
            Duration::from_millis(50),
        );
        let gate = Arc::new(ReadinessGate::new(connector.clone()));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let gate = Arc::clone(&gate);
                tokio::spawn(async move { gate.ensure_ready().await })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap_err(), timeout_error());
        }

        assert_eq!(connector.calls.load(Ordering::SeqCst), 1);
        assert_eq!(gate.state(), ReadinessState::Failed);
        assert_eq!(gate.last_error(), Some(timeout_error()));
    }

    #[tokio::test]
    async fn failure_is_retried_by_next_caller() {
        let connector = ScriptedConnector::new(vec![Err(timeout_error()), Ok(())], Duration::ZERO);
        let gate = ReadinessGate::new(connector.clone());

        assert!(gate.ensure_ready().await.is_err());
        assert!(!gate.is_ready());

        assert!(gate.ensure_ready().await.is_ok());
        assert!(gate.is_ready());
        assert!(gate.last_error().is_none());
        assert_eq!(connector.calls.load(Ordering::SeqCst), 2);
        assert_eq!(gate.attempts(), 2);
    }

    #[tokio::test]
    async fn panicking_connector_fails_the_attempt_and_is_retried() {
        let connector = Arc::new(PanicOnce {
            calls: AtomicU64::new(0),
        });
        let gate = ReadinessGate::new(connector.clone());

        let err = gate.ensure_ready().await.unwrap_err();
        assert_eq!(
            err,
            DatabaseError::Other("database connector panicked: driver bug".to_string())
        );
        assert_eq!(gate.state(), ReadinessState::Failed);

        assert!(gate.ensure_ready().await.is_ok());
        assert_eq!(gate.state(), ReadinessState::Ready);
        assert_eq!(connector.calls.load(Ordering::SeqCst), 2);
    }
}
