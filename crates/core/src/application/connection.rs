// Connection Manager - bounded fan-out of `connect <id>` sessions
//
// Only the first `max_connections` discovered devices are attempted per run.
// The permit pool bounds how many connect sessions are alive at once.

use crate::application::constants::connect_command;
use crate::application::discovery::DeviceDiscovery;
use crate::domain::DeviceId;
use crate::port::{CommandError, CommandExecutor};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

/// How a single connection attempt ended (reported through the log only)
#[derive(Debug)]
pub enum ConnectionOutcome {
    /// Output contained the expected success marker
    Connected,
    /// Command ran but the marker was absent
    Rejected,
    /// The connect session itself failed
    Errored(CommandError),
}

impl ConnectionOutcome {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionOutcome::Connected)
    }
}

/// Everything a connect task needs, cheap to clone into `tokio::spawn`
#[derive(Clone)]
struct Connector {
    executor: Arc<dyn CommandExecutor>,
    permits: Arc<Semaphore>,
    response_timeout: Duration,
    expected_response: Arc<str>,
}

impl Connector {
    async fn connect(&self, device: DeviceId) -> ConnectionOutcome {
        // Held until this function returns, on every path.
        // The pool is private to the manager and `close()` is never called,
        // so acquisition only fails if that invariant is broken.
        let _permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(closed) => unreachable!("connection permit pool closed: {}", closed),
        };

        info!(device = %device, "Attempting to connect to {}...", device);

        let command = connect_command(&device);
        match self
            .executor
            .execute(&command, Some(self.response_timeout))
            .await
        {
            Ok(output) if output.contains(&*self.expected_response) => {
                info!(device = %device, "Successfully connected to {}.", device);
                ConnectionOutcome::Connected
            }
            Ok(_) => {
                error!(device = %device, "Failed to connect to {}.", device);
                ConnectionOutcome::Rejected
            }
            Err(e) => {
                error!(
                    device = %device,
                    kind = ?e.kind,
                    command = %e.command,
                    raw_errors = %e.raw_errors,
                    "Connection attempt to {} failed: {}", device, e.message
                );
                ConnectionOutcome::Errored(e)
            }
        }
    }
}

pub struct ConnectionManager {
    discovery: Arc<DeviceDiscovery>,
    connector: Connector,
    max_connections: NonZeroUsize,
}

impl ConnectionManager {
    /// Create a connection manager
    ///
    /// # Arguments
    /// * `discovery` - Source of the device list
    /// * `executor` - Runs the connect sessions
    /// * `max_connections` - Permit pool size and per-run batch size
    /// * `response_timeout` - Settle time for each `connect <id>`
    /// * `expected_response` - Success marker searched in connect output
    pub fn new(
        discovery: Arc<DeviceDiscovery>,
        executor: Arc<dyn CommandExecutor>,
        max_connections: NonZeroUsize,
        response_timeout: Duration,
        expected_response: impl Into<String>,
    ) -> Self {
        let expected_response: String = expected_response.into();
        Self {
            discovery,
            connector: Connector {
                executor,
                permits: Arc::new(Semaphore::new(max_connections.get())),
                response_timeout,
                expected_response: Arc::from(expected_response),
            },
            max_connections,
        }
    }

    /// Connect to one device, waiting for a free permit first.
    ///
    /// Never fails: the outcome is logged and returned for inspection.
    pub async fn connect_device(&self, device: &DeviceId) -> ConnectionOutcome {
        self.connector.connect(device.clone()).await
    }

    /// Discover devices, then attempt the first `max_connections` of them
    /// concurrently and wait for every attempt to finish.
    ///
    /// Returns the number of attempts launched. Only a discovery failure is
    /// an error; a failing or panicking attempt is logged and its siblings
    /// carry on.
    pub async fn manage_connections(&self) -> Result<usize, CommandError> {
        let devices = self.discovery.discover().await?;

        let batch: Vec<DeviceId> = devices
            .into_iter()
            .take(self.max_connections.get())
            .collect();
        let launched = batch.len();

        let mut tasks = JoinSet::new();
        for device in batch {
            let connector = self.connector.clone();
            tasks.spawn(async move { connector.connect(device).await });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(join_err) = joined {
                if join_err.is_panic() {
                    error!("Connection task panicked: {:?}", join_err);
                } else {
                    error!("Connection task cancelled: {:?}", join_err);
                }
            }
        }

        info!(attempts = launched, "All device connection attempts are complete.");
        Ok(launched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::constants::SCAN_COMMAND;
    use crate::domain::DevicePattern;
    use crate::port::command_executor::mocks::{MockReply, ScriptedExecutor};
    use crate::port::CommandErrorKind;

    const MAC: &str = r"[0-9A-F]{2}(?::[0-9A-F]{2}){5}";
    const MARKER: &str = "Connection successful";

    fn scan_output(count: usize) -> String {
        (1..=count)
            .map(|i| format!("[NEW] Device AA:BB:CC:DD:EE:{:02} Device{}\n", i, i))
            .collect()
    }

    fn manager(executor: Arc<ScriptedExecutor>, max: usize) -> ConnectionManager {
        let discovery = Arc::new(DeviceDiscovery::new(
            executor.clone(),
            DevicePattern::new(MAC).unwrap(),
        ));
        ConnectionManager::new(
            discovery,
            executor,
            NonZeroUsize::new(max).unwrap(),
            Duration::from_millis(5),
            MARKER,
        )
    }

    fn connects(executor: &ScriptedExecutor) -> Vec<String> {
        let mut cmds: Vec<String> = executor
            .commands()
            .into_iter()
            .filter(|c| c.starts_with("connect "))
            .collect();
        cmds.sort();
        cmds
    }

    #[tokio::test]
    async fn test_only_first_batch_is_attempted() {
        let executor = Arc::new(
            ScriptedExecutor::new()
                .on_output(SCAN_COMMAND, scan_output(3))
                .on_output("connect", format!("Attempting to connect\n{}\n", MARKER)),
        );
        let manager = manager(executor.clone(), 2);

        let launched = manager.manage_connections().await.unwrap();

        assert_eq!(launched, 2);
        assert_eq!(
            connects(&executor),
            vec!["connect AA:BB:CC:DD:EE:01", "connect AA:BB:CC:DD:EE:02"]
        );
    }

    #[tokio::test]
    async fn test_launches_min_of_cap_and_found() {
        for (max, found) in [(1, 0), (1, 4), (3, 2), (4, 4), (5, 9)] {
            let executor = Arc::new(
                ScriptedExecutor::new()
                    .on_output(SCAN_COMMAND, scan_output(found))
                    .on_output("connect", MARKER)
                    .with_delay(Duration::from_millis(10)),
            );
            let manager = manager(executor.clone(), max);

            let launched = manager.manage_connections().await.unwrap();

            assert_eq!(launched, max.min(found));
            assert_eq!(connects(&executor).len(), max.min(found));
            assert!(executor.max_in_flight() <= max);
        }
    }

    #[tokio::test]
    async fn test_connect_uses_response_timeout() {
        let executor = Arc::new(ScriptedExecutor::new().on_output("connect", MARKER));
        let manager = manager(executor.clone(), 1);

        manager
            .connect_device(&DeviceId::from("AA:BB:CC:DD:EE:01"))
            .await;

        assert_eq!(
            executor.calls(),
            vec![(
                "connect AA:BB:CC:DD:EE:01".to_string(),
                Some(Duration::from_millis(5))
            )]
        );
    }

    #[tokio::test]
    async fn test_marker_present_is_success() {
        let executor = Arc::new(
            ScriptedExecutor::new()
                .on_output("connect", "Attempting to connect to AA\n[CHG] Connection successful\n"),
        );

        let outcome = manager(executor, 1)
            .connect_device(&DeviceId::from("AA:BB:CC:DD:EE:01"))
            .await;

        assert!(outcome.is_connected());
    }

    #[tokio::test]
    async fn test_marker_absent_is_failure() {
        let executor = Arc::new(
            ScriptedExecutor::new()
                .on_output("connect", "Attempting to connect to AA\nFailed to connect: org.bluez.Error.Failed\n"),
        );

        let outcome = manager(executor, 1)
            .connect_device(&DeviceId::from("AA:BB:CC:DD:EE:01"))
            .await;

        assert!(matches!(outcome, ConnectionOutcome::Rejected));
    }

    #[tokio::test]
    async fn test_permit_pool_bounds_direct_callers() {
        let executor = Arc::new(
            ScriptedExecutor::new()
                .on_output("connect", MARKER)
                .with_delay(Duration::from_millis(30)),
        );
        let manager = manager(executor.clone(), 2);
        let ids: Vec<DeviceId> = (1..=5)
            .map(|i| DeviceId::new(format!("AA:BB:CC:DD:EE:{:02}", i)))
            .collect();

        let (a, b, c, d, e) = tokio::join!(
            manager.connect_device(&ids[0]),
            manager.connect_device(&ids[1]),
            manager.connect_device(&ids[2]),
            manager.connect_device(&ids[3]),
            manager.connect_device(&ids[4]),
        );

        assert!([a, b, c, d, e].iter().all(ConnectionOutcome::is_connected));
        assert_eq!(executor.call_count(), 5);
        assert_eq!(executor.max_in_flight(), 2);
    }

    #[tokio::test]
    async fn test_failing_attempt_does_not_stop_siblings() {
        let executor = Arc::new(
            ScriptedExecutor::new()
                .on_output(SCAN_COMMAND, scan_output(3))
                .on(
                    "connect AA:BB:CC:DD:EE:01",
                    MockReply::Fail(CommandErrorKind::Timeout, String::new()),
                )
                .on(
                    "connect AA:BB:CC:DD:EE:02",
                    MockReply::Panic("control shell exploded".into()),
                )
                .on_output("connect", MARKER),
        );
        let manager = manager(executor.clone(), 3);

        let launched = manager.manage_connections().await.unwrap();

        assert_eq!(launched, 3);
        assert_eq!(connects(&executor).len(), 3);
    }

    #[tokio::test]
    async fn test_permit_returned_after_failed_attempt() {
        let executor = Arc::new(
            ScriptedExecutor::new()
                .on(
                    "connect AA:BB:CC:DD:EE:01",
                    MockReply::Fail(CommandErrorKind::Timeout, String::new()),
                )
                .on_output("connect", MARKER),
        );
        let manager = manager(executor.clone(), 1);

        let failed = manager
            .connect_device(&DeviceId::from("AA:BB:CC:DD:EE:01"))
            .await;
        let next = tokio::time::timeout(
            Duration::from_secs(2),
            manager.connect_device(&DeviceId::from("AA:BB:CC:DD:EE:02")),
        )
        .await
        .expect("single permit was not released");

        assert!(matches!(failed, ConnectionOutcome::Errored(_)));
        assert!(next.is_connected());
        assert_eq!(executor.call_count(), 2);
    }

    #[tokio::test]
    async fn test_errored_outcome_keeps_command_error() {
        let executor = Arc::new(ScriptedExecutor::new().on(
            "connect",
            MockReply::Fail(CommandErrorKind::ErrorOutput, "Device not available".into()),
        ));

        let outcome = manager(executor, 1)
            .connect_device(&DeviceId::from("AA:BB:CC:DD:EE:07"))
            .await;

        match outcome {
            ConnectionOutcome::Errored(e) => {
                assert_eq!(e.command, "connect AA:BB:CC:DD:EE:07");
                assert_eq!(e.raw_errors, "Device not available");
            }
            other => panic!("expected Errored, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_scan_failure_aborts_before_any_connect() {
        let executor = Arc::new(ScriptedExecutor::new().on(
            SCAN_COMMAND,
            MockReply::Fail(CommandErrorKind::Timeout, String::new()),
        ));
        let manager = manager(executor.clone(), 2);

        let result = manager.manage_connections().await;

        tokio_test::assert_err!(&result);
        assert!(connects(&executor).is_empty());
    }
}
