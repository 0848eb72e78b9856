//! End-to-end relay tests.
//!
//! These tests run the full path a real session takes - creation endpoint
//! logic, bind handshake, relay driver, teardown - against an in-memory
//! transport and a scripted shell connector, and verify the outcomes the
//! client observes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use protocol::{Op, TermMessage};

use gateway::api::sessions::{launch_session, CreateSessionRequest};
use gateway::api::AppState;
use gateway::config::Config;
use gateway::relay::{ConnectorError, HostTarget, ShellChannel, ShellConnector};
use gateway::session::{bind_transport, InputChunk, SessionHandle, SessionRegistry};
use gateway::transport::{TerminationStatus, Transport, TransportError};

// =============================================================================
// Test doubles
// =============================================================================

/// In-memory transport: the test scripts inbound frames and inspects what
/// the gateway sent back and how it closed the connection.
struct TestTransport {
    inbound: tokio::sync::Mutex<tokio::sync::mpsc::UnboundedReceiver<Result<String, TransportError>>>,
    sent: Mutex<Vec<String>>,
    closed: Mutex<Option<(TerminationStatus, String)>>,
}

impl TestTransport {
    fn new() -> (
        Arc<Self>,
        tokio::sync::mpsc::UnboundedSender<Result<String, TransportError>>,
    ) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            inbound: tokio::sync::Mutex::new(rx),
            sent: Mutex::new(Vec::new()),
            closed: Mutex::new(None),
        });
        (transport, tx)
    }

    fn sent_messages(&self) -> Vec<TermMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|frame| TermMessage::from_json(frame).unwrap())
            .collect()
    }

    fn close_notification(&self) -> Option<(TerminationStatus, String)> {
        self.closed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for TestTransport {
    async fn recv(&self) -> Result<String, TransportError> {
        match self.inbound.lock().await.recv().await {
            Some(result) => result,
            None => Err(TransportError::Closed),
        }
    }

    async fn send(&self, frame: String) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(frame);
        Ok(())
    }

    async fn close(&self, status: TerminationStatus, reason: &str) {
        let mut closed = self.closed.lock().unwrap();
        if closed.is_none() {
            *closed = Some((status, reason.to_string()));
        }
    }
}

/// Scripted remote shell: echoes every stdin chunk back as output, exits
/// cleanly when the client types `exit`, and reports an input failure when
/// the client vanishes.
struct EchoChannel {
    window_changes: Mutex<Vec<(u16, u16)>>,
    streams: Mutex<Option<Arc<SessionHandle>>>,
    closed: AtomicUsize,
}

impl EchoChannel {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            window_changes: Mutex::new(Vec::new()),
            streams: Mutex::new(None),
            closed: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ShellChannel for EchoChannel {
    async fn request_pty(&self, _term: &str, _rows: u16, _cols: u16) -> Result<(), ConnectorError> {
        Ok(())
    }

    fn set_streams(&self, handle: Arc<SessionHandle>) {
        *self.streams.lock().unwrap() = Some(handle);
    }

    async fn start_shell(&self) -> Result<(), ConnectorError> {
        Ok(())
    }

    async fn window_change(&self, rows: u16, cols: u16) -> Result<(), ConnectorError> {
        self.window_changes.lock().unwrap().push((rows, cols));
        Ok(())
    }

    async fn wait(&self) -> Result<(), ConnectorError> {
        let handle = self
            .streams
            .lock()
            .unwrap()
            .clone()
            .ok_or(ConnectorError::StreamsNotSet)?;

        loop {
            match handle.next_input().await {
                InputChunk::Data(data) if data == b"exit\n" => return Ok(()),
                InputChunk::Data(data) => {
                    if !data.is_empty() {
                        handle
                            .write_output(&data)
                            .await
                            .map_err(|e| ConnectorError::Output(e.to_string()))?;
                    }
                }
                InputChunk::Closed { error, .. } => {
                    return Err(ConnectorError::Input(error.to_string()))
                }
            }
        }
    }

    async fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Connector handing out [`EchoChannel`]s and recording the targets it was
/// asked to reach.
struct TestConnector {
    channel: Mutex<Option<Arc<EchoChannel>>>,
    targets: Mutex<Vec<HostTarget>>,
}

impl TestConnector {
    fn with_channel(channel: Arc<EchoChannel>) -> Arc<Self> {
        Arc::new(Self {
            channel: Mutex::new(Some(channel)),
            targets: Mutex::new(Vec::new()),
        })
    }

    fn refusing() -> Arc<Self> {
        Arc::new(Self {
            channel: Mutex::new(None),
            targets: Mutex::new(Vec::new()),
        })
    }

    fn targets(&self) -> Vec<HostTarget> {
        self.targets.lock().unwrap().clone()
    }
}

#[async_trait]
impl ShellConnector for TestConnector {
    async fn connect(&self, target: &HostTarget) -> Result<Arc<dyn ShellChannel>, ConnectorError> {
        self.targets.lock().unwrap().push(target.clone());
        match self.channel.lock().unwrap().clone() {
            Some(channel) => Ok(channel as Arc<dyn ShellChannel>),
            None => Err(ConnectorError::Connect {
                host: target.host.clone(),
                port: target.port,
                reason: "connection refused".to_string(),
            }),
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn state_with(connector: Arc<dyn ShellConnector>, config: Config) -> AppState {
    AppState {
        registry: Arc::new(SessionRegistry::new()),
        connector,
        config: Arc::new(config),
    }
}

fn creation_request(port: u16) -> CreateSessionRequest {
    CreateSessionRequest {
        ip: "10.0.0.1".to_string(),
        username: "u".to_string(),
        password: "p".to_string(),
        port,
    }
}

/// Waits until every session is gone, i.e. the relay driver finished its
/// teardown.
async fn wait_for_teardown(registry: &SessionRegistry) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !registry.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("session was not terminated in time");
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_full_session_lifecycle_clean_exit() {
    let channel = EchoChannel::new();
    let state = state_with(
        TestConnector::with_channel(Arc::clone(&channel)),
        Config::default(),
    );

    // Create a session the way the endpoint does.
    let created = launch_session(&state, creation_request(0)).unwrap();
    assert_eq!(created.id.len(), 32);

    // Attach a transport: bind frame first, then terminal traffic.
    let (transport, tx) = TestTransport::new();
    tx.send(Ok(TermMessage::bind(&created.id).to_json().unwrap()))
        .unwrap();
    tx.send(Ok(TermMessage::stdin("echo hi\n").to_json().unwrap()))
        .unwrap();
    tx.send(Ok(TermMessage::stdin("exit\n").to_json().unwrap()))
        .unwrap();

    let bound = bind_transport(&state.registry, Arc::clone(&transport) as Arc<dyn Transport>)
        .await
        .unwrap();
    assert_eq!(bound.id(), created.id);

    wait_for_teardown(&state.registry).await;

    // The shell echoed the first line back as a stdout frame.
    let sent = transport.sent_messages();
    assert!(
        sent.iter()
            .any(|m| m.op == Op::Stdout && m.data == "echo hi\n"),
        "no echoed stdout frame in {:?}",
        sent
    );

    // Clean exit: status 1 with the fixed reason.
    assert_eq!(
        transport.close_notification(),
        Some((TerminationStatus::CleanExit, "Process exited".to_string()))
    );
    assert_eq!(channel.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_port_zero_defaults_to_22_internally() {
    let connector = TestConnector::refusing();
    let state = state_with(
        Arc::clone(&connector) as Arc<dyn ShellConnector>,
        Config::default(),
    );

    let created = launch_session(&state, creation_request(0)).unwrap();

    let (transport, tx) = TestTransport::new();
    tx.send(Ok(TermMessage::bind(&created.id).to_json().unwrap()))
        .unwrap();
    bind_transport(&state.registry, transport as Arc<dyn Transport>)
        .await
        .unwrap();

    wait_for_teardown(&state.registry).await;

    let targets = connector.targets();
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].port, 22);
    assert_eq!(targets[0].host, "10.0.0.1");
}

#[tokio::test]
async fn test_explicit_port_is_kept() {
    let connector = TestConnector::refusing();
    let state = state_with(
        Arc::clone(&connector) as Arc<dyn ShellConnector>,
        Config::default(),
    );

    let created = launch_session(&state, creation_request(2222)).unwrap();

    let (transport, tx) = TestTransport::new();
    tx.send(Ok(TermMessage::bind(&created.id).to_json().unwrap()))
        .unwrap();
    bind_transport(&state.registry, transport as Arc<dyn Transport>)
        .await
        .unwrap();

    wait_for_teardown(&state.registry).await;
    assert_eq!(connector.targets()[0].port, 2222);
}

#[tokio::test]
async fn test_connect_failure_reaches_client_as_status_two() {
    let state = state_with(
        TestConnector::refusing() as Arc<dyn ShellConnector>,
        Config::default(),
    );

    let created = launch_session(&state, creation_request(0)).unwrap();

    let (transport, tx) = TestTransport::new();
    tx.send(Ok(TermMessage::bind(&created.id).to_json().unwrap()))
        .unwrap();
    bind_transport(&state.registry, Arc::clone(&transport) as Arc<dyn Transport>)
        .await
        .unwrap();

    wait_for_teardown(&state.registry).await;

    let (status, reason) = transport.close_notification().unwrap();
    assert_eq!(status, TerminationStatus::Failure);
    assert!(reason.contains("connection refused"), "reason: {reason}");
}

#[tokio::test]
async fn test_bind_with_unknown_id_leaves_sessions_alone() {
    let state = state_with(
        TestConnector::refusing() as Arc<dyn ShellConnector>,
        Config::default(),
    );
    let created = launch_session(&state, creation_request(0)).unwrap();

    let (transport, tx) = TestTransport::new();
    tx.send(Ok(TermMessage::bind("deadbeefdeadbeefdeadbeefdeadbeef")
        .to_json()
        .unwrap()))
        .unwrap();

    let result = bind_transport(&state.registry, transport as Arc<dyn Transport>).await;
    assert!(result.is_err());

    // The pending session is untouched and still bindable.
    let handle = state.registry.get(&created.id).unwrap();
    assert!(!handle.is_bound());
}

#[tokio::test]
async fn test_second_bind_rejected_first_relay_unaffected() {
    let channel = EchoChannel::new();
    let state = state_with(
        TestConnector::with_channel(Arc::clone(&channel)),
        Config::default(),
    );
    let created = launch_session(&state, creation_request(0)).unwrap();

    let (first, tx1) = TestTransport::new();
    tx1.send(Ok(TermMessage::bind(&created.id).to_json().unwrap()))
        .unwrap();
    bind_transport(&state.registry, Arc::clone(&first) as Arc<dyn Transport>)
        .await
        .unwrap();

    let (second, tx2) = TestTransport::new();
    tx2.send(Ok(TermMessage::bind(&created.id).to_json().unwrap()))
        .unwrap();
    assert!(
        bind_transport(&state.registry, Arc::clone(&second) as Arc<dyn Transport>)
            .await
            .is_err()
    );

    // The first transport still drives the session to a clean exit.
    tx1.send(Ok(TermMessage::stdin("exit\n").to_json().unwrap()))
        .unwrap();
    wait_for_teardown(&state.registry).await;

    assert_eq!(
        first.close_notification(),
        Some((TerminationStatus::CleanExit, "Process exited".to_string()))
    );
    assert!(second.close_notification().is_none());
}

#[tokio::test]
async fn test_resize_then_disconnect_one_window_change_then_failure() {
    let channel = EchoChannel::new();
    let state = state_with(
        TestConnector::with_channel(Arc::clone(&channel)),
        Config::default(),
    );
    let created = launch_session(&state, creation_request(0)).unwrap();

    let (transport, tx) = TestTransport::new();
    tx.send(Ok(TermMessage::bind(&created.id).to_json().unwrap()))
        .unwrap();
    tx.send(Ok(TermMessage::resize(40, 120).to_json().unwrap()))
        .unwrap();
    bind_transport(&state.registry, Arc::clone(&transport) as Arc<dyn Transport>)
        .await
        .unwrap();

    // Client disconnects after the resize.
    drop(tx);

    wait_for_teardown(&state.registry).await;

    assert_eq!(
        channel.window_changes.lock().unwrap().as_slice(),
        &[(40, 120)]
    );
    let (status, _) = transport.close_notification().unwrap();
    assert_eq!(status, TerminationStatus::Failure);
}

#[tokio::test]
async fn test_unbound_session_times_out_and_disappears() {
    let mut config = Config::default();
    config.session.bind_timeout_secs = 1;

    let connector = TestConnector::refusing();
    let state = state_with(Arc::clone(&connector) as Arc<dyn ShellConnector>, config);

    let created = launch_session(&state, creation_request(0)).unwrap();
    assert!(state.registry.contains(&created.id));

    wait_for_teardown(&state.registry).await;

    // Nothing ever attached and the connector was never consulted.
    assert!(connector.targets().is_empty());
}

#[tokio::test]
async fn test_concurrent_sessions_are_independent() {
    let channel = EchoChannel::new();
    let state = state_with(
        TestConnector::with_channel(Arc::clone(&channel)),
        Config::default(),
    );

    let doomed = launch_session(&state, creation_request(0)).unwrap();
    let healthy = launch_session(&state, creation_request(0)).unwrap();
    assert_eq!(state.registry.len(), 2);

    // Only the doomed session gets a transport, which dies immediately.
    let (transport, tx) = TestTransport::new();
    tx.send(Ok(TermMessage::bind(&doomed.id).to_json().unwrap()))
        .unwrap();
    bind_transport(&state.registry, transport as Arc<dyn Transport>)
        .await
        .unwrap();
    drop(tx);

    tokio::time::timeout(Duration::from_secs(5), async {
        while state.registry.contains(&doomed.id) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("doomed session should terminate");

    // The other session is still pending and intact.
    assert!(state.registry.contains(&healthy.id));
}
