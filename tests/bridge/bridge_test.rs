//! Coverage for the event bridge coordination loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use confann::bridge::{
    readiness, run_bridge, BridgeDeps, BridgeState, Readiness, ShutdownReason, ShutdownReport,
    ShutdownTrigger,
};
use confann::irc::{ChatSink, SessionSignals};
use confann::webhook::server::{self, StopOutcome};
use confann::webhook::{router, WebhookState};

use crate::common::{test_credential, ChatCall, RecordingChat};

const WAIT: Duration = Duration::from_secs(5);

struct Rig {
    chat: Arc<RecordingChat>,
    ready: Readiness,
    connected: mpsc::UnboundedSender<()>,
    disconnected: mpsc::UnboundedSender<()>,
    interrupts: mpsc::Sender<()>,
    trigger: ShutdownTrigger,
    addr: SocketAddr,
    bridge: JoinHandle<ShutdownReport>,
}

impl Rig {
    async fn finish(self) -> (ShutdownReport, Arc<RecordingChat>) {
        let joined = tokio::time::timeout(WAIT, self.bridge).await;
        let report = match joined {
            Ok(Ok(report)) => report,
            Ok(Err(err)) => panic!("bridge task failed: {err}"),
            Err(_) => panic!("bridge did not shut down in time"),
        };
        (report, self.chat)
    }
}

async fn start_rig() -> Rig {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("should bind loopback listener");
    let addr = listener.local_addr().expect("listener should have an address");
    let (errors_tx, errors_rx) = mpsc::channel(1);
    start_rig_with(addr, errors_rx, |router| {
        server::spawn_on(listener, router, errors_tx)
    })
}

fn start_rig_with(
    addr: SocketAddr,
    listener_errors: mpsc::Receiver<confann::webhook::ListenerError>,
    spawn: impl FnOnce(axum::Router) -> confann::webhook::WebhookServer,
) -> Rig {
    let chat = Arc::new(RecordingChat::default());
    let (writer, ready) = readiness();
    let server = spawn(router(WebhookState {
        credential: Arc::new(test_credential()),
        readiness: writer.reader(),
        chat: Arc::clone(&chat) as Arc<dyn ChatSink>,
        channel: "#alrs".to_owned(),
        path: "/".to_owned(),
    }));

    let (connected_tx, connected_rx) = mpsc::unbounded_channel();
    let (disconnected_tx, disconnected_rx) = mpsc::unbounded_channel();
    let (interrupt_tx, interrupt_rx) = mpsc::channel(1);
    let (trigger, shutdown_rx) = ShutdownTrigger::channel();

    let bridge = tokio::spawn(run_bridge(BridgeDeps {
        chat: Arc::clone(&chat) as Arc<dyn ChatSink>,
        readiness: writer,
        join_order: vec!["#bots".to_owned(), "#alrs".to_owned()],
        signals: SessionSignals {
            connected: connected_rx,
            disconnected: disconnected_rx,
        },
        interrupts: interrupt_rx,
        listener_errors,
        server,
        shutdown_grace: Duration::from_secs(1),
        shutdown: trigger.clone(),
        shutdown_rx,
    }));

    Rig {
        chat,
        ready,
        connected: connected_tx,
        disconnected: disconnected_tx,
        interrupts: interrupt_tx,
        trigger,
        addr,
        bridge,
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    let polled = tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "condition not reached in time");
}

#[tokio::test]
async fn connected_sets_ready_then_joins_in_order() {
    let rig = start_rig().await;
    assert!(!rig.ready.is_ready());

    assert!(rig.connected.send(()).is_ok());
    let chat = Arc::clone(&rig.chat);
    wait_until(|| chat.calls().len() == 2).await;
    assert!(rig.ready.is_ready());
    assert_eq!(
        rig.chat.calls(),
        vec![
            ChatCall::Join("#bots".to_owned()),
            ChatCall::Join("#alrs".to_owned()),
        ]
    );

    assert!(rig.interrupts.send(()).await.is_ok());
    let ready = rig.ready.clone();
    let (report, chat) = rig.finish().await;
    assert_eq!(report.reason, ShutdownReason::Interrupt);
    assert!(!ready.is_ready());
    assert_eq!(chat.close_count(), 1);
}

#[tokio::test]
async fn interrupt_closes_session_and_stops_listener() {
    let rig = start_rig().await;
    assert!(rig.connected.send(()).is_ok());
    assert!(rig.interrupts.send(()).await.is_ok());
    let addr = rig.addr;

    let (report, chat) = rig.finish().await;
    assert_eq!(report.reason, ShutdownReason::Interrupt);
    assert_eq!(report.listener, StopOutcome::Graceful);
    assert_eq!(report.final_state, BridgeState::Terminated);
    assert_eq!(chat.close_count(), 1);
    assert_eq!(chat.calls().last(), Some(&ChatCall::Close));
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn disconnect_drives_exactly_one_shutdown() {
    let rig = start_rig().await;
    assert!(rig.connected.send(()).is_ok());
    assert!(rig.disconnected.send(()).is_ok());
    // A spurious second disconnect must not close twice.
    assert!(rig.disconnected.send(()).is_ok());

    let (report, chat) = rig.finish().await;
    assert_eq!(report.reason, ShutdownReason::Disconnected);
    assert_eq!(chat.close_count(), 1);
}

#[tokio::test]
async fn disconnect_clears_readiness() {
    let rig = start_rig().await;
    assert!(rig.connected.send(()).is_ok());
    let ready = rig.ready.clone();
    wait_until(|| ready.is_ready()).await;

    assert!(rig.disconnected.send(()).is_ok());
    let (report, _chat) = rig.finish().await;
    assert_eq!(report.reason, ShutdownReason::Disconnected);
    assert!(!ready.is_ready());
}

#[tokio::test]
async fn interrupt_before_connect_skips_joins() {
    let rig = start_rig().await;
    assert!(rig.interrupts.send(()).await.is_ok());

    let (report, chat) = rig.finish().await;
    assert_eq!(report.reason, ShutdownReason::Interrupt);
    assert_eq!(chat.calls(), vec![ChatCall::Close]);
}

#[tokio::test]
async fn competing_triggers_still_close_once() {
    let rig = start_rig().await;
    assert!(rig.interrupts.send(()).await.is_ok());
    assert!(rig.disconnected.send(()).is_ok());
    rig.trigger.trigger(ShutdownReason::Requested);

    let (_report, chat) = rig.finish().await;
    assert_eq!(chat.close_count(), 1);
}

#[tokio::test]
async fn external_request_shuts_down() {
    let rig = start_rig().await;
    assert!(rig.trigger.trigger(ShutdownReason::Requested));

    let (report, chat) = rig.finish().await;
    assert_eq!(report.reason, ShutdownReason::Requested);
    assert_eq!(chat.close_count(), 1);
}

#[tokio::test]
async fn listener_bind_failure_shuts_down() {
    let occupied = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("should bind loopback listener");
    let addr = occupied.local_addr().expect("listener should have an address");
    let (errors_tx, errors_rx) = mpsc::channel(1);
    let rig = start_rig_with(addr, errors_rx, |router| {
        server::spawn(addr, router, errors_tx)
    });

    let (report, chat) = rig.finish().await;
    assert_eq!(report.reason, ShutdownReason::ListenerFailed);
    assert_eq!(chat.close_count(), 1);
    drop(occupied);
}

#[tokio::test]
async fn trigger_keeps_only_the_first_request() {
    let (trigger, mut rx) = ShutdownTrigger::channel();
    assert!(trigger.trigger(ShutdownReason::Interrupt));
    assert!(!trigger.trigger(ShutdownReason::Disconnected));
    assert!(!trigger.clone().trigger(ShutdownReason::ListenerFailed));
    assert_eq!(rx.recv().await, Some(ShutdownReason::Interrupt));
    assert!(rx.try_recv().is_err());
}
