//! Transport session: drains the command queue onto the executor link

use super::liveness::LivenessFlag;
use crate::queue::{QueueConsumer, QueueItem};
use crate::transport::{TransportConnector, TransportStream};
use gesture_bridge_shared::{
    codec::{self, FrameDecoder},
    state_machine::{LinkEvent, LinkState, LinkStateMachine, TransitionResult},
    Command,
};
use std::fmt;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Events emitted by the transport session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A connect attempt started
    Connecting { target: String },
    /// Link is up
    Connected,
    /// An established link failed
    Disconnected { reason: String },
    /// A connect attempt failed
    ConnectionFailed { reason: String },
    /// A command was written to the socket
    Sent(Command),
    /// A command was lost with a failing write and will not be retried
    Dropped(Command),
    /// The executor replied with a frame
    Reply(String),
    /// The session reached its terminal state
    Stopped { reason: StopReason },
}

/// Why the session stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The close sentinel was dequeued
    CloseSentinel,
    /// An external termination signal arrived
    Terminated,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::CloseSentinel => write!(f, "close requested"),
            StopReason::Terminated => write!(f, "terminated"),
        }
    }
}

impl From<StopReason> for LinkEvent {
    fn from(reason: StopReason) -> Self {
        match reason {
            StopReason::CloseSentinel => LinkEvent::CloseRequested,
            StopReason::Terminated => LinkEvent::Terminated,
        }
    }
}

/// Timing knobs for the session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Reconnection delay (initial)
    pub reconnect_delay: Duration,
    /// Maximum reconnection delay
    pub max_reconnect_delay: Duration,
    /// Size of the buffer used to read executor replies
    pub read_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
            read_buffer: 1024,
        }
    }
}

/// How one connected period ended
enum LinkOutcome {
    Stopped(StopReason),
    Failed(String),
}

/// Owns the connection to the executor and the single consumer end of the queue
pub struct TransportSession<C: TransportConnector> {
    connector: C,
    config: SessionConfig,
    queue: QueueConsumer,
    liveness: LivenessFlag,
    shutdown: watch::Receiver<bool>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    fsm: LinkStateMachine,
}

impl<C: TransportConnector> TransportSession<C> {
    /// Create a session; nothing happens until [`run`](Self::run) or [`spawn`](Self::spawn)
    pub fn new(
        connector: C,
        config: SessionConfig,
        queue: QueueConsumer,
        liveness: LivenessFlag,
        shutdown: watch::Receiver<bool>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let session = Self {
            connector,
            config,
            queue,
            liveness,
            shutdown,
            event_tx,
            fsm: LinkStateMachine::new(),
        };

        (session, event_rx)
    }

    /// Run the session on its own task
    pub fn spawn(self) -> JoinHandle<StopReason> {
        tokio::spawn(self.run())
    }

    /// Main loop with reconnection logic; returns once the session is stopped
    pub async fn run(mut self) -> StopReason {
        let mut reconnect_delay = self.config.reconnect_delay;
        info!("Transport session starting, executor at {}", self.connector.target());

        loop {
            let stop_requested = *self.shutdown.borrow();
            if stop_requested {
                return self.stop(StopReason::Terminated);
            }

            self.transition(LinkEvent::ConnectStarted);
            self.emit(SessionEvent::Connecting {
                target: self.connector.target().to_string(),
            });

            let attempt = tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut self.shutdown) => None,
                result = self.connector.connect() => Some(result),
            };

            let stream = match attempt {
                None => return self.stop(StopReason::Terminated),
                Some(Ok(stream)) => stream,
                Some(Err(e)) => {
                    self.liveness.mark_down();
                    self.transition(LinkEvent::IoFailed);
                    warn!(
                        "Connection to executor failed: {:#}, retrying in {:?}",
                        e, reconnect_delay
                    );
                    self.emit(SessionEvent::ConnectionFailed {
                        reason: e.to_string(),
                    });

                    if self.pause(reconnect_delay).await {
                        return self.stop(StopReason::Terminated);
                    }

                    // Exponential backoff
                    reconnect_delay =
                        std::cmp::min(reconnect_delay * 2, self.config.max_reconnect_delay);
                    continue;
                }
            };

            reconnect_delay = self.config.reconnect_delay;
            self.transition(LinkEvent::ConnectSucceeded);
            self.liveness.mark_up();
            info!(
                "Connected to executor at {} (connection #{})",
                self.connector.target(),
                self.fsm.connects()
            );
            self.emit(SessionEvent::Connected);

            match self.drive(stream).await {
                LinkOutcome::Stopped(reason) => return self.stop(reason),
                LinkOutcome::Failed(reason) => {
                    self.liveness.mark_down();
                    self.transition(LinkEvent::IoFailed);
                    warn!("Disconnected from executor: {}", reason);
                    self.emit(SessionEvent::Disconnected { reason });

                    if self.pause(reconnect_delay).await {
                        return self.stop(StopReason::Terminated);
                    }
                }
            }
        }
    }

    /// Handle an established connection until it fails or the session stops
    async fn drive(&mut self, stream: C::Stream) -> LinkOutcome {
        let (mut reader, mut writer) = tokio::io::split(stream);
        let mut decoder = FrameDecoder::new();
        let mut read_buf = vec![0u8; self.config.read_buffer.max(1)];

        let outcome = loop {
            tokio::select! {
                biased;

                _ = wait_for_shutdown(&mut self.shutdown) => {
                    break LinkOutcome::Stopped(StopReason::Terminated);
                }

                // Send queued commands
                item = self.queue.dequeue() => {
                    let command = match item {
                        QueueItem::Close => break LinkOutcome::Stopped(StopReason::CloseSentinel),
                        QueueItem::Command(command) => command,
                    };

                    let frame = codec::encode(command);
                    let written = tokio::select! {
                        biased;
                        _ = wait_for_shutdown(&mut self.shutdown) => None,
                        result = writer.write_all(&frame) => Some(result),
                    };

                    // At-most-once: the in-flight command is not requeued
                    match written {
                        None => {
                            warn!("Dropping command '{}', terminated mid-write", command);
                            self.emit(SessionEvent::Dropped(command));
                            break LinkOutcome::Stopped(StopReason::Terminated);
                        }
                        Some(Err(e)) => {
                            warn!("Dropping command '{}' after write failure", command);
                            self.emit(SessionEvent::Dropped(command));
                            break LinkOutcome::Failed(format!("Write error: {}", e));
                        }
                        Some(Ok(())) => {}
                    }

                    info!("Sent command to executor: {}", command);
                    self.emit(SessionEvent::Sent(command));
                }

                // Read executor replies
                result = reader.read(&mut read_buf) => {
                    match result {
                        Ok(0) => break LinkOutcome::Failed("Executor closed connection".into()),
                        Ok(n) => {
                            decoder.extend(&read_buf[..n]);
                            loop {
                                match decoder.decode_next() {
                                    Ok(Some(reply)) => {
                                        debug!("Executor replied: {}", reply);
                                        self.emit(SessionEvent::Reply(reply));
                                    }
                                    Ok(None) => break,
                                    Err(e) => warn!("Undecodable reply from executor: {}", e),
                                }
                            }
                        }
                        Err(e) => break LinkOutcome::Failed(format!("Read error: {}", e)),
                    }
                }
            }
        };

        if let LinkOutcome::Stopped(_) = outcome {
            let mut stream = reader.unsplit(writer);
            if let Err(e) = TransportStream::shutdown(&mut stream).await {
                debug!("Socket shutdown failed: {}", e);
            }
        }

        outcome
    }

    /// Sleep before the next connect attempt; true if terminated meanwhile
    async fn pause(&mut self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut self.shutdown) => true,
            _ = tokio::time::sleep(delay) => false,
        }
    }

    fn stop(&mut self, reason: StopReason) -> StopReason {
        self.transition(reason.into());
        self.liveness.mark_down();

        let discarded = self.queue.discard_pending();
        if discarded > 0 {
            info!("Discarded {} pending commands", discarded);
        }

        info!("Transport session stopped: {}", reason);
        self.emit(SessionEvent::Stopped { reason });
        reason
    }

    fn transition(&mut self, event: LinkEvent) {
        match self.fsm.process_event(event) {
            TransitionResult::Success(state) => debug!("Link state: {}", state),
            TransitionResult::Invalid { from, event } => {
                warn!("Ignoring link event {:?} in state {}", event, from)
            }
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Current link state
    pub fn state(&self) -> LinkState {
        self.fsm.state()
    }
}

/// Resolves once the termination signal is raised; never if its sender is gone
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    let raised = shutdown.wait_for(|stop| *stop).await.is_ok();
    if !raised {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{command_queue, CommandQueue};
    use crate::transport::TcpConnector;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::io;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn fast_config() -> SessionConfig {
        SessionConfig {
            reconnect_delay: Duration::from_millis(10),
            max_reconnect_delay: Duration::from_millis(50),
            read_buffer: 1024,
        }
    }

    struct Harness {
        queue: CommandQueue,
        liveness: LivenessFlag,
        shutdown: watch::Sender<bool>,
        events: mpsc::UnboundedReceiver<SessionEvent>,
        handle: JoinHandle<StopReason>,
    }

    fn start<C: TransportConnector>(connector: C) -> Harness {
        let (queue, consumer) = command_queue();
        let liveness = LivenessFlag::new();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (session, events) = TransportSession::new(
            connector,
            fast_config(),
            consumer,
            liveness.clone(),
            shutdown_rx,
        );
        assert_eq!(session.state(), LinkState::Disconnected);

        Harness {
            queue,
            liveness,
            shutdown,
            events,
            handle: session.spawn(),
        }
    }

    fn tcp(addr: &str) -> TcpConnector {
        TcpConnector::new(addr, Duration::from_secs(1))
    }

    async fn wait_event(
        events: &mut mpsc::UnboundedReceiver<SessionEvent>,
        want: impl Fn(&SessionEvent) -> bool,
    ) -> SessionEvent {
        timeout(WAIT, async {
            loop {
                let event = events.recv().await.expect("event channel closed");
                if want(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("timed out waiting for session event")
    }

    /// Read frames from the peer until `count` arrive or the peer closes
    async fn read_frames(socket: &mut TcpStream, count: usize) -> Vec<String> {
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        let mut buf = [0u8; 256];

        while frames.len() < count {
            let n = timeout(WAIT, socket.read(&mut buf))
                .await
                .expect("timed out reading frames")
                .expect("read failed");
            if n == 0 {
                break;
            }
            decoder.extend(&buf[..n]);
            while let Some(frame) = decoder.decode_next().expect("bad frame") {
                frames.push(frame);
            }
        }
        frames
    }

    #[tokio::test]
    async fn test_commands_arrive_in_enqueue_order() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let h = start(tcp(&addr));

        let order = [
            Command::VolumeUp,
            Command::AltTab,
            Command::VolumeDown,
            Command::ScrollUp,
            Command::OpenCalculator,
        ];
        for cmd in order {
            h.queue.enqueue(cmd);
        }

        let (mut socket, _) = listener.accept().await.unwrap();
        let frames = read_frames(&mut socket, order.len()).await;
        let expected: Vec<String> = order.iter().map(|c| c.to_string()).collect();
        assert_eq!(frames, expected);

        h.queue.close();
        let reason = timeout(WAIT, h.handle).await.unwrap().unwrap();
        assert_eq!(reason, StopReason::CloseSentinel);
    }

    #[tokio::test]
    async fn test_close_sentinel_stops_before_later_commands() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let mut h = start(tcp(&addr));

        h.queue.enqueue(Command::PlayPause);
        h.queue.close();
        h.queue.enqueue(Command::Screenshot);

        let (mut socket, _) = listener.accept().await.unwrap();

        // The session shuts the socket down, so reading runs to EOF
        let frames = read_frames(&mut socket, usize::MAX).await;
        assert_eq!(frames, vec!["PlayPause".to_string()]);

        let reason = timeout(WAIT, h.handle).await.unwrap().unwrap();
        assert_eq!(reason, StopReason::CloseSentinel);
        wait_event(&mut h.events, |e| {
            *e == SessionEvent::Stopped {
                reason: StopReason::CloseSentinel,
            }
        })
        .await;
    }

    #[tokio::test]
    async fn test_liveness_follows_peer_close_and_reconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let mut h = start(tcp(&addr));

        let (socket, _) = listener.accept().await.unwrap();
        wait_event(&mut h.events, |e| *e == SessionEvent::Connected).await;
        assert!(h.liveness.is_up());

        // Executor goes away
        drop(socket);
        wait_event(&mut h.events, |e| {
            matches!(e, SessionEvent::Disconnected { .. })
        })
        .await;
        assert!(!h.liveness.is_up());

        // Listener is still there, so the session comes back
        let (mut socket, _) = listener.accept().await.unwrap();
        wait_event(&mut h.events, |e| *e == SessionEvent::Connected).await;
        assert!(h.liveness.is_up());

        h.queue.enqueue(Command::TaskManager);
        let frames = read_frames(&mut socket, 1).await;
        assert_eq!(frames, vec!["Task Manager".to_string()]);

        h.shutdown.send(true).unwrap();
        let reason = timeout(WAIT, h.handle).await.unwrap().unwrap();
        assert_eq!(reason, StopReason::Terminated);
    }

    #[tokio::test]
    async fn test_retries_until_executor_appears() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut h = start(tcp(&addr.to_string()));
        h.queue.enqueue(Command::VolumeUp);

        wait_event(&mut h.events, |e| {
            matches!(e, SessionEvent::ConnectionFailed { .. })
        })
        .await;
        assert!(!h.liveness.is_up());

        // Commands queued while disconnected are sent after the connect
        let listener = TcpListener::bind(addr).await.unwrap();
        let (mut socket, _) = listener.accept().await.unwrap();
        let frames = read_frames(&mut socket, 1).await;
        assert_eq!(frames, vec!["Volume Up".to_string()]);
        assert!(h.liveness.is_up());

        h.queue.close();
        timeout(WAIT, h.handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_termination_while_disconnected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let mut h = start(tcp(&addr));
        h.queue.enqueue(Command::AltTab);
        wait_event(&mut h.events, |e| {
            matches!(e, SessionEvent::ConnectionFailed { .. })
        })
        .await;

        h.shutdown.send(true).unwrap();
        let reason = timeout(WAIT, h.handle).await.unwrap().unwrap();
        assert_eq!(reason, StopReason::Terminated);
        assert!(!h.liveness.is_up());
    }

    #[tokio::test]
    async fn test_replies_are_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let mut h = start(tcp(&addr));

        let (mut socket, _) = listener.accept().await.unwrap();
        socket.write_all(b"Volume increased|Calc").await.unwrap();
        socket.write_all(b"ulator opened|").await.unwrap();

        let first = wait_event(&mut h.events, |e| matches!(e, SessionEvent::Reply(_))).await;
        assert_eq!(first, SessionEvent::Reply("Volume increased".into()));
        let second = wait_event(&mut h.events, |e| matches!(e, SessionEvent::Reply(_))).await;
        assert_eq!(second, SessionEvent::Reply("Calculator opened".into()));

        h.queue.close();
        timeout(WAIT, h.handle).await.unwrap().unwrap();
    }

    /// Stream whose writes always fail and whose reads never complete
    struct BrokenPipeStream;

    impl AsyncRead for BrokenPipeStream {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Pending
        }
    }

    impl AsyncWrite for BrokenPipeStream {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[async_trait]
    impl TransportStream for BrokenPipeStream {
        async fn shutdown(&mut self) -> Result<()> {
            Ok(())
        }
    }

    struct BrokenPipeConnector {
        connects: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TransportConnector for BrokenPipeConnector {
        type Stream = BrokenPipeStream;

        async fn connect(&self) -> Result<Self::Stream> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(BrokenPipeStream)
        }

        fn target(&self) -> &str {
            "broken-pipe"
        }
    }

    #[tokio::test]
    async fn test_failed_write_drops_command_without_retry() {
        let connects = Arc::new(AtomicUsize::new(0));
        let mut h = start(BrokenPipeConnector {
            connects: connects.clone(),
        });

        h.queue.enqueue(Command::VolumeUp);
        h.queue.enqueue(Command::VolumeDown);

        let mut dropped = Vec::new();
        while dropped.len() < 2 {
            if let SessionEvent::Dropped(cmd) = wait_event(&mut h.events, |e| {
                matches!(e, SessionEvent::Dropped(_) | SessionEvent::Sent(_))
            })
            .await
            {
                dropped.push(cmd);
            }
        }

        // Each command is lost exactly once, on its own connection
        assert_eq!(dropped, vec![Command::VolumeUp, Command::VolumeDown]);
        wait_event(&mut h.events, |e| {
            matches!(e, SessionEvent::Disconnected { .. })
        })
        .await;
        assert!(connects.load(Ordering::SeqCst) >= 2);

        h.shutdown.send(true).unwrap();
        let reason = timeout(WAIT, h.handle).await.unwrap().unwrap();
        assert_eq!(reason, StopReason::Terminated);
    }

    /// Stream that never accepts a byte, like a peer with a full receive window
    struct StalledStream;

    impl AsyncRead for StalledStream {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Pending
        }
    }

    impl AsyncWrite for StalledStream {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Pending
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Pending
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Pending
        }
    }

    #[async_trait]
    impl TransportStream for StalledStream {
        async fn shutdown(&mut self) -> Result<()> {
            Ok(())
        }
    }

    struct StalledConnector;

    #[async_trait]
    impl TransportConnector for StalledConnector {
        type Stream = StalledStream;

        async fn connect(&self) -> Result<Self::Stream> {
            Ok(StalledStream)
        }

        fn target(&self) -> &str {
            "stalled"
        }
    }

    #[tokio::test]
    async fn test_termination_interrupts_stalled_write() {
        let mut h = start(StalledConnector);
        wait_event(&mut h.events, |e| *e == SessionEvent::Connected).await;

        h.queue.enqueue(Command::Screenshot);
        // Let the session pick the command up and block in the write
        tokio::time::sleep(Duration::from_millis(50)).await;

        h.shutdown.send(true).unwrap();
        let reason = timeout(WAIT, h.handle).await.unwrap().unwrap();
        assert_eq!(reason, StopReason::Terminated);

        let dropped = wait_event(&mut h.events, |e| {
            matches!(e, SessionEvent::Dropped(_) | SessionEvent::Sent(_))
        })
        .await;
        assert_eq!(dropped, SessionEvent::Dropped(Command::Screenshot));
        assert!(!h.liveness.is_up());
    }
}
