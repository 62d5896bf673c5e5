//! Individual client session handling

use crate::command::{CommandExecutor, CommandOutcome, ConnectionState};
use crate::config::FrameMode;
use crate::server::wait_for_shutdown;
use bytes::BytesMut;
use gesture_bridge_shared::codec::{self, FrameDecoder};
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Active client session
pub struct ClientSession<S> {
    stream: S,
    addr: SocketAddr,
    executor: CommandExecutor,
    mode: FrameMode,
    reply_enabled: bool,
    read_buf: BytesMut,
    chunk_size: usize,
    decoder: FrameDecoder,
    state: ConnectionState,
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> ClientSession<S> {
    pub fn new(
        stream: S,
        addr: SocketAddr,
        executor: CommandExecutor,
        mode: FrameMode,
        reply_enabled: bool,
        chunk_size: usize,
    ) -> Self {
        let chunk_size = chunk_size.max(1);

        Self {
            stream,
            addr,
            executor,
            mode,
            reply_enabled,
            read_buf: BytesMut::with_capacity(chunk_size),
            chunk_size,
            decoder: FrameDecoder::new(),
            state: ConnectionState::new(),
        }
    }

    /// Serve the client until it disconnects or shutdown is signalled
    ///
    /// Returns the number of frames handled.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> usize {
        let mut handled = 0;

        loop {
            self.read_buf.clear();
            self.read_buf.reserve(self.chunk_size);

            let n = tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => {
                    debug!("[{}] Closing for shutdown", self.addr);
                    break;
                }
                result = self.stream.read_buf(&mut self.read_buf) => match result {
                    Ok(0) => {
                        info!("[{}] Client disconnected", self.addr);
                        break;
                    }
                    Ok(n) => n,
                    Err(e) => {
                        warn!("[{}] Read error: {}", self.addr, e);
                        break;
                    }
                },
            };

            for frame in self.frames(n) {
                handled += 1;
                info!("[{}] Received: {}", self.addr, frame);

                let outcome = self.executor.execute(&frame, &mut self.state).await;
                match &outcome {
                    CommandOutcome::Executed(text) => info!("[{}] Response: {}", self.addr, text),
                    CommandOutcome::Suppressed(text) => info!("[{}] {}", self.addr, text),
                    CommandOutcome::Unknown(text) | CommandOutcome::Failed(text) => {
                        warn!("[{}] {}", self.addr, text)
                    }
                }

                if self.reply_enabled {
                    let written = tokio::select! {
                        biased;
                        _ = wait_for_shutdown(&mut shutdown) => {
                            debug!("[{}] Shutdown while replying", self.addr);
                            return handled;
                        }
                        result = self.reply(&outcome) => result,
                    };
                    if let Err(e) = written {
                        warn!("[{}] Write error: {}", self.addr, e);
                        return handled;
                    }
                }
            }
        }

        handled
    }

    /// Frames contained in the last read of `n` bytes
    fn frames(&mut self, n: usize) -> Vec<String> {
        let chunk = &self.read_buf[..n];

        match self.mode {
            FrameMode::FirstToken => match codec::first_token(chunk) {
                Ok(token) => token.into_iter().collect(),
                Err(e) => {
                    warn!("[{}] Failed to decode data: {}", self.addr, e);
                    Vec::new()
                }
            },
            FrameMode::Buffered => {
                self.decoder.extend(chunk);
                let mut frames = Vec::new();
                loop {
                    match self.decoder.decode_next() {
                        Ok(Some(frame)) => frames.push(frame),
                        Ok(None) => break,
                        Err(e) => warn!("[{}] Failed to decode data: {}", self.addr, e),
                    }
                }
                frames
            }
        }
    }

    async fn reply(&mut self, outcome: &CommandOutcome) -> std::io::Result<()> {
        match codec::encode_text(outcome.response()) {
            Ok(frame) => self.stream.write_all(&frame).await,
            Err(e) => {
                debug!("[{}] Response not sendable: {}", self.addr, e);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::testing::RecordingActions;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::DuplexStream;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn addr() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    fn session(
        actions: &Arc<RecordingActions>,
        mode: FrameMode,
        reply: bool,
    ) -> (ClientSession<DuplexStream>, DuplexStream) {
        let (server, client) = tokio::io::duplex(4096);
        let executor = CommandExecutor::new(actions.clone());
        (
            ClientSession::new(server, addr(), executor, mode, reply, 1024),
            client,
        )
    }

    async fn run_with_input(
        actions: &Arc<RecordingActions>,
        mode: FrameMode,
        input: &[u8],
    ) -> (usize, Vec<u8>) {
        let (session, mut client) = session(actions, mode, true);
        let (_tx, rx) = watch::channel(false);

        client.write_all(input).await.unwrap();
        let handle = tokio::spawn(session.run(rx));
        client.shutdown().await.unwrap();

        let mut replies = Vec::new();
        timeout(WAIT, client.read_to_end(&mut replies))
            .await
            .unwrap()
            .unwrap();
        let handled = timeout(WAIT, handle).await.unwrap().unwrap();
        (handled, replies)
    }

    #[tokio::test]
    async fn test_buffered_mode_executes_every_coalesced_frame() {
        let actions = Arc::new(RecordingActions::with_volume(50));

        let (handled, replies) = run_with_input(
            &actions,
            FrameMode::Buffered,
            b"Volume Up|Screenshot|Scroll Up|",
        )
        .await;

        assert_eq!(handled, 3);
        assert_eq!(
            actions.calls(),
            vec!["set_volume 60", "screenshot", "scroll 120"]
        );
        assert_eq!(
            String::from_utf8(replies).unwrap(),
            "Volume increased|Screenshot key (Print Screen) sent|Mouse scrolled up|"
        );
    }

    #[tokio::test]
    async fn test_first_token_mode_keeps_only_first_frame_of_a_read() {
        let actions = Arc::new(RecordingActions::with_volume(50));

        let (handled, _) = run_with_input(
            &actions,
            FrameMode::FirstToken,
            b"Volume Up|Screenshot|Scroll Up|",
        )
        .await;

        assert_eq!(handled, 1);
        assert_eq!(actions.calls(), vec!["set_volume 60"]);
    }

    #[tokio::test]
    async fn test_split_frame_is_reassembled() {
        let actions = Arc::new(RecordingActions::default());
        let (session, mut client) = session(&actions, FrameMode::Buffered, false);
        let (_tx, rx) = watch::channel(false);
        let handle = tokio::spawn(session.run(rx));

        client.write_all(b"Play").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        client.write_all(b"Pause|").await.unwrap();
        client.shutdown().await.unwrap();

        assert_eq!(timeout(WAIT, handle).await.unwrap().unwrap(), 1);
        assert_eq!(actions.calls(), vec!["play_pause"]);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_skipped() {
        let actions = Arc::new(RecordingActions::default());

        let (handled, replies) =
            run_with_input(&actions, FrameMode::Buffered, b"\xff\xfe|AltTab|").await;

        assert_eq!(handled, 1);
        assert_eq!(String::from_utf8(replies).unwrap(), "Alt+Tab sent|");
    }

    #[tokio::test]
    async fn test_unknown_command_gets_diagnostic_reply() {
        let actions = Arc::new(RecordingActions::default());

        let (_, replies) = run_with_input(&actions, FrameMode::Buffered, b"Jump|").await;

        assert_eq!(String::from_utf8(replies).unwrap(), "Unknown command: Jump|");
        assert!(actions.calls().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_ends_idle_session() {
        let actions = Arc::new(RecordingActions::default());
        let (session, _client) = session(&actions, FrameMode::Buffered, true);
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(session.run(rx));

        tx.send_replace(true);
        assert_eq!(timeout(WAIT, handle).await.unwrap().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_blocked_reply() {
        let actions = Arc::new(RecordingActions::default());
        // Room for the command but not for the reply; the client never reads
        let (server, mut client) = tokio::io::duplex(16);
        let executor = CommandExecutor::new(actions.clone());
        let session = ClientSession::new(server, addr(), executor, FrameMode::Buffered, true, 1024);
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(session.run(rx));

        client.write_all(b"Screenshot|").await.unwrap();
        timeout(WAIT, async {
            while actions.calls().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        tx.send_replace(true);
        assert_eq!(timeout(WAIT, handle).await.unwrap().unwrap(), 1);
    }
}
