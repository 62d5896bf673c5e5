//! Recognition sources feeding the gesture dispatcher
//!
//! The vision model runs elsewhere; it only has to produce one label per
//! processed frame. The client ships a line-oriented source so a recognizer
//! process can pipe labels into stdin.

use crate::gesture::{GestureDispatcher, Recognition};
use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tracing::{info, warn};

/// Producer of raw recognizer labels
#[async_trait]
pub trait RecognitionSource: Send + 'static {
    /// Next raw label, or `None` once the source is exhausted
    async fn next_label(&mut self) -> Result<Option<String>>;
}

/// One label per line from any async reader
pub struct LineSource<R> {
    lines: Lines<BufReader<R>>,
}

impl<R: AsyncRead + Unpin + Send + 'static> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
        }
    }
}

impl LineSource<tokio::io::Stdin> {
    pub fn stdin() -> Self {
        Self::new(tokio::io::stdin())
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send + 'static> RecognitionSource for LineSource<R> {
    async fn next_label(&mut self) -> Result<Option<String>> {
        Ok(self.lines.next_line().await?)
    }
}

/// Feed every label from `source` to the dispatcher until the source ends
pub async fn run_recognition<S: RecognitionSource>(mut source: S, mut dispatcher: GestureDispatcher) {
    info!("Gesture recognition started");

    loop {
        let raw = match source.next_label().await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                info!("Recognition source finished");
                break;
            }
            Err(e) => {
                warn!("Recognition source failed: {:#}", e);
                break;
            }
        };

        match Recognition::parse(&raw) {
            Ok(recognition) => {
                dispatcher.on_recognition(recognition).await;
            }
            Err(e) => warn!("{}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::{GestureLabel, LastGesture, Mapping, SharedMapping};
    use crate::queue::{command_queue, QueueItem};
    use gesture_bridge_shared::Command;

    #[tokio::test]
    async fn test_line_source_yields_lines() {
        let mut source = LineSource::new(&b"Thumb_Up\nNone\n"[..]);
        assert_eq!(source.next_label().await.unwrap().as_deref(), Some("Thumb_Up"));
        assert_eq!(source.next_label().await.unwrap().as_deref(), Some("None"));
        assert_eq!(source.next_label().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_run_recognition_skips_unknown_labels() {
        let mapping: Mapping = [(GestureLabel::ClosedFist, Command::PlayPause)]
            .into_iter()
            .collect();
        let (queue, mut consumer) = command_queue();
        let dispatcher =
            GestureDispatcher::new(SharedMapping::new(mapping), queue, LastGesture::new(), 2);

        // "Jazz_Hands" is rejected before it reaches the dispatcher's counter
        let input: &'static [u8] = b"Closed_Fist\nJazz_Hands\nClosed_Fist\nNone\nNone\n";
        run_recognition(LineSource::new(input), dispatcher).await;

        assert_eq!(consumer.dequeue().await, QueueItem::Command(Command::PlayPause));
        assert_eq!(consumer.discard_pending(), 0);
    }
}
