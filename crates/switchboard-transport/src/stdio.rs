//! Newline-delimited JSON over a pair of async byte streams.

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::channel::{Channel, MessageListener};

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// One message per line in each direction.
///
/// Reading starts when a listener subscribes; end of input drops that
/// listener. The writer task returned by [`LineChannel::new`] finishes once
/// every clone of the channel's sender is gone and pending lines are written.
pub struct LineChannel {
    reader: Mutex<Option<BoxedReader>>,
    outbound_tx: mpsc::UnboundedSender<String>,
}

impl LineChannel {
    pub fn new<R, W>(reader: R, writer: W) -> (Self, JoinHandle<()>)
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let writer_task = tokio::spawn(write_lines(writer, outbound_rx));
        let channel = Self {
            reader: Mutex::new(Some(Box::new(reader))),
            outbound_tx,
        };
        (channel, writer_task)
    }

    /// Channel over the process's stdin and stdout.
    pub fn stdio() -> (Self, JoinHandle<()>) {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

impl Channel for LineChannel {
    fn subscribe(&self, listener: MessageListener) {
        let Some(reader) = self.reader.lock().take() else {
            error!("Line channel already has a subscriber");
            return;
        };
        tokio::spawn(read_lines(reader, listener));
    }

    fn send(&self, text: String) {
        if self.outbound_tx.send(text).is_err() {
            error!("Line channel writer stopped, discarding outbound message");
        }
    }
}

async fn read_lines(reader: BoxedReader, listener: MessageListener) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if !line.trim().is_empty() {
                    listener(line);
                }
            }
            Ok(None) => {
                debug!("Line channel input closed");
                break;
            }
            Err(e) => {
                error!("Failed to read from line channel: {e}");
                break;
            }
        }
    }
}

async fn write_lines<W>(mut writer: W, mut outbound_rx: mpsc::UnboundedReceiver<String>)
where
    W: AsyncWrite + Send + Unpin,
{
    while let Some(text) = outbound_rx.recv().await {
        let written = async {
            writer.write_all(text.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        };
        if let Err(e) = written.await {
            error!("Failed to write to line channel: {e}");
            break;
        }
    }
}
