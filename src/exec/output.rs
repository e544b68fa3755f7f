// src/exec/output.rs

//! Line readers for child stdout / stderr.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::engine::{OutputStream, RuntimeEvent};
use crate::types::JobId;

/// Spawn a task forwarding each line of `reader` as an `OutputLine` event.
///
/// Bytes are decoded lossily so a stray invalid sequence never ends the
/// stream. A final line without a trailing newline is still delivered.
pub fn spawn_reader<R>(
    reader: R,
    job: JobId,
    stream: OutputStream,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = decode_line(&buf);
                    let event = RuntimeEvent::OutputLine { job, stream, line };
                    if runtime_tx.send(event).await.is_err() {
                        debug!(job = %job, "runtime gone; dropping remaining output");
                        break;
                    }
                }
                Err(e) => {
                    debug!(job = %job, ?stream, error = %e, "output stream read failed");
                    break;
                }
            }
        }
    })
}

fn decode_line(bytes: &[u8]) -> String {
    let mut line = String::from_utf8_lossy(bytes).into_owned();
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    line
}
