//! Command socket task
//!
//! Accepts one client connection at a time on a Unix stream socket and
//! answers each newline-terminated request with one reply line, in order.
//! Undecodable lines get a `malformed` error reply and the connection
//! stays open.

use std::fs::{self, Permissions};
use std::io;
use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::path::Path;
use std::sync::Arc;

use log::{debug, info, trace, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};

use kiln_core::traits::{HeaterOutput, TemperatureSensor};
use kiln_protocol::{Command, ErrorKind, LineParser, Response};

use crate::processor::CommandProcessor;

/// Buffer size for socket reads
const RX_BUF_SIZE: usize = 1024;

/// Bind the command socket, replacing a stale socket file left by an
/// earlier process, and apply the permission bits
pub fn bind_socket(path: &Path, mode: u32) -> io::Result<UnixListener> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {
            debug!("removing stale socket {}", path.display());
            fs::remove_file(path)?;
        }
        Ok(_) => {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} exists and is not a socket", path.display()),
            ));
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let listener = UnixListener::bind(path)?;
    fs::set_permissions(path, Permissions::from_mode(mode))?;
    info!("listening on {} (mode {:o})", path.display(), mode);
    Ok(listener)
}

/// Serve clients until the listener fails
pub async fn server_task<S, H>(
    listener: UnixListener,
    processor: Arc<CommandProcessor<S, H>>,
) -> io::Result<()>
where
    S: TemperatureSensor + Send + 'static,
    H: HeaterOutput + Send + 'static,
{
    loop {
        let (stream, _) = listener.accept().await?;
        debug!("client connected");
        if let Err(e) = serve_connection(stream, &processor).await {
            warn!("client connection failed: {}", e);
        }
        debug!("client disconnected");
    }
}

async fn serve_connection<S, H>(
    stream: UnixStream,
    processor: &CommandProcessor<S, H>,
) -> io::Result<()>
where
    S: TemperatureSensor + Send + 'static,
    H: HeaterOutput + Send + 'static,
{
    let (mut rx, mut tx) = stream.into_split();
    let mut parser = LineParser::new();
    let mut buf = [0u8; RX_BUF_SIZE];

    loop {
        let n = rx.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        trace!("RX: {} bytes", n);

        for record in parser.feed_bytes(&buf[..n]) {
            let response = match record.map(|line| Command::from_line(&line)) {
                Ok(Ok(command)) => {
                    debug!("command: {}", command.kind());
                    processor.handle(command).await
                }
                Ok(Err(e)) => Response::error(None, ErrorKind::Malformed, e),
                Err(e) => Response::error(None, ErrorKind::Malformed, e),
            };

            let mut line = response
                .to_line()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            line.push('\n');
            tx.write_all(line.as_bytes()).await?;
        }
    }
}
