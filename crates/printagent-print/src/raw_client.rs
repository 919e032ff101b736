// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw TCP print client (JetDirect, port 9100).
//
// Open a TCP socket and stream the file.  No settings, no job tracking: the
// printer must understand the document format natively.  Messages are the
// ones shown to the operator, so they are kept in the desk's language.

use std::future::Future;
use std::io;
use std::path::Path;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, instrument, warn};

use printagent_core::error::{AgentError, Result};
use printagent_core::types::{ConnectionCheck, ConnectionStatus, OperationResult};

/// Size of each socket write.
const CHUNK_SIZE: usize = 8192;

/// Check whether a RAW printer accepts TCP connections.  Never fails: every
/// outcome is reported as a `ConnectionCheck`.
#[instrument(skip(timeout))]
pub async fn check_connection(host: &str, port: u16, timeout: Duration) -> ConnectionCheck {
    check_with(TcpStream::connect((host, port)), timeout).await
}

async fn check_with<S, C>(connect: C, timeout: Duration) -> ConnectionCheck
where
    S: AsyncWrite + Unpin,
    C: Future<Output = io::Result<S>>,
{
    match tokio::time::timeout(timeout, connect).await {
        Ok(Ok(mut stream)) => {
            let _ = stream.shutdown().await;
            info!("printer is reachable");
            ConnectionCheck {
                status: ConnectionStatus::Online,
                message: "Соединение успешно установлено".into(),
            }
        }
        Ok(Err(e)) => {
            warn!(error = %e, "printer connection failed");
            ConnectionCheck {
                status: ConnectionStatus::Offline,
                message: format!("Ошибка соединения: {e}"),
            }
        }
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "printer connection timed out");
            ConnectionCheck {
                status: ConnectionStatus::Offline,
                message: "Таймаут соединения".into(),
            }
        }
    }
}

/// Stream a file to a RAW printer in 8 KiB chunks.  Single attempt.
#[instrument(skip(path, timeout), fields(path = %path.display()))]
pub async fn send_file(path: &Path, host: &str, port: u16, timeout: Duration) -> Result<OperationResult> {
    let file = File::open(path)
        .await
        .map_err(|_| AgentError::File(format!("Файл не найден: {}", path.display())))?;
    stream_file(file, TcpStream::connect((host, port)), timeout).await
}

/// Connect, then copy `file` to the stream.  Every network step is bounded
/// by `timeout`.
async fn stream_file<S, C>(mut file: File, connect: C, timeout: Duration) -> Result<OperationResult>
where
    S: AsyncWrite + Unpin,
    C: Future<Output = io::Result<S>>,
{
    let mut stream = tokio::time::timeout(timeout, connect)
        .await
        .map_err(|_| AgentError::Timeout("Таймаут соединения с принтером".into()))?
        .map_err(|e| AgentError::Connection(format!("Ошибка соединения с принтером: {e}")))?;

    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut sent: u64 = 0;
    loop {
        let read = file
            .read(&mut buffer)
            .await
            .map_err(|e| AgentError::File(format!("Ошибка чтения файла: {e}")))?;
        if read == 0 {
            break;
        }

        tokio::time::timeout(timeout, stream.write_all(&buffer[..read]))
            .await
            .map_err(|_| AgentError::Timeout("Таймаут соединения с принтером".into()))?
            .map_err(|e| AgentError::Connection(format!("Ошибка соединения с принтером: {e}")))?;

        sent += read as u64;
        debug!(sent, "raw chunk sent");
    }

    // Flushing and shutting down tells the printer the job is complete.
    tokio::time::timeout(timeout, async {
        stream.flush().await?;
        stream.shutdown().await
    })
    .await
    .map_err(|_| AgentError::Timeout("Таймаут соединения с принтером".into()))?
    .map_err(|e| AgentError::Connection(format!("Ошибка соединения с принтером: {e}")))?;

    info!(bytes = sent, "raw print complete");
    Ok(OperationResult::ok("Файл успешно отправлен на принтер"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    const TIMEOUT: Duration = Duration::from_secs(3);

    async fn listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        (listener, port)
    }

    /// A port with nothing listening on it.
    async fn closed_port() -> u16 {
        let (listener, port) = listener().await;
        drop(listener);
        port
    }

    #[tokio::test]
    async fn check_reports_online() {
        let (listener, port) = listener().await;
        let accept = tokio::spawn(async move { listener.accept().await.map(|_| ()) });

        let check = check_connection("127.0.0.1", port, TIMEOUT).await;
        assert_eq!(check.status, ConnectionStatus::Online);
        assert_eq!(check.message, "Соединение успешно установлено");
        accept.await.expect("join").expect("accept");
    }

    #[tokio::test]
    async fn check_reports_offline_on_refused() {
        let port = closed_port().await;
        let check = check_connection("127.0.0.1", port, TIMEOUT).await;
        assert_eq!(check.status, ConnectionStatus::Offline);
        assert!(check.message.starts_with("Ошибка соединения: "));
    }

    #[tokio::test]
    async fn sends_whole_file_in_chunks() {
        let (listener, port) = listener().await;
        let receiver = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut received = Vec::new();
            socket.read_to_end(&mut received).await.expect("read");
            received
        });

        let payload: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        let mut file = tempfile::NamedTempFile::new().expect("temp");
        std::io::Write::write_all(&mut file, &payload).expect("write");

        let result = send_file(file.path(), "127.0.0.1", port, TIMEOUT).await.expect("send");
        assert!(result.success);
        assert_eq!(result.message, "Файл успешно отправлен на принтер");
        assert_eq!(receiver.await.expect("join"), payload);
    }

    #[tokio::test]
    async fn empty_file_succeeds() {
        let (listener, port) = listener().await;
        let receiver = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut received = Vec::new();
            socket.read_to_end(&mut received).await.expect("read");
            received.len()
        });

        let file = tempfile::NamedTempFile::new().expect("temp");
        let result = send_file(file.path(), "127.0.0.1", port, TIMEOUT).await.expect("send");
        assert!(result.success);
        assert_eq!(receiver.await.expect("join"), 0);
    }

    #[tokio::test]
    async fn connection_error_message() {
        let port = closed_port().await;
        let file = tempfile::NamedTempFile::new().expect("temp");
        let err = send_file(file.path(), "127.0.0.1", port, TIMEOUT)
            .await
            .expect_err("refused");
        assert!(err.to_string().starts_with("Ошибка соединения с принтером: "));
    }

    #[tokio::test]
    async fn check_times_out_within_window() {
        let window = Duration::from_millis(100);
        let started = std::time::Instant::now();
        let check = check_with(std::future::pending::<io::Result<TcpStream>>(), window).await;
        let elapsed = started.elapsed();

        assert_eq!(check.status, ConnectionStatus::Offline);
        assert_eq!(check.message, "Таймаут соединения");
        assert!(elapsed >= window, "gave up early: {elapsed:?}");
        assert!(elapsed < Duration::from_secs(2), "overran the window: {elapsed:?}");
    }

    #[tokio::test]
    async fn send_times_out_on_connect() {
        let file = tempfile::NamedTempFile::new().expect("temp");
        let file = File::open(file.path()).await.expect("open");
        let err = stream_file(
            file,
            std::future::pending::<io::Result<TcpStream>>(),
            Duration::from_millis(100),
        )
        .await
        .expect_err("timeout");
        assert!(matches!(err, AgentError::Timeout(_)));
        assert_eq!(err.to_string(), "Таймаут соединения с принтером");
    }

    #[tokio::test]
    async fn send_times_out_when_printer_stops_reading() {
        let mut source = tempfile::NamedTempFile::new().expect("temp");
        std::io::Write::write_all(&mut source, &[0x1b; 4096]).expect("write");
        let file = File::open(source.path()).await.expect("open");

        // The peer end is kept open but never read, so writes stall once the
        // pipe buffer is full.
        let (client, _printer) = tokio::io::duplex(64);
        let err = stream_file(file, std::future::ready(Ok(client)), Duration::from_millis(100))
            .await
            .expect_err("timeout");
        assert_eq!(err.to_string(), "Таймаут соединения с принтером");
    }

    #[tokio::test]
    async fn missing_file_message() {
        let err = send_file(Path::new("/no/such/job.pdf"), "127.0.0.1", 9100, TIMEOUT)
            .await
            .expect_err("missing");
        assert_eq!(err.to_string(), "Файл не найден: /no/such/job.pdf");
    }
}
