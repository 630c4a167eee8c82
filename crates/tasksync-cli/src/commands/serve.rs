//! Manual HTTP trigger.
//!
//! One request per connection, handled in accept order, so two triggers
//! never overlap.

use std::future::Future;
use std::time::Duration;

use tasksync_core::{RunSummary, SyncError};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use super::{load_config, reconciler, CliResult};

const TRIGGER_PATH: &str = "/trigger";
/// How long a client gets to send its request line.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_REQUEST_LINE: u64 = 8192;

pub async fn run(bind: Option<String>) -> CliResult {
    let config = load_config()?;
    let addr = bind.unwrap_or_else(|| config.trigger.bind.clone());
    let reconciler = reconciler(&config, false)?;

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, path = TRIGGER_PATH, "listening for manual triggers");

    loop {
        let (mut stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(err) => {
                tracing::warn!(error = %err, "accept failed");
                continue;
            }
        };
        tracing::debug!(%peer, "connection");
        if let Err(err) = respond(&mut stream, || reconciler.run()).await {
            tracing::warn!(%peer, error = %err, "failed to answer trigger");
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Route {
    Trigger,
    NotFound,
}

/// Route on the request line only; headers and body are ignored.
fn route(request: &str) -> Route {
    let Some(first_line) = request.lines().next() else {
        return Route::NotFound;
    };
    let mut parts = first_line.split_whitespace();
    let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
        return Route::NotFound;
    };
    let Ok(url) = url::Url::parse(&format!("http://localhost{target}")) else {
        return Route::NotFound;
    };

    match (method, url.path()) {
        ("GET" | "POST", TRIGGER_PATH) => Route::Trigger,
        _ => Route::NotFound,
    }
}

fn response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

/// Read one request from `stream`, run `trigger` if it targets `/trigger`
/// and write the answer.
async fn respond<S, F, Fut>(stream: &mut S, trigger: F) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<RunSummary, SyncError>>,
{
    let answer = match tokio::time::timeout(REQUEST_TIMEOUT, read_request_line(stream)).await {
        Err(_) => {
            tracing::warn!("client sent no request line in time");
            response("408 Request Timeout", "Request timeout")
        }
        Ok(request) => handle(&request?, trigger).await,
    };

    stream.write_all(answer.as_bytes()).await?;
    stream.shutdown().await
}

/// Read up to the first `\n`, across as many reads as the client needs.
async fn read_request_line<S>(stream: &mut S) -> std::io::Result<String>
where
    S: AsyncRead + Unpin,
{
    let mut reader = BufReader::new((&mut *stream).take(MAX_REQUEST_LINE));
    let mut line = Vec::new();
    reader.read_until(b'\n', &mut line).await?;
    Ok(String::from_utf8_lossy(&line).into_owned())
}

async fn handle<F, Fut>(request: &str, trigger: F) -> String
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<RunSummary, SyncError>>,
{
    match route(request) {
        Route::Trigger => match trigger().await {
            Ok(summary) => {
                tracing::info!(%summary, "manual trigger processed");
                response("200 OK", "Manual trigger processed")
            }
            Err(err) => {
                tracing::error!(error = %err, "manual trigger failed");
                response("500 Internal Server Error", &err.to_string())
            }
        },
        Route::NotFound => response("404 Not Found", "Not found"),
    }
}
