//! JSON-lines attribute service
//!
//! Each connection carries one JSON request per line and receives one JSON
//! response per line:
//!
//! ```text
//! -> {"query_type":"domain-category","attributes":[{"value":"www.example.com"}]}
//! <- {"status":"ok","values":[{"type":"list of strings","value":"News,Business"}]}
//! ```
//!
//! Queries against the shared session are serialized.

use std::sync::{Arc, Mutex};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::{TcpListener, TcpStream};
use uc_core::{Engine, EngineSession, Rating};

/// The only query type the service answers.
pub const SUPPORTED_QUERY_TYPE: &str = "domain-category";

/// Attribute type of every value in a response.
pub const LIST_OF_STRINGS: &str = "list of strings";

/// Longest request line accepted, newline excluded.
pub const MAX_REQUEST_LEN: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Request {
    pub query_type: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Ok,
    ServiceError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    pub values: Vec<Attribute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    fn ok(categories: String) -> Self {
        Self {
            status: Status::Ok,
            values: vec![Attribute {
                id: None,
                kind: Some(LIST_OF_STRINGS.to_string()),
                value: categories,
            }],
            error: None,
        }
    }

    fn service_error(message: impl Into<String>) -> Self {
        Self {
            status: Status::ServiceError,
            values: Vec::new(),
            error: Some(message.into()),
        }
    }
}

/// Answer one request line.
///
/// URLs that fail to parse or have no category are answered with an empty
/// category list; only engine failures become service errors.
pub fn respond<E: Engine>(session: &EngineSession<E>, line: &str, verbosity: u8) -> Response {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            warn!("malformed request: {}", e);
            return Response::service_error(format!("malformed request: {}", e));
        }
    };
    debug!("request: {:?}", request);

    if request.query_type != SUPPORTED_QUERY_TYPE {
        error!("query type '{}' is not supported", request.query_type);
        return Response::service_error(format!(
            "query type '{}' is not supported",
            request.query_type
        ));
    }

    let Some(attribute) = request.attributes.first() else {
        warn!("request carries no attributes");
        return Response::service_error("missing domain attribute");
    };

    match session.rate(&attribute.value, verbosity) {
        Rating::EngineError(e) => Response::service_error(e.to_string()),
        rating => Response::ok(rating.into_rendered()),
    }
}

/// Bind `listen` and serve until interrupted.
pub fn run<E>(session: EngineSession<E>, listen: &str, verbosity: u8) -> Result<(), String>
where
    E: Engine + Send + 'static,
    EngineSession<E>: Send,
{
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| format!("Failed to start tokio runtime: {}", e))?;

    runtime.block_on(async {
        let listener = TcpListener::bind(listen)
            .await
            .map_err(|e| format!("Failed to listen on '{}': {}", listen, e))?;
        let local = listener
            .local_addr()
            .map_err(|e| format!("Failed to read listening address: {}", e))?;
        info!("listening on {}", local);

        let shared = Arc::new(Mutex::new(session));
        tokio::select! {
            result = serve(listener, shared, verbosity) => result,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, shutting down");
                Ok(())
            }
        }
    })
}

/// Accept connections on `listener` forever.
pub async fn serve<E>(
    listener: TcpListener,
    session: Arc<Mutex<EngineSession<E>>>,
    verbosity: u8,
) -> Result<(), String>
where
    E: Engine + Send + 'static,
    EngineSession<E>: Send,
{
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("failed to accept connection: {}", e);
                continue;
            }
        };
        debug!("connection from {}", peer);

        let session = Arc::clone(&session);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, session, verbosity).await {
                warn!("connection from {} ended: {}", peer, e);
            }
        });
    }
}

async fn handle_connection<E>(
    stream: TcpStream,
    session: Arc<Mutex<EngineSession<E>>>,
    verbosity: u8,
) -> std::io::Result<()>
where
    E: Engine + Send + 'static,
    EngineSession<E>: Send,
{
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        let line = match read_request_line(&mut reader, &mut buf).await? {
            RequestLine::Eof => break,
            RequestLine::TooLong => {
                warn!("request longer than {} bytes rejected", MAX_REQUEST_LEN);
                let response = Response::service_error(format!(
                    "request exceeds {} bytes",
                    MAX_REQUEST_LEN
                ));
                write_response(&mut writer, &response).await?;
                continue;
            }
            RequestLine::Line(line) => line,
        };
        if line.trim().is_empty() {
            continue;
        }

        let session = Arc::clone(&session);
        let response = tokio::task::spawn_blocking(move || {
            let session = session.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            respond(&session, &line, verbosity)
        })
        .await
        .unwrap_or_else(|e| Response::service_error(format!("query task failed: {}", e)));

        write_response(&mut writer, &response).await?;
    }

    Ok(())
}

enum RequestLine {
    Line(String),
    TooLong,
    Eof,
}

/// Read one newline-terminated request, holding at most
/// `MAX_REQUEST_LEN + 1` bytes. The remainder of an overlong line is
/// discarded. Invalid UTF-8 is replaced so the request fails to parse.
async fn read_request_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<RequestLine>
where
    R: AsyncBufRead + Unpin,
{
    let limit = MAX_REQUEST_LEN as u64 + 1;

    buf.clear();
    let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
    if n == 0 {
        return Ok(RequestLine::Eof);
    }

    if buf.last() == Some(&b'\n') || buf.len() <= MAX_REQUEST_LEN {
        let text = String::from_utf8_lossy(buf);
        return Ok(RequestLine::Line(text.trim_end_matches(['\r', '\n']).to_string()));
    }

    loop {
        buf.clear();
        let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
        if n == 0 || buf.last() == Some(&b'\n') {
            break;
        }
    }
    buf.clear();
    Ok(RequestLine::TooLong)
}

async fn write_response<W>(writer: &mut W, response: &Response) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut out = serde_json::to_string(response)
        .unwrap_or_else(|_| r#"{"status":"service-error","values":[]}"#.to_string());
    out.push('\n');
    writer.write_all(out.as_bytes()).await
}
