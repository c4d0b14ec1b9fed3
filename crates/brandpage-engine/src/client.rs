use std::io::ErrorKind;
use std::net::{TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use brandpage_contracts::generation::GenerationResult;
use brandpage_contracts::profile::BrandProfile;
use brandpage_contracts::prompt_log::PromptLog;
use brandpage_contracts::wire::{Envelope, GENERATED_CODE_EVENT};
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Value};
use tracing::{debug, warn};
use tungstenite::client::IntoClientRequest;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{HandshakeError, Message as WsMessage, WebSocket};

use crate::enhance::ENHANCE_PATH;

pub const RECONNECT_ATTEMPTS: usize = 5;
pub const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);
const RECONNECT_BACKOFF: Duration = Duration::from_millis(500);
const CLIENT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub attempts: usize,
    pub attempt_timeout: Duration,
    pub backoff: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            attempts: RECONNECT_ATTEMPTS,
            attempt_timeout: ATTEMPT_TIMEOUT,
            backoff: RECONNECT_BACKOFF,
        }
    }
}

/// A client session with the relay: one WebSocket, owned by whoever
/// connected it, plus the prompt log of everything it received.
pub struct RelayClient {
    url: String,
    ws: WebSocket<MaybeTlsStream<TcpStream>>,
    prompt_log: PromptLog,
}

impl RelayClient {
    /// Connects with up to `options.attempts` tries, each bounded by
    /// `options.attempt_timeout`, sleeping `backoff * attempt` in between.
    pub fn connect(server: &str, options: &ConnectOptions) -> Result<Self> {
        let url = relay_ws_url(server)?;
        let attempts = options.attempts.max(1);
        let mut last_error = None;
        for attempt in 1..=attempts {
            match open_websocket(&url, options.attempt_timeout) {
                Ok(ws) => {
                    debug!(%url, attempt, "connected to relay");
                    return Ok(Self {
                        url,
                        ws,
                        prompt_log: PromptLog::new(),
                    });
                }
                Err(err) => {
                    let detail = format!("{err:#}");
                    warn!(%url, attempt, attempts, error = %detail, "relay connection attempt failed");
                    last_error = Some(err);
                    if attempt < attempts {
                        let multiplier = u32::try_from(attempt).unwrap_or(u32::MAX);
                        thread::sleep(options.backoff.saturating_mul(multiplier));
                    }
                }
            }
        }
        let err = last_error.unwrap_or_else(|| anyhow!("no connection attempts made"));
        Err(err.context(format!(
            "failed to connect to relay at {url} after {attempts} attempts"
        )))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn prompt_log(&self) -> &PromptLog {
        &self.prompt_log
    }

    pub fn emit_generate(&mut self, profile: &BrandProfile) -> Result<()> {
        let frame = Envelope::generate(profile)?.to_text()?;
        self.ws
            .send(WsMessage::Text(frame.into()))
            .context("failed to send generate event")
    }

    /// Waits up to `wait` for the next `generatedCode` event. Its prompt is
    /// appended to the prompt log before it is returned.
    pub fn next_generated(&mut self, wait: Duration) -> Result<Option<GenerationResult>> {
        let deadline = Instant::now() + wait;
        loop {
            if Instant::now() >= deadline {
                return Ok(None);
            }
            let message = match self.ws.read() {
                Ok(message) => message,
                Err(tungstenite::Error::Io(err))
                    if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    continue;
                }
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    bail!("relay closed the connection")
                }
                Err(err) => return Err(err).context("relay read failed"),
            };
            let raw = match message {
                WsMessage::Text(text) => text.to_string(),
                WsMessage::Binary(bytes) => String::from_utf8_lossy(&bytes).to_string(),
                WsMessage::Close(_) => bail!("relay closed the connection"),
                _ => continue,
            };
            let envelope = match Envelope::parse(&raw) {
                Ok(envelope) => envelope,
                Err(err) => {
                    warn!(error = %err, "ignoring malformed relay frame");
                    continue;
                }
            };
            if !envelope.is(GENERATED_CODE_EVENT) {
                debug!(event = %envelope.event, "ignoring relay event");
                continue;
            }
            let result = envelope.into_generation_result()?;
            self.prompt_log.push(result.prompt.clone());
            return Ok(Some(result));
        }
    }

    /// Emits one `generate` and waits for the next `generatedCode`.
    pub fn generate(&mut self, profile: &BrandProfile, wait: Duration) -> Result<GenerationResult> {
        self.emit_generate(profile)?;
        self.next_generated(wait)?
            .ok_or_else(|| anyhow!("no generatedCode received within {wait:?}"))
    }

    pub fn close(mut self) -> Result<()> {
        match self.ws.close(None) {
            Ok(()) => {}
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                return Ok(())
            }
            Err(err) => return Err(err).context("failed to close relay connection"),
        }
        let deadline = Instant::now() + Duration::from_secs(1);
        while Instant::now() < deadline {
            match self.ws.read() {
                Ok(_) => continue,
                Err(tungstenite::Error::Io(err))
                    if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    continue;
                }
                Err(_) => break,
            }
        }
        Ok(())
    }
}

/// Maps `http(s)://` server addresses to `ws(s)://`; WebSocket URLs pass
/// through.
pub fn relay_ws_url(server: &str) -> Result<String> {
    let mut url = reqwest::Url::parse(server.trim())
        .with_context(|| format!("invalid relay address '{server}'"))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => bail!("unsupported relay scheme '{other}'"),
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow!("cannot use scheme {scheme} for '{server}'"))?;
    Ok(url.to_string())
}

pub fn enhance_url(server: &str) -> Result<String> {
    let mut url = reqwest::Url::parse(server.trim())
        .with_context(|| format!("invalid relay address '{server}'"))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "http",
        "https" | "wss" => "https",
        other => bail!("unsupported relay scheme '{other}'"),
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow!("cannot use scheme {scheme} for '{server}'"))?;
    url.set_path(ENHANCE_PATH);
    url.set_query(None);
    Ok(url.to_string())
}

/// Asks the relay to rewrite `text`. Any failure (transport, status, body,
/// missing or empty `enhanced`) returns `text` unchanged.
pub fn enhance_content(server: &str, text: &str, field: &str, timeout: Duration) -> String {
    match request_enhancement(server, text, field, timeout) {
        Ok(Some(enhanced)) => enhanced,
        Ok(None) => text.to_string(),
        Err(err) => {
            let detail = format!("{err:#}");
            warn!(field, error = %detail, "enhancement failed");
            text.to_string()
        }
    }
}

fn request_enhancement(
    server: &str,
    text: &str,
    field: &str,
    timeout: Duration,
) -> Result<Option<String>> {
    let endpoint = enhance_url(server)?;
    let client = HttpClient::builder()
        .timeout(timeout)
        .build()
        .context("failed to build enhance http client")?;
    let response = client
        .post(&endpoint)
        .json(&json!({ "text": text, "field": field }))
        .send()
        .with_context(|| format!("enhance request failed ({endpoint})"))?;
    let status = response.status();
    if !status.is_success() {
        bail!("enhance request failed ({})", status.as_u16());
    }
    let parsed: Value = response.json().context("enhance returned invalid JSON")?;
    Ok(parsed
        .get("enhanced")
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_string))
}

fn open_websocket(url: &str, timeout: Duration) -> Result<WebSocket<MaybeTlsStream<TcpStream>>> {
    let request = url
        .into_client_request()
        .context("invalid relay websocket request")?;
    let host = request
        .uri()
        .host()
        .context("relay url has no host")?
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string();
    let port = request
        .uri()
        .port_u16()
        .unwrap_or(if request.uri().scheme_str() == Some("wss") {
            443
        } else {
            80
        });
    let addr = (host.as_str(), port)
        .to_socket_addrs()
        .with_context(|| format!("failed to resolve {host}:{port}"))?
        .next()
        .with_context(|| format!("{host}:{port} did not resolve"))?;
    let stream = TcpStream::connect_timeout(&addr, timeout)
        .with_context(|| format!("failed to connect to {addr}"))?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;

    let mut ws = match tungstenite::client_tls(request, stream) {
        Ok((ws, _)) => ws,
        Err(HandshakeError::Failure(err)) => {
            return Err(err).context("relay websocket handshake failed")
        }
        Err(HandshakeError::Interrupted(_)) => bail!("relay websocket handshake timed out"),
    };
    set_socket_read_timeout(&mut ws, Some(CLIENT_POLL_INTERVAL));
    Ok(ws)
}

fn set_socket_read_timeout(
    ws: &mut WebSocket<MaybeTlsStream<TcpStream>>,
    timeout: Option<Duration>,
) {
    match ws.get_mut() {
        MaybeTlsStream::Plain(stream) => {
            let _ = stream.set_read_timeout(timeout);
        }
        MaybeTlsStream::Rustls(stream) => {
            let _ = stream.get_mut().set_read_timeout(timeout);
        }
        _ => {}
    }
}
