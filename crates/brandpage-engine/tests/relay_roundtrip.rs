use std::net::{SocketAddr, TcpStream};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use brandpage_contracts::generation::{ERROR_PLACEHOLDER_HTML, FAILURE_PROMPT};
use brandpage_contracts::profile::BrandProfile;
use brandpage_contracts::wire::Envelope;
use brandpage_engine::{
    enhance_content, ConnectOptions, GenerationError, RelayClient, RelayContext, RelayServer,
    TextGenerator,
};
use serde_json::json;
use tungstenite::client::IntoClientRequest;
use tungstenite::http::HeaderValue;
use tungstenite::Message as WsMessage;

const WAIT: Duration = Duration::from_secs(5);

/// Behaves according to the company name embedded in the prompt.
struct ScriptedGenerator;

impl TextGenerator for ScriptedGenerator {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        if prompt.contains("\"companyName\": \"Timeout\"") {
            thread::sleep(Duration::from_millis(50));
            return Err(GenerationError::Timeout(Duration::from_secs(20)));
        }
        if prompt.contains("\"companyName\": \"Slow\"") {
            thread::sleep(Duration::from_millis(600));
            return Ok("<!DOCTYPE html><html><body>Slow</body></html>".to_string());
        }
        if prompt.contains("Improve the following") {
            return Ok("\"Acme Solutions\"".to_string());
        }
        let name = if prompt.contains("\"companyName\": \"Fast\"") {
            "Fast"
        } else {
            "Acme"
        };
        Ok(format!(
            "```html\n<!DOCTYPE html><html><body>{name}</body></html>\n```"
        ))
    }
}

/// Serves a relay from its own runtime thread so the blocking clients below
/// can talk to it.
fn start_relay(allowed_origin: Option<&str>) -> SocketAddr {
    let context = RelayContext::new(Arc::new(ScriptedGenerator))
        .with_allowed_origin(allowed_origin.map(str::to_string));
    let (addr_tx, addr_rx) = mpsc::channel();
    thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async move {
            let server = RelayServer::bind("127.0.0.1:0", context).await.unwrap();
            addr_tx.send(server.local_addr().unwrap()).unwrap();
            server.serve().await.unwrap();
        });
    });
    addr_rx.recv().unwrap()
}

fn connect(addr: SocketAddr) -> RelayClient {
    RelayClient::connect(&format!("http://{addr}"), &ConnectOptions::default()).unwrap()
}

fn acme() -> BrandProfile {
    BrandProfile::from_value(json!({
        "companyName": "Acme",
        "description": "We build things",
        "primaryColor": "#3B82F6",
        "socialLinks": {},
        "logoUrl": "",
    }))
    .unwrap()
}

fn named(name: &str) -> BrandProfile {
    BrandProfile::new(name, "We build things")
}

#[test]
fn generate_emits_extracted_document() -> anyhow::Result<()> {
    let addr = start_relay(None);
    let mut client = connect(addr);

    let result = client.generate(&acme(), WAIT)?;
    assert_eq!(result.html, "<!DOCTYPE html><html><body>Acme</body></html>");
    assert!(result.prompt.contains("\"companyName\": \"Acme\""));

    assert_eq!(client.prompt_log().len(), 1);
    assert_eq!(client.prompt_log().entries()[0].text, result.prompt);
    client.close()
}

#[test]
fn failure_emits_placeholder_and_connection_stays_usable() -> anyhow::Result<()> {
    let addr = start_relay(None);
    let mut client = connect(addr);

    let failed = client.generate(&named("Timeout"), WAIT)?;
    assert_eq!(failed.html, ERROR_PLACEHOLDER_HTML);
    assert_eq!(failed.prompt, FAILURE_PROMPT);

    let recovered = client.generate(&acme(), WAIT)?;
    assert_eq!(recovered.html, "<!DOCTYPE html><html><body>Acme</body></html>");

    let texts: Vec<&str> = client
        .prompt_log()
        .entries()
        .iter()
        .map(|entry| entry.text.as_str())
        .collect();
    assert_eq!(texts, vec![FAILURE_PROMPT, recovered.prompt.as_str()]);
    client.close()
}

#[test]
fn concurrent_requests_complete_in_completion_order() -> anyhow::Result<()> {
    let addr = start_relay(None);
    let mut client = connect(addr);

    client.emit_generate(&named("Slow"))?;
    client.emit_generate(&named("Fast"))?;

    let first = client.next_generated(WAIT)?.expect("first result");
    let second = client.next_generated(WAIT)?.expect("second result");
    assert_eq!(first.html, "<!DOCTYPE html><html><body>Fast</body></html>");
    assert_eq!(second.html, "<!DOCTYPE html><html><body>Slow</body></html>");
    client.close()
}

#[test]
fn every_generate_gets_exactly_one_reply() -> anyhow::Result<()> {
    let addr = start_relay(None);
    let mut client = connect(addr);
    for _ in 0..3 {
        client.emit_generate(&acme())?;
    }
    for _ in 0..3 {
        assert!(client.next_generated(WAIT)?.is_some());
    }
    assert!(client.next_generated(Duration::from_millis(300))?.is_none());
    assert_eq!(client.prompt_log().len(), 3);
    client.close()
}

fn next_result(
    ws: &mut tungstenite::WebSocket<tungstenite::stream::MaybeTlsStream<TcpStream>>,
) -> anyhow::Result<brandpage_contracts::generation::GenerationResult> {
    loop {
        if let WsMessage::Text(text) = ws.read()? {
            return Envelope::parse(text.as_str())?.into_generation_result();
        }
    }
}

#[test]
fn malformed_frames_are_ignored_and_missing_profiles_fail_softly() -> anyhow::Result<()> {
    let addr = start_relay(None);
    let (mut ws, _) = tungstenite::connect(format!("ws://{addr}/"))?;

    ws.send(WsMessage::Text("not json".into()))?;
    ws.send(WsMessage::Text(r#"{"event":"hello","data":{}}"#.into()))?;
    ws.send(WsMessage::Text(r#"{"event":"generate"}"#.into()))?;
    assert!(next_result(&mut ws)?.is_failure());

    ws.close(None)?;
    Ok(())
}

#[test]
fn mistyped_profile_is_still_generated() -> anyhow::Result<()> {
    let addr = start_relay(None);
    let (mut ws, _) = tungstenite::connect(format!("ws://{addr}/"))?;

    ws.send(WsMessage::Text(
        r#"{"event":"generate","data":{"companyName":"Acme","description":"x","socialLinks":null,"logoUrl":null}}"#
            .into(),
    ))?;
    let result = next_result(&mut ws)?;
    assert_eq!(result.html, "<!DOCTYPE html><html><body>Acme</body></html>");
    assert!(result.prompt.contains("\"socialLinks\": null"));

    ws.close(None)?;
    Ok(())
}

#[test]
fn enhance_endpoint_rewrites_field() {
    let addr = start_relay(None);
    let enhanced = enhance_content(
        &format!("http://{addr}"),
        "Acme",
        "companyName",
        Duration::from_secs(5),
    );
    assert_eq!(enhanced, "Acme Solutions");
}

#[test]
fn disallowed_origin_is_rejected() -> anyhow::Result<()> {
    let addr = start_relay(Some("http://localhost:5173"));

    let mut request = format!("ws://{addr}/").into_client_request()?;
    request
        .headers_mut()
        .insert("Origin", HeaderValue::from_static("http://evil.test"));
    let stream = TcpStream::connect(addr)?;
    assert!(tungstenite::client(request, stream).is_err());

    let mut request = format!("ws://{addr}/").into_client_request()?;
    request
        .headers_mut()
        .insert("Origin", HeaderValue::from_static("http://localhost:5173"));
    let stream = TcpStream::connect(addr)?;
    let (mut ws, _) = tungstenite::client(request, stream)
        .map_err(|_| anyhow::anyhow!("allowed origin was rejected"))?;
    ws.close(None)?;
    Ok(())
}
