use std::collections::VecDeque;
use std::sync::Mutex;

use super::*;
use crate::session::{MemorySessionStore, Session, UserProfile};

type PollResult = Result<Option<IncomingCall>, NotificationError>;

/// Replays scripted responses; once exhausted, reports no pending call.
#[derive(Default)]
struct FakeNotifications {
    responses: Mutex<VecDeque<PollResult>>,
    tokens: Mutex<Vec<String>>,
}

impl FakeNotifications {
    fn scripted(responses: Vec<PollResult>) -> Self {
        Self { responses: Mutex::new(responses.into()), tokens: Mutex::new(Vec::new()) }
    }

    fn calls(&self) -> usize {
        self.tokens.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationService for FakeNotifications {
    async fn incoming_call(&self, token: &str) -> PollResult {
        self.tokens.lock().unwrap().push(token.to_owned());
        self.responses.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }
}

fn call(id: &str) -> IncomingCall {
    IncomingCall {
        call_id: id.to_owned(),
        appointment_id: "appt-42".to_owned(),
        caller_name: "Dr. Rivera".to_owned(),
        call_type: CallKind::Video,
    }
}

fn logged_in_store() -> Arc<MemorySessionStore> {
    Arc::new(MemorySessionStore::with_session(Session {
        token: "tok-1".to_owned(),
        user: UserProfile {
            id: None,
            email: "a@b.com".to_owned(),
            full_name: "Ada".to_owned(),
            is_verified: true,
            phone: None,
        },
    }))
}

const TICK: Duration = Duration::from_secs(5);

// =============================================================================
// poller
// =============================================================================

#[tokio::test(start_paused = true)]
async fn repeated_call_id_is_reported_once() {
    let service = Arc::new(FakeNotifications::scripted(vec![Ok(Some(call("c1"))), Ok(Some(call("c1"))), Ok(Some(call("c1")))]));
    let (handle, mut rx) = spawn_incoming_call_poller(service.clone(), logged_in_store(), TICK);

    assert_eq!(rx.recv().await, Some(call("c1")));
    tokio::time::sleep(TICK * 3).await;

    assert!(service.calls() >= 3);
    assert!(rx.try_recv().is_err());
    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn same_call_id_rings_again_after_a_quiet_poll() {
    let service = Arc::new(FakeNotifications::scripted(vec![Ok(Some(call("c1"))), Ok(None), Ok(Some(call("c1")))]));
    let (handle, mut rx) = spawn_incoming_call_poller(service, logged_in_store(), TICK);

    assert_eq!(rx.recv().await, Some(call("c1")));
    assert_eq!(rx.recv().await, Some(call("c1")));
    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn polls_with_stored_token() {
    let service = Arc::new(FakeNotifications::scripted(vec![Ok(Some(call("c1")))]));
    let (handle, mut rx) = spawn_incoming_call_poller(service.clone(), logged_in_store(), TICK);

    rx.recv().await.unwrap();

    assert_eq!(service.tokens.lock().unwrap()[0], "tok-1");
    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn skips_polls_without_session() {
    let service = Arc::new(FakeNotifications::default());
    let store = Arc::new(MemorySessionStore::new());
    let (handle, _rx) = spawn_incoming_call_poller(service.clone(), store, TICK);

    tokio::time::sleep(TICK * 4).await;

    assert_eq!(service.calls(), 0);
    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn service_error_does_not_stop_polling() {
    let service = Arc::new(FakeNotifications::scripted(vec![Err(NotificationError::Status(503)), Ok(Some(call("c2")))]));
    let (handle, mut rx) = spawn_incoming_call_poller(service.clone(), logged_in_store(), TICK);

    assert_eq!(rx.recv().await, Some(call("c2")));
    assert_eq!(service.calls(), 2);
    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stop_ends_polling() {
    let service = Arc::new(FakeNotifications::default());
    let (handle, _rx) = spawn_incoming_call_poller(service.clone(), logged_in_store(), TICK);
    tokio::time::sleep(TICK + Duration::from_secs(1)).await;

    handle.stop().await;
    let calls = service.calls();
    tokio::time::sleep(TICK * 4).await;

    assert_eq!(service.calls(), calls);
}

#[tokio::test(start_paused = true)]
async fn dropping_receiver_ends_polling() {
    let service = Arc::new(FakeNotifications::default());
    let (handle, rx) = spawn_incoming_call_poller(service, logged_in_store(), TICK);

    drop(rx);
    tokio::time::sleep(TICK).await;

    assert!(handle.is_finished());
}

// =============================================================================
// wire types
// =============================================================================

#[test]
fn incoming_call_parses_camel_case_with_default_kind() {
    let raw = r#"{"callId":"c1","appointmentId":"appt-42","callerName":"Dr. Rivera"}"#;
    let parsed: IncomingCall = serde_json::from_str(raw).unwrap();
    assert_eq!(parsed, call("c1"));
}

#[test]
fn incoming_call_parses_voice_kind() {
    let raw = r#"{"callId":"c1","appointmentId":"a","callerName":"b","callType":"voice"}"#;
    let parsed: IncomingCall = serde_json::from_str(raw).unwrap();
    assert_eq!(parsed.call_type, CallKind::Voice);
}

#[test]
fn http_endpoint_trims_trailing_slash() {
    let service = HttpNotificationService::new("https://api.example.com/v1/");
    assert_eq!(service.endpoint(), "https://api.example.com/v1/notifications/incoming-call");
}

// =============================================================================
// HttpNotificationService against a local listener
// =============================================================================

/// Serve one canned HTTP response on a loopback port. Resolves to the
/// request head the client sent.
async fn serve_once(response: String) -> (String, tokio::task::JoinHandle<String>) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}/v1", listener.local_addr().unwrap());
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            head.extend_from_slice(&buf[..n]);
        }
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        String::from_utf8_lossy(&head).into_owned()
    });
    (base_url, server)
}

fn http_response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

fn local_service(base_url: &str) -> HttpNotificationService {
    HttpNotificationService::with_client(reqwest::Client::builder().no_proxy().build().unwrap(), base_url)
}

#[tokio::test]
async fn http_pending_call_is_parsed_and_bearer_is_sent() {
    let body = r#"{"callId":"c1","appointmentId":"appt-42","callerName":"Dr. Rivera","callType":"video"}"#;
    let (base_url, server) = serve_once(http_response("200 OK", body)).await;

    let result = local_service(&base_url).incoming_call("tok-1").await.unwrap();
    assert_eq!(result, Some(call("c1")));

    let head = server.await.unwrap().to_ascii_lowercase();
    assert!(head.starts_with("get /v1/notifications/incoming-call "));
    assert!(head.contains("authorization: bearer tok-1"));
}

#[tokio::test]
async fn http_no_content_is_no_call() {
    let (base_url, server) = serve_once("HTTP/1.1 204 No Content\r\nConnection: close\r\n\r\n".to_owned()).await;
    assert_eq!(local_service(&base_url).incoming_call("tok").await.unwrap(), None);
    server.await.unwrap();
}

#[tokio::test]
async fn http_not_found_is_no_call() {
    let (base_url, server) = serve_once(http_response("404 Not Found", "")).await;
    assert_eq!(local_service(&base_url).incoming_call("tok").await.unwrap(), None);
    server.await.unwrap();
}

#[tokio::test]
async fn http_null_body_is_no_call() {
    let (base_url, server) = serve_once(http_response("200 OK", "null")).await;
    assert_eq!(local_service(&base_url).incoming_call("tok").await.unwrap(), None);
    server.await.unwrap();
}

#[tokio::test]
async fn http_server_error_maps_to_status() {
    let (base_url, server) = serve_once(http_response("503 Service Unavailable", "")).await;
    let err = local_service(&base_url).incoming_call("tok").await.unwrap_err();
    assert!(matches!(err, NotificationError::Status(503)));
    server.await.unwrap();
}
