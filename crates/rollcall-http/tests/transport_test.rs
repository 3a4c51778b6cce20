//! HttpTransport against a throwaway local HTTP/1.1 responder.

use rollcall_core::transport::{NewClass, TakeAttendanceRequest};
use rollcall_core::{envelope, ApiRequest, ClientError, RosterCache, Transport, TransportError};
use rollcall_http::HttpTransport;
use serde_json::json;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Serve exactly one request with `status` and `body`; yields the raw request text.
async fn serve_once(status: &'static str, body: String) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}/", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
            if request_complete(&raw) {
                break;
            }
        }
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        String::from_utf8_lossy(&raw).into_owned()
    });

    (base, handle)
}

fn request_complete(raw: &[u8]) -> bool {
    let text = String::from_utf8_lossy(raw);
    let Some(header_end) = text.find("\r\n\r\n") else {
        return false;
    };
    let content_length = text[..header_end]
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    raw.len() >= header_end + 4 + content_length
}

fn transport(base: &str) -> HttpTransport {
    HttpTransport::new(base, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_class_report_query_string() {
    let (base, server) = serve_once(
        "200 OK",
        json!({"success": true, "attendance_records": []}).to_string(),
    )
    .await;

    let value = transport(&base)
        .send(ApiRequest::ClassReport {
            class_id: "C1".into(),
            date: "2024-03-01".into(),
        })
        .await
        .unwrap();
    assert_eq!(value["attendance_records"], json!([]));

    let raw = server.await.unwrap();
    assert!(
        raw.starts_with("GET /api/attendance_report?class_id=C1&date=2024-03-01 HTTP/1.1"),
        "{raw}"
    );
}

#[tokio::test]
async fn test_post_sends_json_body() {
    let (base, server) = serve_once("200 OK", json!({"success": true}).to_string()).await;

    transport(&base)
        .send(ApiRequest::TakeAttendance(TakeAttendanceRequest {
            class_id: "C1".into(),
            date: "2024-03-01".into(),
            photo: "/9j/4AAQ".into(),
        }))
        .await
        .unwrap();

    let raw = server.await.unwrap();
    assert!(raw.starts_with("POST /api/take_attendance HTTP/1.1"), "{raw}");
    assert!(raw.to_ascii_lowercase().contains("content-type: application/json"));
    let body = raw.split("\r\n\r\n").nth(1).unwrap();
    let body: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(body, json!({"class_id": "C1", "date": "2024-03-01", "photo": "/9j/4AAQ"}));
}

#[tokio::test]
async fn test_rejection_with_error_status_is_service_rejected() {
    let (base, server) = serve_once(
        "400 BAD REQUEST",
        json!({"success": false, "error": "Missing class name"}).to_string(),
    )
    .await;

    let result = transport(&base)
        .send(ApiRequest::AddClass(NewClass { name: String::new() }))
        .await;
    assert_eq!(
        envelope::interpret(result).unwrap_err(),
        ClientError::ServiceRejected("Missing class name".into())
    );
    server.await.unwrap();
}

#[tokio::test]
async fn test_unparsable_error_status_is_transport_failure() {
    let (base, server) = serve_once("503 SERVICE UNAVAILABLE", "maintenance".into()).await;

    let err = transport(&base)
        .send(ApiRequest::DeleteStudent {
            student_id: "S1".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(
        err,
        TransportError::Status {
            status: 503,
            body: "maintenance".into()
        }
    );
    let raw = server.await.unwrap();
    assert!(raw.starts_with("DELETE /api/students/S1 HTTP/1.1"), "{raw}");
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}/", listener.local_addr().unwrap());
    drop(listener);

    let err = transport(&base).send(ApiRequest::ListClasses).await.unwrap_err();
    assert!(matches!(err, TransportError::Connect(_)), "{err:?}");
}

#[tokio::test]
async fn test_roster_refresh_over_http() {
    let (base, server) = serve_once(
        "200 OK",
        json!({"success": true, "classes": [{"id": "C1", "name": "Biology"}]}).to_string(),
    )
    .await;

    let mut roster = RosterCache::new();
    roster.refresh_classes(&transport(&base)).await.unwrap();
    assert_eq!(roster.resolve_class_name("C1"), "Biology");
    server.await.unwrap();
}
