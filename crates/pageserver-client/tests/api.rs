//! Request shapes of the mutating endpoints, verified against a minimal
//! single-request HTTP server on a loopback port.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

use shale_pageserver_client::{Error, PageserverClient};
use shale_types::{TenantId, TimelineId};

struct ReceivedRequest {
    request_line: String,
    body: String,
}

/// Accepts one connection, captures the request line and body, and answers
/// with the given status.
fn serve_one(
    listener: TcpListener,
    status_line: &'static str,
    response_body: &'static str,
) -> JoinHandle<ReceivedRequest> {
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut request_line = String::new();
        reader.read_line(&mut request_line).unwrap();

        let mut content_length = 0usize;
        loop {
            let mut header = String::new();
            reader.read_line(&mut header).unwrap();
            if header.trim().is_empty() {
                break;
            }
            if let Some(value) = header.to_ascii_lowercase().strip_prefix("content-length:") {
                content_length = value.trim().parse().unwrap();
            }
        }
        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body).unwrap();

        stream
            .write_all(
                format!(
                    "HTTP/1.1 {status_line}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{response_body}",
                    response_body.len()
                )
                .as_bytes(),
            )
            .unwrap();
        ReceivedRequest {
            request_line: request_line.trim().to_string(),
            body: String::from_utf8(body).unwrap(),
        }
    })
}

fn local_client() -> (PageserverClient, TcpListener) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    (PageserverClient::new(port), listener)
}

#[test]
fn timeline_create_posts_the_new_timeline_id() {
    let (client, listener) = local_client();
    let server = serve_one(listener, "200 OK", "");
    let (tenant, timeline) = (TenantId::generate(), TimelineId::generate());

    client.timeline_create(tenant, timeline).unwrap();

    let received = server.join().unwrap();
    assert_eq!(
        received.request_line,
        format!("POST /v1/tenant/{tenant}/timeline HTTP/1.1")
    );
    let payload: serde_json::Value = serde_json::from_str(&received.body).unwrap();
    assert_eq!(payload["new_timeline_id"], timeline.to_string());
}

#[test]
fn timeline_checkpoint_puts_to_the_checkpoint_endpoint() {
    let (client, listener) = local_client();
    let server = serve_one(listener, "200 OK", "");
    let (tenant, timeline) = (TenantId::generate(), TimelineId::generate());

    client.timeline_checkpoint(tenant, timeline).unwrap();

    let received = server.join().unwrap();
    assert_eq!(
        received.request_line,
        format!("PUT /v1/tenant/{tenant}/timeline/{timeline}/checkpoint HTTP/1.1")
    );
    assert!(received.body.is_empty());
}

#[test]
fn timeline_create_surfaces_api_errors() {
    let (client, listener) = local_client();
    let server = serve_one(listener, "400 Bad Request", "duplicate timeline");

    let err = client
        .timeline_create(TenantId::generate(), TimelineId::generate())
        .unwrap_err();
    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 400);
            assert!(message.contains("duplicate timeline"));
        }
        other => panic!("expected api error, got {other:?}"),
    }
    server.join().unwrap();
}
