// SPDX-FileCopyrightText: 2026 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use common::driver::normalize_records;
use common::test_helper::roster::{get_drivers, get_roster_as_json};
use roster_sync::{FetchError, HttpRosterEndpoint, RosterEndpoint};
use std::{sync::Arc, time::Duration};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    sync::oneshot,
    task::JoinHandle,
};

/// Minimal HTTP server answering a single request.
///
/// Returns the base url and a receiver for the raw request head.
async fn serve_once(
    status: &'static str,
    body: &'static str,
) -> (String, oneshot::Receiver<String>, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind HTTP test server");
    let address = listener.local_addr().unwrap();
    let (request_tx, request_rx) = oneshot::channel();
    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0_u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        let _ = request_tx.send(String::from_utf8_lossy(&request).to_string());
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        let _ = stream.shutdown().await;
    });
    (format!("http://{}/api", address), request_rx, server)
}

#[test_log::test(tokio::test)]
async fn fetch_requests_shuttle_roster_with_token() {
    let (base_url, request, _server) = serve_once("200 OK", get_roster_as_json()).await;
    let endpoint = HttpRosterEndpoint::new(&base_url, Duration::from_secs(2))
        .unwrap()
        .with_token_provider(Arc::new(|| Some("secret".to_string())));

    let records = endpoint.fetch().await.expect("roster fetch failed");

    assert_eq!(normalize_records(records), get_drivers());
    let request = request.await.unwrap().to_lowercase();
    assert!(request.starts_with("get /api/shuttle http/1.1"), "{request}");
    assert!(request.contains("authorization: bearer secret"), "{request}");
    assert!(request.contains("accept: application/json"), "{request}");
}

#[test_log::test(tokio::test)]
async fn fetch_without_token_sends_no_authorization() {
    let (base_url, request, _server) = serve_once("200 OK", "[]").await;
    let endpoint = HttpRosterEndpoint::new(&base_url, Duration::from_secs(2))
        .unwrap()
        .with_token_provider(Arc::new(|| None::<String>));

    assert_eq!(endpoint.fetch().await, Ok(vec![]));
    assert!(!request.await.unwrap().to_lowercase().contains("authorization"));
}

#[test_log::test(tokio::test)]
async fn null_payload_is_an_empty_roster() {
    let (base_url, _request, _server) = serve_once("200 OK", "null").await;
    let endpoint = HttpRosterEndpoint::new(&base_url, Duration::from_secs(2)).unwrap();
    assert_eq!(endpoint.fetch().await, Ok(vec![]));
}

#[test_log::test(tokio::test)]
async fn unauthorized_is_reported_distinctly() {
    let (base_url, _request, _server) =
        serve_once("401 Unauthorized", r#"{"message":"token expired"}"#).await;
    let endpoint = HttpRosterEndpoint::new(&base_url, Duration::from_secs(2)).unwrap();
    assert_eq!(endpoint.fetch().await, Err(FetchError::Unauthorized));
}

#[test_log::test(tokio::test)]
async fn server_error_is_a_status_failure() {
    let (base_url, _request, _server) = serve_once("500 Internal Server Error", "").await;
    let endpoint = HttpRosterEndpoint::new(&base_url, Duration::from_secs(2)).unwrap();
    assert_eq!(endpoint.fetch().await, Err(FetchError::Status(500)));
}

#[test_log::test(tokio::test)]
async fn malformed_payload_is_rejected() {
    let (base_url, _request, _server) = serve_once("200 OK", r#"{"drivers":"none"}"#).await;
    let endpoint = HttpRosterEndpoint::new(&base_url, Duration::from_secs(2)).unwrap();
    assert!(matches!(
        endpoint.fetch().await,
        Err(FetchError::Malformed(_))
    ));
}

#[test_log::test(tokio::test)]
async fn unreachable_endpoint_is_a_transport_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);
    let endpoint =
        HttpRosterEndpoint::new(&format!("http://{}/api", address), Duration::from_secs(2))
            .unwrap();
    assert!(matches!(
        endpoint.fetch().await,
        Err(FetchError::Transport(_))
    ));
}

#[test_log::test(tokio::test)]
async fn silent_endpoint_runs_into_the_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let _server = tokio::spawn(async move {
        let (_stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });
    let endpoint =
        HttpRosterEndpoint::new(&format!("http://{}/api", address), Duration::from_millis(100))
            .unwrap();

    let result = tokio::time::timeout(Duration::from_secs(2), endpoint.fetch())
        .await
        .expect("request not bounded by the configured timeout");

    assert!(matches!(result, Err(FetchError::Transport(_))));
}
