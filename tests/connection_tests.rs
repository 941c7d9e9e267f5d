//! Connection-resilience integration tests against the in-process mock
//! service: port discovery, failure classification, reconnection
//! scheduling, and disconnect semantics.

mod common;

use std::time::Duration;

use common::*;
use sona_link::{ConnectionOptions, SonaLinkClient, SonaLinkError, SonaLinkTimeouts};

/// Options suitable for tests: overridden ports, no auto-subscribe
/// chatter, and short reconnect delays.
fn test_options(ports: Vec<u16>) -> ConnectionOptions {
    ConnectionOptions::new()
        .with_ports(ports)
        .with_auto_subscribe(false)
        .with_reconnect_delay_ms(10)
        .with_max_reconnect_delay_ms(50)
}

fn build_client(options: ConnectionOptions) -> SonaLinkClient {
    SonaLinkClient::builder()
        .options(options)
        .timeouts(SonaLinkTimeouts::fast())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_connects_to_first_reachable_port() {
    let service = MockService::spawn(echo_responder).await;
    let ports = vec![dead_port().await, dead_port().await, service.port];

    let (handlers, statuses) = status_recorder();
    let client = SonaLinkClient::builder()
        .options(test_options(ports).with_auto_reconnect(false))
        .timeouts(SonaLinkTimeouts::fast())
        .event_handlers(handlers)
        .build()
        .unwrap();

    client.connect().await.unwrap();

    assert!(client.is_connected());
    assert_eq!(client.status().port, Some(service.port));

    let recorded = statuses.lock().unwrap();
    assert!(recorded[0].connecting, "first transition should be connecting");
    let connected: Vec<_> = recorded.iter().filter(|s| s.connected).collect();
    assert_eq!(connected.len(), 1, "exactly one connected update expected");
    assert_eq!(connected[0].port, Some(service.port));
}

#[tokio::test]
async fn test_connect_is_a_no_op_when_already_connected() {
    let service = MockService::spawn(echo_responder).await;
    let (handlers, statuses) = status_recorder();
    let client = SonaLinkClient::builder()
        .options(test_options(vec![service.port]).with_auto_reconnect(false))
        .timeouts(SonaLinkTimeouts::fast())
        .event_handlers(handlers)
        .build()
        .unwrap();

    client.connect().await.unwrap();
    let transitions_after_first = statuses.lock().unwrap().len();

    client.connect().await.unwrap();

    assert_eq!(service.connection_count(), 1);
    assert_eq!(statuses.lock().unwrap().len(), transitions_after_first);
}

#[tokio::test]
async fn test_unreachable_service_rejects_when_auto_reconnect_is_off() {
    let ports = vec![dead_port().await, dead_port().await, dead_port().await];
    let client = build_client(test_options(ports).with_auto_reconnect(false));

    match client.connect().await {
        Err(SonaLinkError::ServiceUnreachable(_)) => {}
        other => panic!("expected ServiceUnreachable, got {:?}", other),
    }

    let status = client.status();
    assert!(!status.connected && !status.connecting);
    assert_eq!(status.error.unwrap().code, "SERVICE_UNREACHABLE");
}

#[tokio::test]
async fn test_auto_reconnect_retries_then_reports_exhaustion() {
    let ports = vec![dead_port().await, dead_port().await, dead_port().await];
    let client = build_client(
        test_options(ports)
            .with_auto_reconnect(true)
            .with_max_reconnect_attempts(Some(2)),
    );

    // Scheduled, not raised.
    client.connect().await.unwrap();

    wait_for("terminal max-attempts status", || {
        let status = client.status();
        !status.connecting
            && status
                .error
                .as_ref()
                .is_some_and(|e| e.code == "CONNECTION_REFUSED")
    })
    .await;
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_transient_loss_triggers_reconnect() {
    let service = MockService::spawn(echo_responder).await;
    let client = build_client(test_options(vec![service.port]).with_auto_reconnect(true));

    client.connect().await.unwrap();
    assert_eq!(service.connection_count(), 1);

    service.drop_connection();

    wait_for("second connection", || service.connection_count() >= 2).await;
    wait_for("client connected again", || client.is_connected()).await;
}

#[tokio::test]
async fn test_server_close_is_terminal_even_with_auto_reconnect() {
    let service = MockService::spawn(echo_responder).await;
    let client = build_client(test_options(vec![service.port]).with_auto_reconnect(true));

    client.connect().await.unwrap();
    service.close_connection();

    wait_for("refused status", || {
        client
            .status()
            .error
            .as_ref()
            .is_some_and(|e| e.code == "CONNECTION_REFUSED")
    })
    .await;

    // No reconnection is attempted after a server-initiated close.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(service.connection_count(), 1);
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_disconnect_is_idempotent_and_resets_state() {
    let service = MockService::spawn(echo_responder).await;
    let client = build_client(test_options(vec![service.port]).with_auto_reconnect(true));

    client.connect().await.unwrap();
    service.push(nc_push(true, false));
    wait_for("cache populated", || client.cache().get_nc_state().is_some()).await;

    client.disconnect().await;
    client.disconnect().await;

    let status = client.status();
    assert!(!status.connected && !status.connecting);
    assert!(status.error.is_none(), "deliberate disconnect carries no error");
    assert!(client.cache().get_nc_state().is_none(), "cache is reset");

    // A deliberate disconnect never turns into a reconnect.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(service.connection_count(), 1);
}

#[tokio::test]
async fn test_disconnect_cancels_a_scheduled_reconnect() {
    let ports = vec![dead_port().await];
    let client = build_client(
        test_options(ports)
            .with_auto_reconnect(true)
            .with_reconnect_delay_ms(100),
    );

    client.connect().await.unwrap();
    assert!(client.status().connecting);

    client.disconnect().await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    let status = client.status();
    assert!(!status.connecting, "reconnect timer must be cancelled");
    assert!(status.error.is_none());
}
