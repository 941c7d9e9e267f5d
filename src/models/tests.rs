use serde_json::json;

use super::*;
use crate::error::SonaLinkError;

// ── Wire messages ───────────────────────────────────────────────────────

#[test]
fn test_client_message_wire_shape() {
    let msg = ClientMessage::Subscribe {
        request_id: 7,
        topics: vec![Topic::Devices, Topic::AccentConversion],
    };
    let wire = serde_json::to_value(&msg).unwrap();
    assert_eq!(
        wire,
        json!({"type": "subscribe", "request_id": 7, "topics": ["devices", "ac"]})
    );
}

#[test]
fn test_server_message_ack_parses_without_optional_fields() {
    let msg: ServerMessage =
        serde_json::from_str(r#"{"type":"ack","request_id":3,"success":true}"#).unwrap();
    match msg {
        ServerMessage::Ack {
            request_id,
            success,
            subscribed,
            message,
        } => {
            assert_eq!(request_id, 3);
            assert!(success);
            assert!(subscribed.is_none());
            assert!(message.is_none());
        }
        other => panic!("expected ack, got {:?}", other),
    }
}

#[test]
fn test_server_message_push_without_state_defaults_to_null() {
    // A push with no payload at all still parses; normalization rejects
    // it later because null is not an object.
    let msg: ServerMessage = serde_json::from_str(r#"{"type":"nc_state"}"#).unwrap();
    match msg {
        ServerMessage::NcState { state } => assert!(state.is_null()),
        other => panic!("expected nc_state, got {:?}", other),
    }
    assert_eq!(msg_kind(r#"{"type":"in_call_state","state":{}}"#), MessageKind::InCallState);
    assert_eq!(msg_kind(r#"{"type":"pong"}"#), MessageKind::Pong);
}

fn msg_kind(raw: &str) -> MessageKind {
    serde_json::from_str::<ServerMessage>(raw).unwrap().kind()
}

// ── Normalization ───────────────────────────────────────────────────────

#[test]
fn test_device_state_normalizes_missing_channels() {
    let state = DeviceState::from_raw(&json!({
        "microphone": {
            "device": {"id": "hs-1", "name": "Arc Wireless", "battery": 80},
            "updatedAt": 1712000000000u64
        }
    }))
    .unwrap();

    assert!(state.microphone.device.is_some());
    assert_eq!(state.microphone.updated_at, 1712000000000);
    // Speaker entry was absent entirely: no device, stamped "now".
    assert!(state.speaker.device.is_none());
    assert!(state.speaker.updated_at > 0);
}

#[test]
fn test_device_state_null_device_means_none_present() {
    let state = DeviceState::from_raw(&json!({
        "microphone": {"device": null, "updatedAt": 5},
        "speaker": {"updatedAt": 5}
    }))
    .unwrap();
    assert!(state.microphone.device.is_none());
    assert!(state.speaker.device.is_none());
}

#[test]
fn test_device_state_rejects_non_object_payload() {
    for raw in [json!(null), json!("devices"), json!(42), json!([1, 2])] {
        match DeviceState::from_raw(&raw) {
            Err(SonaLinkError::InvalidMessage(_)) => {}
            other => panic!("expected InvalidMessage, got {:?}", other),
        }
    }
}

#[test]
fn test_feature_state_defaults_missing_flags_to_disabled() {
    let state = FeatureState::from_raw(&json!({
        "microphone": {"enabled": true, "updatedAt": 9},
        "speaker": {"updatedAt": 9}
    }))
    .unwrap();
    assert!(state.enabled(Channel::Microphone));
    assert!(!state.enabled(Channel::Speaker));
}

#[test]
fn test_in_call_state_defaults_missing_flag_to_false() {
    let state = InCallState::from_raw(&json!({})).unwrap();
    assert!(!state.active);
    assert!(state.updated_at > 0);
}

// ── Value-only change comparison ────────────────────────────────────────

#[test]
fn test_feature_state_timestamp_only_difference_is_unchanged() {
    let a = FeatureState::from_raw(&json!({
        "microphone": {"enabled": true, "updatedAt": 100},
        "speaker": {"enabled": false, "updatedAt": 100}
    }))
    .unwrap();
    let b = FeatureState::from_raw(&json!({
        "microphone": {"enabled": true, "updatedAt": 200},
        "speaker": {"enabled": false, "updatedAt": 200}
    }))
    .unwrap();
    assert!(a.same_values(&b));

    let c = FeatureState::from_raw(&json!({
        "microphone": {"enabled": false, "updatedAt": 200},
        "speaker": {"enabled": false, "updatedAt": 200}
    }))
    .unwrap();
    assert!(!a.same_values(&c));
}

#[test]
fn test_in_call_timestamp_only_difference_is_unchanged() {
    let a = InCallState {
        active: true,
        updated_at: 100,
    };
    let b = InCallState {
        active: true,
        updated_at: 999,
    };
    assert!(a.same_values(&b));
    assert!(!a.same_values(&InCallState {
        active: false,
        updated_at: 100,
    }));
}

#[test]
fn test_device_state_nested_field_difference_is_a_change() {
    let base = json!({
        "microphone": {
            "device": {"id": "hs-1", "name": "Arc Wireless", "firmware": {"version": "1.2"}},
            "updatedAt": 100
        },
        "speaker": {"device": null, "updatedAt": 100}
    });
    let a = DeviceState::from_raw(&base).unwrap();

    // Same devices, different timestamps: unchanged.
    let mut ts_only = base.clone();
    ts_only["microphone"]["updatedAt"] = json!(500);
    let b = DeviceState::from_raw(&ts_only).unwrap();
    assert!(a.same_devices(&b));

    // A deeply nested field changed: that is a change.
    let mut nested = base.clone();
    nested["microphone"]["device"]["firmware"]["version"] = json!("1.3");
    let c = DeviceState::from_raw(&nested).unwrap();
    assert!(!a.same_devices(&c));
}

// ── Status / misc ───────────────────────────────────────────────────────

#[test]
fn test_connection_status_invariant_helpers() {
    let status = ConnectionStatus::connected(50192);
    assert!(status.connected && !status.connecting);
    assert_eq!(status.port, Some(50192));

    let status = ConnectionStatus::connecting();
    assert!(!status.connected && status.connecting);

    let status = ConnectionStatus::disconnected();
    assert!(!status.connected && !status.connecting);
    assert_eq!(status.to_string(), "disconnected");
}

#[test]
fn test_topic_wire_names() {
    assert_eq!(Topic::Devices.as_str(), "devices");
    assert_eq!(Topic::NoiseCancellation.as_str(), "nc");
    assert_eq!(Topic::AccentConversion.as_str(), "ac");
    assert_eq!(Topic::InCall.as_str(), "in_call");
    assert_eq!(serde_json::to_value(Topic::InCall).unwrap(), json!("in_call"));
}

#[test]
fn test_connection_options_defaults() {
    let options = ConnectionOptions::default();
    assert_eq!(options.host, DEFAULT_HOST);
    assert_eq!(options.ports, DEFAULT_PORTS.to_vec());
    assert!(options.auto_reconnect);
    assert_eq!(options.reconnect_delay_ms, 1000);
    assert_eq!(options.max_reconnect_delay_ms, 30000);
    assert!(options.max_reconnect_attempts.is_none());
    assert_eq!(options.auto_subscribe_topics.len(), 4);
}
