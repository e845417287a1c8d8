use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use tracewire_frame::encode_frame;

use crate::error::Result;

/// One complete protocol message.
///
/// `request_id` is unique among currently-outstanding requests on a
/// connection and is never reused while a matching reply is pending.
/// Fire-and-forget frames (`SetPeerIdentity`) carry request id 0, below the
/// range issued for tracked requests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireFrame {
    pub request_id: u32,
    #[serde(flatten)]
    pub body: FrameBody,
}

/// Frame body. Exactly one variant is set per frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "msg", rename_all = "snake_case")]
pub enum FrameBody {
    /// Client → service: resolve a service name to a method table.
    BindService { service_name: String },
    /// Service → client: result of a bind request.
    BindServiceReply {
        success: bool,
        service_id: u32,
        methods: Vec<MethodInfo>,
    },
    /// Client → service: invoke a bound method with serialized arguments.
    InvokeMethod {
        service_id: u32,
        method_id: u32,
        args: Vec<u8>,
    },
    /// Service → client: one reply for an invocation. Streaming methods send
    /// several with `has_more = true` before the final one.
    InvokeMethodReply {
        success: bool,
        has_more: bool,
        reply: Vec<u8>,
    },
    /// Service → client: the request failed at the protocol level.
    RequestError { error: String },
    /// Client → service: announce the calling process identity, sent once
    /// before binding. No reply is expected.
    SetPeerIdentity { pid: i32, uid: u32 },
}

/// One method advertised by the service in a `BindServiceReply`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MethodInfo {
    pub id: u32,
    pub name: String,
}

/// Serialize a frame and prepend the wire-format length prefix.
pub fn encode_wire_frame(frame: &WireFrame) -> Result<Bytes> {
    let body = serde_json::to_vec(frame)?;
    let mut buf = BytesMut::new();
    encode_frame(&body, &mut buf)?;
    Ok(buf.freeze())
}

/// Deserialize one defragmented frame body.
pub fn decode_wire_frame(body: &[u8]) -> Result<WireFrame> {
    Ok(serde_json::from_slice(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracewire_frame::LENGTH_PREFIX_SIZE;

    #[test]
    fn wire_frame_roundtrip() {
        let frame = WireFrame {
            request_id: 7,
            body: FrameBody::BindService {
                service_name: "consumer".to_string(),
            },
        };

        let wire = encode_wire_frame(&frame).unwrap();
        let decoded = decode_wire_frame(&wire[LENGTH_PREFIX_SIZE..]).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn length_prefix_matches_body() {
        let frame = WireFrame {
            request_id: 1,
            body: FrameBody::RequestError {
                error: "nope".to_string(),
            },
        };

        let wire = encode_wire_frame(&frame).unwrap();
        let declared = u32::from_le_bytes([wire[0], wire[1], wire[2], wire[3]]) as usize;
        assert_eq!(declared, wire.len() - LENGTH_PREFIX_SIZE);
    }

    #[test]
    fn body_variants_are_tagged() {
        let frame = WireFrame {
            request_id: 3,
            body: FrameBody::SetPeerIdentity { pid: 42, uid: 1000 },
        };
        let json: serde_json::Value =
            serde_json::from_slice(&serde_json::to_vec(&frame).unwrap()).unwrap();

        assert_eq!(json["msg"], "set_peer_identity");
        assert_eq!(json["request_id"], 3);
        assert_eq!(json["pid"], 42);
    }

    #[test]
    fn invoke_reply_roundtrip_preserves_raw_payload() {
        let frame = WireFrame {
            request_id: 9,
            body: FrameBody::InvokeMethodReply {
                success: true,
                has_more: true,
                reply: vec![0x00, 0xFF, 0x7F],
            },
        };

        let wire = encode_wire_frame(&frame).unwrap();
        let decoded = decode_wire_frame(&wire[LENGTH_PREFIX_SIZE..]).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn unknown_tag_fails_to_decode() {
        let result = decode_wire_frame(br#"{"request_id":1,"msg":"who_knows"}"#);
        assert!(result.is_err());
    }
}
