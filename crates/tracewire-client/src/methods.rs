use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::proto::MethodInfo;

/// Closed set of service methods this client understands.
///
/// The protocol identifies methods by name; the service assigns the numeric
/// ids at bind time. Names outside this set advertised by the service are
/// ignored, and invocations of methods the service did not advertise are
/// dropped with a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    EnableTracing,
    StartTracing,
    DisableTracing,
    ReadBuffers,
    FreeBuffers,
    Flush,
    GetTraceStats,
}

impl Method {
    pub const ALL: [Method; 7] = [
        Method::EnableTracing,
        Method::StartTracing,
        Method::DisableTracing,
        Method::ReadBuffers,
        Method::FreeBuffers,
        Method::Flush,
        Method::GetTraceStats,
    ];

    /// Protocol-level method name.
    pub fn name(self) -> &'static str {
        match self {
            Method::EnableTracing => "EnableTracing",
            Method::StartTracing => "StartTracing",
            Method::DisableTracing => "DisableTracing",
            Method::ReadBuffers => "ReadBuffers",
            Method::FreeBuffers => "FreeBuffers",
            Method::Flush => "Flush",
            Method::GetTraceStats => "GetTraceStats",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Method::ALL.iter().copied().find(|m| m.name() == name)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Method-id table negotiated at bind time.
///
/// Populated exactly once from a successful `BindServiceReply`; immutable
/// for the session's lifetime.
#[derive(Debug, Clone)]
pub struct MethodTable {
    service_id: u32,
    ids: HashMap<Method, u32>,
}

impl MethodTable {
    pub fn from_bind_reply(service_id: u32, methods: &[MethodInfo]) -> Self {
        let mut ids = HashMap::with_capacity(methods.len());
        for info in methods {
            match Method::from_name(&info.name) {
                Some(method) => {
                    ids.insert(method, info.id);
                }
                None => debug!(name = %info.name, "ignoring unknown service method"),
            }
        }
        Self { service_id, ids }
    }

    pub fn service_id(&self) -> u32 {
        self.service_id
    }

    /// Resolve a method to the id the service assigned it, if advertised.
    pub fn find_method_id(&self, method: Method) -> Option<u32> {
        self.ids.get(&method).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Arguments for `EnableTracing`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TraceConfig {
    pub buffer_size_kb: u32,
    pub duration_ms: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
}

/// A fragment of a logical trace packet.
///
/// `last_slice_for_packet` marks the final fragment; concatenating every
/// slice up to and including it, in delivery order, yields one packet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TraceSlice {
    pub data: Vec<u8>,
    pub last_slice_for_packet: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnableTracingReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DisableTracingReply {}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadBuffersReply {
    pub slices: Vec<TraceSlice>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FreeBuffersReply {}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlushReply {}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BufferStats {
    pub buffer_size: u64,
    pub bytes_written: u64,
    pub chunks_written: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TraceStatsReply {
    pub buffer_stats: Vec<BufferStats>,
}

/// A decoded reply, tagged by the method that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodReply {
    EnableTracing(EnableTracingReply),
    DisableTracing(DisableTracingReply),
    ReadBuffers(ReadBuffersReply),
    FreeBuffers(FreeBuffersReply),
    Flush(FlushReply),
    GetTraceStats(TraceStatsReply),
}

type DecodeFn = fn(&[u8]) -> serde_json::Result<MethodReply>;

/// Per-method reply decoder registry.
///
/// Methods without a registered decoder are known to the protocol but have
/// no reply type on this side; their replies are dropped, not treated as
/// errors.
pub struct ReplyDecoders {
    decoders: HashMap<Method, DecodeFn>,
}

impl ReplyDecoders {
    /// Registry covering every supported method except `StartTracing`,
    /// whose reply carries nothing the client consumes.
    pub fn standard() -> Self {
        let mut decoders: HashMap<Method, DecodeFn> = HashMap::new();
        decoders.insert(Method::EnableTracing, |raw| {
            Ok(MethodReply::EnableTracing(serde_json::from_slice(raw)?))
        });
        decoders.insert(Method::DisableTracing, |raw| {
            Ok(MethodReply::DisableTracing(serde_json::from_slice(raw)?))
        });
        decoders.insert(Method::ReadBuffers, |raw| {
            Ok(MethodReply::ReadBuffers(serde_json::from_slice(raw)?))
        });
        decoders.insert(Method::FreeBuffers, |raw| {
            Ok(MethodReply::FreeBuffers(serde_json::from_slice(raw)?))
        });
        decoders.insert(Method::Flush, |raw| {
            Ok(MethodReply::Flush(serde_json::from_slice(raw)?))
        });
        decoders.insert(Method::GetTraceStats, |raw| {
            Ok(MethodReply::GetTraceStats(serde_json::from_slice(raw)?))
        });
        Self { decoders }
    }

    pub fn has_decoder(&self, method: Method) -> bool {
        self.decoders.contains_key(&method)
    }

    /// Decode a raw reply payload for `method`.
    pub fn decode(&self, method: Method, payload: &[u8]) -> Result<MethodReply, DecodeError> {
        match self.decoders.get(&method) {
            Some(decode) => decode(payload).map_err(|source| DecodeError::Malformed {
                method,
                source,
            }),
            None => Err(DecodeError::UnsupportedMethod(method)),
        }
    }
}

impl Default for ReplyDecoders {
    fn default() -> Self {
        Self::standard()
    }
}

/// Reply decoding failures. Non-fatal: the session logs and drops the reply.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The method is known but its reply type is not locally registered.
    #[error("no reply decoder registered for {0}")]
    UnsupportedMethod(Method),

    /// The reply payload did not match the expected shape.
    #[error("failed decoding {method} reply: {source}")]
    Malformed {
        method: Method,
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: u32, name: &str) -> MethodInfo {
        MethodInfo {
            id,
            name: name.to_string(),
        }
    }

    #[test]
    fn method_names_roundtrip() {
        for method in Method::ALL {
            assert_eq!(Method::from_name(method.name()), Some(method));
        }
        assert_eq!(Method::from_name("NotAMethod"), None);
    }

    #[test]
    fn table_resolves_advertised_methods() {
        let table = MethodTable::from_bind_reply(
            5,
            &[info(1, "EnableTracing"), info(2, "ReadBuffers")],
        );

        assert_eq!(table.service_id(), 5);
        assert_eq!(table.find_method_id(Method::EnableTracing), Some(1));
        assert_eq!(table.find_method_id(Method::ReadBuffers), Some(2));
        assert_eq!(table.find_method_id(Method::Flush), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn table_ignores_unknown_service_methods() {
        let table =
            MethodTable::from_bind_reply(1, &[info(1, "EnableTracing"), info(9, "FutureMethod")]);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn standard_registry_skips_start_tracing() {
        let decoders = ReplyDecoders::standard();
        for method in Method::ALL {
            assert_eq!(
                decoders.has_decoder(method),
                method != Method::StartTracing,
                "{method}"
            );
        }
    }

    #[test]
    fn decode_read_buffers_reply() {
        let decoders = ReplyDecoders::standard();
        let payload = serde_json::to_vec(&ReadBuffersReply {
            slices: vec![TraceSlice {
                data: vec![1, 2, 3],
                last_slice_for_packet: true,
            }],
        })
        .unwrap();

        let reply = decoders.decode(Method::ReadBuffers, &payload).unwrap();
        match reply {
            MethodReply::ReadBuffers(reply) => {
                assert_eq!(reply.slices.len(), 1);
                assert!(reply.slices[0].last_slice_for_packet);
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[test]
    fn missing_decoder_is_unsupported() {
        let decoders = ReplyDecoders::standard();
        let result = decoders.decode(Method::StartTracing, b"{}");
        assert!(matches!(result, Err(DecodeError::UnsupportedMethod(_))));
    }

    #[test]
    fn malformed_payload_is_reported() {
        let decoders = ReplyDecoders::standard();
        let result = decoders.decode(Method::GetTraceStats, b"not-json");
        assert!(matches!(result, Err(DecodeError::Malformed { .. })));
    }

    #[test]
    fn trace_config_omits_empty_categories() {
        let json = serde_json::to_value(TraceConfig {
            buffer_size_kb: 1024,
            duration_ms: 5000,
            categories: Vec::new(),
        })
        .unwrap();
        assert!(json.get("categories").is_none());
    }
}
