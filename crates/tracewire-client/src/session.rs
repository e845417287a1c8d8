use std::collections::VecDeque;
use std::io::Write;

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, info, warn};

use tracewire_frame::StreamDefragmenter;

use crate::correlator::RequestCorrelator;
use crate::error::{ClientError, Result};
use crate::methods::{Method, MethodReply, MethodTable, ReplyDecoders};
use crate::proto::{decode_wire_frame, encode_wire_frame, FrameBody, MethodInfo, WireFrame};
use crate::reassembly::SliceReassembler;

/// Upward-facing surface of a session.
///
/// Invocations are fire-and-forget; completion is observed here, not through
/// return values.
pub trait SessionHandler {
    /// A decoded reply for a previously invoked method.
    fn on_response(&mut self, method: Method, reply: MethodReply);

    /// The delimited trace stream assembled from a completed streaming read.
    fn on_trace_complete(&mut self, trace: Bytes);

    /// A fatal protocol violation. The session is already closed when this
    /// fires; queued and in-flight work has been discarded.
    fn on_error(&mut self, message: &str);

    /// The transport closed. Queued and in-flight work has been discarded.
    fn on_close(&mut self);
}

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Service name to bind on the remote side.
    pub service_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            service_name: "ConsumerPort".to_string(),
        }
    }
}

/// Lifecycle state, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unbound,
    Binding,
    Bound,
    Closed,
}

enum BindState {
    Unbound,
    Binding { request_id: u32 },
    Bound(MethodTable),
    Closed,
}

/// Client session against a remote tracing service.
///
/// Owns every piece of per-connection state: the defragmentation buffer, the
/// bind state machine, the command queue, the pending-request map, and the
/// slice reassembler. Feed transport reads into [`Session::handle_data`] and
/// the transport close event into [`Session::handle_close`]; all side effects
/// are applied strictly in byte-arrival order.
///
/// The session must be owned by exactly one task. Nothing here is locked.
pub struct Session<T: Write, H: SessionHandler> {
    transport: T,
    handler: H,
    config: SessionConfig,
    state: BindState,
    defrag: StreamDefragmenter,
    correlator: RequestCorrelator,
    queue: VecDeque<(Method, Vec<u8>)>,
    decoders: ReplyDecoders,
    reassembler: SliceReassembler,
}

impl<T: Write, H: SessionHandler> Session<T, H> {
    pub fn new(transport: T, handler: H) -> Self {
        Self::with_config(transport, handler, SessionConfig::default())
    }

    pub fn with_config(transport: T, handler: H, config: SessionConfig) -> Self {
        Self {
            transport,
            handler,
            config,
            state: BindState::Unbound,
            defrag: StreamDefragmenter::new(),
            correlator: RequestCorrelator::new(),
            queue: VecDeque::new(),
            decoders: ReplyDecoders::standard(),
            reassembler: SliceReassembler::new(),
        }
    }

    /// Queue a method invocation (fire-and-forget).
    ///
    /// The first call starts the bind handshake; calls made while binding
    /// stay queued and are flushed in FIFO order once the service is bound.
    /// Once bound, every call flushes immediately. After the session closed
    /// this is a no-op.
    pub fn invoke<A: Serialize>(&mut self, method: Method, args: &A) -> Result<()> {
        if matches!(self.state, BindState::Closed) {
            warn!(%method, "invoke on closed session ignored");
            return Ok(());
        }

        let args = serde_json::to_vec(args)?;
        self.queue.push_back((method, args));

        let result = if matches!(self.state, BindState::Unbound) {
            self.start_binding()
        } else if matches!(self.state, BindState::Bound(_)) {
            self.flush_queue()
        } else {
            Ok(())
        };

        if let Err(err) = result {
            self.fail(&err.to_string());
            return Err(err);
        }
        Ok(())
    }

    /// Feed bytes received from the transport.
    ///
    /// Every frame completed by this chunk is dispatched in arrival order.
    /// On a fatal error the session closes, `on_error` fires, and the rest
    /// of the chunk is left unprocessed.
    pub fn handle_data(&mut self, data: &[u8]) {
        if matches!(self.state, BindState::Closed) {
            return;
        }

        let bodies = match self.defrag.push(data) {
            Ok(bodies) => bodies,
            Err(err) => {
                self.fail(&err.to_string());
                return;
            }
        };

        for body in bodies {
            let frame = match decode_wire_frame(&body) {
                Ok(frame) => frame,
                Err(err) => {
                    self.fail(&format!("undecodable frame: {err}"));
                    return;
                }
            };
            if let Err(err) = self.dispatch(frame) {
                self.fail(&err.to_string());
                return;
            }
            if matches!(self.state, BindState::Closed) {
                return;
            }
        }
    }

    /// The transport closed. Terminal for the session: queued commands and
    /// outstanding requests are discarded, and later calls are no-ops.
    pub fn handle_close(&mut self) {
        if matches!(self.state, BindState::Closed) {
            return;
        }
        info!(
            dropped_commands = self.queue.len(),
            outstanding = self.correlator.outstanding(),
            "transport closed; discarding session state"
        );
        self.teardown();
        self.handler.on_close();
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        match self.state {
            BindState::Unbound => SessionState::Unbound,
            BindState::Binding { .. } => SessionState::Binding,
            BindState::Bound(_) => SessionState::Bound,
            BindState::Closed => SessionState::Closed,
        }
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.state, BindState::Bound(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, BindState::Closed)
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    fn start_binding(&mut self) -> Result<()> {
        info!(service = %self.config.service_name, "binding service");
        self.send_peer_identity()?;

        let request_id = self.correlator.next_request_id();
        let frame = WireFrame {
            request_id,
            body: FrameBody::BindService {
                service_name: self.config.service_name.clone(),
            },
        };
        self.state = BindState::Binding { request_id };
        self.send_frame(&frame)
    }

    /// Announce the calling process identity. Fire-and-forget: request id 0,
    /// no reply expected, nothing tracked.
    fn send_peer_identity(&mut self) -> Result<()> {
        #[cfg(unix)]
        {
            // SAFETY: getpid/getuid have no preconditions and cannot fail.
            let (pid, uid) = unsafe { (libc::getpid(), libc::getuid()) };
            let frame = WireFrame {
                request_id: 0,
                body: FrameBody::SetPeerIdentity { pid, uid },
            };
            self.send_frame(&frame)?;
        }
        Ok(())
    }

    fn flush_queue(&mut self) -> Result<()> {
        let table = match &self.state {
            BindState::Bound(table) => table.clone(),
            _ => return Ok(()),
        };

        while let Some((method, args)) = self.queue.pop_front() {
            let Some(method_id) = table.find_method_id(method) else {
                warn!(%method, "service does not support method; dropping invocation");
                continue;
            };

            let request_id = self.correlator.next_request_id();
            self.correlator.track(request_id, method);
            let frame = WireFrame {
                request_id,
                body: FrameBody::InvokeMethod {
                    service_id: table.service_id(),
                    method_id,
                    args,
                },
            };
            debug!(request_id, %method, "invoking method");
            self.send_frame(&frame)?;
        }
        Ok(())
    }

    fn send_frame(&mut self, frame: &WireFrame) -> Result<()> {
        let wire = encode_wire_frame(frame)?;
        self.transport.write_all(&wire)?;
        self.transport.flush()?;
        Ok(())
    }

    fn dispatch(&mut self, frame: WireFrame) -> Result<()> {
        match frame.body {
            FrameBody::BindServiceReply {
                success,
                service_id,
                methods,
            } => self.handle_bind_reply(frame.request_id, success, service_id, methods),
            FrameBody::InvokeMethodReply {
                success,
                has_more,
                reply,
            } => self.handle_method_reply(frame.request_id, success, has_more, &reply),
            FrameBody::RequestError { error } => {
                if let BindState::Binding { request_id } = self.state {
                    if request_id == frame.request_id {
                        return Err(ClientError::BindFailed(error));
                    }
                }
                let method = self.correlator.resolve(frame.request_id, true)?;
                warn!(
                    request_id = frame.request_id,
                    %method,
                    %error,
                    "request failed on the service side; abandoning it"
                );
                Ok(())
            }
            FrameBody::BindService { .. }
            | FrameBody::InvokeMethod { .. }
            | FrameBody::SetPeerIdentity { .. } => {
                Err(ClientError::UnexpectedFrame(frame.request_id))
            }
        }
    }

    fn handle_bind_reply(
        &mut self,
        request_id: u32,
        success: bool,
        service_id: u32,
        methods: Vec<MethodInfo>,
    ) -> Result<()> {
        let expected = match self.state {
            BindState::Binding { request_id } => request_id,
            _ => return Err(ClientError::UnexpectedFrame(request_id)),
        };
        if request_id != expected {
            return Err(ClientError::UnknownRequest(request_id));
        }
        if !success {
            return Err(ClientError::BindFailed(format!(
                "bind rejected for service '{}'",
                self.config.service_name
            )));
        }

        let table = MethodTable::from_bind_reply(service_id, &methods);
        info!(
            service_id,
            methods = table.len(),
            queued = self.queue.len(),
            "service bound"
        );
        self.state = BindState::Bound(table);
        self.flush_queue()
    }

    fn handle_method_reply(
        &mut self,
        request_id: u32,
        success: bool,
        has_more: bool,
        reply: &[u8],
    ) -> Result<()> {
        let method = self.correlator.resolve(request_id, !has_more)?;

        if !success {
            warn!(request_id, %method, "service reported a failed invocation");
            return Ok(());
        }

        let decoded = match self.decoders.decode(method, reply) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!(request_id, %method, error = %err, "dropping undecodable reply");
                return Ok(());
            }
        };

        match decoded {
            MethodReply::ReadBuffers(reply) => {
                for slice in &reply.slices {
                    self.reassembler.ingest(slice);
                }
                if !has_more {
                    let trace = self.reassembler.flush();
                    debug!(bytes = trace.len(), "streaming read complete");
                    self.handler.on_trace_complete(trace);
                }
            }
            other => self.handler.on_response(method, other),
        }
        Ok(())
    }

    fn fail(&mut self, message: &str) {
        warn!(error = message, "fatal protocol error; closing session");
        self.teardown();
        self.handler.on_error(message);
    }

    fn teardown(&mut self) {
        self.state = BindState::Closed;
        self.queue.clear();
        self.correlator.clear();
        self.reassembler.clear();
    }
}
