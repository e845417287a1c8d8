use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracewire_client::{Method, MethodReply, Session, SessionHandler};
use tracewire_transport::TraceStream;

use crate::exit::{CliError, CliResult, FAILURE, PROTOCOL_ERROR, TIMEOUT, USAGE};

/// Poll interval for the read loop; short enough to notice ctrl-c promptly.
pub const READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Session handler that records events for the command loops to poll.
#[derive(Default)]
pub struct CliHandler {
    pub replies: Vec<(Method, MethodReply)>,
    pub trace: Option<Bytes>,
    pub error: Option<String>,
    pub closed: bool,
}

impl CliHandler {
    pub fn has_reply(&self, method: Method) -> bool {
        self.replies.iter().any(|(m, _)| *m == method)
    }
}

impl SessionHandler for CliHandler {
    fn on_response(&mut self, method: Method, reply: MethodReply) {
        if let MethodReply::EnableTracing(reply) = &reply {
            if let Some(error) = &reply.error {
                self.error = Some(format!("enable tracing failed: {error}"));
            }
        }
        self.replies.push((method, reply));
    }

    fn on_trace_complete(&mut self, trace: Bytes) {
        self.trace = Some(trace);
    }

    fn on_error(&mut self, message: &str) {
        self.error = Some(message.to_string());
    }

    fn on_close(&mut self) {
        self.closed = true;
    }
}

/// Drive the session until `done` reports completion or `deadline` elapses.
///
/// The reader must have a read timeout configured (see [`READ_TIMEOUT`]) so
/// the loop can observe interrupts and the deadline between reads.
pub fn pump_until<F>(
    session: &mut Session<TraceStream, CliHandler>,
    reader: &mut TraceStream,
    deadline: Duration,
    interrupted: Option<&Arc<AtomicBool>>,
    done: F,
) -> CliResult<()>
where
    F: Fn(&CliHandler) -> bool,
{
    let start = Instant::now();
    let mut buf = [0u8; 8 * 1024];
    loop {
        if let Some(error) = &session.handler().error {
            return Err(CliError::new(PROTOCOL_ERROR, error.clone()));
        }
        if session.handler().closed {
            return Err(CliError::new(FAILURE, "service closed the connection"));
        }
        if done(session.handler()) {
            return Ok(());
        }
        if let Some(flag) = interrupted {
            if flag.load(Ordering::SeqCst) {
                return Err(CliError::new(FAILURE, "interrupted"));
            }
        }
        if start.elapsed() >= deadline {
            return Err(CliError::new(
                TIMEOUT,
                "timed out waiting for service reply",
            ));
        }

        match reader.read(&mut buf) {
            Ok(0) => session.handle_close(),
            Ok(n) => session.handle_data(&buf[..n]),
            Err(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock
                        | std::io::ErrorKind::TimedOut
                        | std::io::ErrorKind::Interrupted
                ) =>
            {
                continue;
            }
            Err(err) => return Err(crate::exit::io_error("read failed", err)),
        }
    }
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}
