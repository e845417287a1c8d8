use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracewire_client::{connect, Method, TraceConfig};
use tracing::info;

use crate::cmd::RecordArgs;
use crate::drive::{parse_duration, pump_until, CliHandler, READ_TIMEOUT};
use crate::exit::{client_error, io_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_record_summary, OutputFormat};

pub fn run(args: RecordArgs, format: OutputFormat) -> CliResult<i32> {
    let duration = parse_duration(&args.duration)?;
    let reply_timeout = parse_duration(&args.timeout)?;

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&interrupted);
        ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)).map_err(|err| {
            CliError::new(INTERNAL, format!("failed installing ctrl-c handler: {err}"))
        })?;
    }

    let (mut session, mut reader) = connect(&args.path, CliHandler::default())
        .map_err(|err| client_error("connect failed", err))?;
    reader
        .set_read_timeout(Some(READ_TIMEOUT))
        .map_err(|err| transport_error("configure read timeout", err))?;

    let trace_config = TraceConfig {
        buffer_size_kb: args.buffer_size_kb,
        duration_ms: duration.as_millis().min(u128::from(u32::MAX)) as u32,
        categories: args.categories.clone().unwrap_or_default(),
    };
    session
        .invoke(Method::EnableTracing, &trace_config)
        .map_err(|err| client_error("enable tracing failed", err))?;
    pump_until(&mut session, &mut reader, reply_timeout, None, |h| {
        h.has_reply(Method::EnableTracing)
    })?;

    info!(duration_ms = duration.as_millis() as u64, "recording");
    wait_recording(duration, &interrupted);

    session
        .invoke(Method::DisableTracing, &())
        .map_err(|err| client_error("disable tracing failed", err))?;
    pump_until(&mut session, &mut reader, reply_timeout, None, |h| {
        h.has_reply(Method::DisableTracing)
    })?;

    session
        .invoke(Method::ReadBuffers, &())
        .map_err(|err| client_error("read buffers failed", err))?;
    pump_until(&mut session, &mut reader, reply_timeout, None, |h| {
        h.trace.is_some()
    })?;

    // Fire-and-forget; the trace is already in hand.
    session
        .invoke(Method::FreeBuffers, &())
        .map_err(|err| client_error("free buffers failed", err))?;

    let Some(trace) = session.handler().trace.clone() else {
        return Err(CliError::new(INTERNAL, "trace missing after completed read"));
    };
    std::fs::write(&args.out, &trace)
        .map_err(|err| io_error(&format!("failed writing {}", args.out.display()), err))?;

    print_record_summary(&args.out, trace.len(), format);
    Ok(SUCCESS)
}

fn wait_recording(duration: Duration, interrupted: &Arc<AtomicBool>) {
    let deadline = Instant::now() + duration;
    while Instant::now() < deadline {
        if interrupted.load(Ordering::SeqCst) {
            info!("interrupted; stopping recording early");
            return;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}
