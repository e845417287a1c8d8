use tracewire_client::{connect, Method, MethodReply};

use crate::cmd::StatsArgs;
use crate::drive::{parse_duration, pump_until, CliHandler, READ_TIMEOUT};
use crate::exit::{client_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_stats, OutputFormat};

pub fn run(args: StatsArgs, format: OutputFormat) -> CliResult<i32> {
    let reply_timeout = parse_duration(&args.timeout)?;

    let (mut session, mut reader) = connect(&args.path, CliHandler::default())
        .map_err(|err| client_error("connect failed", err))?;
    reader
        .set_read_timeout(Some(READ_TIMEOUT))
        .map_err(|err| transport_error("configure read timeout", err))?;

    session
        .invoke(Method::GetTraceStats, &())
        .map_err(|err| client_error("stats request failed", err))?;
    pump_until(&mut session, &mut reader, reply_timeout, None, |h| {
        h.has_reply(Method::GetTraceStats)
    })?;

    let stats = session.handler().replies.iter().find_map(|(_, reply)| {
        if let MethodReply::GetTraceStats(stats) = reply {
            Some(stats.clone())
        } else {
            None
        }
    });

    match stats {
        Some(stats) => {
            print_stats(&stats, format);
            Ok(SUCCESS)
        }
        None => Err(CliError::new(INTERNAL, "stats reply missing")),
    }
}
