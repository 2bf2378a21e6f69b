use std::env;
use std::process::ExitCode;

use binary_telemetry::{read_file, ParsedStream};
use tracing::error;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: binary_telemetry <log-file> [max-records-per-stream]";

/// Prints the streams of a telemetry log.
///
/// Usage: `binary_telemetry <log-file> [max-records-per-stream]`
fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    let Some((path, limit)) = parse_args(env::args().skip(1)) else {
        eprintln!("{}", USAGE);
        return ExitCode::from(2);
    };

    let parsed = match read_file(&path) {
        Ok(parsed) => parsed,
        Err(err) => {
            error!(path = %path, error = %err, "failed to read telemetry log");
            return ExitCode::FAILURE;
        }
    };

    println!("Read {} streams from {}", parsed.streams.len(), path);
    for stream in &parsed.streams {
        print_stream(stream, limit);
    }
    if parsed.truncated {
        println!("(log ends with an incomplete frame)");
    }
    ExitCode::SUCCESS
}

/// Splits the command line into the log path and the per-stream record
/// limit. `None` means the arguments are malformed.
fn parse_args<I: Iterator<Item = String>>(mut args: I) -> Option<(String, usize)> {
    let path = args.next()?;
    let limit = match args.next() {
        Some(arg) => arg.parse::<usize>().ok()?,
        None => usize::MAX,
    };
    if args.next().is_some() {
        return None;
    }
    Some((path, limit))
}

fn print_stream(stream: &ParsedStream, limit: usize) {
    let schema = &stream.schema;
    println!("======== {} (id {}) ========", schema.name, schema.id);
    for (i, field) in schema.fields.iter().enumerate() {
        let label = schema
            .labels
            .as_ref()
            .and_then(|labels| labels.get(i))
            .map(String::as_str)
            .unwrap_or("-");
        println!("  field {}: {:<12} {:?}", i, label, field);
    }
    println!("  records: {}", stream.len());

    for (timestamp, record) in stream.timestamps.iter().zip(&stream.records).take(limit) {
        let values: Vec<String> = record.iter().map(|v| v.to_string()).collect();
        println!("  [{}] {}", timestamp, values.join(" | "));
    }
}
