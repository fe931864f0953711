//! amfxml CLI: convert AMF payloads to JSON text and back.
//!
//! ```text
//! amfxml message-to-text capture.amf > capture.json
//! amfxml text-to-message capture.json -o replay.amf
//! amfxml object-to-text - < value.amf
//! ```
//!
//! Logs go to stderr; `RUST_LOG` overrides the level chosen with `-v`.

mod commands;
mod parse;

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process;

use amfxml::{Converter, ConverterOptions};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::build_cli;
use parse::{matches_to_action, CliAction, Location, Operation};

fn main() {
    let matches = build_cli().get_matches();

    let action = match matches_to_action(&matches) {
        Ok(action) => action,
        Err(e) => {
            eprintln!("(error) {}", e);
            process::exit(2);
        }
    };

    init_tracing(action.verbosity);

    match run(&action) {
        Ok(()) => {}
        Err(e) => {
            eprintln!("(error) {}", e);
            process::exit(1);
        }
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(io::stderr),
        )
        .init();
}

fn build_converter(action: &CliAction) -> Result<Converter, String> {
    let mut options = match &action.config {
        Some(path) => ConverterOptions::from_file(path).map_err(|e| e.to_string())?,
        None => ConverterOptions::default(),
    };
    if action.compact {
        options.pretty = false;
    }
    if action.render_aliases {
        options.render_aliases = true;
    }
    if action.keep_acks {
        options.suppress_acknowledgments = false;
    }
    Converter::builder()
        .options(options)
        .build()
        .map_err(|e| e.to_string())
}

fn run(action: &CliAction) -> Result<(), String> {
    let converter = build_converter(action)?;
    let input = read_input(&action.input)?;
    debug!(operation = ?action.operation, len = input.len(), "read input");

    let output = match action.operation {
        Operation::MessageToText => match converter.render_message(&input) {
            Ok(Some(text)) => with_newline(text),
            Ok(None) => {
                eprintln!("(skipped) acknowledgment message");
                return Ok(());
            }
            Err(e) => return Err(e.to_string()),
        },
        Operation::TextToMessage => converter
            .text_to_amf_message(&as_text(input)?)
            .map_err(|e| e.to_string())?,
        Operation::ObjectToText => converter
            .try_amf_object_to_text(&input)
            .map(with_newline)
            .map_err(|e| e.to_string())?,
        Operation::TextToObject => converter
            .try_text_to_amf_object(&as_text(input)?)
            .map_err(|e| e.to_string())?,
    };

    write_output(&action.output, &output)
}

fn with_newline(mut text: String) -> Vec<u8> {
    text.push('\n');
    text.into_bytes()
}

fn as_text(input: Vec<u8>) -> Result<String, String> {
    String::from_utf8(input).map_err(|e| format!("input is not UTF-8: {}", e))
}

fn read_input(location: &Location) -> Result<Vec<u8>, String> {
    match location {
        Some(path) => fs::read(path).map_err(|e| describe(path, e)),
        None => {
            let mut buf = Vec::new();
            io::stdin()
                .read_to_end(&mut buf)
                .map_err(|e| format!("stdin: {}", e))?;
            Ok(buf)
        }
    }
}

fn write_output(location: &Location, bytes: &[u8]) -> Result<(), String> {
    match location {
        Some(path) => fs::write(path, bytes).map_err(|e| describe(path, e)),
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(bytes)
                .and_then(|()| stdout.flush())
                .map_err(|e| format!("stdout: {}", e))
        }
    }
}

fn describe(path: &Path, e: io::Error) -> String {
    format!("{}: {}", path.display(), e)
}
