//! ArgMatches → CliAction conversion.
//!
//! Translates clap's parsed arguments into one conversion request plus the
//! settings that shape the converter and the logger.

use clap::ArgMatches;
use std::path::PathBuf;

/// One conversion, in wire terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// AMF action message bytes → JSON
    MessageToText,
    /// JSON → AMF action message bytes
    TextToMessage,
    /// AMF3 value bytes → JSON
    ObjectToText,
    /// JSON → AMF3 value bytes
    TextToObject,
}

/// Where to read from or write to. `None` is stdin/stdout.
pub type Location = Option<PathBuf>;

/// The result of parsing the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliAction {
    pub operation: Operation,
    pub input: Location,
    pub output: Location,
    pub config: Option<PathBuf>,
    pub compact: bool,
    pub render_aliases: bool,
    pub keep_acks: bool,
    pub verbosity: u8,
}

/// Convert clap ArgMatches into a CliAction.
pub fn matches_to_action(matches: &ArgMatches) -> Result<CliAction, String> {
    let (sub_name, sub_matches) = matches
        .subcommand()
        .ok_or_else(|| "No command provided".to_string())?;

    let operation = match sub_name {
        "message-to-text" => Operation::MessageToText,
        "text-to-message" => Operation::TextToMessage,
        "object-to-text" => Operation::ObjectToText,
        "text-to-object" => Operation::TextToObject,
        other => return Err(format!("Unknown command: {}", other)),
    };

    let flag = |name: &str| {
        operation == Operation::MessageToText && sub_matches.get_flag(name)
    };

    Ok(CliAction {
        operation,
        input: location(sub_matches.get_one::<String>("input")),
        output: location(sub_matches.get_one::<String>("output")),
        config: sub_matches.get_one::<String>("config").map(PathBuf::from),
        compact: sub_matches.get_flag("compact"),
        render_aliases: flag("render-aliases"),
        keep_acks: flag("keep-acks"),
        verbosity: sub_matches.get_count("verbose"),
    })
}

fn location(arg: Option<&String>) -> Location {
    match arg.map(String::as_str) {
        None | Some("-") => None,
        Some(path) => Some(PathBuf::from(path)),
    }
}
