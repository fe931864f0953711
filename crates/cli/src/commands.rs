//! clap command tree.

use clap::{Arg, ArgAction, Command};

/// Build the top-level `amfxml` command.
pub fn build_cli() -> Command {
    Command::new("amfxml")
        .about("Convert AMF3 values and Flex action messages to JSON text and back")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_name("FILE")
                .help("JSON file of converter options"),
        )
        .arg(
            Arg::new("compact")
                .long("compact")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Write text on one line"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::Count)
                .help("Log more (-v debug, -vv trace)"),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .global(true)
                .value_name("FILE")
                .help("Write the result to FILE instead of stdout"),
        )
        .subcommand(
            Command::new("message-to-text")
                .about("Render an AMF action message as JSON")
                .arg(input_arg())
                .arg(
                    Arg::new("render-aliases")
                        .long("render-aliases")
                        .action(ArgAction::SetTrue)
                        .help("Register the DSC/DSK small-message aliases before rendering"),
                )
                .arg(
                    Arg::new("keep-acks")
                        .long("keep-acks")
                        .action(ArgAction::SetTrue)
                        .help("Render acknowledgment messages instead of skipping them"),
                ),
        )
        .subcommand(
            Command::new("text-to-message")
                .about("Encode a JSON action message as AMF")
                .arg(input_arg()),
        )
        .subcommand(
            Command::new("object-to-text")
                .about("Render a single AMF3 value as JSON")
                .arg(input_arg()),
        )
        .subcommand(
            Command::new("text-to-object")
                .about("Encode a JSON value as a single AMF3 value")
                .arg(input_arg()),
        )
}

fn input_arg() -> Arg {
    Arg::new("input")
        .value_name("INPUT")
        .default_value("-")
        .help("Input file, or - for stdin")
}
