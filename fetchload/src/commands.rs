use clap::{ArgAction, arg, command};

pub const DEFAULT_DB_PATH: &str = "./request_results.db";

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

fn db_arg() -> clap::Arg {
    arg!(-d --"db" <PATH>)
        .required(false)
        .help("Path of the SQLite database file")
        .env("FETCHLOAD_DB")
        .default_value(DEFAULT_DB_PATH)
}

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("fetchload")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("fetchload")
        .about("Fetch JSON records from an HTTP endpoint and store them in SQLite")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Only log errors; no spinner or summary")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-v --"verbose" "Log more (-v info, -vv debug, -vvv trace)")
                .required(false)
                .action(ArgAction::Count)
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(
            command!("load")
                .about("Fetch the URL once and write every returned record to the database")
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("The endpoint to fetch")
                        .env("FETCHLOAD_URL"),
                )
                .arg(db_arg())
                .arg(
                    arg!(-t --"table" <NAME>)
                        .required(false)
                        .help("Target table (default: last path segment of the URL)"),
                )
                .arg(
                    arg!(-X --"method" <METHOD>)
                        .required(false)
                        .help("HTTP method")
                        .value_parser(["GET", "POST"])
                        .default_value("GET"),
                )
                .arg(
                    arg!(-H --"header" <HEADER>)
                        .required(false)
                        .help("Request header as 'Name: value' (repeatable)")
                        .action(ArgAction::Append),
                )
                .arg(
                    arg!(-p --"param" <PARAM>)
                        .required(false)
                        .help("Query parameter as 'key=value' (repeatable)")
                        .action(ArgAction::Append),
                )
                .arg(
                    arg!(--"pointer" <JSON_POINTER>)
                        .required(false)
                        .help("JSON pointer to the record array inside the body, e.g. /data/items"),
                )
                .arg(
                    arg!(--"merge-column" <COLUMN>)
                        .required(false)
                        .help("Upsert on this column instead of appending"),
                )
                .arg(
                    arg!(--"measure" <KEY>)
                        .required(false)
                        .help("Add a <KEY>_length field to every record"),
                )
                .arg(
                    arg!(--"min-length" <N>)
                        .required(false)
                        .help("Keep only records whose <KEY>_length is at least N")
                        .value_parser(clap::value_parser!(i64))
                        .requires("measure"),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Request timeout in seconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("60"),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Summary format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                ),
        )
        .subcommand(
            command!("drop")
                .about("Drop a table from the database")
                .arg(db_arg())
                .arg(
                    arg!(-t --"table" <NAME>)
                        .required(true)
                        .help("The table to drop"),
                ),
        )
        .subcommand(
            command!("runs")
                .about("List the most recent load runs")
                .arg(db_arg())
                .arg(
                    arg!(-n --"limit" <N>)
                        .required(false)
                        .help("How many runs to show")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("10"),
                ),
        )
}
