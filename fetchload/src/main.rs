use colored::Colorize;
use fetchload::commands::command_argument_builder;
use fetchload::handlers::{describe_failure, handle_drop, handle_load, handle_runs, init_tracing};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");
    let verbosity = chosen_command.get_count("verbose");

    init_tracing(verbosity, quiet);

    let result = match chosen_command.subcommand() {
        Some(("load", primary_command)) => handle_load(primary_command).await.map(|_| ()),
        Some(("drop", primary_command)) => handle_drop(primary_command),
        Some(("runs", primary_command)) => handle_runs(primary_command),
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "✗".red().bold(), describe_failure(&e).red());
        std::process::exit(1);
    }
}
