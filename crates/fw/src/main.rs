//! `fw` -- command-line front end for the formwire formula engine.
//!
//! Parses CLI arguments with clap, loads the engine configuration into a
//! runtime context, installs logging and dispatches to command handlers.

mod cli;
mod commands;
mod context;
mod output;
mod styles;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use context::RuntimeContext;

fn main() {
    let cli = Cli::parse();

    let ctx = match RuntimeContext::from_global_args(&cli.global) {
        Ok(ctx) => ctx,
        Err(e) => exit_with_error(&e, cli.global.json),
    };

    // Logs go to stderr so they never mix with command output.
    let filter =
        EnvFilter::try_from_env("FW_LOG").unwrap_or_else(|_| EnvFilter::new(ctx.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Some(Commands::Eval(args)) => commands::eval::run(&ctx, &args),
        Some(Commands::Deps(args)) => commands::deps::run(&ctx, &args),
        Some(Commands::Replay(args)) => commands::replay::run(&ctx, &args),
        Some(Commands::Functions(args)) => commands::functions::run(&ctx, &args),
        Some(Commands::Completion(args)) => commands::completion::run(&ctx, &args),
        Some(Commands::Version) => commands::version::run(&ctx),
        None => {
            use clap::CommandFactory;
            Cli::command().print_help().ok();
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        exit_with_error(&e, ctx.json);
    }
}

/// Prints `e` (as JSON under `--json`) and exits with code 1.
fn exit_with_error(e: &anyhow::Error, json: bool) -> ! {
    if json {
        let err_json = serde_json::json!({
            "error": format!("{:#}", e),
        });
        if let Ok(s) = serde_json::to_string_pretty(&err_json) {
            eprintln!("{}", s);
        }
    } else {
        eprintln!("Error: {:#}", e);
    }
    std::process::exit(1);
}
