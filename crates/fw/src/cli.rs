//! Clap CLI definitions for the `fw` command.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// fw -- evaluate and replay reactive form formulas.
#[derive(Parser, Debug)]
#[command(
    name = "fw",
    about = "Evaluate and replay reactive form formulas",
    long_about = "Compiles form formulas, shows what they depend on and replays scripted form sessions against the reactive engine.",
    version,
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Global flags available to all subcommands.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Engine configuration file (default: ./formwire.yaml).
    #[arg(long, global = true, env = "FW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output in JSON format.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose/debug output.
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output (errors only).
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,
}

/// All available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate a formula once against the given field values.
    Eval(EvalArgs),

    /// List what a formula reads.
    #[command(alias = "dependencies")]
    Deps(DepsArgs),

    /// Run a scripted form session and print every publication.
    Replay(ReplayArgs),

    /// List built-in functions.
    #[command(alias = "fns")]
    Functions(FunctionsArgs),

    /// Generate shell completion scripts.
    Completion(CompletionArgs),

    /// Print version information.
    Version,
}

/// Bindings shared by `eval` and `deps`.
#[derive(Args, Debug, Clone, Default)]
pub struct BindingArgs {
    /// Known field, as PATH=JSON. Non-JSON values are taken as text.
    #[arg(long = "field", short = 'f', value_name = "PATH=JSON")]
    pub fields: Vec<String>,

    /// Repeating-group instance `this.` refers to, e.g. claims[1].
    #[arg(long)]
    pub scope: Option<String>,

    /// Fixed argument, as NAME=JSON.
    #[arg(long = "fixed", value_name = "NAME=JSON")]
    pub fixed: Vec<String>,

    /// Debug label attached to errors.
    #[arg(long)]
    pub label: Option<String>,
}

#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Formula source.
    pub expression: String,

    #[command(flatten)]
    pub bindings: BindingArgs,

    /// Show the rewritten formula alongside the result.
    #[arg(long)]
    pub explain: bool,
}

#[derive(Args, Debug)]
pub struct DepsArgs {
    /// Formula source.
    pub expression: String,

    #[command(flatten)]
    pub bindings: BindingArgs,

    /// External argument name bound to a host channel.
    #[arg(long = "external", value_name = "NAME")]
    pub external: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// YAML script with fields, expressions and events.
    pub script: PathBuf,
}

#[derive(Args, Debug)]
pub struct FunctionsArgs {
    /// Only list built-ins of this category (text, math, date, ...).
    #[arg(long)]
    pub category: Option<String>,

    /// Include structural and legacy functions.
    #[arg(long, short = 'a')]
    pub all: bool,
}

#[derive(Args, Debug)]
pub struct CompletionArgs {
    #[command(subcommand)]
    pub command: CompletionCommands,
}

#[derive(Subcommand, Debug)]
pub enum CompletionCommands {
    /// Generate bash completions.
    Bash,
    /// Generate zsh completions.
    Zsh,
    /// Generate fish completions.
    Fish,
    /// Generate PowerShell completions.
    Powershell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_repeated_bindings() {
        let cli = Cli::parse_from([
            "fw", "eval", "a + b", "--field", "a=1", "-f", "b=2", "--fixed", "rate=0.5", "--json",
        ]);
        assert!(cli.global.json);
        match cli.command {
            Some(Commands::Eval(args)) => {
                assert_eq!(args.expression, "a + b");
                assert_eq!(args.bindings.fields, vec!["a=1", "b=2"]);
                assert_eq!(args.bindings.fixed, vec!["rate=0.5"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
