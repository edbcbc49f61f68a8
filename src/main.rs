use std::io;
use std::process;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::env::CompleteEnv;
use clap_complete::{Shell, generate};
use tracing_subscriber::EnvFilter;

use chatblocks::config;

mod args;
mod cmd;

#[derive(Parser)]
#[command(name = "chatblocks")]
#[command(version = env!("CHATBLOCKS_VERSION"))]
#[command(about = "Track chat thread links inside markdown codeblocks")]
#[command(
    long_about = "chatblocks - Keep the chat threads of a note inside the note.\n\nA block opened with ```smart-<platform> holds one line per thread:\n\n  chat-active:: <unix seconds> <url>\n  chat-done:: <unix seconds> <url>\n\nThe block opens its first unfinished thread, saves new thread links as you\nnavigate, and moves on to the next thread when one is marked done."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the links of a block and the state of the one it opens with
    #[command(alias = "ls")]
    Links(cmd::links::LinksArgs),

    /// Upgrade bare links to chat-active:: lines
    Prefix(cmd::prefix::PrefixArgs),

    /// Mark a thread done and show the next one
    Done(cmd::done::DoneArgs),

    /// Mark a done thread active again
    #[command(alias = "reopen")]
    Activate(cmd::activate::ActivateArgs),

    /// Save a thread link into a block
    Add(cmd::add::AddArgs),

    /// Classify URLs by platform and thread shape
    Classify(cmd::classify::ClassifyArgs),

    /// Merge two conversation lists
    Merge(cmd::merge::MergeArgs),

    /// List conversations found in a browser console log
    Detect(cmd::detect::DetectArgs),

    /// Replay recorded navigation events against a block
    Replay(cmd::replay::ReplayArgs),

    /// Insert an empty block into a markdown file
    Insert(cmd::insert::InsertArgs),

    /// Generate shell completion script
    Completion(CompletionArgs),

    /// Configuration introspection
    Config(cmd::config_cmd::ConfigArgs),
}

#[derive(clap::Args)]
struct CompletionArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Clone, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    Powershell,
}

/// Diagnostics go to stderr, filtered by CHATBLOCKS_LOG (default: warn).
fn init_logging() {
    let filter =
        EnvFilter::try_from_env(config::ENV_LOG).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn main() {
    // Handle dynamic shell completions
    CompleteEnv::with_factory(Cli::command).complete();

    // Use try_parse to catch errors and normalize exit code
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // Exit with 0 for help/version, 1 for actual errors
            let exit_code = if e.kind() == clap::error::ErrorKind::DisplayHelp
                || e.kind() == clap::error::ErrorKind::DisplayVersion
            {
                0
            } else {
                1
            };
            process::exit(exit_code);
        }
    };

    if let Commands::Completion(args) = &cli.command {
        let shell = match args.shell {
            CompletionShell::Bash => Shell::Bash,
            CompletionShell::Zsh => Shell::Zsh,
            CompletionShell::Fish => Shell::Fish,
            CompletionShell::Powershell => Shell::PowerShell,
        };
        generate(shell, &mut Cli::command(), "chatblocks", &mut io::stdout());
        return;
    }

    init_logging();

    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(e) => {
            eprintln!("cannot get cwd: {}", e);
            process::exit(1);
        }
    };
    let loaded_config = config::load_config(&cwd);
    let config = &loaded_config.config;

    let result = match cli.command {
        Commands::Links(args) => cmd::links::run(args, config),
        Commands::Prefix(args) => cmd::prefix::run(args, config),
        Commands::Done(args) => cmd::done::run(args, config),
        Commands::Activate(args) => cmd::activate::run(args, config),
        Commands::Add(args) => cmd::add::run(args, config),
        Commands::Classify(args) => cmd::classify::run(args),
        Commands::Merge(args) => cmd::merge::run(args, config),
        Commands::Detect(args) => cmd::detect::run(args, config),
        Commands::Replay(args) => cmd::replay::run(args, config),
        Commands::Insert(args) => cmd::insert::run(args),
        Commands::Config(args) => cmd::config_cmd::run(args, &loaded_config),
        Commands::Completion(_) => unreachable!(), // Handled above
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        process::exit(1);
    }
}
