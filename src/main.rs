// Copyright 2026 Vigil Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use vigil_runtime::cli;

#[derive(Parser)]
#[command(
    name = "vigil",
    about = "Vigil — drift-tolerant web value tracker",
    version,
    after_help = "Run 'vigil <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract every active item once and evaluate triggers
    Run {
        /// Skip the dynamic (browser) tier
        #[arg(long)]
        no_browser: bool,
    },
    /// Extract a single item immediately
    Check {
        /// Item id
        item_id: String,
        /// Skip the dynamic (browser) tier
        #[arg(long)]
        no_browser: bool,
    },
    /// Ask the repair collaborator for a replacement selector
    Repair {
        /// Item id
        item_id: String,
    },
    /// Show items, health counters, and latest readings
    Status,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global flags via environment variables so all modules can check them
    if cli.json {
        std::env::set_var("VIGIL_JSON", "1");
    }
    if cli.quiet {
        std::env::set_var("VIGIL_QUIET", "1");
    }

    let default_level = if cli.verbose {
        "vigil_runtime=debug"
    } else {
        "vigil_runtime=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_level.parse().expect("static directive is valid")),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Run { no_browser } => cli::run_cmd::run(no_browser).await,
        Commands::Check {
            item_id,
            no_browser,
        } => cli::check_cmd::run(&item_id, no_browser).await,
        Commands::Repair { item_id } => cli::repair_cmd::run(&item_id).await,
        Commands::Status => cli::status_cmd::run().await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "vigil", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if !cli::output::is_quiet() && !cli::output::is_json() {
            eprintln!("  Error: {e:#}");
        }
        if cli::output::is_json() {
            cli::output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        }
        std::process::exit(1);
    }

    result
}
