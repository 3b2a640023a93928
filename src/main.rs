use clap::{Args, Parser, Subcommand};
use forge_lang::cli;
use forge_lang::config::{ForgeConfig, RunOptions};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "forge")]
#[command(about = "Analyze, run and inspect Forge scripts")]
#[command(long_about = "Forge - language service and interpreter for Forge scripts

COMMANDS:
  check     - Report diagnostics for a script
  run       - Analyze, then execute a script
  complete  - Completion items at a position
  hover     - Hover text at a position
  symbols   - Outline of a script's declarations

Positions are 0-based (line and column), as editors send them.

EXAMPLES:
  forge check main.forge
  forge check main.forge --json
  forge run main.forge --max-steps 100000
  forge complete main.forge --line 3 --column 8
  RUST_LOG=forge_lang=debug forge run main.forge")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    /// Log analysis and execution details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Analysis settings shared by every command
#[derive(Args)]
struct Settings {
    /// Report MODULE_NOT_ENABLED as a warning and do not gate calls at run time
    #[arg(long, global = true, env = "FORGE_SOFT_MODULE_GATING")]
    soft_module_gating: bool,

    /// Report property problems as warnings
    #[arg(long, global = true, env = "FORGE_RELAXED_MEMBER_ACCESS")]
    relaxed_member_access: bool,

    /// Skip the lint stage
    #[arg(long, global = true, env = "FORGE_NO_LINT")]
    no_lint: bool,

    /// Longest source line before LINT_LINE_LENGTH
    #[arg(long, global = true, env = "FORGE_MAX_LINE_LENGTH")]
    max_line_length: Option<usize>,

    /// Modules offered by the `able` snippet (comma separated)
    #[arg(long, global = true, env = "FORGE_DEFAULT_MODULES", value_delimiter = ',')]
    default_modules: Vec<String>,
}

impl Settings {
    fn config(&self) -> ForgeConfig {
        let mut config = ForgeConfig {
            soft_module_gating: self.soft_module_gating,
            relaxed_member_access: self.relaxed_member_access,
            lint_enabled: !self.no_lint,
            ..Default::default()
        };
        if let Some(max) = self.max_line_length {
            config.max_line_length = max.max(1);
        }
        if !self.default_modules.is_empty() {
            config.default_modules = self.default_modules.clone();
        }
        config
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Report diagnostics for a script
    Check {
        /// Path to the .forge file
        file: PathBuf,

        /// Print diagnostics in the editor wire format
        #[arg(long)]
        json: bool,
    },

    /// Analyze, then execute a script
    Run {
        /// Path to the .forge file
        file: PathBuf,

        /// Refuse to run when analysis reports warnings
        #[arg(long, env = "FORGE_STOP_ON_WARNINGS")]
        stop_on_warnings: bool,

        /// Statement budget
        #[arg(long, env = "FORGE_MAX_STEPS")]
        max_steps: Option<u64>,

        /// Wall-clock budget in milliseconds
        #[arg(long, env = "FORGE_TIMEOUT_MS")]
        timeout_ms: Option<u64>,

        /// Run calls into disabled modules anyway
        #[arg(long, env = "FORGE_IGNORE_MODULE_GATING")]
        ignore_module_gating: bool,
    },

    /// Completion items at a position
    Complete {
        file: PathBuf,

        #[arg(short, long)]
        line: u32,

        #[arg(short, long)]
        column: u32,

        #[arg(long)]
        json: bool,
    },

    /// Hover text at a position
    Hover {
        file: PathBuf,

        #[arg(short, long)]
        line: u32,

        #[arg(short, long)]
        column: u32,
    },

    /// Outline of a script's declarations
    Symbols {
        file: PathBuf,

        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "forge_lang=debug"
    } else {
        "forge_lang=warn"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .init();
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = cli.settings.config();

    let code = match cli.command {
        Commands::Check { file, json } => {
            if cli::check(&file, &config, json)? {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }

        Commands::Run {
            file,
            stop_on_warnings,
            max_steps,
            timeout_ms,
            ignore_module_gating,
        } => {
            let options = RunOptions {
                stop_on_warnings,
                max_steps,
                timeout_ms,
                verbose: cli.verbose,
                ignore_module_gating,
            };
            let status = cli::run(&file, &config, options)?;
            ExitCode::from(u8::try_from(status).unwrap_or(1))
        }

        Commands::Complete {
            file,
            line,
            column,
            json,
        } => {
            cli::complete(&file, &config, line, column, json)?;
            ExitCode::SUCCESS
        }

        Commands::Hover { file, line, column } => {
            cli::hover(&file, &config, line, column)?;
            ExitCode::SUCCESS
        }

        Commands::Symbols { file, json } => {
            cli::symbols(&file, &config, json)?;
            ExitCode::SUCCESS
        }
    };
    Ok(code)
}
