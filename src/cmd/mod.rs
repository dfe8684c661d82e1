mod compile;

use clap::{CommandFactory, Parser, Subcommand, ValueHint};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

const AFTER_HELP: &str = "\x1b[1mCommon workflows:\x1b[0m
  Compile a draw.io ER diagram into DDL:
    erd2sql compile -i diagram.drawio -o schema.sql

  Preview without writing a file:
    erd2sql compile -i diagram.drawio -o schema.sql --dry-run

  Inspect JSON validation output:
    erd2sql compile -i diagram.drawio -o schema.sql --json

\x1b[1mMore info:\x1b[0m
  Run 'erd2sql <command> --help' for command-specific options.
  Enable completions: erd2sql completions <shell>";

#[derive(Parser)]
#[command(name = "erd2sql")]
#[command(version)]
#[command(about = "Compiles draw.io entity-relationship diagrams into SQL DDL")]
#[command(after_help = AFTER_HELP)]
#[command(arg_required_else_help = true)]
#[command(max_term_width = 100)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

// Help heading constants for consistency
const INPUT_OUTPUT: &str = "Input/Output";
const BEHAVIOR: &str = "Behavior";
const OUTPUT_FORMAT: &str = "Output";

#[derive(Subcommand)]
pub enum Commands {
    /// Compile a draw.io diagram into SQL DDL
    #[command(visible_alias = "c")]
    #[command(after_help = "\x1b[1mExamples:\x1b[0m
  erd2sql compile -i diagram.drawio -o schema.sql
  erd2sql compile -i diagram.drawio -o schema.sql --strict
  erd2sql compile -i diagram.drawio -o schema.sql --dry-run --json")]
    Compile {
        /// Path to the draw.io diagram file
        #[arg(short, long, value_hint = ValueHint::FilePath, help_heading = INPUT_OUTPUT)]
        input: PathBuf,

        /// Path to write the generated DDL to
        #[arg(short, long, value_hint = ValueHint::FilePath, help_heading = INPUT_OUTPUT)]
        output: PathBuf,

        /// Validate and report, but do not write the output file
        #[arg(long, help_heading = BEHAVIOR)]
        dry_run: bool,

        /// Show a progress spinner while compiling
        #[arg(long, help_heading = BEHAVIOR)]
        progress: bool,

        /// Treat deferred (circular) foreign keys as a fatal error
        #[arg(long, help_heading = BEHAVIOR)]
        strict: bool,

        /// Emit the validation summary as JSON instead of human-readable text
        #[arg(short, long, help_heading = OUTPUT_FORMAT)]
        json: bool,
    },

    /// Generate shell completion scripts
    #[command(after_help = "\x1b[1mInstallation:\x1b[0m
  Bash:
    erd2sql completions bash > /etc/bash_completion.d/erd2sql
    # or: erd2sql completions bash >> ~/.bashrc

  Zsh:
    erd2sql completions zsh > \"${fpath[1]}/_erd2sql\"
    # or for oh-my-zsh: erd2sql completions zsh > ~/.oh-my-zsh/completions/_erd2sql

  Fish:
    erd2sql completions fish > ~/.config/fish/completions/erd2sql.fish

  PowerShell:
    erd2sql completions powershell >> $PROFILE")]
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Compile {
            input,
            output,
            dry_run,
            progress,
            strict,
            json,
        } => compile::run(input, output, dry_run, progress, strict, json),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
    }
}
