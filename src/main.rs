use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueHint};
use clap_complete::{generate, Shell};
use console::style;
use dialoguer::{theme::ColorfulTheme, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{info, warn};

use abo_exchange::output::{render_solve_json, render_solve_text, render_table};
use abo_exchange::{
    AssignmentSolver, BloodType, BoardConfig, BoardReport, CompatibilityTable, ExchangeBoard,
    FeasibilityEvaluator, Pair, ReportFormat, ReportGenerator, SamePairRule, TypeDomain,
};

/// ABO blood-type feasibility checker for kidney-exchange cycles
#[derive(Parser, Debug)]
#[command(
    name = "abo-exchange",
    version,
    about = "Check whether a paired kidney-exchange cycle is ABO blood-type feasible",
    long_about = r#"
Pick donor and recipient blood types for the pairs of an exchange and check
whether the directed cycle Pair1 -> Pair2 -> Pair3 -> Pair1 works:

- every donor must be able to give to the NEXT pair's recipient
- every pair is checked against the selected same-pair rule

The `solve` command searches every assignment for one that works.
"#
)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Interactive mode: pick the six blood types from lists (runs `check`)
    #[arg(short, long)]
    interactive: bool,

    /// Number of threads (0 = auto)
    #[arg(short, long, default_value = "0", global = true)]
    threads: usize,

    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate one exchange board
    Check {
        /// Pair as DONOR:RECIPIENT, repeat in cycle order (e.g. -p O:A -p A:B -p B:O)
        #[arg(short, long = "pair", value_name = "DONOR:RECIPIENT")]
        pairs: Vec<Pair>,

        /// TOML board file
        #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath)]
        config: Option<PathBuf>,

        /// Same-pair rule (overrides the board file)
        #[arg(short, long, value_enum)]
        rule: Option<SamePairRule>,

        /// Pick the six blood types from lists
        #[arg(short, long)]
        interactive: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Output directory for file reports
        #[arg(short, long, default_value = "./reports", value_hint = ValueHint::DirPath)]
        output: PathBuf,
    },
    /// Search all assignments for a feasible one
    Solve {
        /// Number of pairs in the cycle
        #[arg(short, long, default_value = "3")]
        pairs: usize,

        /// Blood types to draw from
        #[arg(short, long, value_enum, default_value = "full")]
        domain: TypeDomain,

        /// Same-pair rule
        #[arg(short, long, value_enum, default_value = "must-be-compatible")]
        rule: SamePairRule,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print the ABO compatibility table
    Table,
    /// Generate shell completions
    Completions { shell: Shell },
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
    Html,
    All,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> ReportFormat {
        match format {
            OutputFormat::Text => ReportFormat::Text,
            OutputFormat::Json => ReportFormat::Json,
            OutputFormat::Csv => ReportFormat::Csv,
            OutputFormat::Html => ReportFormat::Html,
            OutputFormat::All => ReportFormat::All,
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let (verbose, threads) = (cli.verbose, cli.threads);

    let command = match resolve_command(cli)? {
        Some(command) => command,
        None => {
            Cli::command().print_help()?;
            return Ok(ExitCode::SUCCESS);
        }
    };

    if let Commands::Completions { shell } = command {
        generate_completions(shell);
        return Ok(ExitCode::SUCCESS);
    }

    init_logging(verbose);

    match command {
        Commands::Table => {
            print!("{}", render_table(CompatibilityTable::abo()));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Solve {
            pairs,
            domain,
            rule,
            json,
        } => {
            init_thread_pool(threads)?;
            run_solve(pairs, domain, rule, json)
        }
        Commands::Check {
            pairs,
            config,
            rule,
            interactive,
            format,
            output,
        } => {
            let config = if interactive {
                run_interactive_mode(rule, format, output)?
            } else {
                AppConfig::from_args(pairs, config, rule, format, output)?
            };
            run_check(config)
        }
        Commands::Completions { .. } => Ok(ExitCode::SUCCESS),
    }
}

/// Top-level `-i` without a subcommand means an interactive `check`;
/// with any subcommand other than `check` it is rejected.
fn resolve_command(cli: Cli) -> Result<Option<Commands>> {
    match (cli.command, cli.interactive) {
        (None, true) => Ok(Some(Commands::Check {
            pairs: Vec::new(),
            config: None,
            rule: None,
            interactive: true,
            format: OutputFormat::Text,
            output: PathBuf::from("./reports"),
        })),
        (Some(Commands::Check {
            pairs,
            config,
            rule,
            interactive,
            format,
            output,
        }), top_level) => Ok(Some(Commands::Check {
            pairs,
            config,
            rule,
            interactive: interactive || top_level,
            format,
            output,
        })),
        (Some(_), true) => bail!("--interactive only applies to the `check` command"),
        (command, false) => Ok(command),
    }
}

fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(format!("abo_exchange={}", level))
        .with_writer(io::stderr)
        .init();
}

fn init_thread_pool(threads: usize) -> Result<()> {
    let num_threads = if threads == 0 {
        num_cpus::get()
    } else {
        threads
    };

    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()
        .map_err(|e| anyhow::anyhow!("Failed to initialize thread pool: {}", e))?;

    info!("Using {} threads", rayon::current_num_threads());
    Ok(())
}

fn run_interactive_mode(
    rule: Option<SamePairRule>,
    format: OutputFormat,
    output: PathBuf,
) -> Result<AppConfig> {
    println!(
        "{}",
        style("╔══════════════════════════════════════════════════════════════╗").cyan()
    );
    println!(
        "{}",
        style("║          Kidney Exchange Cycle - Interactive Mode            ║")
            .cyan()
            .bold()
    );
    println!(
        "{}",
        style("╚══════════════════════════════════════════════════════════════╝").cyan()
    );
    println!();

    let theme = ColorfulTheme::default();
    let types: Vec<&str> = BloodType::ALL.iter().map(|t| t.as_str()).collect();

    let mut pairs = Vec::with_capacity(3);
    for i in 1..=3 {
        let recipient = Select::with_theme(&theme)
            .with_prompt(format!("Pair {} recipient", i))
            .default(0)
            .items(&types)
            .interact()?;
        let donor = Select::with_theme(&theme)
            .with_prompt(format!("Pair {} donor", i))
            .default(0)
            .items(&types)
            .interact()?;
        pairs.push(Pair::new(BloodType::ALL[donor], BloodType::ALL[recipient]));
    }

    let rule = match rule {
        Some(rule) => rule,
        None => {
            let rules = vec![
                "Each pair must be compatible",
                "Each pair must be incompatible (needs the exchange)",
            ];
            let idx = Select::with_theme(&theme)
                .with_prompt("Same-pair rule")
                .default(0)
                .items(&rules)
                .interact()?;
            match idx {
                1 => SamePairRule::MustBeIncompatible,
                _ => SamePairRule::MustBeCompatible,
            }
        }
    };

    Ok(AppConfig {
        board: ExchangeBoard::new(pairs)?,
        rule,
        format,
        output,
    })
}

fn run_check(config: AppConfig) -> Result<ExitCode> {
    let evaluator = FeasibilityEvaluator::abo(config.rule);
    info!(
        "Checking {}-pair exchange under {}",
        config.board.len(),
        evaluator.rule()
    );

    let result = evaluator.evaluate(&config.board);
    if !result.feasible {
        warn!(
            "Exchange infeasible under {}: {} diagnostics, {} failed edges",
            evaluator.rule(),
            result.diagnostics.len(),
            result.failed_edges().count()
        );
    }

    let report = BoardReport {
        board: &config.board,
        result: &result,
    };
    let generator = ReportGenerator::new(&config.output);
    let written = generator.generate(&report, config.format.into())?;

    if !written.is_empty() {
        println!(
            "\n{} Reports saved to: {}",
            style("✓").green().bold(),
            style(config.output.display()).cyan()
        );
    }

    Ok(if result.feasible {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn run_solve(pairs: usize, domain: TypeDomain, rule: SamePairRule, json: bool) -> Result<ExitCode> {
    let solver = AssignmentSolver::new(pairs, domain, rule)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!(
        "Searching {} assignments...",
        solver.assignment_count()
    ));

    let outcome = solver.solve();
    pb.finish_and_clear();

    if json {
        println!("{}", render_solve_json(&outcome)?);
    } else {
        print!("{}", render_solve_text(&outcome));
    }

    Ok(if outcome.is_feasible() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

#[derive(Debug)]
struct AppConfig {
    board: ExchangeBoard,
    rule: SamePairRule,
    format: OutputFormat,
    output: PathBuf,
}

impl AppConfig {
    fn from_args(
        pairs: Vec<Pair>,
        config: Option<PathBuf>,
        rule: Option<SamePairRule>,
        format: OutputFormat,
        output: PathBuf,
    ) -> Result<Self> {
        let file = match &config {
            Some(path) => BoardConfig::from_file(path)
                .with_context(|| format!("Failed to load board file {}", path.display()))?,
            None => BoardConfig::default(),
        };
        let merged = file.merged(&pairs, rule);
        let board = merged
            .board()
            .context("No pairs given: use --pair DONOR:RECIPIENT, --config FILE or --interactive")?;

        Ok(Self {
            board,
            rule: merged.rule(),
            format,
            output,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(args: &[&str]) -> Result<Option<Commands>> {
        resolve_command(Cli::try_parse_from(args)?)
    }

    #[test]
    fn test_bare_interactive_runs_check() -> Result<()> {
        let cli = Cli::try_parse_from(["abo-exchange", "-i"])?;
        assert!(cli.command.is_none());

        let command = resolve_command(cli)?;
        assert!(matches!(
            command,
            Some(Commands::Check {
                interactive: true,
                rule: None,
                ref pairs,
                ..
            }) if pairs.is_empty()
        ));
        Ok(())
    }

    #[test]
    fn test_interactive_before_check_is_kept() -> Result<()> {
        let command = resolve(&["abo-exchange", "-i", "check", "--rule", "incompatible"])?;
        assert!(matches!(
            command,
            Some(Commands::Check {
                interactive: true,
                rule: Some(SamePairRule::MustBeIncompatible),
                ..
            })
        ));

        let command = resolve(&["abo-exchange", "check", "-i"])?;
        assert!(matches!(command, Some(Commands::Check { interactive: true, .. })));
        Ok(())
    }

    #[test]
    fn test_interactive_rejected_outside_check() {
        assert!(Cli::try_parse_from(["abo-exchange", "solve", "-i"]).is_err());
        assert!(Cli::try_parse_from(["abo-exchange", "table", "--interactive"]).is_err());

        for args in [
            ["abo-exchange", "-i", "solve"],
            ["abo-exchange", "-i", "table"],
        ] {
            let err = resolve(&args).unwrap_err();
            assert!(err.to_string().contains("only applies to the `check` command"));
        }
    }

    #[test]
    fn test_plain_subcommands_pass_through() -> Result<()> {
        let command = resolve(&["abo-exchange", "solve", "--pairs", "2"])?;
        assert!(matches!(command, Some(Commands::Solve { pairs: 2, .. })));

        let command = resolve(&["abo-exchange", "check", "-p", "O:A"])?;
        assert!(matches!(
            command,
            Some(Commands::Check { interactive: false, ref pairs, .. }) if pairs.len() == 1
        ));
        Ok(())
    }
}
