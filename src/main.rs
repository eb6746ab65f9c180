//! CLI entry point for `mailproc`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, CommandFactory, Parser, Subcommand};
use tokio::io::AsyncBufReadExt;
use tracing::info;

use mailproc::config::{self, ConfigKey, ConfigStore, ConfigValue};
use mailproc::control::{Controller, ReloadSource, RequeueReport, StartOptions};
use mailproc::scheduler::RunSummary;
use mailproc::sink::{read_skip_records, JsonLinesSink};

#[derive(Parser)]
#[command(
    name = "mailproc",
    version,
    about = "Discover, parse and extract attachments from maildir-style email files"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file
    #[arg(long, value_name = "FILE", global = true, env = "MAILPROC_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the processing loop in this process (Ctrl-C stops it)
    Run {
        #[command(flatten)]
        start: StartArgs,
        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive console reading one command per line
    Console,
    /// Unlock the files recorded as skipped in a sink file
    Requeue {
        /// Sink file to read skip records from (defaults to the configured sink)
        #[arg(long, value_name = "FILE")]
        sink: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Inspect or edit the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

#[derive(Args, Debug, Clone, Default)]
struct StartArgs {
    /// Discover and parse once without renaming or locking anything
    #[arg(long)]
    dry_run: bool,
    /// Run partitions on the scheduler task instead of in parallel
    #[arg(long)]
    foreground: bool,
    /// Maximum concurrent partitions (-1 = all logical processors)
    #[arg(long, value_name = "N", allow_negative_numbers = true)]
    max_cores: Option<i32>,
    /// Maximum files per round
    #[arg(long, value_name = "N")]
    max_emails: Option<usize>,
    /// Seed for the round shuffle
    #[arg(long, value_name = "SEED", hide = true)]
    seed: Option<u64>,
}

impl From<StartArgs> for StartOptions {
    fn from(args: StartArgs) -> Self {
        Self {
            dry_run: args.dry_run,
            foreground: args.foreground,
            max_cores: args.max_cores,
            max_emails: args.max_emails,
            seed: args.seed,
        }
    }
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write the built-in defaults to the config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print one value
    Get { key: String },
    /// Set one value and save the config file
    Set { key: String, value: String },
}

/// One line typed into the console.
#[derive(Parser)]
#[command(no_binary_name = true, name = "console", disable_version_flag = true)]
struct ConsoleLine {
    #[command(subcommand)]
    command: ConsoleCommand,
}

#[derive(Subcommand)]
enum ConsoleCommand {
    /// Start the processing loop
    Start(StartArgs),
    /// Stop the processing loop after running partitions finish
    Stop,
    /// Reload the configuration
    Config {
        /// Reload the config file
        #[arg(long, conflicts_with = "load_defaults", required_unless_present = "load_defaults")]
        load: bool,
        /// Reload the defaults file
        #[arg(long)]
        load_defaults: bool,
    },
    /// Show whether the loop is running
    Status,
    /// Unlock the files recorded as skipped in the sink file
    Requeue {
        #[arg(long, value_name = "FILE")]
        sink: Option<PathBuf>,
    },
    /// Stop and leave the console
    #[command(alias = "exit")]
    Quit,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let store = Arc::new(open_store(cli.config.as_deref())?);
    let config = store.snapshot();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Run { start, json } => cmd_run(store, start, json).await,
        Commands::Console => cmd_console(store).await,
        Commands::Requeue { sink, json } => cmd_requeue(&store, sink, json),
        Commands::Config { action } => cmd_config(&store, action),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

fn open_store(path: Option<&Path>) -> anyhow::Result<ConfigStore> {
    let store = match path {
        Some(path) => ConfigStore::open(path, config::defaults_file_path(path)),
        None => ConfigStore::open_default(),
    };
    store.context("Cannot load configuration")
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &config::Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailproc.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

fn build_controller(store: Arc<ConfigStore>) -> anyhow::Result<Controller> {
    let path = config::sink_path(&store.snapshot());
    let sink = JsonLinesSink::open(&path)
        .with_context(|| format!("Cannot open sink file {}", path.display()))?;
    Ok(Controller::new(store, Arc::new(sink)))
}

/// Run the loop until it finishes (dry run) or Ctrl-C is pressed.
async fn cmd_run(store: Arc<ConfigStore>, start: StartArgs, json: bool) -> anyhow::Result<()> {
    let controller = Arc::new(build_controller(store)?);
    controller.start(start.into())?;

    let ctl = Arc::clone(&controller);
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted");
            ctl.stop();
        }
    });
    let summary = controller.join().await?.unwrap_or_default();
    signal.abort();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

/// Read commands from stdin until `quit`, EOF or Ctrl-C.
async fn cmd_console(store: Arc<ConfigStore>) -> anyhow::Result<()> {
    let controller = build_controller(Arc::clone(&store))?;
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    println!("  mailproc console. Commands: start, stop, config, status, requeue, quit");

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            continue;
        }
        let command = match ConsoleLine::try_parse_from(words) {
            Ok(parsed) => parsed.command,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        match command {
            ConsoleCommand::Start(args) => match controller.start(args.into()) {
                Ok(()) => println!("  Started"),
                Err(e) => println!("  Cannot start: {e}"),
            },
            ConsoleCommand::Stop => {
                if controller.stop() {
                    if let Some(summary) = controller.join().await? {
                        print_summary(&summary);
                    }
                } else {
                    println!("  Not running");
                }
            }
            ConsoleCommand::Config { load_defaults, .. } => {
                let source = if load_defaults {
                    ReloadSource::LoadDefaults
                } else {
                    ReloadSource::Load
                };
                match controller.reload_config(source) {
                    Ok(()) => println!("  Configuration reloaded"),
                    Err(e) => println!("  Cannot reload configuration: {e}"),
                }
            }
            ConsoleCommand::Status => {
                let status = controller.status();
                let state = match (status.running, status.stopping) {
                    (true, true) => "stopping",
                    (true, false) => "yes",
                    _ => "no",
                };
                println!("  {:<25} {}", "Running", state);
                println!("  {:<25} {}", "Active partitions", status.partitions);
            }
            ConsoleCommand::Requeue { sink } => {
                let requeued = match load_skips(&store, sink) {
                    Ok(records) => controller.requeue(records).await.map_err(anyhow::Error::from),
                    Err(e) => Err(e),
                };
                match requeued {
                    Ok(report) => print_requeue(&report),
                    Err(e) => println!("  {e:#}"),
                }
            }
            ConsoleCommand::Quit => break,
        }
    }

    if controller.stop() {
        println!("  Waiting for running partitions...");
    }
    if let Some(summary) = controller.join().await? {
        print_summary(&summary);
    }
    Ok(())
}

fn load_skips(
    store: &ConfigStore,
    sink: Option<PathBuf>,
) -> anyhow::Result<Vec<mailproc::model::document::SkipRecord>> {
    let path = sink.unwrap_or_else(|| config::sink_path(&store.snapshot()));
    read_skip_records(&path).with_context(|| format!("Cannot read skip records from {}", path.display()))
}

fn cmd_requeue(store: &ConfigStore, sink: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let records = load_skips(store, sink)?;
    let report = mailproc::control::requeue(&records);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_requeue(&report);
    }
    Ok(())
}

fn cmd_config(store: &ConfigStore, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            if let Some(path) = store.config_path() {
                println!("# {}", path.display());
            }
            print!("{}", toml::to_string_pretty(&*store.snapshot())?);
        }
        ConfigAction::Init { force } => {
            let path = store
                .config_path()
                .context("No config file location available")?;
            if path.exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
            }
            config::Config::default().write_to(path)?;
            println!("  Wrote {}", path.display());
        }
        ConfigAction::Get { key } => {
            let key: ConfigKey = key.parse()?;
            println!("{}", store.get(key));
        }
        ConfigAction::Set { key, value } => {
            let key: ConfigKey = key.parse()?;
            let value = parse_value(key, &store.get(key), &value)?;
            store.set(key, value)?;
            store.save()?;
            println!("  {key} = {}", store.get(key));
        }
    }
    Ok(())
}

/// Parse a command-line string into a value of the same type as `current`.
fn parse_value(key: ConfigKey, current: &ConfigValue, raw: &str) -> anyhow::Result<ConfigValue> {
    let value = match current {
        ConfigValue::String(_) => ConfigValue::String(raw.to_string()),
        ConfigValue::Int(_) => ConfigValue::Int(
            raw.parse()
                .with_context(|| format!("{key} expects an integer"))?,
        ),
        ConfigValue::Bool(_) => ConfigValue::Bool(
            raw.parse()
                .with_context(|| format!("{key} expects true or false"))?,
        ),
        ConfigValue::Duration(_) => ConfigValue::Duration(Duration::from_secs(
            raw.trim_end_matches('s')
                .parse()
                .with_context(|| format!("{key} expects a number of seconds"))?,
        )),
        ConfigValue::StringList(_) => ConfigValue::StringList(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        ),
    };
    Ok(value)
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("  Run summary:");
    println!("  {:<25} {}", "Ticks", summary.ticks);
    println!("  {:<25} {}", "Saturated ticks", summary.saturated_ticks);
    println!("  {:<25} {}", "Rounds", summary.rounds);
    println!("  {:<25} {}", "Partitions", summary.partitions);
    println!("  {:<25} {}", "Files dispatched", summary.files_dispatched);
    println!("  {:<25} {}", "Documents", summary.documents);
    println!("  {:<25} {}", "Skipped", summary.skipped);
    println!();
}

fn print_requeue(report: &RequeueReport) {
    println!("  {:<25} {}", "Released", report.released.len());
    println!("  {:<25} {}", "Missing", report.missing.len());
    println!("  {:<25} {}", "Failed", report.failed.len());
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailproc", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}
