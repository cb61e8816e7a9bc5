//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use volsweep::core::config::{BackendKind, Config};
use volsweep::core::context::Context;
use volsweep::core::errors::VsError;
use volsweep::inventory::Volume;
use volsweep::logger::{ActivityEvent, ActivityLoggerHandle, spawn_logger};
use volsweep::provider::{self, InventoryProvider};
use volsweep::session::{ApplyOutcome, PrunePlan, Session, SessionMsg, SessionOptions};
use volsweep::signals::ShutdownSignal;

/// volsweep: inventory container volumes, find orphans, plan and apply prunes.
#[derive(Debug, Parser)]
#[command(
    name = "volsweep",
    author,
    version,
    about = "Container volume inventory and prune planning",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Inventory backend (docker-cli or mock).
    #[arg(long, global = true, value_name = "KIND")]
    backend: Option<String>,
    /// Per-command backend timeout.
    #[arg(long, global = true, value_name = "MILLISECONDS")]
    timeout_ms: Option<u64>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Increase verbosity.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// List volumes with size, status, project and attachments.
    List(ListArgs),
    /// Show one volume's current details.
    Inspect(InspectArgs),
    /// Preview a prune plan without removing anything.
    Plan(SelectArgs),
    /// Remove the selected volumes.
    Prune(PruneArgs),
    /// Interactive inventory dashboard.
    Dashboard(DashboardArgs),
    /// View and validate configuration.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct ListArgs {
    /// Only volumes no container references.
    #[arg(long)]
    orphans: bool,
    /// Only volumes belonging to this project.
    #[arg(long, value_name = "PROJECT")]
    project: Option<String>,
}

#[derive(Debug, Clone, Args)]
struct InspectArgs {
    /// Volume name.
    #[arg(value_name = "NAME")]
    name: String,
}

#[derive(Debug, Clone, Args, Default)]
struct SelectArgs {
    /// Volumes to include.
    #[arg(value_name = "NAME")]
    names: Vec<String>,
    /// Include every orphaned volume.
    #[arg(long)]
    orphans: bool,
}

#[derive(Debug, Clone, Args, Default)]
struct PruneArgs {
    #[command(flatten)]
    select: SelectArgs,
    /// Skip interactive confirmation prompt.
    #[arg(long)]
    yes: bool,
}

#[derive(Debug, Clone, Args, Default)]
struct DashboardArgs {
    /// Auto-refresh interval (0 disables); defaults to `dashboard.refresh_ms`.
    #[arg(long, value_name = "MILLISECONDS")]
    refresh_ms: Option<u64>,
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print the config file path in use.
    Path,
    /// Print the effective configuration.
    Show,
    /// Validate the configuration.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// Operation partially succeeded.
    #[error("{0}")]
    Partial(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
            Self::Partial(_) => 4,
        }
    }
}

impl From<VsError> for CliError {
    fn from(err: VsError) -> Self {
        match err {
            VsError::InvalidConfig { .. }
            | VsError::MissingConfig { .. }
            | VsError::ConfigParse { .. }
            | VsError::InvalidVolumeName { .. }
            | VsError::NotFound { .. } => Self::User(err.to_string()),
            VsError::Serialization { .. } | VsError::ChannelClosed { .. } => {
                Self::Internal(err.to_string())
            }
            _ => Self::Runtime(err.to_string()),
        }
    }
}

/// Process-wide state for commands that talk to a backend.
struct App {
    config: Config,
    signal: ShutdownSignal,
    ctx: Context,
    logger: Option<(ActivityLoggerHandle, JoinHandle<()>)>,
    started: Instant,
    mode: OutputMode,
    verbose: bool,
    quiet: bool,
}

impl App {
    fn start(cli: &Cli) -> Result<Self, CliError> {
        let config = load_config(cli)?;
        let signal = ShutdownSignal::install();
        let ctx = signal.context();

        let logger = if config.logging.enabled {
            match spawn_logger(&config.logging) {
                Ok(pair) => Some(pair),
                Err(e) => {
                    if !cli.quiet {
                        eprintln!("[VSW-LOG] activity log disabled: {e}");
                    }
                    None
                }
            }
        } else {
            None
        };

        let app = Self {
            signal,
            ctx,
            logger,
            started: Instant::now(),
            mode: output_mode(cli),
            verbose: cli.verbose,
            quiet: cli.quiet,
            config,
        };
        app.log(ActivityEvent::SessionStarted {
            version: env!("CARGO_PKG_VERSION").to_string(),
            backend: app.config.backend.kind.label().to_string(),
            config_hash: app.config.stable_hash().unwrap_or_default(),
        });
        Ok(app)
    }

    fn logger(&self) -> Option<ActivityLoggerHandle> {
        self.logger.as_ref().map(|(handle, _)| handle.clone())
    }

    fn log(&self, event: ActivityEvent) {
        if let Some((handle, _)) = &self.logger {
            handle.send(event);
        }
    }

    fn connect(&self) -> Result<Arc<dyn InventoryProvider>, VsError> {
        let started = Instant::now();
        let provider = provider::connect(&self.config, &self.ctx);
        self.timing("connect", started);
        provider
    }

    fn session(&self) -> Result<Session, CliError> {
        let provider = self.connect()?;
        Ok(Session::new(provider, self.session_options()))
    }

    fn session_options(&self) -> SessionOptions {
        SessionOptions::from_config(&self.config, self.logger())
    }

    /// Read the inventory into `session`, reporting how long it took.
    fn load(&self, session: &mut Session) -> Result<(), CliError> {
        let started = Instant::now();
        let count = session.refresh(&self.ctx)?;
        self.timing(&format!("inventory ({count} volumes)"), started);
        Ok(())
    }

    fn timing(&self, step: &str, started: Instant) {
        if self.verbose {
            eprintln!(
                "[VSW-TIMING] {step}: {}ms",
                started.elapsed().as_millis()
            );
        }
    }

    fn finish(self, result: &Result<(), CliError>) {
        let reason = if self.signal.should_shutdown() {
            "signal"
        } else if result.is_ok() {
            "completed"
        } else {
            "failed"
        };
        if self.signal.should_shutdown() && !self.quiet {
            eprintln!("[VSW-SIGNAL] interrupted, shutting down");
        }
        if let Err(e) = result {
            self.log(ActivityEvent::Error {
                code: format!("exit-{}", e.exit_code()),
                message: e.to_string(),
            });
        }
        self.log(ActivityEvent::SessionStopped {
            reason: reason.to_string(),
            uptime_secs: self.started.elapsed().as_secs(),
        });
        if let Some((handle, join)) = self.logger {
            handle.shutdown();
            let _ = join.join();
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Config(args) => return run_config(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            return Ok(());
        }
        _ => {}
    }

    let app = App::start(cli)?;
    let result = match &cli.command {
        Command::List(args) => run_list(&app, args),
        Command::Inspect(args) => run_inspect(&app, args),
        Command::Plan(args) => run_plan(&app, args),
        Command::Prune(args) => run_prune(&app, args),
        Command::Dashboard(args) => run_dashboard(&app, args),
        Command::Config(_) | Command::Completions(_) => Ok(()),
    };
    app.finish(&result);
    result
}

fn load_config(cli: &Cli) -> Result<Config, VsError> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(raw) = &cli.backend {
        config.backend.kind = BackendKind::parse(raw)?;
    }
    if let Some(ms) = cli.timeout_ms {
        config.backend.command_timeout_ms = ms;
    }
    config.validate()?;
    Ok(config)
}

fn run_list(app: &App, args: &ListArgs) -> Result<(), CliError> {
    let mut session = app.session()?;
    app.load(&mut session)?;

    let volumes: Vec<&Volume> = session
        .model()
        .snapshot()
        .iter()
        .filter(|v| !args.orphans || v.is_orphan())
        .filter(|v| args.project.as_deref().is_none_or(|p| v.project == p))
        .collect();

    match app.mode {
        OutputMode::Human => {
            print_volume_table(&volumes);
            if !app.quiet {
                let orphans = volumes.iter().filter(|v| v.is_orphan()).count();
                println!(
                    "\n{} volume(s), {} orphaned  [{}]",
                    volumes.len(),
                    orphans,
                    session.backend_name()
                );
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "list",
                "backend": session.backend_name(),
                "count": volumes.len(),
                "volumes": volumes,
            });
            write_json_line(&payload)?;
        }
    }
    session.close()?;
    Ok(())
}

fn run_inspect(app: &App, args: &InspectArgs) -> Result<(), CliError> {
    provider::validate_volume_name(&args.name)?;
    let provider = app.connect()?;
    let details = provider.get_volume_details(&app.ctx, &args.name);
    let closed = provider.close();
    let volume = details?;
    closed?;

    match app.mode {
        OutputMode::Human => print_volume_details(&volume),
        OutputMode::Json => {
            write_json_line(&json!({
                "command": "inspect",
                "volume": volume,
            }))?;
        }
    }
    Ok(())
}

fn run_plan(app: &App, args: &SelectArgs) -> Result<(), CliError> {
    let mut session = app.session()?;
    app.load(&mut session)?;
    select(&mut session, &app.ctx, args)?;
    let plan = session.model().compute_plan();

    match app.mode {
        OutputMode::Human => {
            print_plan(&plan);
            if !app.quiet && !plan.is_empty() {
                println!("\n{}", "Dry run: nothing was removed.".dimmed());
            }
        }
        OutputMode::Json => write_json_line(&plan_payload("plan", &plan))?,
    }
    session.close()?;
    Ok(())
}

fn run_prune(app: &App, args: &PruneArgs) -> Result<(), CliError> {
    let mut session = app.session()?;
    app.load(&mut session)?;
    select(&mut session, &app.ctx, &args.select)?;
    let plan = session.model().compute_plan();

    if plan.is_empty() {
        match app.mode {
            OutputMode::Human => println!("Nothing to prune."),
            OutputMode::Json => write_json_line(&plan_payload("prune", &plan))?,
        }
        session.close()?;
        return Ok(());
    }

    let prompt = app.config.prune.confirm && !args.yes && io::stdin().is_terminal();
    if prompt {
        print_plan(&plan);
        if !confirm(&format!(
            "\nRemove {} volume(s), reclaiming {}? [y/N] ",
            plan.len(),
            plan.total_human()
        ))? {
            println!("Aborted; nothing was removed.");
            session.close()?;
            return Ok(());
        }
    }

    let started = Instant::now();
    let outcome = session.apply_plan(&app.ctx);
    app.timing("apply", started);

    match app.mode {
        OutputMode::Human => print_outcome(&outcome),
        OutputMode::Json => {
            write_json_line(&json!({
                "command": "prune",
                "plan": plan_json(&plan),
                "outcome": outcome,
            }))?;
        }
    }
    session.close()?;

    if app.ctx.is_cancelled() {
        return Err(CliError::Runtime("prune interrupted".to_string()));
    }
    if !outcome.is_complete() {
        return Err(CliError::Partial(format!(
            "{} of {} removal(s) failed, {} skipped",
            outcome.failed.len(),
            outcome.attempted(),
            outcome.skipped.len()
        )));
    }
    Ok(())
}

#[cfg(feature = "tui")]
fn run_dashboard(app: &App, args: &DashboardArgs) -> Result<(), CliError> {
    let mut session = match app.connect() {
        Ok(provider) => Session::new(provider, app.session_options()),
        Err(err) => Session::unavailable(&err, app.session_options()),
    };
    session.start(&app.ctx);

    let refresh_ms = args.refresh_ms.unwrap_or(app.config.dashboard.refresh_ms);
    let refresh = (refresh_ms > 0).then(|| std::time::Duration::from_millis(refresh_ms));
    volsweep::tui::run(&mut session, &app.ctx, refresh)?;
    session.close()?;
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_dashboard(_app: &App, _args: &DashboardArgs) -> Result<(), CliError> {
    Err(CliError::User(
        "dashboard unavailable: built without the `tui` feature".to_string(),
    ))
}

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            match output_mode(cli) {
                OutputMode::Human => println!("{}", path.display()),
                OutputMode::Json => write_json_line(&json!({
                    "command": "config path",
                    "path": path.to_string_lossy(),
                    "exists": path.exists(),
                }))?,
            }
            Ok(())
        }
        ConfigCommand::Show => {
            let config = load_config(cli)?;
            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Internal(format!("render config: {e}")))?;
                    print!("{toml_str}");
                }
                OutputMode::Json => write_json_line(&json!({
                    "command": "config show",
                    "config": serde_json::to_value(&config)?,
                }))?,
            }
            Ok(())
        }
        ConfigCommand::Validate => match load_config(cli) {
            Ok(config) => {
                let hash = config
                    .stable_hash()
                    .map_err(|e| CliError::Internal(e.to_string()))?;
                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("Configuration is valid.");
                        println!("  Source: {}", config.config_file.display());
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => write_json_line(&json!({
                        "command": "config validate",
                        "valid": true,
                        "path": config.config_file.to_string_lossy(),
                        "hash": hash,
                    }))?,
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => eprintln!("Configuration is INVALID: {e}"),
                    OutputMode::Json => write_json_line(&json!({
                        "command": "config validate",
                        "valid": false,
                        "error": e.to_string(),
                    }))?,
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
    }
}

/// Mark the requested volumes in the session.
fn select(session: &mut Session, ctx: &Context, args: &SelectArgs) -> Result<(), CliError> {
    if args.names.is_empty() && !args.orphans {
        return Err(CliError::User(
            "select volumes by name or pass --orphans".to_string(),
        ));
    }
    if args.orphans {
        session.dispatch(ctx, SessionMsg::MarkAllOrphans);
    }
    for name in &args.names {
        let index = session
            .model()
            .snapshot()
            .iter()
            .position(|v| &v.name == name)
            .ok_or_else(|| CliError::User(format!("volume not found: {name}")))?;
        if !session.model().is_marked(index) {
            session.dispatch(ctx, SessionMsg::ToggleMark(index));
        }
    }
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool, CliError> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .map_err(|e| CliError::Runtime(e.to_string()))?;
    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn print_volume_table(volumes: &[&Volume]) {
    println!(
        "{}",
        format!(
            "{:<32} {:>9}  {:<6}  {:<16} {}",
            "NAME", "SIZE", "STATUS", "PROJECT", "ATTACHED"
        )
        .bold()
    );
    for volume in volumes {
        let row = format!(
            "{:<32} {:>9}  {:<6}  {:<16} {}",
            volume.name,
            volume.size_human(),
            volume.status_label(),
            volume.project_label(),
            volume.attached_label(",")
        );
        if volume.is_orphan() {
            println!("{}", row.yellow());
        } else {
            println!("{row}");
        }
    }
}

fn print_volume_details(volume: &Volume) {
    let status = if volume.is_orphan() {
        volume.status_label().yellow().to_string()
    } else {
        volume.status_label().green().to_string()
    };
    println!("{}", volume.name.bold());
    println!("  Driver:    {}", volume.driver);
    println!("  Size:      {}", volume.size_human());
    println!("  Project:   {}", volume.project_label());
    println!("  Status:    {status}");
    println!("  Attached:  {}", volume.attached_label(", "));
    println!(
        "  Last seen: {}",
        volume.last_seen.format("%Y-%m-%d %H:%M:%S UTC")
    );
}

fn print_plan(plan: &PrunePlan) {
    if plan.is_empty() {
        println!("{}", "<none selected>".dimmed());
        return;
    }
    println!("{}", "Prune plan:".bold());
    for volume in &plan.selected {
        println!("  {:<32} {:>9}", volume.name, volume.size_human());
    }
    let mut total = format!(
        "  Total reclaimable: {} across {} volume(s)",
        plan.total_human(),
        plan.len()
    );
    if plan.unknown_size_count > 0 {
        total.push_str(&format!(" ({} of unknown size)", plan.unknown_size_count));
    }
    println!("{}", total.cyan());
}

fn print_outcome(outcome: &ApplyOutcome) {
    for name in &outcome.succeeded {
        println!("  {} {name}", "removed".green());
    }
    for (name, err) in &outcome.failed {
        println!("  {} {name}: {}", "failed ".red(), err.message);
    }
    for name in &outcome.skipped {
        println!("  {} {name} (batch limit)", "skipped".dimmed());
    }
    println!("\n{}", outcome.summary().bold());
}

fn plan_json(plan: &PrunePlan) -> Value {
    json!({
        "volumes": plan.names(),
        "count": plan.len(),
        "total_reclaimable_bytes": plan.total_reclaimable_bytes,
        "unknown_size_count": plan.unknown_size_count,
    })
}

fn plan_payload(command: &str, plan: &PrunePlan) -> Value {
    json!({
        "command": command,
        "plan": plan_json(plan),
    })
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("VOLSWEEP_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_wins_over_env_and_tty() {
        assert_eq!(
            resolve_output_mode(true, Some("human"), true),
            OutputMode::Json
        );
    }

    #[test]
    fn env_mode_overrides_tty_fallback() {
        assert_eq!(
            resolve_output_mode(false, Some(" JSON "), true),
            OutputMode::Json
        );
        assert_eq!(
            resolve_output_mode(false, Some("human"), false),
            OutputMode::Human
        );
        assert_eq!(resolve_output_mode(false, Some("auto"), false), OutputMode::Json);
        assert_eq!(resolve_output_mode(false, None, true), OutputMode::Human);
    }

    #[test]
    fn exit_codes_follow_contract() {
        assert_eq!(CliError::User(String::new()).exit_code(), 1);
        assert_eq!(CliError::Runtime(String::new()).exit_code(), 2);
        assert_eq!(CliError::Internal(String::new()).exit_code(), 3);
        assert_eq!(CliError::Partial(String::new()).exit_code(), 4);
    }

    #[test]
    fn backend_errors_map_to_exit_classes() {
        assert_eq!(CliError::from(VsError::not_found("x")).exit_code(), 1);
        assert_eq!(
            CliError::from(VsError::InvalidVolumeName { name: "-f".into() }).exit_code(),
            1
        );
        assert_eq!(
            CliError::from(VsError::Unavailable {
                backend: "docker-cli",
                details: "down".into()
            })
            .exit_code(),
            2
        );
        assert_eq!(
            CliError::from(VsError::ChannelClosed { component: "logger" }).exit_code(),
            3
        );
    }

    #[test]
    fn command_surface_parses() {
        let cases = [
            vec!["volsweep", "list"],
            vec!["volsweep", "list", "--orphans", "--project", "shop"],
            vec!["volsweep", "inspect", "pgdata"],
            vec!["volsweep", "plan", "a", "b"],
            vec!["volsweep", "plan", "--orphans"],
            vec!["volsweep", "prune", "--orphans", "--yes"],
            vec!["volsweep", "--backend", "mock", "--json", "list"],
            vec!["volsweep", "--timeout-ms", "500", "dashboard", "--refresh-ms", "0"],
            vec!["volsweep", "config", "validate"],
            vec!["volsweep", "completions", "bash"],
        ];
        for case in cases {
            assert!(Cli::try_parse_from(case.clone()).is_ok(), "failed to parse {case:?}");
        }
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["volsweep", "-v", "-q", "list"]).is_err());
    }

    #[test]
    fn inspect_requires_a_name() {
        assert!(Cli::try_parse_from(["volsweep", "inspect"]).is_err());
    }
}
