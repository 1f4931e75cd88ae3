// crates/escrow-cli/src/main.rs
// ============================================================================
// Module: Quorum Escrow CLI Entry Point
// Description: Command dispatcher for vault, proof, approval, and release workflows.
// Purpose: Expose the escrow engine's consumer surface on the command line.
// Dependencies: clap, escrow-config, escrow-core, serde, serde_jcs, thiserror.
// ============================================================================

//! ## Overview
//! The `escrow` CLI loads `escrow.toml`, builds an engine from it, runs one
//! operation, and prints the result as canonical JSON. State survives
//! between invocations only with the sqlite store. All user-facing strings
//! are routed through the message catalog. Inputs are untrusted: evidence
//! files are read with hard size limits.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use escrow_cli::t;
use escrow_cli::wiring::ConfiguredEngine;
use escrow_cli::wiring::StoreBackend;
use escrow_cli::wiring::build_engine;
use escrow_cli::wiring::open_store;
use escrow_config::EscrowConfig;
use escrow_config::StoreType;
use escrow_config::config_toml_example;
use escrow_core::AttestationRequest;
use escrow_core::AuthorityId;
use escrow_core::EscrowError;
use escrow_core::EvidenceItem;
use escrow_core::Timestamp;
use escrow_core::ValidatorId;
use escrow_core::VaultCategory;
use escrow_core::VaultId;
use escrow_core::VaultSpec;
use escrow_store_sqlite::VaultVersionSummary;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "escrow", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Optional config file path (defaults to `ESCROW_CONFIG` or escrow.toml).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Optional `SQLite` store path (overrides the `[store]` section).
    #[arg(long = "store-path", value_name = "PATH", global = true)]
    store_path: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Vault creation and inspection.
    Vault {
        /// Selected vault subcommand.
        #[command(subcommand)]
        command: VaultCommand,
    },
    /// Milestone proof submission.
    Proof {
        /// Selected proof subcommand.
        #[command(subcommand)]
        command: ProofCommand,
    },
    /// Record a validator co-signature on a submitted milestone.
    Approve(ApproveCommand),
    /// Release the funds of a releasable milestone.
    Release(ReleaseCommand),
    /// Print totals across all vaults.
    Portfolio,
    /// List submitted milestones awaiting co-signatures.
    Queue(QueueCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Vault subcommands.
#[derive(Subcommand, Debug)]
enum VaultCommand {
    /// Create a vault with all milestones pending.
    Create(VaultCreateCommand),
    /// Print the full state of one vault.
    Show(VaultIdArgs),
    /// Print every vault in creation order.
    List,
    /// Print the rollup of one vault.
    Summary(VaultIdArgs),
    /// Print the stored snapshot versions of one vault (sqlite store only).
    History(VaultIdArgs),
}

/// Proof subcommands.
#[derive(Subcommand, Debug)]
enum ProofCommand {
    /// Submit a claim and evidence files for oracle attestation.
    Submit(ProofSubmitCommand),
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate the config file.
    Validate,
    /// Print a complete example config.
    Example,
}

/// Impact categories accepted on the command line.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum CategoryArg {
    /// Schools, training, and learning programs.
    Education,
    /// Clinics and health services.
    Healthcare,
    /// Farming and food security.
    Agriculture,
    /// Water, roads, energy, and civil works.
    Infrastructure,
}

impl From<CategoryArg> for VaultCategory {
    fn from(value: CategoryArg) -> Self {
        match value {
            CategoryArg::Education => Self::Education,
            CategoryArg::Healthcare => Self::Healthcare,
            CategoryArg::Agriculture => Self::Agriculture,
            CategoryArg::Infrastructure => Self::Infrastructure,
        }
    }
}

/// Arguments for `vault create`.
#[derive(Args, Debug)]
struct VaultCreateCommand {
    /// Project name.
    #[arg(long)]
    name: String,
    /// Project description.
    #[arg(long, default_value = "")]
    description: String,
    /// Owning authority identifier.
    #[arg(long, value_name = "AUTHORITY_ID")]
    authority: String,
    /// Impact category.
    #[arg(long, value_enum)]
    category: CategoryArg,
    /// Project location label.
    #[arg(long, default_value = "")]
    location: String,
    /// Total amount in minor units.
    #[arg(long, value_name = "AMOUNT")]
    total: u64,
    /// Number of milestones.
    #[arg(long, value_name = "COUNT")]
    milestones: u32,
    /// Milestone descriptions in order (repeatable).
    #[arg(long = "milestone-description", value_name = "TEXT", action = ArgAction::Append)]
    milestone_descriptions: Vec<String>,
}

/// Vault selector.
#[derive(Args, Debug)]
struct VaultIdArgs {
    /// Vault identifier.
    #[arg(value_name = "VAULT_ID")]
    vault_id: String,
}

/// Milestone selector.
#[derive(Args, Debug)]
struct MilestoneArgs {
    /// Vault identifier.
    #[arg(value_name = "VAULT_ID")]
    vault_id: String,
    /// Milestone index.
    #[arg(value_name = "INDEX")]
    index: u32,
}

/// Arguments for `proof submit`.
#[derive(Args, Debug)]
struct ProofSubmitCommand {
    /// Target milestone.
    #[command(flatten)]
    target: MilestoneArgs,
    /// Claim text describing the completed work.
    #[arg(long)]
    claim: String,
    /// Evidence file as `MIME=PATH` (repeatable).
    #[arg(long, value_name = "MIME=PATH", action = ArgAction::Append)]
    evidence: Vec<String>,
}

/// Arguments for `approve`.
#[derive(Args, Debug)]
struct ApproveCommand {
    /// Target milestone.
    #[command(flatten)]
    target: MilestoneArgs,
    /// Co-signing validator identifier.
    #[arg(long, value_name = "VALIDATOR_ID")]
    validator: String,
}

/// Arguments for `release`.
#[derive(Args, Debug)]
struct ReleaseCommand {
    /// Target milestone.
    #[command(flatten)]
    target: MilestoneArgs,
}

/// Arguments for `queue`.
#[derive(Args, Debug)]
struct QueueCommand {
    /// Validator whose signatures are reported.
    #[arg(long, value_name = "VALIDATOR_ID")]
    validator: Option<String>,
    /// Only list milestones the validator has not signed.
    #[arg(long, action = ArgAction::SetTrue, requires = "validator")]
    unsigned: bool,
}

/// Output of `vault history`.
#[derive(Debug, Serialize)]
struct VaultHistoryOutput {
    /// Vault identifier.
    vault_id: VaultId,
    /// Stored versions, oldest first.
    versions: Vec<VaultVersionSummary>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for catalog messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a catalog message.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

impl From<EscrowError> for CliError {
    fn from(err: EscrowError) -> Self {
        Self::new(t!("escrow.failed", kind = err.kind(), error = err))
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

/// Errors raised while reading bounded input files.
#[derive(Debug, Error)]
enum ReadLimitError {
    /// I/O failure while reading.
    #[error("{0}")]
    Io(std::io::Error),
    /// File exceeds the permitted size.
    #[error("{size} bytes exceeds limit {limit}")]
    TooLarge {
        /// Observed size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&t!("main.version", version = version))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    let config_path = cli.config;
    let store_path = cli.store_path;
    let load = || load_config(config_path.as_deref(), store_path.clone());
    match command {
        Commands::Config {
            command,
        } => command_config(&command, config_path.as_deref()),
        Commands::Vault {
            command: VaultCommand::History(args),
        } => command_vault_history(&load()?, &args),
        Commands::Vault {
            command,
        } => command_vault(command, &open_engine(&load()?)?),
        Commands::Proof {
            command: ProofCommand::Submit(command),
        } => {
            let config = load()?;
            command_proof_submit(&command, &config, &open_engine(&config)?)
        }
        Commands::Approve(command) => command_approve(&command, &open_engine(&load()?)?),
        Commands::Release(command) => command_release(&command, &open_engine(&load()?)?),
        Commands::Portfolio => {
            write_canonical_json(&open_engine(&load()?)?.portfolio_summary()?)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Queue(command) => command_queue(&command, &open_engine(&load()?)?),
    }
}

/// Emits the top-level help message for the CLI.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(())
}

// ============================================================================
// SECTION: Config Loading
// ============================================================================

/// Loads the config and applies the `--store-path` override.
fn load_config(path: Option<&Path>, store_path: Option<PathBuf>) -> CliResult<EscrowConfig> {
    let config = EscrowConfig::load(path)
        .map_err(|err| CliError::new(t!("config.load_failed", error = err)))?;
    apply_store_override(config, store_path)
}

/// Points the config at a `SQLite` store path when one was given.
fn apply_store_override(
    mut config: EscrowConfig,
    store_path: Option<PathBuf>,
) -> CliResult<EscrowConfig> {
    if let Some(path) = store_path {
        config.store.store_type = StoreType::Sqlite;
        config.store.path = Some(path);
        config.validate().map_err(|err| CliError::new(t!("config.load_failed", error = err)))?;
    }
    Ok(config)
}

/// Builds the engine for a loaded config.
fn open_engine(config: &EscrowConfig) -> CliResult<ConfiguredEngine> {
    build_engine(config).map_err(|err| CliError::new(t!("engine.init_failed", error = err)))
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Executes config subcommands.
fn command_config(command: &ConfigCommand, path: Option<&Path>) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate => {
            let _config = EscrowConfig::load(path)
                .map_err(|err| CliError::new(t!("config.load_failed", error = err)))?;
            write_stdout_line(&t!("config.validate.ok"))
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        }
        ConfigCommand::Example => {
            write_stdout_bytes(config_toml_example().as_bytes())
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Vault Commands
// ============================================================================

/// Dispatches vault subcommands.
fn command_vault(command: VaultCommand, engine: &ConfiguredEngine) -> CliResult<ExitCode> {
    match command {
        VaultCommand::Create(command) => {
            let vault = engine.create_vault(vault_spec(command, now_timestamp()?))?;
            write_canonical_json(&vault)?;
        }
        VaultCommand::Show(args) => {
            write_canonical_json(&engine.vault_state(&VaultId::new(args.vault_id))?)?;
        }
        VaultCommand::List => write_canonical_json(&engine.list_vaults()?)?,
        VaultCommand::Summary(args) => {
            write_canonical_json(&engine.vault_summary(&VaultId::new(args.vault_id))?)?;
        }
        VaultCommand::History(_) => return Err(CliError::new(t!("store.history.requires_sqlite"))),
    }
    Ok(ExitCode::SUCCESS)
}

/// Builds a [`VaultSpec`] from `vault create` arguments.
fn vault_spec(command: VaultCreateCommand, created_at: Timestamp) -> VaultSpec {
    VaultSpec {
        name: command.name,
        description: command.description,
        authority: AuthorityId::new(command.authority),
        category: command.category.into(),
        location: command.location,
        total_amount: command.total,
        milestone_count: command.milestones,
        milestone_descriptions: command.milestone_descriptions,
        created_at,
    }
}

/// Executes `vault history` directly against the `SQLite` store.
fn command_vault_history(config: &EscrowConfig, args: &VaultIdArgs) -> CliResult<ExitCode> {
    let store = open_store(&config.store)
        .map_err(|err| CliError::new(t!("store.open_failed", error = err)))?;
    let StoreBackend::Sqlite(store) = store else {
        return Err(CliError::new(t!("store.history.requires_sqlite")));
    };
    let vault_id = VaultId::new(args.vault_id.clone());
    let versions = store
        .list_versions(&vault_id)
        .map_err(|err| CliError::new(t!("store.history.failed", error = err)))?;
    write_canonical_json(&VaultHistoryOutput {
        vault_id,
        versions,
    })?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Milestone Commands
// ============================================================================

/// Executes `proof submit`.
fn command_proof_submit(
    command: &ProofSubmitCommand,
    config: &EscrowConfig,
    engine: &ConfiguredEngine,
) -> CliResult<ExitCode> {
    let mut evidence = Vec::with_capacity(command.evidence.len());
    for spec in &command.evidence {
        let (mime_type, path) = parse_evidence_spec(spec)?;
        let bytes = read_bytes_with_limit(&path, config.engine.max_evidence_bytes)
            .map_err(|err| read_error(&path, err))?;
        evidence.push(EvidenceItem::new(mime_type, bytes));
    }
    let request = AttestationRequest::new(command.claim.clone(), evidence);
    let milestone = engine.submit_proof(
        &VaultId::new(command.target.vault_id.clone()),
        command.target.index,
        &request,
        now_timestamp()?,
    )?;
    write_canonical_json(&milestone)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `approve`.
fn command_approve(command: &ApproveCommand, engine: &ConfiguredEngine) -> CliResult<ExitCode> {
    let approval = engine.approve_milestone(
        &VaultId::new(command.target.vault_id.clone()),
        command.target.index,
        &ValidatorId::new(command.validator.clone()),
    )?;
    write_canonical_json(&approval)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `release`.
fn command_release(command: &ReleaseCommand, engine: &ConfiguredEngine) -> CliResult<ExitCode> {
    let receipt = engine
        .release_milestone(&VaultId::new(command.target.vault_id.clone()), command.target.index)?;
    write_canonical_json(&receipt)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `queue`.
fn command_queue(command: &QueueCommand, engine: &ConfiguredEngine) -> CliResult<ExitCode> {
    let validator = command.validator.clone().map(ValidatorId::new);
    let items = engine.review_queue(validator.as_ref(), command.unsigned)?;
    write_canonical_json(&items)?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Input Helpers
// ============================================================================

/// Splits a `MIME=PATH` evidence argument.
fn parse_evidence_spec(spec: &str) -> CliResult<(String, PathBuf)> {
    let invalid = || CliError::new(t!("proof.evidence.invalid_spec", value = spec));
    let (mime_type, path) = spec.split_once('=').ok_or_else(invalid)?;
    let mime_type = mime_type.trim();
    if mime_type.is_empty() || path.is_empty() {
        return Err(invalid());
    }
    Ok((mime_type.to_string(), PathBuf::from(path)))
}

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let metadata = file.metadata().map_err(ReadLimitError::Io)?;
    let size = metadata.len();
    let limit = u64::try_from(max_bytes).map_err(|_| ReadLimitError::TooLarge {
        size,
        limit: max_bytes,
    })?;
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }

    let read_limit = limit.saturating_add(1);
    let mut limited = file.take(read_limit);
    let mut bytes = Vec::new();
    limited.read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        let actual = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
        return Err(ReadLimitError::TooLarge {
            size: actual,
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

/// Formats a bounded read failure for an evidence file.
fn read_error(path: &Path, err: ReadLimitError) -> CliError {
    let kind = t!("input.kind.evidence");
    let path = path.display();
    match err {
        ReadLimitError::Io(error) => {
            CliError::new(t!("input.read_failed", kind = kind, path = path, error = error))
        }
        ReadLimitError::TooLarge {
            size,
            limit,
        } => CliError::new(t!(
            "input.read_too_large",
            kind = kind,
            path = path,
            size = size,
            limit = limit
        )),
    }
}

/// Returns the current wall-clock time as unix milliseconds.
fn now_timestamp() -> CliResult<Timestamp> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|err| CliError::new(t!("clock.unavailable", error = err)))?;
    Ok(Timestamp::UnixMillis(i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)))
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes raw bytes to stdout without adding a newline.
fn write_stdout_bytes(bytes: &[u8]) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(bytes)
}

/// Writes canonical JSON to stdout followed by a newline.
fn write_canonical_json<T: Serialize>(value: &T) -> CliResult<()> {
    let mut bytes = serde_jcs::to_vec(value)
        .map_err(|err| CliError::new(t!("output.json_failed", error = err)))?;
    bytes.push(b'\n');
    write_stdout_bytes(&bytes).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    let stream_label = match stream {
        "stdout" => t!("output.stream.stdout"),
        "stderr" => t!("output.stream.stderr"),
        _ => t!("output.stream.unknown"),
    };
    t!("output.write_failed", stream = stream_label, error = error)
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
