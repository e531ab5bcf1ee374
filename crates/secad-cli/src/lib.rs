//! secad operator CLI
//!
//! Subcommands work against a JSON ledger file:
//!
//! - `allocate`: print the next number for an (entity, year) without writing
//! - `validate`: check a numbering config, exit code 1 when invalid
//! - `issue`: number a transaction, write the ledger back and append to its
//!   audit log

#![warn(missing_docs)]

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use secad_audit::{AuditEntry, AuditLogger, MemoryAuditLog};
use secad_certificate::{AllocationResponse, CertificateNumberAllocator, CertificateNumberConfig};
use secad_registry::{
    CertificateIssuer, InMemoryTransactionLedger, IssueError, IssueRequest, SecadConfig,
    TransactionId,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Log output shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => anyhow::bail!("unknown log format: {other}"),
        }
    }
}

/// Install the global subscriber
///
/// `RUST_LOG` takes precedence over `level`. Logs go to stderr so stdout
/// stays machine readable.
///
/// # Errors
/// Fails if a subscriber is already installed.
pub fn init_tracing(format: LogFormat, level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

fn numbering_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("year")
            .long("year")
            .required(true)
            .value_parser(value_parser!(i32))
            .help("Numbering year"),
    )
    .arg(
        Arg::new("format")
            .long("format")
            .help("Template containing {YEAR} and {SEQUENTIAL_NUMBER}"),
    )
    .arg(Arg::new("prefix").long("prefix").help("Prepended with '-'"))
    .arg(Arg::new("suffix").long("suffix").help("Appended with '-'"))
}

fn ledger_arg() -> Arg {
    Arg::new("ledger")
        .long("ledger")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("JSON ledger file")
}

fn user_arg() -> Arg {
    Arg::new("user").long("user").help("Requesting user")
}

/// Command-line definition
#[must_use]
pub fn command() -> Command {
    Command::new("secad")
        .version(secad_registry::VERSION)
        .about("Securities registry certificate numbering")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .global(true)
                .default_value("text")
                .value_parser(["text", "json"])
                .help("Log output format"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .global(true)
                .default_value("info")
                .help("Log filter when RUST_LOG is unset"),
        )
        .subcommand(numbering_args(
            Command::new("allocate")
                .about("Print the next certificate number without recording it")
                .arg(ledger_arg())
                .arg(
                    Arg::new("entity")
                        .long("entity")
                        .required(true)
                        .help("Entity identifier"),
                )
                .arg(user_arg()),
        ))
        .subcommand(numbering_args(
            Command::new("validate")
                .about("Check a numbering configuration")
                .arg(
                    Arg::new("entity")
                        .long("entity")
                        .default_value("")
                        .help("Entity identifier"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        ))
        .subcommand(numbering_args(
            Command::new("issue")
                .about("Number a transaction and write the ledger back")
                .arg(ledger_arg())
                .arg(
                    Arg::new("transaction")
                        .long("transaction")
                        .required(true)
                        .help("Transaction ULID"),
                )
                .arg(
                    Arg::new("entity")
                        .long("entity")
                        .help("Entity identifier; defaults to the transaction's"),
                )
                .arg(
                    Arg::new("audit")
                        .long("audit")
                        .value_parser(value_parser!(PathBuf))
                        .help("Hash-chained audit log; defaults to <ledger>.audit.json"),
                )
                .arg(user_arg()),
        ))
}

/// Log settings from parsed arguments
///
/// # Errors
/// Unknown log format.
pub fn log_settings(matches: &ArgMatches) -> Result<(LogFormat, String)> {
    let format = matches
        .get_one::<String>("log-format")
        .map_or(Ok(LogFormat::Text), |f| f.parse())?;
    let level = matches
        .get_one::<String>("log-level")
        .cloned()
        .unwrap_or_else(|| "info".to_string());
    Ok((format, level))
}

/// Execute a parsed command line, returning the process exit code
///
/// # Errors
/// Configuration, ledger file or argument failures. Allocation and
/// validation failures are reported in the output with exit code 1.
pub async fn run<W: Write>(matches: &ArgMatches, out: &mut W) -> Result<i32> {
    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => SecadConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SecadConfig::default(),
    };

    match matches.subcommand() {
        Some(("allocate", args)) => allocate(args, &config, out).await,
        Some(("validate", args)) => validate(args, out),
        Some(("issue", args)) => issue(args, &config, out).await,
        Some((other, _)) => anyhow::bail!("unknown subcommand: {other}"),
        None => anyhow::bail!("no subcommand given"),
    }
}

async fn allocate<W: Write>(args: &ArgMatches, config: &SecadConfig, out: &mut W) -> Result<i32> {
    let ledger = load_ledger(args).await?;
    let numbering = numbering_config(args, required::<String>(args, "entity")?)?;

    let allocator = CertificateNumberAllocator::with_settings(ledger, config.allocator.clone());
    let user = args.get_one::<String>("user").map(String::as_str);
    let response = AllocationResponse::from(
        allocator.generate_certificate_number(&numbering, user).await,
    );

    write_json(out, &response)?;
    Ok(if response.success { 0 } else { 1 })
}

fn validate<W: Write>(args: &ArgMatches, out: &mut W) -> Result<i32> {
    let numbering = numbering_config(args, required::<String>(args, "entity")?)?;
    let result = CertificateNumberAllocator::validate_config(&numbering);

    if args.get_flag("json") {
        write_json(out, &result)?;
    } else if result.valid {
        writeln!(out, "valid")?;
    } else {
        for error in &result.errors {
            writeln!(out, "{error}")?;
        }
    }
    Ok(if result.valid { 0 } else { 1 })
}

async fn issue<W: Write>(args: &ArgMatches, config: &SecadConfig, out: &mut W) -> Result<i32> {
    let path = required::<PathBuf>(args, "ledger")?;
    let ledger = load_ledger(args).await?;
    let audit_path = args
        .get_one::<PathBuf>("audit")
        .cloned()
        .unwrap_or_else(|| default_audit_path(path));
    let audit_log = Arc::new(load_audit_log(&audit_path).await?);

    let raw_id = required::<String>(args, "transaction")?;
    let transaction_id = TransactionId::from_str(raw_id)
        .with_context(|| format!("invalid transaction id {raw_id}"))?;

    let entity = match args.get_one::<String>("entity") {
        Some(entity) => entity.clone(),
        None => match ledger.get(transaction_id) {
            Some(tx) => tx.entity_id.to_string(),
            None => {
                let response = AllocationResponse {
                    success: false,
                    data: None,
                    error: Some(IssueError::TransactionNotFound(transaction_id).user_message()),
                };
                write_json(out, &response)?;
                return Ok(1);
            }
        },
    };

    let audit = AuditLogger::new(audit_log.clone());
    let issuer = CertificateIssuer::new(ledger.clone(), audit, config);

    let mut request = IssueRequest::new(transaction_id, numbering_config(args, &entity)?);
    if let Some(user) = args.get_one::<String>("user") {
        request = request.with_user(user.as_str());
    }

    let response = issuer.issue_response(request).await;
    if response.success {
        ledger
            .save(path)
            .await
            .with_context(|| format!("writing ledger {}", path.display()))?;
        save_audit_log(&audit_path, &audit_log).await?;
    }

    write_json(out, &response)?;
    Ok(if response.success { 0 } else { 1 })
}

/// Audit file kept next to a ledger: `ledger.json` pairs with `ledger.audit.json`
#[must_use]
pub fn default_audit_path(ledger: &Path) -> PathBuf {
    ledger.with_extension("audit.json")
}

async fn load_audit_log(path: &Path) -> Result<MemoryAuditLog> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no audit log yet, starting a new chain");
            return Ok(MemoryAuditLog::new());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("reading audit log {}", path.display()));
        }
    };
    let entries: Vec<AuditEntry> = serde_json::from_slice(&bytes)
        .with_context(|| format!("parsing audit log {}", path.display()))?;
    let log = MemoryAuditLog::from_entries(entries)
        .with_context(|| format!("verifying audit log {}", path.display()))?;
    tracing::debug!(path = %path.display(), entries = log.len(), "loaded audit log");
    Ok(log)
}

async fn save_audit_log(path: &Path, log: &MemoryAuditLog) -> Result<()> {
    let json = serde_json::to_vec_pretty(&log.entries())?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("writing audit log {}", path.display()))?;
    tracing::info!(path = %path.display(), entries = log.len(), "saved audit log");
    Ok(())
}

async fn load_ledger(args: &ArgMatches) -> Result<Arc<InMemoryTransactionLedger>> {
    let path = required::<PathBuf>(args, "ledger")?;
    let ledger = InMemoryTransactionLedger::load(path)
        .await
        .with_context(|| format!("reading ledger {}", path.display()))?;
    Ok(Arc::new(ledger))
}

fn numbering_config(args: &ArgMatches, entity: &str) -> Result<CertificateNumberConfig> {
    let year = *required::<i32>(args, "year")?;
    let mut config = CertificateNumberConfig::new(entity, year);
    if let Some(format) = args.get_one::<String>("format") {
        config = config.with_format(format.as_str());
    }
    if let Some(prefix) = args.get_one::<String>("prefix") {
        config = config.with_prefix(prefix.as_str());
    }
    if let Some(suffix) = args.get_one::<String>("suffix") {
        config = config.with_suffix(suffix.as_str());
    }
    Ok(config)
}

fn required<'a, T: Clone + Send + Sync + 'static>(
    args: &'a ArgMatches,
    name: &str,
) -> Result<&'a T> {
    args.get_one::<T>(name)
        .with_context(|| format!("missing --{name}"))
}

fn write_json<W: Write, T: serde::Serialize>(out: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
