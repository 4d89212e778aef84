//! TRO Ledger CLI
//!
//! Entry point for the `tro` command-line tool.

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use tro_ledger::config::{user_config_path, EffectiveConfig, LedgerConfig};
use tro_ledger::document::{Document, DocumentPaths};
use tro_ledger::error::{ErrorKind, LedgerError, LedgerResult};
use tro_ledger::instant::parse_instant;
use tro_ledger::performance::PerformanceRequest;
use tro_ledger::profile::TrustProfile;
use tro_ledger::report::{generate_report, TemplateRenderer};
use tro_ledger::scan::IgnoreRules;
use tro_ledger::seal::{sign_document, verify_timestamp, GpgSigner, HttpTimestampAuthority, SealVerification, Signer};
use tro_ledger::signal::{CancelToken, SignalHandler, EXIT_CODE_CANCELLED};
use tro_ledger::sniff::FileCommandSniffer;

const EXIT_FAILURE: i32 = 1;
const EXIT_USAGE: i32 = 2;
/// Verification ran and found a discrepancy.
const EXIT_MISMATCH: i32 = 3;

#[derive(Parser)]
#[command(name = "tro")]
#[command(about = "Transparent Research Object ledger", version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Path to the TRO declaration file (default: some_tro.jsonld)
    #[arg(long, global = true, env = "TRO_DECLARATION")]
    declaration: Option<PathBuf>,

    /// Path to the TRS profile file (only used when creating a new TRO)
    #[arg(long, global = true, env = "TRS_PROFILE")]
    profile: Option<PathBuf>,

    /// GPG fingerprint for signing the TRO
    #[arg(long, global = true, env = "GPG_FINGERPRINT")]
    gpg_fingerprint: Option<String>,

    /// GPG passphrase for signing the TRO
    #[arg(long, global = true, env = "GPG_PASSPHRASE", hide_env_values = true)]
    gpg_passphrase: Option<String>,

    /// GnuPG home directory
    #[arg(long, global = true, env = "GPG_HOME")]
    gpg_home: Option<PathBuf>,

    /// TRO creator (only used when creating a new TRO)
    #[arg(long, global = true, env = "TRO_CREATOR")]
    tro_creator: Option<String>,

    /// TRO name (only used when creating a new TRO)
    #[arg(long, global = true, env = "TRO_NAME")]
    tro_name: Option<String>,

    /// TRO description (only used when creating a new TRO)
    #[arg(long, global = true, env = "TRO_DESCRIPTION")]
    tro_description: Option<String>,

    /// RFC 3161 timestamp authority URL
    #[arg(long, global = true, env = "TSA_URL")]
    tsa_url: Option<String>,

    /// Config file (default: ~/.config/tro/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage arrangements in the TRO
    Arrangement {
        #[command(subcommand)]
        action: ArrangementCommands,
    },

    /// Manage the composition of the TRO
    Composition {
        #[command(subcommand)]
        action: CompositionCommands,
    },

    /// Manage performances in the TRO
    Performance {
        #[command(subcommand)]
        action: PerformanceCommands,
    },

    /// Sign the TRO and obtain a trusted timestamp
    Sign,

    /// Verify that the TRO is signed and timestamped correctly
    Verify,

    /// Compare a replication package with a recorded arrangement
    VerifyPackage {
        /// Arrangement id, e.g. arrangement/0
        arrangement: String,

        /// Directory, zip, tar or tar.gz package
        package: PathBuf,

        /// Only compare package entries under this prefix
        #[arg(long)]
        subpath: Option<String>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Generate a report of the TRO
    Report {
        /// Template file, or the name of a built-in template ("default")
        #[arg(long, short = 't')]
        template: String,

        /// Output file
        #[arg(long, short = 'o')]
        output: PathBuf,
    },

    /// Show the effective configuration (secrets redacted)
    Config,
}

#[derive(Subcommand)]
enum ArrangementCommands {
    /// Scan a directory and record it as a new arrangement
    Add {
        directory: PathBuf,

        #[arg(long, short = 'm')]
        comment: Option<String>,

        /// Directory names to skip (replaces the configured list)
        #[arg(long = "ignore-dir", short = 'i')]
        ignore_dir: Vec<String>,
    },

    /// List arrangements in the TRO
    List {
        /// Show every location
        #[arg(long, short = 'v')]
        verbose: bool,
    },
}

#[derive(Subcommand)]
enum CompositionCommands {
    /// Show the artifacts of the composition
    Info {
        /// Show which arrangements reference each artifact
        #[arg(long, short = 'v')]
        verbose: bool,
    },
}

#[derive(Subcommand)]
enum PerformanceCommands {
    /// Add a performance to the TRO
    Add {
        /// Description of the performance
        #[arg(long, short = 'm')]
        comment: Option<String>,

        /// Start time (RFC 3339 or YYYY-MM-DD[THH:MM:SS])
        #[arg(long, short = 's', value_parser = parse_time)]
        start: DateTime<Utc>,

        /// End time
        #[arg(long, short = 'e', value_parser = parse_time)]
        end: DateTime<Utc>,

        /// Performance attribute, e.g. trov:InternetIsolation
        #[arg(long, short = 'c')]
        caps: Vec<String>,

        /// Accessed arrangement
        #[arg(long, short = 'a')]
        accessed: Option<String>,

        /// Arrangement the performance contributed to
        #[arg(long, short = 'M')]
        modified: Option<String>,

        /// Extra field as KEY=VALUE (VALUE parsed as JSON when possible)
        #[arg(long = "extra", value_parser = parse_extra)]
        extra: Vec<(String, Value)>,
    },
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, String> {
    parse_instant(value).map_err(|e| format!("invalid time '{}': {}", value, e))
}

fn parse_extra(value: &str) -> Result<(String, Value), String> {
    let (key, raw) = value
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", value))?;
    if key.is_empty() {
        return Err("extra field name is empty".to_string());
    }
    let parsed = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), parsed))
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.global.log_level)))
        .init();

    let signals = SignalHandler::new();
    if let Err(e) = signals.install() {
        tracing::warn!(error = %e, "Could not install signal handler");
    }

    let code = match run(cli, signals.token()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit_code(&e)
        }
    };
    process::exit(code);
}

fn exit_code(err: &LedgerError) -> i32 {
    match err.kind() {
        ErrorKind::Cancelled => EXIT_CODE_CANCELLED,
        ErrorKind::Configuration => EXIT_USAGE,
        _ => EXIT_FAILURE,
    }
}

fn run(cli: Cli, cancel: CancelToken) -> LedgerResult<i32> {
    let effective = load_config(&cli.global)?;
    let ctx = Context {
        config: effective.settings.clone(),
        cancel,
    };

    match cli.command {
        Commands::Arrangement { action } => match action {
            ArrangementCommands::Add {
                directory,
                comment,
                ignore_dir,
            } => run_arrangement_add(&ctx, directory, comment, ignore_dir),
            ArrangementCommands::List { verbose } => run_arrangement_list(&ctx, verbose),
        },
        Commands::Composition { action } => match action {
            CompositionCommands::Info { verbose } => run_composition_info(&ctx, verbose),
        },
        Commands::Performance { action } => match action {
            PerformanceCommands::Add {
                comment,
                start,
                end,
                caps,
                accessed,
                modified,
                extra,
            } => {
                let mut request = PerformanceRequest::new(start, end).attribute_names(&caps)?;
                request.comment = comment;
                request.accessed = accessed;
                request.contributed = modified;
                for (key, value) in extra {
                    request = request.extra_field(key, value);
                }
                run_performance_add(&ctx, request)
            }
        },
        Commands::Sign => run_sign(&ctx),
        Commands::Verify => run_verify(&ctx),
        Commands::VerifyPackage {
            arrangement,
            package,
            subpath,
            json,
        } => run_verify_package(&ctx, &arrangement, package, subpath, json),
        Commands::Report { template, output } => {
            let document = ctx.load_document()?;
            let renderer = TemplateRenderer::resolve(&template)?;
            generate_report(&document, &renderer, &output)?;
            println!("Report written to {}", output.display());
            Ok(0)
        }
        Commands::Config => {
            println!("{}", effective.to_json()?);
            Ok(0)
        }
    }
}

fn load_config(global: &GlobalArgs) -> LedgerResult<EffectiveConfig> {
    let (file, required) = match &global.config {
        Some(path) => (Some(path.clone()), true),
        None => (user_config_path(), false),
    };
    let cli = json!({
        "declaration": global.declaration,
        "profile": global.profile,
        "metadata": {
            "creator": global.tro_creator,
            "name": global.tro_name,
            "description": global.tro_description,
        },
        "signing": {
            "key_id": global.gpg_fingerprint,
            "passphrase": global.gpg_passphrase,
            "gpg_home": global.gpg_home,
        },
        "timestamp": {
            "url": global.tsa_url,
        },
    });
    Ok(EffectiveConfig::build(file.as_deref(), required, cli)?)
}

struct Context {
    config: LedgerConfig,
    cancel: CancelToken,
}

impl Context {
    fn paths(&self) -> DocumentPaths {
        DocumentPaths::for_declaration(&self.config.declaration)
    }

    fn signer(&self) -> GpgSigner {
        GpgSigner::new(&self.config.signing.gpg_binary, self.config.timeouts.process())
            .with_home(self.config.signing.gpg_home.clone())
    }

    fn authority(&self) -> HttpTimestampAuthority {
        HttpTimestampAuthority::new(
            self.config.authority_endpoints(),
            &self.config.timestamp.openssl_binary,
            self.config.timeouts,
        )
    }

    /// Existing declaration, or a new one built from the profile and metadata.
    fn open_document(&self) -> LedgerResult<Document> {
        let profile = match &self.config.profile {
            Some(path) => TrustProfile::load(path)?,
            None => TrustProfile::default(),
        };
        Document::open(self.paths(), self.config.document_metadata(), profile)
    }

    /// Existing declaration only.
    fn load_document(&self) -> LedgerResult<Document> {
        Document::load(self.paths())
    }

    /// Record the configured key's public half in the profile snapshot.
    fn embed_public_key(&self, document: &mut Document) -> LedgerResult<bool> {
        let Some(key_id) = self.config.signing.key_id.as_deref() else {
            return Ok(false);
        };
        let key = self.signer().export_public_key(key_id)?;
        Ok(document.set_public_key(key))
    }
}

fn run_arrangement_add(
    ctx: &Context,
    directory: PathBuf,
    comment: Option<String>,
    ignore_dir: Vec<String>,
) -> LedgerResult<i32> {
    let mut options = ctx.config.scan_options()?.with_cancel(ctx.cancel.clone());
    if !ignore_dir.is_empty() {
        let ignore = IgnoreRules::new(&ignore_dir).map_err(|e| LedgerError::Configuration(e.to_string()))?;
        options = options.with_ignore(ignore);
    }
    let sniffer = FileCommandSniffer::new("file", ctx.config.timeouts.process());

    let mut document = ctx.open_document()?;
    ctx.embed_public_key(&mut document)?;
    let id = document.add_arrangement(&directory, &options, comment.as_deref(), &sniffer)?;
    document.save()?;

    println!("Added {} ({} artifacts in composition)", id, document.composition().len());
    Ok(0)
}

fn run_arrangement_list(ctx: &Context, verbose: bool) -> LedgerResult<i32> {
    let document = ctx.load_document()?;
    for arrangement in document.arrangements() {
        println!("Arrangement(id={}): {}", arrangement.id(), arrangement.comment());
        if verbose {
            println!("  - Composition:");
            for locus in arrangement.loci() {
                println!("    - {}", locus.location());
            }
        }
    }
    Ok(0)
}

fn run_composition_info(ctx: &Context, verbose: bool) -> LedgerResult<i32> {
    let document = ctx.load_document()?;
    let usage = if verbose {
        document.artifact_usage()
    } else {
        Default::default()
    };
    let composition = document.composition();
    for artifact in composition.artifacts() {
        println!("{}", artifact.id());
        println!("  - mimeType: {}", artifact.mime_type());
        println!("  - sha256 {}", artifact.sha256());
        if verbose {
            println!("  - Arrangements:");
            for used in usage.get(&artifact.id()).into_iter().flatten() {
                println!("    - {} (id={})", used.location, used.arrangement);
            }
        }
    }
    if let Some(fingerprint) = composition.fingerprint() {
        println!("fingerprint: {}", fingerprint);
    }
    Ok(0)
}

fn run_performance_add(ctx: &Context, request: PerformanceRequest) -> LedgerResult<i32> {
    let mut document = ctx.open_document()?;
    ctx.embed_public_key(&mut document)?;
    let id = document.add_performance(request)?;
    document.save()?;
    println!("Added {}", id);
    Ok(0)
}

fn run_sign(ctx: &Context) -> LedgerResult<i32> {
    let mut document = ctx.load_document()?;
    let mut session = sign_document(&mut document, &ctx.signer(), &ctx.config.signing_key())?;
    println!("Signature written to {}", document.paths().signature.display());

    session.timestamp(&document, &ctx.authority())?;
    println!("Timestamp written to {}", document.paths().timestamp.display());
    Ok(0)
}

fn run_verify(ctx: &Context) -> LedgerResult<i32> {
    let document = ctx.load_document()?;
    match verify_timestamp(&document, &ctx.authority())? {
        SealVerification::Verified => {
            println!("Timestamp verified for {}", document.paths().declaration.display());
            Ok(0)
        }
        SealVerification::Failed { stage, reason } => {
            eprintln!("Verification failed ({:?}): {}", stage, reason.trim());
            Ok(EXIT_MISMATCH)
        }
    }
}

fn run_verify_package(
    ctx: &Context,
    arrangement: &str,
    package: PathBuf,
    subpath: Option<String>,
    json_output: bool,
) -> LedgerResult<i32> {
    let document = ctx.load_document()?;
    let report = document.verify_replication_package(arrangement, &package, subpath.as_deref())?;
    if json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report);
    }
    Ok(if report.is_valid() { 0 } else { EXIT_MISMATCH })
}
