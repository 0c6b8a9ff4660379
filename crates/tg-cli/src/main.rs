//! Tenant Guard CLI
//!
//! Command-line interface for running Microsoft 365 compliance standards
//! against a tenant.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;

mod config;
mod validator;

use config::AppConfig;
use tg_connectors::{Connector, GraphApi, GraphConnector, LicenseChecker, MockGraphConnector};
use tg_core::{SharePointSettings, SharingDomainRestrictionMode, StandardSettings};
use tg_observability::{LoggingConfig, TracingStandardLogger};
use tg_standards::{
    Collaborators, MemoryAlertSink, MemoryComplianceStore, Remediation, StandardContext,
    StandardOutcome, StandardRegistry, StandardResult,
};
use validator::{ConfigValidator, ValidationResult};

#[derive(Parser)]
#[command(name = "tenant-guard")]
#[command(author = "Tenant Guard Team")]
#[command(version)]
#[command(about = "Compliance standards for Microsoft 365 tenants", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid output format: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List available standards
    List,

    /// Run a standard against a tenant
    Run(RunArgs),

    /// Validate configuration
    Validate {
        /// Configuration file to validate
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Also check that Graph accepts the credentials
        #[arg(long)]
        check_connection: bool,
    },

    /// Show current configuration
    Config {
        /// Show secrets (redacted by default)
        #[arg(long)]
        show_secrets: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Tenant domain or id
    #[arg(short, long)]
    tenant: String,

    /// Standard name
    #[arg(short, long, default_value = "SharingDomainRestriction")]
    standard: String,

    /// Standard settings as a JSON file
    #[arg(long, value_name = "FILE", conflicts_with_all = ["mode", "domains"])]
    settings: Option<PathBuf>,

    /// Restriction mode (none, allowList, blockList)
    #[arg(long)]
    mode: Option<String>,

    /// Comma separated domains
    #[arg(long)]
    domains: Option<String>,

    /// Fix drift
    #[arg(long)]
    remediate: bool,

    /// Raise an alert on drift
    #[arg(long)]
    alert: bool,

    /// Record compliance fields
    #[arg(long)]
    report: bool,

    /// Identifier attached to alerts
    #[arg(long)]
    standard_id: Option<String>,

    /// Run against an in-memory tenant instead of Microsoft Graph
    #[arg(long)]
    mock: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = AppConfig::load(&config_path)
        .unwrap_or_else(|_| {
            if cli.verbose {
                eprintln!("Using default configuration (no config file found)");
            }
            AppConfig::default()
        })
        .apply_env_overrides();

    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        config.logging.level.parse().unwrap_or(tracing::Level::INFO)
    };

    tg_observability::init_logging_with_config(LoggingConfig {
        level: log_level,
        json_format: config.logging.json_format || cli.format == OutputFormat::Json,
        ..Default::default()
    });

    match cli.command {
        Commands::List => cmd_list(cli.format),
        Commands::Run(args) => cmd_run(config, args, cli.format).await,
        Commands::Validate {
            config: cfg_path,
            check_connection,
        } => cmd_validate(cfg_path.unwrap_or(config_path), check_connection).await,
        Commands::Config { show_secrets } => cmd_config(config, show_secrets, cli.format),
    }
}

fn default_config_path() -> PathBuf {
    if let Some(dirs) = directories::ProjectDirs::from("com", "tenant-guard", "tenant-guard") {
        dirs.config_dir().join("config.yaml")
    } else {
        PathBuf::from("config/default.yaml")
    }
}

fn cmd_list(format: OutputFormat) -> Result<()> {
    let registry = StandardRegistry::with_defaults();
    let standards = registry.list();

    if format == OutputFormat::Json {
        let listing: Vec<Value> = standards
            .iter()
            .map(|s| {
                json!({
                    "name": s.name(),
                    "description": s.description(),
                    "requiredCapabilities": s.required_capabilities(),
                    "parameters": s.parameters(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    println!("{}", "Available Standards".bold());
    println!("───────────────────");
    for standard in standards {
        println!("  {} - {}", standard.name().cyan(), standard.description());
        for param in standard.parameters() {
            let marker = if param.required { "required" } else { "optional" };
            println!("      {} ({}): {}", param.name, marker, param.description);
        }
        println!(
            "      licenses: {}",
            standard.required_capabilities().join(", ")
        );
    }
    Ok(())
}

fn build_settings(args: &RunArgs) -> Result<StandardSettings> {
    let mut settings = match &args.settings {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
            let value: Value = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;
            StandardSettings::from_json(value)?
        }
        None => StandardSettings::new(),
    };

    if let Some(mode) = &args.mode {
        settings = settings.with_param("Mode", json!(mode));
    }
    if let Some(domains) = &args.domains {
        settings = settings.with_param("Domains", json!(domains));
    }
    if args.remediate {
        settings = settings.with_remediate(true);
    }
    if args.alert {
        settings = settings.with_alert(true);
    }
    if args.report {
        settings = settings.with_report(true);
    }
    if let Some(id) = &args.standard_id {
        settings = settings.with_standard_id(id);
    }
    Ok(settings)
}

fn collaborators(
    graph: Arc<dyn GraphApi>,
    licenses: Arc<dyn LicenseChecker>,
    alerts: Arc<MemoryAlertSink>,
    reports: Arc<MemoryComplianceStore>,
) -> Collaborators {
    Collaborators {
        graph,
        licenses,
        logger: Arc::new(TracingStandardLogger::new()),
        alerts,
        reports,
    }
}

async fn cmd_run(config: AppConfig, args: RunArgs, format: OutputFormat) -> Result<()> {
    let registry = StandardRegistry::with_defaults();
    let settings = build_settings(&args)?;

    let alerts = Arc::new(MemoryAlertSink::new());
    let reports = Arc::new(MemoryComplianceStore::new());

    let collaborators = if args.mock {
        if format == OutputFormat::Text {
            println!("{}", "Using in-memory tenant (--mock)".yellow());
        }
        let mock = Arc::new(MockGraphConnector::with_settings(
            "mock",
            SharePointSettings::new(SharingDomainRestrictionMode::None, &[], &[]),
        ));
        collaborators(mock.clone(), mock, alerts.clone(), reports.clone())
    } else {
        let connector = Arc::new(
            GraphConnector::new(config.graph_config(&args.tenant))
                .context("Failed to create Graph connector")?,
        );
        collaborators(connector.clone(), connector, alerts.clone(), reports.clone())
    };

    let context = StandardContext::new(&args.tenant, settings, collaborators);
    let result = registry.run(&args.standard, &context).await?;

    if format == OutputFormat::Json {
        let output = json!({
            "result": result,
            "alerts": alerts.alerts(),
            "fields": reports.fields(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_result(&result, &alerts, &reports);
    }

    if !result.outcome.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_result(result: &StandardResult, alerts: &MemoryAlertSink, reports: &MemoryComplianceStore) {
    println!("{}", "Standard Run".bold());
    println!("────────────");
    println!("  Standard: {}", result.standard_name.cyan());
    println!("  Tenant: {}", result.tenant);
    println!("  Run: {}", result.run_id);
    println!("  Duration: {}ms", result.duration_ms);
    println!();

    match &result.outcome {
        StandardOutcome::LicenseMissing => {
            println!(
                "  {} Tenant has no SharePoint or OneDrive license, nothing to do",
                "Skipped:".yellow()
            );
        }
        StandardOutcome::Aborted { reason } => {
            println!("  {} {}", "Aborted:".red().bold(), reason);
        }
        StandardOutcome::Evaluated(evaluation) => {
            let verdict = if evaluation.compliant {
                "compliant".green()
            } else {
                "not compliant".red()
            };
            println!("  Compliance: {}", verdict);

            let remediation = match &evaluation.remediation {
                Remediation::NotRequested => "not requested".normal(),
                Remediation::AlreadyCompliant => "already compliant".green(),
                Remediation::Applied => "applied".green(),
                Remediation::Failed { error } => format!("failed: {}", error).red(),
            };
            println!("  Remediation: {}", remediation);
        }
    }

    let raised = alerts.alerts();
    if !raised.is_empty() {
        println!();
        println!("{}", "Alerts".bold());
        for alert in raised {
            println!("  {} {}", "!".yellow(), alert.message);
        }
    }

    let fields = reports.fields();
    if !fields.is_empty() {
        println!();
        println!("{}", "Recorded Fields".bold());
        for field in fields {
            println!("  {} = {}", field.field_name, field.value);
        }
    }
}

async fn cmd_validate(config_path: PathBuf, check_connection: bool) -> Result<()> {
    println!(
        "Validating configuration: {}",
        config_path.display().to_string().cyan()
    );

    let config = match AppConfig::load(&config_path) {
        Ok(config) => config.apply_env_overrides(),
        Err(e) => {
            println!("{}: {}", "Configuration file error".red().bold(), e);
            std::process::exit(1);
        }
    };

    let mut validation_result = ConfigValidator::validate(&config);
    if check_connection && !validation_result.has_errors() {
        check_graph_connection(&config, &mut validation_result).await;
    }
    validation_result.print();

    println!();
    println!("{}", "Configuration Summary".bold());
    println!("─────────────────────");
    println!("  Graph: {}", config.graph.base_url);
    println!("  Client: {}", config.graph.client_id);
    println!("  Token URL: {}", config.graph.token_url);
    println!("  Log level: {}", config.logging.level);

    if validation_result.has_errors() {
        println!();
        println!(
            "{}",
            "Configuration validation failed. Fix the errors above."
                .red()
                .bold()
        );
        std::process::exit(1);
    } else if validation_result.has_warnings() {
        println!();
        println!(
            "{}",
            "Configuration is valid with warnings. Review the warnings above."
                .yellow()
                .bold()
        );
    } else {
        println!();
        println!("{}", "Configuration is valid.".green().bold());
    }

    Ok(())
}

async fn check_graph_connection(config: &AppConfig, result: &mut ValidationResult) {
    if config.graph.tenant_id.is_empty() {
        result.add_error("graph.tenant_id must be set to check the Graph connection");
        return;
    }

    println!(
        "Checking Graph connection for {}",
        config.graph.tenant_id.cyan()
    );
    let health = match GraphConnector::new(config.graph_config(&config.graph.tenant_id)) {
        Ok(connector) => connector.health_check().await,
        Err(e) => Err(e),
    };
    ConfigValidator::record_connection(result, health);
}

fn cmd_config(config: AppConfig, show_secrets: bool, format: OutputFormat) -> Result<()> {
    let display_config = if show_secrets {
        config
    } else {
        config.redact_secrets()
    };

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&display_config)?);
    } else {
        let graph = &display_config.graph;
        println!("{}", "Current Configuration".bold());
        println!("─────────────────────────");
        println!("Graph:");
        println!("  Base URL: {}", graph.base_url);
        println!("  Client ID: {}", graph.client_id);
        println!("  Client Secret: {}", graph.client_secret.expose_secret());
        println!("  Token URL: {}", graph.token_url);
        println!("  Scopes: {}", graph.scopes.join(", "));
        println!("  Timeout: {}s", graph.timeout_secs);
        if let Some(rpm) = graph.requests_per_minute {
            println!("  Rate limit: {}/min", rpm);
        }
        println!("Logging:");
        println!("  Level: {}", display_config.logging.level);
        println!("  JSON: {}", display_config.logging.json_format);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_args(argv: &[&str]) -> RunArgs {
        let mut full = vec!["tenant-guard", "run"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            Commands::Run(args) => args,
            _ => panic!("Expected run command"),
        }
    }

    #[test]
    fn test_run_flags_build_settings() {
        let args = run_args(&[
            "--tenant",
            "contoso.onmicrosoft.com",
            "--mode",
            "allowList",
            "--domains",
            "a.com,b.com",
            "--remediate",
            "--report",
            "--standard-id",
            "std-1",
        ]);
        assert_eq!(args.standard, "SharingDomainRestriction");

        let settings = build_settings(&args).unwrap();
        assert!(settings.remediate);
        assert!(!settings.alert);
        assert!(settings.report);
        assert_eq!(settings.standard_id.as_deref(), Some("std-1"));
        assert_eq!(settings.get_string("Mode").unwrap().as_deref(), Some("allowList"));
        assert_eq!(settings.get_string("Domains").unwrap().as_deref(), Some("a.com,b.com"));
    }

    #[test]
    fn test_settings_conflicts_with_mode() {
        let result = Cli::try_parse_from([
            "tenant-guard",
            "run",
            "--tenant",
            "contoso.onmicrosoft.com",
            "--settings",
            "settings.json",
            "--mode",
            "none",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_output_format_parse() {
        assert!(matches!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json)));
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[tokio::test]
    async fn test_mock_run_collaborators() {
        let alerts = Arc::new(MemoryAlertSink::new());
        let reports = Arc::new(MemoryComplianceStore::new());
        let mock = Arc::new(MockGraphConnector::with_settings(
            "mock",
            SharePointSettings::default(),
        ));
        let settings = build_settings(&run_args(&[
            "--tenant",
            "contoso.onmicrosoft.com",
            "--mode",
            "blockList",
            "--domains",
            "evil.com",
            "--alert",
            "--report",
        ]))
        .unwrap();

        let context = StandardContext::new(
            "contoso.onmicrosoft.com",
            settings,
            collaborators(mock.clone(), mock, alerts.clone(), reports.clone()),
        );
        let result = StandardRegistry::with_defaults()
            .run("SharingDomainRestriction", &context)
            .await
            .unwrap();

        assert_eq!(result.outcome.compliant(), Some(false));
        assert_eq!(alerts.alerts().len(), 1);
        assert_eq!(reports.fields().len(), 2);
    }
}
