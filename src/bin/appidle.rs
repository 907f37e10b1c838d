use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use appidle::config::split_list;
use appidle::{AppIdle, ClassificationResult, ReportBuilder, Settings};

#[derive(Parser)]
#[command(
    name = "appidle",
    version,
    about = "Find idle web apps on an Azure App Service Plan"
)]
struct Cli {
    /// Config file path (default: ~/.appidle/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify every web app on an App Service Plan as deallocatable or active
    Scan(ScanArgs),
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
struct ScanArgs {
    /// Plan name, <resourceGroup>/<planName>, or the plan's resource ID
    plan: String,

    /// Resource group holding the plan
    #[arg(short = 'g', long)]
    resource_group: Option<String>,

    /// Subscription ID
    #[arg(long)]
    subscription: Option<String>,

    /// Evaluation window: 30d, 12h, 2w, or <start>/<end> in RFC 3339
    #[arg(long)]
    window: Option<String>,

    /// Aggregation bucket size: 1h, 15m, PT1H, P1D
    #[arg(long)]
    interval: Option<String>,

    /// Metric to request (repeatable or comma-separated)
    #[arg(long = "metric", value_name = "NAME")]
    metrics: Vec<String>,

    /// Aggregation type to request (repeatable or comma-separated)
    #[arg(long = "aggregation", value_name = "TYPE")]
    aggregations: Vec<String>,

    /// Report path (default: output.json)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Maximum metric requests in flight
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    concurrency: Option<u16>,

    /// Also print the full JSON report to stdout
    #[arg(long)]
    print_report: bool,

    /// ARM access token (e.g. from `az account get-access-token`)
    #[arg(long, env = "AZURE_ACCESS_TOKEN", hide_env_values = true)]
    token: String,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value (empty string clears optional keys)
    Set { key: String, value: String },
    /// List all config values
    List,
    /// Show the config file path
    Path,
}

/// Progress reporter that writes to stderr.
struct StderrProgress;

impl appidle::ScanProgress for StderrProgress {
    fn on_resources_listed(&self, grouping_key: &str, count: usize) {
        eprintln!("Found {count} web apps on {grouping_key}");
    }

    fn on_resource_complete(&self, result: &ClassificationResult, index: usize, total: usize) {
        let note = if result.unavailable_reason.is_some() {
            " (metrics unavailable)"
        } else {
            ""
        };
        eprintln!("[{}/{}] {}{note}", index + 1, total, result.resource_name);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Settings::default_path()?,
    };

    match cli.command {
        Commands::Scan(args) => handle_scan(&config_path, args).await?,
        Commands::Config { action } => handle_config(&config_path, action)?,
    }

    Ok(())
}

async fn handle_scan(config_path: &Path, args: ScanArgs) -> anyhow::Result<()> {
    let mut settings = Settings::load(config_path)?;
    settings.apply_env();
    apply_overrides(&mut settings, &args)?;

    let output = settings.output.clone();
    let app = AppIdle::new(settings, &args.token)?;
    let report = app.scan_plan(&args.plan, &StderrProgress).await?;

    for line in report.summary_lines() {
        println!("{line}");
    }

    if let Err(e) = ReportBuilder::write(&report, &output) {
        // Results go to stdout when the file can't be written.
        eprintln!("Failed to write {}: {e}", output.display());
        println!("{}", ReportBuilder::serialize(&report)?);
        return Err(e.into());
    }

    if args.print_report {
        println!("{}", ReportBuilder::serialize(&report)?);
    }

    let unavailable = report.unavailable_count();
    eprintln!(
        "{} of {} web apps can be deallocated. Report written to {}",
        report.idle_count(),
        report.results.len(),
        output.display()
    );
    if unavailable > 0 {
        eprintln!("{unavailable} web apps had no metrics and were treated as active.");
    }
    Ok(())
}

fn apply_overrides(settings: &mut Settings, args: &ScanArgs) -> anyhow::Result<()> {
    if let Some(sub) = &args.subscription {
        settings.set("subscription_id", sub)?;
    }
    if let Some(rg) = &args.resource_group {
        settings.set("resource_group", rg)?;
    }
    if let Some(window) = &args.window {
        settings.window = window.clone();
    }
    if let Some(interval) = &args.interval {
        settings.interval = interval.clone();
    }
    let metrics: Vec<String> = args.metrics.iter().flat_map(|m| split_list(m)).collect();
    if !metrics.is_empty() {
        settings.metric_names = metrics;
    }
    let aggregations: Vec<String> = args.aggregations.iter().flat_map(|a| split_list(a)).collect();
    if !aggregations.is_empty() {
        settings.aggregations = aggregations;
    }
    if let Some(output) = &args.output {
        settings.output = output.clone();
    }
    if let Some(n) = args.concurrency {
        settings.concurrency = n as usize;
    }
    settings.validate()?;
    Ok(())
}

fn handle_config(config_path: &Path, action: ConfigAction) -> anyhow::Result<()> {
    let mut settings = Settings::load(config_path)?;
    match action {
        ConfigAction::Get { key } => match settings.get(&key)? {
            Some(v) => println!("{key} = {v}"),
            None => println!("{key} is not set"),
        },
        ConfigAction::Set { key, value } => {
            settings.set(&key, &value)?;
            settings.save(config_path)?;
            println!("Config updated.");
        }
        ConfigAction::List => {
            for (k, v) in settings.list() {
                println!("{k} = {v}");
            }
        }
        ConfigAction::Path => println!("{}", config_path.display()),
    }
    Ok(())
}
