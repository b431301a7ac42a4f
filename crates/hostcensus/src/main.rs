//! hostcensus
//!
//! Collects services or scheduled tasks from a fleet of Windows hosts and
//! shows them in a terminal table or saves them as a delimited report

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::Result;
use hostcensus_exec::KeySource;
use hostcensus_inventory::{
    CollectionKind, CollectionRequest, CollectionResult, ExecTransport, InventoryCollector,
    SshExecutorFactory, effective_hosts,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod report;
mod viewer;

use config::Config;

#[derive(Parser, Debug)]
#[command(name = "hostcensus", version, about = "Fleet inventory of services and scheduled tasks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Target hosts (repeatable, comma-delimited)
    #[arg(short = 'c', long = "computers", value_name = "HOST", global = true)]
    computers: Vec<String>,

    /// Read target hosts from a line-delimited file
    #[arg(short, long, value_name = "PATH", global = true)]
    file: Option<PathBuf>,

    /// Write a delimited report instead of opening the viewer
    #[arg(short, long, global = true)]
    save: bool,

    /// Drop items owned by the operating system
    #[arg(long, global = true)]
    skip_defaults: bool,

    /// Config file path
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Hosts processed at once
    #[arg(long, value_name = "N", global = true, value_parser = clap::value_parser!(u64).range(1..))]
    concurrency: Option<u64>,

    /// Report directory
    #[arg(short, long, value_name = "DIR", global = true)]
    output_dir: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Commands {
    /// Installed services
    Services,
    /// Scheduled tasks
    Tasks,
}

impl From<Commands> for CollectionKind {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Services => CollectionKind::Services,
            Commands::Tasks => CollectionKind::ScheduledTasks,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

fn init_logging(verbose: bool, format: LogFormat) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

impl Cli {
    fn request(&self) -> CollectionRequest {
        let mut request =
            CollectionRequest::new(self.command.into()).skip_defaults(self.skip_defaults);

        if !self.computers.is_empty() {
            let hosts: Vec<String> = self
                .computers
                .iter()
                .flat_map(|c| c.split(','))
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(String::from)
                .collect();
            request = request.with_hosts(hosts);
        }
        if let Some(file) = &self.file {
            request = request.with_host_file(file.clone());
        }

        request
    }
}

/// Validate the host sources, then resolve the key and run the collection
///
/// Host sources are checked before the SSH key is touched, so source errors
/// win over key errors and a run with no hosts needs no key at all.
///
/// # Errors
/// Returns error on conflicting or unreadable host sources, or when the SSH
/// key cannot be resolved for a non-empty host list
async fn collect(config: &Config, request: &CollectionRequest) -> Result<CollectionResult> {
    let hosts = effective_hosts(request).await?;
    if hosts.is_empty() {
        info!(kind = %request.kind, "no hosts to collect from");
        return Ok(CollectionResult::empty(request.kind));
    }

    let key_source =
        KeySource::from_settings(config.ssh.key_path.as_deref(), config.ssh.key_env.as_deref());
    let factory = SshExecutorFactory::new(
        config.ssh.user.clone(),
        config.ssh.port,
        config.timeouts.connect(),
        &key_source,
    )?;
    let transport = ExecTransport::new(Arc::new(factory), config.ssh.port)
        .with_shell(config.ssh.shell.clone())
        .with_query_timeout(config.timeouts.query());

    let collector = InventoryCollector::new(Arc::new(transport), config.timeouts.probe())
        .with_concurrency(config.run.concurrency);

    // the file is already read; hand the collector the resulting list
    let request = CollectionRequest::new(request.kind)
        .with_hosts(hosts)
        .skip_defaults(request.skip_defaults);

    Ok(collector.run(&request).await?)
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);

    let mut config = Config::load_default(cli.config.as_deref())?;
    if let Some(n) = cli.concurrency {
        config.run.concurrency = usize::try_from(n)?;
    }
    if let Some(dir) = &cli.output_dir {
        config.run.output_dir.clone_from(dir);
    }
    config.validate()?;

    let result = collect(&config, &cli.request()).await?;

    if cli.save {
        let path = report::write_report(
            &result,
            &config.run.output_dir,
            config.run.delimiter_byte(),
        )?;
        println!("{}", path.display());
    } else {
        viewer::run(&result).await?;
    }

    Ok(())
}
