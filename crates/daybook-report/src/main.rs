//! # daybook-report
//!
//! Daily event summary report job.
//!
//! ## Modes
//!
//! - **Run Mode**: one invocation, response JSON on stdout
//! - **Service Mode**: HTTP trigger with health and metrics endpoints
//!
//! ## Usage
//!
//! ```bash
//! # Report on today
//! daybook-report run
//!
//! # Re-run one specific day
//! daybook-report run --date 2024-03-01
//!
//! # Serve POST /invoke
//! daybook-report serve --port 8080
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde_json::{Value, json};

use daybook_core::aws::Credentials;
use daybook_core::{LogFormat, ObjectStoreBackend, StorageBackend, init_logging};
use daybook_notify::{Notifier, SesNotifier};
use daybook_query::{AthenaQueryEngine, QueryEngine};
use daybook_report::metrics::init_metrics;
use daybook_report::server::{local_now, router};
use daybook_report::{ReportConfig, ReportJob, handle};

/// Daily event summary report.
#[derive(Debug, Parser)]
#[command(name = "daybook-report")]
#[command(about = "Queries the daily event log and writes a summary report")]
#[command(version)]
struct Args {
    /// Log output format (`json` or `pretty`).
    #[arg(long, env = "DAYBOOK_LOG_FORMAT", global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a single invocation.
    Run {
        /// Day to report on (YYYY-MM-DD); defaults to today.
        #[arg(long, env = "DAYBOOK_REPORT_DATE")]
        date: Option<NaiveDate>,
    },

    /// Serve invocations over HTTP.
    Serve {
        /// HTTP port.
        #[arg(long, env = "DAYBOOK_PORT", default_value = "8080")]
        port: u16,
    },
}

fn build_job(config: &ReportConfig) -> Result<ReportJob> {
    let credentials = Credentials::from_env().context("loading AWS credentials")?;

    let storage: Arc<dyn StorageBackend> = Arc::new(
        ObjectStoreBackend::from_bucket(&config.report_bucket)
            .context("opening report bucket")?,
    );
    let engine: Arc<dyn QueryEngine> = Arc::new(AthenaQueryEngine::connect(
        &config.region,
        config.athena_endpoint.as_deref(),
        credentials.clone(),
    )?);

    let mut job = ReportJob::new(storage, engine, config.query_target())
        .with_wait_policy(config.wait_policy);

    if let Some(route) = &config.email {
        let notifier: Arc<dyn Notifier> = Arc::new(SesNotifier::connect(
            &config.region,
            config.ses_endpoint.as_deref(),
            credentials,
        )?);
        job = job.with_notifier(notifier, route.clone());
    } else {
        tracing::info!("SES_FROM/SES_TO not set; report emails disabled");
    }

    Ok(job)
}

async fn run_once(job: &ReportJob, date: Option<NaiveDate>) -> Result<bool> {
    let event = date.map_or(Value::Null, |d| {
        json!({"report_date": d.format("%Y-%m-%d").to_string()})
    });
    let response = handle(job, &event, local_now()).await;
    println!("{}", serde_json::to_string(&response)?);
    Ok(response.is_success())
}

async fn serve(job: ReportJob, port: u16) -> Result<()> {
    init_metrics();

    let app = router(Arc::new(job));
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "report service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(LogFormat::from_name(args.log_format.as_deref()));

    let config = ReportConfig::from_env().context("loading configuration")?;
    let job = build_job(&config)?;

    match args.command {
        Commands::Run { date } => {
            if !run_once(&job, date).await? {
                std::process::exit(1);
            }
        }
        Commands::Serve { port } => serve(job, port).await?,
    }

    Ok(())
}
