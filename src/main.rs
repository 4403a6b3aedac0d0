//! Slope Orchestrator CLI
//!
//! Runs one valuation: uploads the month's inputs, runs the projection and saves its reports

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::warn;
use slope_orchestrator::{Credentials, HttpTransport, RunConfig, Workflow};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "slope_orchestrator", version, about = "Run a monthly valuation projection on Slope")]
struct Args {
    /// Run configuration (JSON)
    #[arg(short, long, default_value = "run.json")]
    config: PathBuf,

    #[arg(long, env = "SLOPE_API_KEY", hide_env_values = true)]
    api_key: String,

    #[arg(long, env = "SLOPE_API_SECRET", hide_env_values = true)]
    api_secret: String,

    /// Override the API base URL from the config file
    #[arg(long)]
    base_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = RunConfig::from_path(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(base_url) = args.base_url {
        config.api.base_url = base_url;
    }

    println!("Slope Orchestrator v{}", env!("CARGO_PKG_VERSION"));
    println!("======================\n");
    println!("Model:      {}", config.model_id);
    println!("Template:   {}", config.template_id);
    println!("Valuation:  {}", config.valuation_date);
    println!();

    let transport = HttpTransport::from_settings(&config.api).context("building HTTP client")?;
    let workflow = Workflow::new(transport, config);

    let cancel = workflow.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; stopping after the current request");
            cancel.cancel();
        }
    });

    let credentials = Credentials {
        api_key: args.api_key,
        api_secret: args.api_secret,
    };
    let report = workflow.run(&credentials).await.context("valuation run failed")?;

    println!("Scenario table:   {}", report.scenario_table_id);
    println!("Data table:       {}", report.data_table_id);
    println!("Model-point file: {}", report.model_point_file_id);
    println!("Projection:       {}", report.projection_id);
    println!("Final status:     {}", report.final_status);

    if !report.completed() {
        bail!("projection {} finished with status {}", report.projection_id, report.final_status);
    }

    let mut failed = 0;
    for outcome in &report.reports {
        match &outcome.result {
            Ok(bytes) => println!("  {} report: {} ({} bytes)", outcome.format, outcome.path.display(), bytes),
            Err(message) => {
                failed += 1;
                println!("  {} report: FAILED ({})", outcome.format, message);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} reports were not saved", failed, report.reports.len());
    }
    Ok(())
}
