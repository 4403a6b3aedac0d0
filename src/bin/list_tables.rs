//! List the table structures, data tables and decrement tables of a model

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use slope_orchestrator::config::{ApiSettings, DEFAULT_BASE_URL};
use slope_orchestrator::{ApiClient, HttpTransport};

#[derive(Debug, Parser)]
#[command(name = "list_tables", about = "List table structures, data tables and decrement tables for a model")]
struct Args {
    /// Model id
    model_id: i64,

    #[arg(long, env = "SLOPE_API_KEY", hide_env_values = true)]
    api_key: String,

    #[arg(long, env = "SLOPE_API_SECRET", hide_env_values = true)]
    api_secret: String,

    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let settings = ApiSettings {
        base_url: args.base_url,
        ..ApiSettings::default()
    };
    let transport = HttpTransport::from_settings(&settings).context("building HTTP client")?;
    let mut client = ApiClient::new(transport);

    let authorized = client.authorize(&args.api_key, &args.api_secret).await;
    if !authorized.is_success() {
        return Err(anyhow!("authorization failed: {}", authorized.envelope()));
    }

    let structures = client.list_table_structures(args.model_id).await;
    println!("Table structures ({}):", structures.len());
    for structure in &structures {
        let name = structure.name.as_deref().unwrap_or("<unnamed>");
        match &structure.description {
            Some(description) => println!("  {:>8}  {}  ({})", structure.id, name, description),
            None => println!("  {:>8}  {}", structure.id, name),
        }
    }
    println!();

    let tables = client.list_data_tables(args.model_id).await;
    println!("Data tables ({}):", tables.len());
    for table in &tables {
        println!("  {:>8}  {}", table.id, table.name.as_deref().unwrap_or("<unnamed>"));
    }
    println!();

    let decrements = client.list_decrement_tables(args.model_id).await;
    println!("Decrement tables ({}):", decrements.len());
    for table in &decrements {
        println!("  {:>8}  {}", table.id, table.name.as_deref().unwrap_or("<unnamed>"));
    }

    Ok(())
}
