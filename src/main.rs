mod config;
mod dataset;
mod report;
mod router;
mod tools;

use anyhow::Result;
use config::Config;
use dataset::Dataset;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tools::{Tool, YteInfoTool, YteTool};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Load configuration
    let config = Config::load_or_default("config.toml")?;

    // Initialize logging, RUST_LOG wins over the configured level
    let filters = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone());
    pretty_env_logger::formatted_builder()
        .parse_filters(&filters)
        .init();
    log::info!("Starting yte tool...");

    // Load the dataset once; it is read-only from here on
    let dataset = Arc::new(Dataset::load(
        &config.dataset.path,
        config.dataset.reference_year,
    ));

    let yte = YteTool::new(dataset.clone());
    let info = YteInfoTool::new(dataset);

    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() {
        let answer = yte.run(args.join(" ")).await?;
        println!("{}", answer);
        return Ok(());
    }

    println!("{}", info.run(()).await?);
    println!("\n{}", "=".repeat(50));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        println!("{}\n", yte.run(query.to_string()).await?);
    }

    log::info!("yte tool stopped");
    Ok(())
}
