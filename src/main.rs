use anyhow::Result;
use clap::Parser;

use comptoir::bootstrap::Launcher;
use comptoir::config::AppConfig;
use comptoir::infrastructure::logger;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    logger::init();

    let config = AppConfig::parse();
    config.validate()?;

    Launcher::new(config).launch().await
}
