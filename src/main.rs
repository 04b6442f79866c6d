use querypilot::ai::build_generator;
use querypilot::client::Session;
use querypilot::models::config::AppConfig;
use querypilot::DbManager;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = AppConfig::from_env()?;

    let db_manager = Arc::new(DbManager::new());
    db_manager.connect(&config.connection).await?;

    let generator = build_generator(&config.ai);
    let mut session = Session::new(Arc::clone(&db_manager), generator);
    session.run(config.initial_table).await?;

    db_manager.disconnect().await;
    Ok(())
}
