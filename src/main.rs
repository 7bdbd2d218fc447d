use anyhow::Result;
use std::sync::Arc;
use storyforge::core::config::Config;
use storyforge::core::io::NativeStorage;
use storyforge::services::export::Exporter;
use storyforge::services::generation::{GenerationClient, HttpGenerationClient};
use storyforge::services::wizard::Wizard;
use storyforge::ui::terminal::TerminalFrontend;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            eprintln!("Please check '{}'.", Config::path().display());
            return Err(e);
        }
    };

    config.ensure_directories()?;

    let client: Arc<dyn GenerationClient> = Arc::new(HttpGenerationClient::new(&config.server)?);
    log::info!(
        "Using story server at {} ({:?} requests, {:?} export)",
        config.server.base_url,
        config.server.variant,
        config.export.mode
    );

    let exporter = Exporter::new(&config, client.clone(), Arc::new(NativeStorage::new()));
    let mut wizard = Wizard::new(&config, client, Box::new(TerminalFrontend::new()), exporter);
    wizard.run().await?;

    Ok(())
}
