use profile_qr::{adapters::HttpProfileService, config::Config, server::Server, telemetry};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    // Load configuration
    let config = Config::load()?;
    tracing::info!("Loaded configuration: {:?}", config);

    let profiles = HttpProfileService::new(&config.profile_api)?;

    let server = Server::new(profiles, &config).await?;
    server.run().await
}
