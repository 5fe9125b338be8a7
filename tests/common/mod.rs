use async_trait::async_trait;
use profile_qr::{
    config::Config,
    domain::profile::{BorrowerProfile, ProfileError, ProfileService},
    server::Server,
    telemetry,
};

#[derive(Clone)]
pub struct MockProfiles;

#[async_trait]
impl ProfileService for MockProfiles {
    async fn fetch_profile(&self, id: &str) -> Result<BorrowerProfile, ProfileError> {
        match id {
            "u1" => Ok(BorrowerProfile {
                id: "u1".to_string(),
                display_name: "Amina Perera".to_string(),
                phone: "0771234567".to_string(),
            }),
            "down" => Err(ProfileError::Upstream("connection refused".to_string())),
            _ => Err(ProfileError::NotFound(id.to_string())),
        }
    }
}

// Helper function to spawn a test server on a random port
#[allow(dead_code)]
pub async fn spawn_server() -> String {
    spawn_server_with(false).await
}

pub async fn spawn_server_with(dev_tools: bool) -> String {
    telemetry::init_tracing();

    let config = {
        let mut config = Config::load().unwrap();
        config.server.host = "localhost".to_string();
        // Use a random OS port
        config.server.port = 0;
        config.dev_tools = dev_tools;
        config
    };

    let server = Server::new(MockProfiles, &config).await.unwrap();

    let port = server.port();
    tokio::spawn(server.run());

    format!("http://{}:{}", config.server.host, port)
}
