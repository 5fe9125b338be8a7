use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::ProfileApiConfig;
use crate::domain::profile::{BorrowerProfile, ProfileError, ProfileService, RawProfileRecord};

impl From<reqwest::Error> for ProfileError {
    fn from(err: reqwest::Error) -> Self {
        ProfileError::Upstream(err.to_string())
    }
}

/// [`ProfileService`] backed by the loan-management REST API.
#[derive(Debug, Clone)]
pub struct HttpProfileService {
    client: Client,
    base_url: String,
    token: Option<SecretString>,
}

impl HttpProfileService {
    /// Returns an error if the HTTP client cannot be initialized
    pub fn new(config: &ProfileApiConfig) -> Result<Self, ProfileError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    /// GETs `resource` relative to the base URL and returns the JSON body.
    pub async fn fetch_json(&self, resource: &str) -> Result<Value, ProfileError> {
        let url = format!("{}/{}", self.base_url, resource.trim_start_matches('/'));
        debug!("Fetching {url}");

        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await?;
        match response.status() {
            status if status.is_success() => Ok(response.json().await?),
            StatusCode::NOT_FOUND => Err(ProfileError::NotFound(resource.to_string())),
            status => Err(ProfileError::Upstream(format!(
                "HTTP error {status} while fetching {resource}"
            ))),
        }
    }
}

#[async_trait]
impl ProfileService for HttpProfileService {
    #[instrument(skip(self))]
    async fn fetch_profile(&self, id: &str) -> Result<BorrowerProfile, ProfileError> {
        let resource = format!("profiles/{}", urlencoding::encode(id));
        let body = self.fetch_json(&resource).await.map_err(|e| match e {
            ProfileError::NotFound(_) => ProfileError::NotFound(id.to_string()),
            other => other,
        })?;
        BorrowerProfile::try_from(RawProfileRecord::from_value(body)?)
    }
}
