use std::sync::Arc;

use async_trait::async_trait;
use cloudlift_core::{DiskClient, DiskError, OAuthClient, OAuthError};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::{ConfigError, non_empty};
use crate::remote::disk::DiskRemote;
use crate::remote::{Reauthenticator, RemoteError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("oauth refresh failed: {0}")]
    OAuth(#[from] OAuthError),
    #[error("disk client setup failed: {0}")]
    Disk(#[from] DiskError),
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub api_url: Option<String>,
    pub oauth_url: Option<String>,
    pub storage_root: String,
}

impl SessionConfig {
    pub fn from_env(storage_root: &str) -> Result<Self, ConfigError> {
        Self::from_lookup(storage_root, |name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(storage_root: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            access_token: non_empty(&lookup, "CLOUDLIFT_TOKEN")
                .ok_or(ConfigError::Missing("CLOUDLIFT_TOKEN"))?,
            refresh_token: non_empty(&lookup, "CLOUDLIFT_REFRESH_TOKEN"),
            client_id: non_empty(&lookup, "CLOUDLIFT_CLIENT_ID"),
            client_secret: non_empty(&lookup, "CLOUDLIFT_CLIENT_SECRET"),
            api_url: non_empty(&lookup, "CLOUDLIFT_API_URL"),
            oauth_url: non_empty(&lookup, "CLOUDLIFT_OAUTH_URL"),
            storage_root: storage_root.to_string(),
        })
    }
}

struct StoredCredentials {
    access_token: String,
    refresh_token: Option<String>,
}

/// Builds disk sessions from stored credentials.
///
/// Every reconnect gets a brand-new HTTP client, so no connection or response
/// state carries over from the session that could not see a folder. When a
/// refresh token and OAuth client credentials are configured the access token
/// is refreshed as well.
pub struct TokenReauthenticator {
    credentials: Mutex<StoredCredentials>,
    oauth_client: Option<OAuthClient>,
    api_url: Option<String>,
    storage_root: String,
}

impl TokenReauthenticator {
    pub fn new(config: &SessionConfig) -> Result<Self, SessionError> {
        let oauth_client = match (&config.client_id, &config.client_secret) {
            (Some(id), Some(secret)) => Some(match &config.oauth_url {
                Some(url) => OAuthClient::with_base_url(url, id, secret)?,
                None => OAuthClient::new(id, secret)?,
            }),
            _ => None,
        };
        Ok(Self {
            credentials: Mutex::new(StoredCredentials {
                access_token: config.access_token.clone(),
                refresh_token: config.refresh_token.clone(),
            }),
            oauth_client,
            api_url: config.api_url.clone(),
            storage_root: config.storage_root.clone(),
        })
    }

    pub async fn connect(&self) -> Result<Arc<DiskRemote>, SessionError> {
        let token = self.credentials.lock().await.access_token.clone();
        self.build_remote(&token)
    }

    pub async fn current_access_token(&self) -> String {
        self.credentials.lock().await.access_token.clone()
    }

    async fn fresh_token(&self) -> Result<String, SessionError> {
        let mut credentials = self.credentials.lock().await;
        let (Some(client), Some(refresh_token)) =
            (&self.oauth_client, credentials.refresh_token.clone())
        else {
            debug!("no refresh credentials configured, reusing stored token");
            return Ok(credentials.access_token.clone());
        };
        let token = client.refresh_token(&refresh_token, None).await?;
        credentials.access_token = token.access_token;
        if let Some(next) = token.refresh_token {
            credentials.refresh_token = Some(next);
        }
        info!("access token refreshed for reconnect");
        Ok(credentials.access_token.clone())
    }

    fn build_remote(&self, token: &str) -> Result<Arc<DiskRemote>, SessionError> {
        let client = match &self.api_url {
            Some(url) => DiskClient::with_base_url(url, token)?,
            None => DiskClient::new(token)?,
        };
        Ok(Arc::new(DiskRemote::new(client, self.storage_root.clone())))
    }
}

#[async_trait]
impl Reauthenticator<DiskRemote> for TokenReauthenticator {
    async fn reconnect(&self) -> Result<Arc<DiskRemote>, RemoteError> {
        let token = self
            .fresh_token()
            .await
            .map_err(|err| RemoteError::Unauthorized(err.to_string()))?;
        self.build_remote(&token)
            .map_err(|err| RemoteError::Failed(err.to_string()))
    }
}
