pub mod auth;

use aws_sdk_dynamodb::Client as DynamoClient;
use lambda_http::Error;
use std::env;

/// Process-scoped handles shared by every request handler.
pub struct AppState {
    pub dynamo_client: DynamoClient,
    pub verifier: auth::TokenVerifier,
    pub table_name: String,
    /// Identity provider browser-SDK config, rendered into the login and
    /// register pages as-is.
    pub identity_web_config: String,
}

impl AppState {
    /// Initialize clients once at startup. The token verifier caches the
    /// identity provider's public keys, so per-request verification never
    /// leaves the process.
    pub async fn from_env() -> Result<Self, Error> {
        let config = aws_config::load_from_env().await;
        let dynamo_client = DynamoClient::new(&config);

        let table_name = env::var("TABLE_NAME").unwrap_or_else(|_| "taskboard".to_string());
        let jwks_url = env::var("IDENTITY_JWKS_URL").map_err(|_| "IDENTITY_JWKS_URL must be set")?;
        let issuer = env::var("IDENTITY_ISSUER").ok();
        let identity_web_config =
            env::var("IDENTITY_WEB_CONFIG").unwrap_or_else(|_| "{}".to_string());

        let jwks = reqwest::get(&jwks_url)
            .await
            .map_err(|e| format!("JWKS fetch error: {}", e))?
            .text()
            .await
            .map_err(|e| format!("JWKS fetch error: {}", e))?;
        let verifier = auth::TokenVerifier::from_jwks(&jwks, issuer)?;

        tracing::info!("App state initialized - table: {}", table_name);

        Ok(Self {
            dynamo_client,
            verifier,
            table_name,
            identity_web_config,
        })
    }
}
