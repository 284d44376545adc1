use derive_more::{Display, Error, From};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Display, From, Error)]
pub enum Error {
    Http(reqwest::Error),
    #[from(ignore)]
    #[display(fmt = "Unexpected status from Polar: {}", "_0")]
    UnexpectedStatus(#[error(not(source))] String),
}

/// Caller identity embedded in the checkout so the webhook can find the
/// account to upgrade. Polar passes it back verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutMetadata {
    pub user_id: String,
    pub user_email: String,
    pub user_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[derive(Clone)]
pub struct PolarClient {
    http: reqwest::Client,
    api_url: String,
    access_token: String,
}

impl PolarClient {
    pub fn new(api_url: &str, access_token: &str) -> PolarClient {
        PolarClient {
            http: reqwest::Client::new(),
            api_url: api_url.into(),
            access_token: access_token.into(),
        }
    }

    #[tracing::instrument(
        name = "Creating a checkout session.",
        err,
        level = "info",
        skip(self, metadata),
        fields(request_id = %Uuid::new_v4())
    )]
    pub async fn create_checkout(
        &self,
        product_id: &str,
        success_url: &str,
        metadata: CheckoutMetadata,
    ) -> Result<CheckoutSession, Error> {
        let body = json!({
            "products": [product_id],
            "success_url": success_url,
            "customer_email": metadata.user_email.clone(),
            "metadata": metadata,
        });
        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::UnexpectedStatus(response.status().to_string()));
        }
        Ok(response.json().await?)
    }
}
