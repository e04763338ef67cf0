//! Supabase PostgREST client using the service_role key

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};

/// Server-side client for the `profiles` table.
/// Uses service_role key which bypasses RLS - handle with care!
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_role_key: String,
}

impl SupabaseClient {
    pub fn new(base_url: &str, service_role_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            service_role_key: service_role_key.to_string(),
        }
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, SupabaseError> {
        let response = builder
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
            .header("Content-Type", "application/json")
            .send()
            .await?;
        Ok(response)
    }

    /// Fetch at most one row matching a PostgREST `query`
    pub async fn get_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
    ) -> Result<Option<T>, SupabaseError> {
        let url = format!("{}?{}", self.rest_url(table), query);
        let response = self
            .send(
                self.client
                    .get(&url)
                    .header("Accept", "application/vnd.pgrst.object+json"),
            )
            .await?;

        // Singular responses answer 406 when nothing matched
        if response.status() == StatusCode::NOT_ACCEPTABLE {
            return Ok(None);
        }

        let response = ensure_success(response).await?;
        response.json().await.map(Some).map_err(SupabaseError::Parse)
    }

    /// Insert, or merge into the row that conflicts on `on_conflict`
    pub async fn upsert<T: Serialize>(
        &self,
        table: &str,
        data: &T,
        on_conflict: &str,
    ) -> Result<(), SupabaseError> {
        let url = format!("{}?on_conflict={}", self.rest_url(table), on_conflict);
        let response = self
            .send(
                self.client
                    .post(&url)
                    .header("Prefer", "resolution=merge-duplicates,return=minimal")
                    .json(data),
            )
            .await?;

        ensure_success(response).await.map(|_| ())
    }
}

async fn ensure_success(response: Response) -> Result<Response, SupabaseError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SupabaseError::Api {
        status: status.as_u16(),
        body,
    })
}

/// Supabase errors
#[derive(Debug, thiserror::Error)]
pub enum SupabaseError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rest_urls_ignore_trailing_slashes() {
        let client = SupabaseClient::new("https://project.supabase.co/", "key");
        assert_eq!(
            client.rest_url("profiles"),
            "https://project.supabase.co/rest/v1/profiles"
        );
    }
}
