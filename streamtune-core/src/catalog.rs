use crate::{config::PlayerConfig, error::CatalogError, track::Track};

/// Fetches the track list from the catalog endpoint
#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: reqwest::Client,
    url: String,
}

impl CatalogClient {
    pub fn new(client: reqwest::Client, config: &PlayerConfig) -> Self {
        Self {
            client,
            url: config.catalog_url.clone(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn fetch_tracks(&self) -> Result<Vec<Track>, CatalogError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CatalogError::Http {
                status: response.status().as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;
        let tracks: Vec<Track> =
            serde_json::from_slice(&body).map_err(|e| CatalogError::Payload(e.to_string()))?;

        log::info!("Fetched {} tracks from {}", tracks.len(), self.url);
        Ok(tracks)
    }
}
