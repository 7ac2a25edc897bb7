//! External place-search collaborator.

use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

pub const GOOGLE_NEARBY_SEARCH: &str =
    "https://maps.googleapis.com/maps/api/place/nearbysearch/json";

#[derive(Debug, Error)]
pub enum PlaceSearchError {
    #[error("place search request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("place search unavailable: {0}")]
    Unavailable(String),
}

/// Looks up points of interest around a position.
///
/// Latitude and longitude are passed as the signed decimal text the client
/// reported. The returned object is the upstream payload, untouched.
pub trait PlaceSearch: Send + Sync + 'static {
    fn nearby(
        &self,
        latitude: &str,
        longitude: &str,
        radius_meters: u64,
    ) -> impl Future<Output = Result<Value, PlaceSearchError>> + Send;
}

/// Google Places nearby search over HTTPS.
#[derive(Debug, Clone)]
pub struct GooglePlaces {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GooglePlaces {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }
}

impl PlaceSearch for GooglePlaces {
    fn nearby(
        &self,
        latitude: &str,
        longitude: &str,
        radius_meters: u64,
    ) -> impl Future<Output = Result<Value, PlaceSearchError>> + Send {
        let request = self.client.get(self.endpoint.as_str()).query(&[
            ("location", format!("{},{}", latitude, longitude)),
            ("radius", radius_meters.to_string()),
            ("key", self.api_key.clone()),
        ]);
        async move {
            let response = request.send().await?.error_for_status()?;
            Ok(response.json::<Value>().await?)
        }
    }
}
