//! Geocoding error types.

/// Errors resolving a single station.
///
/// Never fatal: the station simply stays without a coordinate until a
/// later cycle retries it.
#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider returned an error status
    #[error("geocoder error {status}: {message}")]
    Api { status: u16, message: String },

    /// Rate limited by the provider
    #[error("rate limited by geocoder")]
    RateLimited,

    /// Failed to parse the provider's response
    #[error("JSON parse error: {message}")]
    Json { message: String },

    /// No candidate query produced a result
    #[error("no match for {0:?}")]
    NotFound(String),
}
