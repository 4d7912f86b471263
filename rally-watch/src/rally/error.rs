//! Rally API error types.

/// Errors that abort a route fetch.
///
/// Any of these leaves the previously stored snapshot untouched; the next
/// scheduled cycle simply tries again.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error status code
    #[error("API error {status} for {url}: {message}")]
    Api {
        status: u16,
        url: String,
        message: String,
    },

    /// Rate limited by the API
    #[error("rate limited by rally API")]
    RateLimited,

    /// Response body was not valid JSON
    #[error("JSON parse error for {url}: {message}")]
    Json {
        url: String,
        message: String,
        body: Option<String>,
    },

    /// Response was JSON but not the expected shape
    #[error("unexpected response for {url}: {message}")]
    Shape { url: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = FetchError::Api {
            status: 503,
            url: "https://example.com/stations".into(),
            message: "Service Unavailable".into(),
        };
        assert_eq!(
            err.to_string(),
            "API error 503 for https://example.com/stations: Service Unavailable"
        );

        let err = FetchError::Shape {
            url: "https://example.com/stations".into(),
            message: "expected array".into(),
        };
        assert!(err.to_string().contains("expected array"));
    }
}
