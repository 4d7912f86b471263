//! Delivery error types.

/// Errors delivering one message to one user.
///
/// Never fatal to a sync cycle; recorded per recipient.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Messaging API rejected the message
    #[error("delivery rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Failed to render the message body
    #[error("render error: {0}")]
    Render(#[from] askama::Error),

    /// Recipient cannot be addressed by this notifier
    #[error("invalid recipient: {0}")]
    Recipient(String),
}
