//! Public alert broadcast (`POST /send-alert`).
//!
//! The backend relays the message to subscribed recipients and answers
//! `{ success, message?, error? }`. A service that cannot be reached is
//! reported separately from one that answered and refused.

use outbreak_watch_surveillance_models::{SendAlertRequest, SendAlertResponse};
use thiserror::Error;

use crate::{ApiEndpoints, FetchError, Fetcher, Resource};

/// Shown when the backend answers without any usable explanation.
const UNKNOWN_FAILURE: &str = "Unknown error occurred";

/// Shown on success when the backend sends no message of its own.
const DEFAULT_SENT_MESSAGE: &str = "Alert sent successfully";

/// Why an alert was not sent.
#[derive(Debug, Clone, Error)]
pub enum SendAlertError {
    /// Nothing to send.
    #[error("Message is required")]
    EmptyMessage,

    /// The alert service could not be reached at all.
    #[error("Could not connect to alert service. Please check if backend is running.")]
    Unreachable {
        /// The transport failure.
        #[source]
        source: FetchError,
    },

    /// The service answered but did not send the alert.
    #[error("Failed to send alert: {reason}")]
    Rejected {
        /// HTTP status of the reply.
        status: u16,
        /// Explanation from the service.
        reason: String,
    },
}

/// Posts `message` to the alert service.
///
/// Returns the service's confirmation message on success.
///
/// # Errors
///
/// * [`SendAlertError::EmptyMessage`] if `message` is blank (no request
///   is sent).
/// * [`SendAlertError::Unreachable`] if no response was received.
/// * [`SendAlertError::Rejected`] if the service replied with a failure
///   status, `success: false`, or a body that is not JSON.
pub async fn send_alert(
    fetcher: &dyn Fetcher,
    endpoints: &ApiEndpoints,
    message: &str,
) -> Result<String, SendAlertError> {
    if message.trim().is_empty() {
        return Err(SendAlertError::EmptyMessage);
    }

    let url = endpoints
        .url(Resource::SendAlert, None)
        .map_err(|source| SendAlertError::Unreachable { source })?;

    let body = serde_json::to_value(SendAlertRequest {
        message: message.to_string(),
    })
    .map_err(|e| SendAlertError::Rejected {
        status: 0,
        reason: e.to_string(),
    })?;

    log::info!("Sending alert ({} chars)", message.chars().count());

    let reply = fetcher.post_json(&url, &body).await.map_err(|source| {
        log::error!("Alert service unreachable: {source}");
        SendAlertError::Unreachable { source }
    })?;

    interpret_reply(reply.status, reply.is_success(), &reply.body)
}

fn interpret_reply(status: u16, ok: bool, body: &str) -> Result<String, SendAlertError> {
    let Ok(parsed) = serde_json::from_str::<SendAlertResponse>(body) else {
        log::warn!("Alert service returned a non-JSON body (HTTP {status})");
        return Err(SendAlertError::Rejected {
            status,
            reason: format!("Invalid response from alert service (HTTP {status})"),
        });
    };

    if ok && parsed.success {
        log::info!(
            "Alert sent via {}",
            parsed.method.as_deref().unwrap_or("unknown channel")
        );
        return Ok(parsed
            .message
            .unwrap_or_else(|| DEFAULT_SENT_MESSAGE.to_string()));
    }

    let reason = parsed
        .error
        .or(parsed.message)
        .unwrap_or_else(|| UNKNOWN_FAILURE.to_string());
    log::warn!("Alert rejected (HTTP {status}): {reason}");

    Err(SendAlertError::Rejected { status, reason })
}
