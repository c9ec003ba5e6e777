//! # Order Error Types Module
//!
//! Error types surfaced by the ordering flow. Every variant is recovered at
//! the turn boundary: it is turned into a user-facing message and the
//! conversation state is held.

/// Custom error types for ordering operations
#[derive(Debug, Clone, PartialEq)]
pub enum OrderError {
    /// Network or backend failure, including rejected credentials
    GatewayUnavailable(String),
    /// Missing product, cart, entry or fulfillment location
    NotFound(String),
    /// Input the flow cannot accept (e-mail, address, delivery range)
    ValidationFailed(String),
    /// Precheckout payload does not match the issued invoice
    PaymentMismatch,
    /// No session data where the flow expected some
    SessionAbsent(String),
    /// The transition table failed its construction checks
    InvalidTransitionTable(String),
}

/// Result alias used by gateways and the state machine
pub type OrderResult<T> = Result<T, OrderError>;

impl OrderError {
    /// Localization key of the message shown to the user
    pub fn message_key(&self) -> &'static str {
        match self {
            OrderError::GatewayUnavailable(_) => "error-gateway",
            OrderError::NotFound(_) => "error-not-found",
            OrderError::ValidationFailed(_) => "error-validation",
            OrderError::PaymentMismatch => "error-payment-mismatch",
            OrderError::SessionAbsent(_) => "error-session",
            OrderError::InvalidTransitionTable(_) => "error-gateway",
        }
    }
}

impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderError::GatewayUnavailable(msg) => write!(f, "Gateway unavailable: {msg}"),
            OrderError::NotFound(msg) => write!(f, "Not found: {msg}"),
            OrderError::ValidationFailed(msg) => write!(f, "Validation failed: {msg}"),
            OrderError::PaymentMismatch => write!(f, "Payment payload mismatch"),
            OrderError::SessionAbsent(msg) => write!(f, "Session absent: {msg}"),
            OrderError::InvalidTransitionTable(msg) => {
                write!(f, "Invalid transition table: {msg}")
            }
        }
    }
}

impl std::error::Error for OrderError {}

impl From<reqwest::Error> for OrderError {
    fn from(err: reqwest::Error) -> Self {
        if err.status() == Some(reqwest::StatusCode::NOT_FOUND) {
            OrderError::NotFound(err.to_string())
        } else {
            OrderError::GatewayUnavailable(err.to_string())
        }
    }
}

impl From<sqlx::Error> for OrderError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => OrderError::NotFound("row not found".to_string()),
            other => OrderError::GatewayUnavailable(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for OrderError {
    fn from(err: serde_json::Error) -> Self {
        OrderError::GatewayUnavailable(format!("malformed response: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_formatting() {
        let err = OrderError::GatewayUnavailable("timeout".to_string());
        assert_eq!(err.to_string(), "Gateway unavailable: timeout");
        assert_eq!(OrderError::PaymentMismatch.to_string(), "Payment payload mismatch");
    }

    #[test]
    fn test_every_variant_has_a_message_key() {
        let errors = [
            OrderError::GatewayUnavailable(String::new()),
            OrderError::NotFound(String::new()),
            OrderError::ValidationFailed(String::new()),
            OrderError::PaymentMismatch,
            OrderError::SessionAbsent(String::new()),
            OrderError::InvalidTransitionTable(String::new()),
        ];
        for err in errors {
            assert!(err.message_key().starts_with("error-"));
        }
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: OrderError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, OrderError::NotFound(_)));
    }
}
