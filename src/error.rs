use thiserror::Error;

/// Errors raised while evaluating or trading an instrument
///
/// Everything except [`BotError::Configuration`] is recoverable: the scheduler
/// logs it, skips the instrument for the rest of the cycle and retries on the
/// next tick.
#[derive(Debug, Error)]
pub enum BotError {
    /// The gateway call did not complete (transport failure, 429, 5xx)
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// The response arrived but could not be parsed into the expected record
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Sized quantity is below the instrument's minimum increment
    #[error("insufficient quantity for {symbol}: raw {raw} < step {step}")]
    InsufficientQuantity {
        symbol: String,
        raw: String,
        step: String,
    },

    /// The exchange declined the order
    #[error("order rejected (code {code}): {message}")]
    OrderRejected { code: i64, message: String },

    /// Missing credentials or invalid parameters at startup
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Candle appended with an open time not after the last one
    #[error("out-of-order candle for {symbol}: {open_time} <= {last_open_time}")]
    OutOfOrderCandle {
        symbol: String,
        open_time: i64,
        last_open_time: i64,
    },
}

impl BotError {
    /// Only configuration errors abort the process
    pub fn is_fatal(&self) -> bool {
        matches!(self, BotError::Configuration(_))
    }

    /// Whether the failure is a network-class error the next cycle retries
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BotError::TransientNetwork(_) | BotError::MalformedResponse(_)
        )
    }
}

impl From<reqwest::Error> for BotError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BotError::MalformedResponse(err.to_string())
        } else {
            BotError::TransientNetwork(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BotError {
    fn from(err: serde_json::Error) -> Self {
        BotError::MalformedResponse(err.to_string())
    }
}

impl From<config::ConfigError> for BotError {
    fn from(err: config::ConfigError) -> Self {
        BotError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_configuration_is_fatal() {
        assert!(BotError::Configuration("missing key".into()).is_fatal());
        assert!(!BotError::TransientNetwork("timeout".into()).is_fatal());
        assert!(!BotError::OrderRejected {
            code: -2019,
            message: "Margin is insufficient.".into()
        }
        .is_fatal());
    }

    #[test]
    fn test_malformed_is_treated_as_transient() {
        assert!(BotError::MalformedResponse("bad json".into()).is_transient());
        assert!(!BotError::InsufficientQuantity {
            symbol: "XRPUSDT".into(),
            raw: "0.05".into(),
            step: "0.1".into(),
        }
        .is_transient());
    }

    #[test]
    fn test_json_error_maps_to_malformed() {
        let err: BotError = serde_json::from_str::<Vec<u8>>("{").unwrap_err().into();
        assert!(matches!(err, BotError::MalformedResponse(_)));
    }
}
