//! Error types for signal registration and delivery

use std::error::Error;

/// Error raised by a receiver while a signal is being delivered.
///
/// Receivers hand back whatever error they produced; `Signal::send` returns it
/// untouched so callers can downcast to the concrete type.
pub type ReceiverFailure = Box<dyn Error + Send + Sync>;

/// What a receiver returns for a single delivery
pub type Outcome<R = ()> = Result<R, ReceiverFailure>;

/// Registration-time errors, only produced by signals created in debug mode
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignalError {
    /// The receiver has no live callable behind it
    #[error("receiver `{receiver}` is not callable")]
    InvalidReceiver { receiver: String },

    /// A weak receiver without a dispatch_uid must accept the full event
    #[error(
        "receiver `{receiver}` must accept the full event (payload, sender and signal) \
         when connected weakly without a dispatch_uid"
    )]
    InvalidReceiverSignature { receiver: String },
}

/// A receiver panicked during robust delivery
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("receiver `{receiver}` panicked: {message}")]
pub struct ReceiverPanicked {
    pub receiver: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_error_messages() {
        let err = SignalError::InvalidReceiver {
            receiver: "on_save".to_string(),
        };
        assert_eq!(err.to_string(), "receiver `on_save` is not callable");

        let err = SignalError::InvalidReceiverSignature {
            receiver: "on_save".to_string(),
        };
        assert!(err.to_string().contains("dispatch_uid"));
    }

    #[test]
    fn test_receiver_failure_keeps_concrete_type() {
        let failure: ReceiverFailure = Box::new(ReceiverPanicked {
            receiver: "audit".to_string(),
            message: "boom".to_string(),
        });

        let panicked = failure
            .downcast_ref::<ReceiverPanicked>()
            .expect("concrete type should survive boxing");
        assert_eq!(panicked.message, "boom");
        assert_eq!(failure.to_string(), "receiver `audit` panicked: boom");
    }
}
