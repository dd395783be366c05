use serde::Serialize;

use crate::error::CoreError;

/// Lifecycle state of one product.
///
/// `Provisioning` and `Stopping` are transitional: background work owns
/// the product until it moves on to `Ready` or `Error`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProductState {
    Idle,
    Provisioning,
    Ready,
    Capturing,
    Stopping,
    Error,
}

impl ProductState {
    pub fn is_transitional(self) -> bool {
        matches!(self, Self::Provisioning | Self::Stopping)
    }

    /// Fail with `InvalidState` unless the state is one of `allowed`.
    pub(crate) fn require(
        self,
        allowed: &[Self],
        product: &str,
        operation: &str,
    ) -> Result<(), CoreError> {
        if allowed.contains(&self) {
            Ok(())
        } else {
            Err(CoreError::InvalidState {
                product: product.to_string(),
                operation: operation.to_string(),
                state: self.to_string(),
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn display_is_lowercase() {
        assert_eq!(ProductState::Idle.to_string(), "idle");
        assert_eq!(ProductState::Capturing.to_string(), "capturing");
        assert_eq!("ready".parse::<ProductState>().ok(), Some(ProductState::Ready));
    }

    #[test]
    fn transitional_states() {
        assert!(ProductState::Provisioning.is_transitional());
        assert!(ProductState::Stopping.is_transitional());
        assert!(!ProductState::Ready.is_transitional());
    }

    #[test]
    fn require_reports_current_state() {
        let err = ProductState::Stopping
            .require(&[ProductState::Ready], "p", "capture-start")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot capture-start while product 'p' is in state 'stopping'"
        );
    }
}
