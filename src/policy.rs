use crate::core::{AutosaveError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing and retry knobs of the autosave pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosavePolicy {
    /// Quiet period after the last keystroke before a debounced stage fires.
    pub debounce_ms: u64,
    /// Upper bound on how long continuous typing can postpone a stage.
    pub max_wait_ms: u64,
    /// Time `saved` stays visible before returning to `idle`.
    pub saved_revert_ms: u64,
    /// Time `error` stays visible before returning to `idle`.
    pub error_revert_ms: u64,
    /// Total remote attempts per commit (first try included).
    pub max_commit_attempts: u32,
}

impl Default for AutosavePolicy {
    fn default() -> Self {
        Self {
            debounce_ms: 600,
            max_wait_ms: 2_000,
            saved_revert_ms: 1_200,
            error_revert_ms: 3_000,
            max_commit_attempts: 2,
        }
    }
}

impl AutosavePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a policy from JSON; missing keys fall back to defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let policy: Self = serde_json::from_str(json)?;
        policy.validate()?;
        Ok(policy.normalized())
    }

    /// Set the debounce window
    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    /// Set the max-wait ceiling
    pub fn max_wait_ms(mut self, ms: u64) -> Self {
        self.max_wait_ms = ms;
        self
    }

    /// Set how long `saved` stays visible
    pub fn saved_revert_ms(mut self, ms: u64) -> Self {
        self.saved_revert_ms = ms;
        self
    }

    /// Set how long `error` stays visible
    pub fn error_revert_ms(mut self, ms: u64) -> Self {
        self.error_revert_ms = ms;
        self
    }

    /// Set total commit attempts
    pub fn max_commit_attempts(mut self, attempts: u32) -> Self {
        self.max_commit_attempts = attempts;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_commit_attempts == 0 {
            return Err(AutosaveError::InvalidPolicy(
                "max_commit_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Clamps zero durations to 1ms and the max-wait ceiling to at least the
    /// debounce window.
    pub fn normalized(&self) -> Self {
        let debounce_ms = self.debounce_ms.max(1);
        Self {
            debounce_ms,
            max_wait_ms: self.max_wait_ms.max(debounce_ms),
            saved_revert_ms: self.saved_revert_ms.max(1),
            error_revert_ms: self.error_revert_ms.max(1),
            max_commit_attempts: self.max_commit_attempts.max(1),
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    pub fn saved_revert(&self) -> Duration {
        Duration::from_millis(self.saved_revert_ms)
    }

    pub fn error_revert(&self) -> Duration {
        Duration::from_millis(self.error_revert_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_inspector_timings() {
        let policy = AutosavePolicy::default();
        assert_eq!(policy.debounce(), Duration::from_millis(600));
        assert_eq!(policy.max_wait(), Duration::from_millis(2_000));
        assert_eq!(policy.saved_revert(), Duration::from_millis(1_200));
        assert_eq!(policy.error_revert(), Duration::from_millis(3_000));
        assert_eq!(policy.max_commit_attempts, 2);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let policy = AutosavePolicy::from_json_str(r#"{ "debounce_ms": 250 }"#).unwrap();
        assert_eq!(policy.debounce_ms, 250);
        assert_eq!(policy.max_wait_ms, 2_000);
    }

    #[test]
    fn zero_attempts_are_rejected() {
        let err = AutosavePolicy::from_json_str(r#"{ "max_commit_attempts": 0 }"#).unwrap_err();
        assert!(matches!(err, AutosaveError::InvalidPolicy(_)));
    }

    #[test]
    fn malformed_json_is_a_serialization_error() {
        let err = AutosavePolicy::from_json_str("{ nope").unwrap_err();
        assert!(matches!(err, AutosaveError::Serialization(_)));
    }

    #[test]
    fn normalization_lifts_max_wait_to_debounce() {
        let policy = AutosavePolicy::new()
            .debounce_ms(0)
            .max_wait_ms(0)
            .saved_revert_ms(0)
            .normalized();
        assert_eq!(policy.debounce_ms, 1);
        assert_eq!(policy.max_wait_ms, 1);
        assert_eq!(policy.saved_revert_ms, 1);

        let policy = AutosavePolicy::new().debounce_ms(900).max_wait_ms(300).normalized();
        assert_eq!(policy.max_wait_ms, 900);
    }
}
