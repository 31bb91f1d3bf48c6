/// Settings for an [`Evaluator`](crate::Evaluator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalConfig {
    /// Drop intermediate buffers as soon as their last consumer has run.
    pub release_intermediates: bool,
    /// Verify every produced buffer against the node's declared element type
    /// and partial shape.
    pub check_output_types: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            release_intermediates: true,
            check_output_types: true,
        }
    }
}

impl EvalConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep or release intermediates.
    pub fn with_release_intermediates(mut self, enable: bool) -> Self {
        self.release_intermediates = enable;
        self
    }

    /// Enable or disable output verification.
    pub fn with_output_checks(mut self, enable: bool) -> Self {
        self.check_output_types = enable;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = EvalConfig::new();
        assert!(cfg.release_intermediates);
        assert!(cfg.check_output_types);
    }

    #[test]
    fn test_builder() {
        let cfg = EvalConfig::new()
            .with_release_intermediates(false)
            .with_output_checks(false);
        assert!(!cfg.release_intermediates);
        assert!(!cfg.check_output_types);
    }
}
