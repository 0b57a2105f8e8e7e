use testforge_core::ExecutionResult;

/// Decides which harness exit statuses count as a validated run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExitPolicy {
    /// Accept exit status 1 ("ran, but some assertions failed") as well as 0
    pub accept_failed_assertions: bool,
}

impl ExitPolicy {
    pub fn strict() -> Self {
        Self::default()
    }

    pub fn lenient() -> Self {
        Self {
            accept_failed_assertions: true,
        }
    }

    pub fn is_acceptable(&self, exit_code: i32) -> bool {
        exit_code == 0 || (self.accept_failed_assertions && exit_code == 1)
    }

    /// `exit_code` is `None` when the process ended without a status
    /// (killed by a signal).
    pub fn classify(&self, exit_code: Option<i32>, output: String) -> ExecutionResult {
        match exit_code {
            Some(code) if self.is_acceptable(code) => ExecutionResult::Success { exit_code: code },
            _ => ExecutionResult::FailureRetryable { exit_code, output },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_policy() {
        let policy = ExitPolicy::strict();
        assert!(policy.is_acceptable(0));
        assert!(!policy.is_acceptable(1));
        assert!(!policy.is_acceptable(2));
    }

    #[test]
    fn test_lenient_policy() {
        let policy = ExitPolicy::lenient();
        assert!(policy.is_acceptable(0));
        assert!(policy.is_acceptable(1));
        assert!(!policy.is_acceptable(5));
    }

    #[test]
    fn test_classify() {
        let policy = ExitPolicy::strict();
        assert_eq!(
            policy.classify(Some(0), String::new()),
            ExecutionResult::Success { exit_code: 0 }
        );
        assert_eq!(
            policy.classify(None, "killed".into()),
            ExecutionResult::FailureRetryable {
                exit_code: None,
                output: "killed".into()
            }
        );
        assert!(!policy.classify(Some(1), String::new()).is_success());
    }
}
