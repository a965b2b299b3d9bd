use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of matching a request against one rule or an ordered rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Allow,
    Deny,
    /// No rule applied. Callers pick their own default.
    NoOpinion,
}

impl Verdict {
    pub fn is_allow(self) -> bool {
        self == Verdict::Allow
    }

    pub fn is_deny(self) -> bool {
        self == Verdict::Deny
    }

    /// Replace `NoOpinion` with `default`; any other verdict stands.
    pub fn or(self, default: Verdict) -> Verdict {
        match self {
            Verdict::NoOpinion => default,
            other => other,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Allow => write!(f, "allow"),
            Verdict::Deny => write!(f, "deny"),
            Verdict::NoOpinion => write!(f, "no_opinion"),
        }
    }
}

/// A verdict together with the rule that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub verdict: Verdict,
    /// Position of the matching rule in evaluation order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_index: Option<usize>,
    /// Name of the matching rule, if it has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_name: Option<String>,
}

impl Decision {
    /// A decision where no rule matched.
    pub fn no_opinion() -> Self {
        Self {
            verdict: Verdict::NoOpinion,
            rule_index: None,
            rule_name: None,
        }
    }

    /// Apply the caller's default action if no rule matched.
    pub fn resolve(mut self, default: Verdict) -> Self {
        self.verdict = self.verdict.or(default);
        self
    }

    /// Human-readable explanation for logs and CLI output.
    pub fn reason(&self) -> String {
        match (&self.rule_name, self.rule_index) {
            (Some(name), _) => format!("matched rule '{name}'"),
            (None, Some(idx)) => format!("matched rule #{idx}"),
            (None, None) => "no rule matched".to_string(),
        }
    }
}
