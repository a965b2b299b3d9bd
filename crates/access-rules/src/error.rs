use thiserror::Error;

/// Errors raised while building a [`Rule`](crate::Rule) from its text facets.
///
/// Only the two closed-enum facets can fail. List facets and the priority are
/// parsed permissively and never produce an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("invalid rule action '{0}'; expected 'allow' or 'deny'")]
    InvalidAction(String),

    #[error("invalid rule verb '{0}'; expected '*', 'get' or 'post'")]
    InvalidVerb(String),
}

pub type RuleResult<T> = Result<T, RuleError>;
