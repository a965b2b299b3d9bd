//! # access-rules
//!
//! Allow/deny rules for incoming requests. Each rule is parsed from loosely
//! written text facets (action, users, roles, verb, IP patterns, priority)
//! and a [`RuleCollection`] evaluates them in priority order, first match
//! wins. When no rule applies the answer is [`Verdict::NoOpinion`] and the
//! caller picks its own default.
//!
//! ## Quick start
//!
//! ```rust
//! use access_rules::{Rule, RuleCollection, StaticPrincipal, Verdict};
//!
//! let mut rules = RuleCollection::new();
//! rules.add(Rule::new("allow", "alice", "", "get", "192.168.*", "1").unwrap());
//! rules.add(Rule::new("deny", "*", "", "", "", "2").unwrap());
//!
//! let alice = StaticPrincipal::user("Alice");
//! assert_eq!(rules.evaluate(&alice, "GET", "192.168.1.5"), Verdict::Allow);
//! assert_eq!(rules.evaluate(&alice, "POST", "192.168.1.5"), Verdict::Deny);
//! ```

mod collection;
mod error;
pub mod loader;
pub mod matcher;
mod principal;
mod rule;
mod schema;
mod shared;
mod verdict;

// Re-export primary public API at crate root.
pub use collection::RuleCollection;
pub use error::{RuleError, RuleResult};
pub use principal::{Principal, StaticPrincipal};
pub use rule::{Action, Rule, Verb};
pub use schema::{DefaultAction, PriorityText, RuleSpec, RulesFile};
pub use shared::SharedRules;
pub use verdict::{Decision, Verdict};
