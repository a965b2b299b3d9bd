use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::collection::RuleCollection;
use crate::error::RuleResult;
use crate::matcher::WILDCARD;
use crate::rule::{Action, Rule, Verb};
use crate::verdict::Verdict;

/// Top-level rules file loaded from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesFile {
    /// Schema version; currently must be "1.0".
    pub version: String,
    /// What callers should do when no rule has an opinion.
    #[serde(default)]
    pub default_action: DefaultAction,
    /// Rules in declaration order. Evaluation order is decided by priority.
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

impl RulesFile {
    /// Describe an existing collection in its compact form.
    pub fn from_collection(collection: &RuleCollection, default_action: DefaultAction) -> Self {
        Self {
            version: "1.0".to_string(),
            default_action,
            rules: collection.iter().map(RuleSpec::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultAction {
    Allow,
    #[default]
    Deny,
}

impl DefaultAction {
    pub fn verdict(self) -> Verdict {
        match self {
            DefaultAction::Allow => Verdict::Allow,
            DefaultAction::Deny => Verdict::Deny,
        }
    }
}

/// A rule as written in configuration: the raw text of each facet.
///
/// Every field is optional. A missing facet takes its default (action
/// `allow`, everything else `*`, no priority). Serializing only writes the
/// facets that differ from those defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "scalar_text"
    )]
    pub name: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "scalar_text"
    )]
    pub action: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "scalar_text"
    )]
    pub users: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "scalar_text"
    )]
    pub roles: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "scalar_text"
    )]
    pub verb: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "scalar_text"
    )]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<PriorityText>,
}

/// Accept a bare YAML scalar (`users: 1001`) wherever facet text is expected.
fn scalar_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Integer(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|scalar| match scalar {
        Scalar::Text(s) => s,
        Scalar::Integer(n) => n.to_string(),
        Scalar::Float(n) => n.to_string(),
        Scalar::Bool(b) => b.to_string(),
    }))
}

/// A priority as found in YAML: a bare number or any string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PriorityText {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<f64> for PriorityText {
    /// Whole numbers are written without a fractional part.
    fn from(value: f64) -> Self {
        if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
            PriorityText::Integer(value as i64)
        } else {
            PriorityText::Float(value)
        }
    }
}

impl fmt::Display for PriorityText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriorityText::Integer(n) => write!(f, "{n}"),
            PriorityText::Float(n) => write!(f, "{n}"),
            PriorityText::Text(s) => f.write_str(s),
        }
    }
}

impl RuleSpec {
    /// Build the [`Rule`] these facets describe.
    pub fn build(&self) -> RuleResult<Rule> {
        let priority = self
            .priority
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        let rule = Rule::new(
            self.action.as_deref().unwrap_or(Action::Allow.as_str()),
            self.users.as_deref().unwrap_or_default(),
            self.roles.as_deref().unwrap_or_default(),
            self.verb.as_deref().unwrap_or_default(),
            self.ip.as_deref().unwrap_or_default(),
            &priority,
        )?;
        Ok(match &self.name {
            Some(name) => rule.named(name.as_str()),
            None => rule,
        })
    }
}

impl From<&Rule> for RuleSpec {
    fn from(rule: &Rule) -> Self {
        Self {
            name: rule.name().map(str::to_string),
            action: (rule.action() != Action::Allow).then(|| rule.action().to_string()),
            users: users_text(rule),
            roles: list_text(rule.roles()),
            verb: (rule.verb() != Verb::Any).then(|| rule.verb().to_string()),
            ip: list_text(rule.ip_rules()),
            priority: rule.priority().map(PriorityText::from),
        }
    }
}

/// The users facet, or `None` when it is the bare wildcard.
///
/// `*` goes last: the parser stops at it, so anything written after it would
/// be lost on the next load.
fn users_text(rule: &Rule) -> Option<String> {
    if rule.everyone() && rule.users().is_empty() {
        return None;
    }
    let mut tokens: Vec<&str> = rule.users().iter().map(String::as_str).collect();
    if rule.everyone() {
        tokens.push(WILDCARD);
    } else {
        if rule.guest_applied() {
            tokens.push("?");
        }
        if rule.authenticated_applied() {
            tokens.push("@");
        }
    }
    Some(tokens.join(","))
}

/// A list facet, or `None` when it is the bare wildcard.
fn list_text(items: &[String]) -> Option<String> {
    match items {
        [only] if only == WILDCARD => None,
        _ => Some(items.join(",")),
    }
}
