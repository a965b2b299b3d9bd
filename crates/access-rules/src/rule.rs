use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{RuleError, RuleResult};
use crate::matcher::{has_inner_wildcard, matches_address, matches_roles, split_tokens, WILDCARD};
use crate::principal::Principal;
use crate::verdict::Verdict;

const GUEST_TOKEN: &str = "?";
const AUTHENTICATED_TOKEN: &str = "@";

/// What a rule does when all of its facets match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    #[default]
    Allow,
    Deny,
}

impl Action {
    /// Parse an action literal, ignoring case and surrounding whitespace.
    pub fn parse(text: &str) -> RuleResult<Self> {
        match text.trim().to_lowercase().as_str() {
            "allow" => Ok(Action::Allow),
            "deny" => Ok(Action::Deny),
            _ => Err(RuleError::InvalidAction(text.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Allow => "allow",
            Action::Deny => "deny",
        }
    }

    pub fn verdict(self) -> Verdict {
        match self {
            Action::Allow => Verdict::Allow,
            Action::Deny => Verdict::Deny,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The HTTP verb a rule is restricted to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Verb {
    #[default]
    Any,
    Get,
    Post,
}

impl Verb {
    /// Parse a verb facet. Blank text means [`Verb::Any`].
    pub fn parse(text: &str) -> RuleResult<Self> {
        match text.trim().to_lowercase().as_str() {
            "" | WILDCARD => Ok(Verb::Any),
            "get" => Ok(Verb::Get),
            "post" => Ok(Verb::Post),
            _ => Err(RuleError::InvalidVerb(text.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Any => WILDCARD,
            Verb::Get => "get",
            Verb::Post => "post",
        }
    }

    /// Case-insensitive comparison against a request verb.
    pub fn matches(self, request_verb: &str) -> bool {
        self == Verb::Any || request_verb.eq_ignore_ascii_case(self.as_str())
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single access rule.
///
/// Built once from its text facets and never changed afterwards. A request
/// gets this rule's verdict only if the verb, address, user and role facets
/// all match (AND); otherwise the rule has no opinion.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    name: Option<String>,
    action: Action,
    users: BTreeSet<String>,
    everyone: bool,
    guest: bool,
    authenticated: bool,
    roles: Vec<String>,
    verb: Verb,
    ip_rules: Vec<String>,
    priority: Option<f64>,
}

impl Rule {
    /// Build a rule from its text facets.
    ///
    /// `users`, `roles` and `ip_rules` are comma-separated lists and may be
    /// blank, which means "anyone". `priority` is any text; if it is not a
    /// finite number the rule has no priority.
    ///
    /// Fails only when `action` or `verb` is not one of the accepted literals.
    pub fn new(
        action: &str,
        users: &str,
        roles: &str,
        verb: &str,
        ip_rules: &str,
        priority: &str,
    ) -> RuleResult<Self> {
        let action = Action::parse(action)?;
        let verb = Verb::parse(verb)?;

        let mut rule = Self {
            name: None,
            action,
            users: BTreeSet::new(),
            everyone: false,
            guest: false,
            authenticated: false,
            roles: parse_list(roles, true),
            verb,
            ip_rules: parse_list(ip_rules, false),
            priority: parse_priority(priority),
        };
        rule.parse_users(users);

        for pattern in &rule.ip_rules {
            if has_inner_wildcard(pattern) {
                warn!(
                    pattern = pattern.as_str(),
                    "IP pattern has text after '*'; only the prefix before it is matched"
                );
            }
        }

        Ok(rule)
    }

    /// Attach a label used in decisions and logs. Blank names are ignored.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        let name = name.trim();
        self.name = (!name.is_empty()).then(|| name.to_string());
        self
    }

    fn parse_users(&mut self, text: &str) {
        let mut saw_token = false;
        for token in split_tokens(text, true) {
            saw_token = true;
            match token.as_str() {
                WILDCARD => {
                    // Tokens after `*` are not looked at.
                    self.everyone = true;
                    break;
                }
                GUEST_TOKEN => self.guest = true,
                AUTHENTICATED_TOKEN => self.authenticated = true,
                _ => {
                    self.users.insert(token);
                }
            }
        }
        if !saw_token {
            self.everyone = true;
        }
    }

    // -- Matching -------------------------------------------------------------

    /// Decide this rule's verdict for one request.
    pub fn evaluate<P: Principal + ?Sized>(
        &self,
        principal: &P,
        verb: &str,
        address: &str,
    ) -> Verdict {
        if self.verb.matches(verb)
            && matches_address(&self.ip_rules, address)
            && self.matches_user(principal)
            && matches_roles(&self.roles, principal)
        {
            self.action.verdict()
        } else {
            Verdict::NoOpinion
        }
    }

    fn matches_user<P: Principal + ?Sized>(&self, principal: &P) -> bool {
        if self.everyone {
            return true;
        }
        let anonymous = principal.is_anonymous();
        (self.guest && anonymous)
            || (self.authenticated && !anonymous)
            || self.users.contains(&principal.name().to_lowercase())
    }

    // -- Accessors ------------------------------------------------------------

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn action(&self) -> Action {
        self.action
    }

    /// Exact-match user names, lowercased.
    pub fn users(&self) -> &BTreeSet<String> {
        &self.users
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn verb(&self) -> Verb {
        self.verb
    }

    pub fn ip_rules(&self) -> &[String] {
        &self.ip_rules
    }

    pub fn priority(&self) -> Option<f64> {
        self.priority
    }

    /// The rule applies to every principal.
    pub fn everyone(&self) -> bool {
        self.everyone
    }

    /// The rule applies to anonymous principals.
    pub fn guest_applied(&self) -> bool {
        self.guest || self.everyone
    }

    /// The rule applies to authenticated principals.
    pub fn authenticated_applied(&self) -> bool {
        self.authenticated || self.everyone
    }
}

/// Parse a list facet; no tokens at all means the wildcard.
fn parse_list(text: &str, fold_case: bool) -> Vec<String> {
    let tokens: Vec<String> = split_tokens(text, fold_case).collect();
    if tokens.is_empty() {
        vec![WILDCARD.to_string()]
    } else {
        tokens
    }
}

fn parse_priority(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    match text.parse::<f64>() {
        Ok(p) if p.is_finite() => Some(p),
        _ => {
            warn!(priority = text, "non-numeric rule priority ignored");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::principal::StaticPrincipal;

    fn rule(action: &str, users: &str, roles: &str, verb: &str, ip: &str) -> Rule {
        Rule::new(action, users, roles, verb, ip, "").expect("rule should build")
    }

    // -- Construction --

    #[test]
    fn action_is_normalized() {
        let a = rule(" Allow ", "", "", "", "");
        let b = rule("ALLOW", "", "", "", "");
        assert_eq!(a.action(), Action::Allow);
        assert_eq!(a.action(), b.action());
        assert_eq!(rule("dEnY", "", "", "", "").action(), Action::Deny);
    }

    #[test]
    fn invalid_action_is_rejected() {
        let err = Rule::new("permit", "", "", "", "", "").unwrap_err();
        assert_eq!(err, RuleError::InvalidAction("permit".into()));
        assert!(Rule::new("", "", "", "", "", "").is_err());
    }

    #[test]
    fn invalid_verb_is_rejected() {
        let err = Rule::new("allow", "", "", "PUT", "", "").unwrap_err();
        assert_eq!(err, RuleError::InvalidVerb("PUT".into()));
    }

    #[test]
    fn blank_facets_default_to_wildcard() {
        let r = rule("allow", "  ", "", " ", ", ,");
        assert!(r.everyone());
        assert!(r.users().is_empty());
        assert_eq!(r.roles(), &["*"]);
        assert_eq!(r.verb(), Verb::Any);
        assert_eq!(r.ip_rules(), &["*"]);
        assert_eq!(r.priority(), None);
        assert_eq!(r.name(), None);
    }

    #[test]
    fn star_stops_user_parsing() {
        let r = rule("allow", "*, bob", "", "", "");
        assert!(r.everyone());
        assert!(!r.users().contains("bob"));

        let r = rule("allow", "*,?,@", "", "", "");
        assert!(r.everyone());
        assert!(!r.guest && !r.authenticated);
        // Derived facets still report true through `everyone`.
        assert!(r.guest_applied() && r.authenticated_applied());
    }

    #[test]
    fn tokens_before_star_are_kept() {
        let r = rule("allow", "Carol, *, bob", "", "", "");
        assert!(r.everyone());
        assert!(r.users().contains("carol"));
        assert!(!r.users().contains("bob"));
    }

    #[test]
    fn guest_and_authenticated_tokens() {
        let r = rule("allow", "?,@", "", "", "");
        assert!(r.guest_applied());
        assert!(r.authenticated_applied());
        assert!(!r.everyone());
        assert!(r.users().is_empty());
    }

    #[test]
    fn list_facets_fold_case_except_ip() {
        let r = rule("allow", "Alice, BOB", "Admin , Ops", "GET", "FE80::*");
        assert_eq!(
            r.users().iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["alice", "bob"]
        );
        assert_eq!(r.roles(), &["admin", "ops"]);
        assert_eq!(r.verb(), Verb::Get);
        assert_eq!(r.ip_rules(), &["FE80::*"]);
    }

    #[test]
    fn priority_is_parsed_permissively() {
        let priority = |text: &str| Rule::new("allow", "", "", "", "", text).unwrap().priority();
        assert_eq!(priority(" 7 "), Some(7.0));
        assert_eq!(priority("-3"), Some(-3.0));
        assert_eq!(priority("1.5"), Some(1.5));
        assert_eq!(priority("3000000000"), Some(3_000_000_000.0));
        assert_eq!(priority("high"), None);
        assert_eq!(priority("NaN"), None);
        assert_eq!(priority("inf"), None);
    }

    #[test]
    fn named_trims_and_ignores_blank() {
        let r = rule("allow", "", "", "", "").named("  staff ");
        assert_eq!(r.name(), Some("staff"));
        let r = r.named("   ");
        assert_eq!(r.name(), None);
    }

    // -- Matching --

    #[test]
    fn verb_match_is_case_insensitive() {
        let r = rule("allow", "", "", "get", "");
        let anyone = StaticPrincipal::anonymous();
        assert_eq!(r.evaluate(&anyone, "GET", "1.2.3.4"), Verdict::Allow);
        assert_eq!(r.evaluate(&anyone, "Get", "1.2.3.4"), Verdict::Allow);
        assert_eq!(r.evaluate(&anyone, "POST", "1.2.3.4"), Verdict::NoOpinion);

        let any_verb = rule("deny", "", "", "*", "");
        assert_eq!(any_verb.evaluate(&anyone, "DELETE", "1.2.3.4"), Verdict::Deny);
    }

    #[test]
    fn ip_prefix_match() {
        let r = rule("allow", "", "", "", "192.168.*");
        let anyone = StaticPrincipal::anonymous();
        assert_eq!(r.evaluate(&anyone, "get", "192.168.1.5"), Verdict::Allow);
        assert_eq!(r.evaluate(&anyone, "get", "10.0.0.1"), Verdict::NoOpinion);
    }

    #[test]
    fn guest_only_matches_anonymous() {
        let r = rule("allow", "?", "", "", "");
        assert_eq!(
            r.evaluate(&StaticPrincipal::anonymous(), "get", "::1"),
            Verdict::Allow
        );
        assert_eq!(
            r.evaluate(&StaticPrincipal::user("alice"), "get", "::1"),
            Verdict::NoOpinion
        );
    }

    #[test]
    fn authenticated_only_matches_signed_in() {
        let r = rule("deny", "@", "", "", "");
        assert_eq!(
            r.evaluate(&StaticPrincipal::user("alice"), "get", "::1"),
            Verdict::Deny
        );
        assert_eq!(
            r.evaluate(&StaticPrincipal::anonymous(), "get", "::1"),
            Verdict::NoOpinion
        );
    }

    #[test]
    fn user_names_compare_case_insensitively() {
        let r = rule("allow", "alice", "", "", "");
        assert_eq!(
            r.evaluate(&StaticPrincipal::user("ALICE"), "get", "::1"),
            Verdict::Allow
        );
        assert_eq!(
            r.evaluate(&StaticPrincipal::user("bob"), "get", "::1"),
            Verdict::NoOpinion
        );
        assert_eq!(
            r.evaluate(&StaticPrincipal::anonymous(), "get", "::1"),
            Verdict::NoOpinion
        );
    }

    #[test]
    fn roles_must_match_one() {
        let r = rule("allow", "@", "admin, ops", "", "");
        let ops = StaticPrincipal::user("carol").with_roles(["Ops"]);
        let dev = StaticPrincipal::user("dave").with_roles(["dev"]);
        assert_eq!(r.evaluate(&ops, "post", "::1"), Verdict::Allow);
        assert_eq!(r.evaluate(&dev, "post", "::1"), Verdict::NoOpinion);
    }

    #[test]
    fn non_ascii_role_matches() {
        let r = rule("allow", "", "Ärzte", "", "");
        assert_eq!(r.roles(), &["ärzte"]);
        let doctor = StaticPrincipal::user("bob").with_roles(["Ärzte"]);
        assert_eq!(r.evaluate(&doctor, "get", "::1"), Verdict::Allow);
    }

    #[test]
    fn all_facets_are_required() {
        let r = rule("deny", "alice", "admin", "post", "10.*");
        let alice = StaticPrincipal::user("alice").with_roles(["admin"]);
        assert_eq!(r.evaluate(&alice, "POST", "10.1.1.1"), Verdict::Deny);
        assert_eq!(r.evaluate(&alice, "GET", "10.1.1.1"), Verdict::NoOpinion);
        assert_eq!(r.evaluate(&alice, "POST", "11.1.1.1"), Verdict::NoOpinion);

        let no_role = StaticPrincipal::user("alice");
        assert_eq!(r.evaluate(&no_role, "POST", "10.1.1.1"), Verdict::NoOpinion);
    }

    #[test]
    fn works_through_trait_objects() {
        let r = rule("allow", "alice", "", "", "");
        let alice = StaticPrincipal::user("alice");
        let p: &dyn Principal = &alice;
        assert_eq!(r.evaluate(p, "get", "::1"), Verdict::Allow);
    }
}
