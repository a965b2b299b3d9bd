use std::cmp::Ordering;

use tracing::{debug, trace};

use crate::principal::Principal;
use crate::rule::Rule;
use crate::verdict::{Decision, Verdict};

/// An ordered set of rules evaluated first-match-wins.
///
/// Rules with an explicit priority come first, lowest number first. Rules
/// without a priority follow all of them. Equal keys keep insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleCollection {
    rules: Vec<Rule>,
}

impl RuleCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `rule` after every rule that sorts before or equal to it.
    pub fn add(&mut self, rule: Rule) {
        let at = self
            .rules
            .partition_point(|existing| compare_priority(existing, &rule) != Ordering::Greater);
        self.rules.insert(at, rule);
    }

    /// Return the verdict of the first rule that has an opinion.
    pub fn evaluate<P: Principal + ?Sized>(
        &self,
        principal: &P,
        verb: &str,
        address: &str,
    ) -> Verdict {
        self.decide(principal, verb, address).verdict
    }

    /// Like [`evaluate`](Self::evaluate), but also report which rule matched.
    pub fn decide<P: Principal + ?Sized>(
        &self,
        principal: &P,
        verb: &str,
        address: &str,
    ) -> Decision {
        debug!(
            user = principal.name(),
            anonymous = principal.is_anonymous(),
            verb,
            address,
            rules = self.rules.len(),
            "evaluating request against rules"
        );

        for (idx, rule) in self.rules.iter().enumerate() {
            let verdict = rule.evaluate(principal, verb, address);
            if verdict != Verdict::NoOpinion {
                trace!(index = idx, rule = rule.name(), %verdict, "rule matched request");
                return Decision {
                    verdict,
                    rule_index: Some(idx),
                    rule_name: rule.name().map(str::to_string),
                };
            }
        }

        Decision::no_opinion()
    }

    /// Rules in evaluation order.
    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Sort key: `(priority is None, priority)` ascending.
fn compare_priority(a: &Rule, b: &Rule) -> Ordering {
    match (a.priority(), b.priority()) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl Extend<Rule> for RuleCollection {
    fn extend<I: IntoIterator<Item = Rule>>(&mut self, iter: I) {
        for rule in iter {
            self.add(rule);
        }
    }
}

impl FromIterator<Rule> for RuleCollection {
    fn from_iter<I: IntoIterator<Item = Rule>>(iter: I) -> Self {
        let mut collection = Self::new();
        collection.extend(iter);
        collection
    }
}

impl<'a> IntoIterator for &'a RuleCollection {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}
