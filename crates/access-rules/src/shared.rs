use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::collection::RuleCollection;
use crate::principal::Principal;
use crate::verdict::{Decision, Verdict};

/// A cloneable handle to the live rule set, for request handlers that must
/// survive configuration reloads.
///
/// Readers take a snapshot (an `Arc` clone) and evaluate without holding the
/// lock. A reload builds a complete [`RuleCollection`] first and then swaps it
/// in, so nobody ever sees a half-populated rule list.
#[derive(Debug, Clone, Default)]
pub struct SharedRules {
    inner: Arc<RwLock<Arc<RuleCollection>>>,
}

impl SharedRules {
    pub fn new(collection: RuleCollection) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(collection))),
        }
    }

    /// The collection in effect right now.
    pub fn snapshot(&self) -> Arc<RuleCollection> {
        Arc::clone(&*self.inner.read())
    }

    /// Swap in a new collection, returning the one it replaced.
    pub fn replace(&self, collection: RuleCollection) -> Arc<RuleCollection> {
        let rules = collection.len();
        let previous = std::mem::replace(&mut *self.inner.write(), Arc::new(collection));
        info!(rules, previous_rules = previous.len(), "rule set replaced");
        previous
    }

    pub fn evaluate<P: Principal + ?Sized>(
        &self,
        principal: &P,
        verb: &str,
        address: &str,
    ) -> Verdict {
        self.snapshot().evaluate(principal, verb, address)
    }

    pub fn decide<P: Principal + ?Sized>(
        &self,
        principal: &P,
        verb: &str,
        address: &str,
    ) -> Decision {
        self.snapshot().decide(principal, verb, address)
    }
}

impl From<RuleCollection> for SharedRules {
    fn from(collection: RuleCollection) -> Self {
        Self::new(collection)
    }
}
