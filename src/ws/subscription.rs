//! Client-owned subscription registry.
//!
//! Tracks which topics the client has asked to observe. The registry
//! outlives any single socket: every time a connection opens, each entry
//! is re-sent in insertion order.

use crate::domain::Topic;

/// Ordered set of active [`Topic`] subscriptions.
#[derive(Debug, Default, Clone)]
pub struct SubscriptionRegistry {
    topics: Vec<Topic>,
}

impl SubscriptionRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a topic. Returns `false` if it was already present, in which
    /// case the registry is unchanged.
    pub fn subscribe(&mut self, topic: Topic) -> bool {
        if self.topics.contains(&topic) {
            return false;
        }
        self.topics.push(topic);
        true
    }

    /// Removes a topic. Returns `false` if it was not present.
    pub fn unsubscribe(&mut self, topic: &Topic) -> bool {
        let before = self.topics.len();
        self.topics.retain(|t| t != topic);
        self.topics.len() != before
    }

    /// Iterates topics in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Topic> {
        self.topics.iter()
    }

    /// Returns an owned copy of the active topics, in registration order.
    #[must_use]
    pub fn list_active(&self) -> Vec<Topic> {
        self.topics.clone()
    }

    /// Returns the number of registered topics.
    #[must_use]
    pub fn count(&self) -> usize {
        self.topics.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_registry() {
        let registry = SubscriptionRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.list_active().is_empty());
    }

    #[test]
    fn subscribe_is_idempotent() {
        let mut registry = SubscriptionRegistry::new();
        assert!(registry.subscribe(Topic::task("A")));
        assert!(!registry.subscribe(Topic::task("A")));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn same_id_different_kind_are_distinct() {
        let mut registry = SubscriptionRegistry::new();
        registry.subscribe(Topic::task("A"));
        registry.subscribe(Topic::workflow("A"));
        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn unsubscribe_removes_topic() {
        let mut registry = SubscriptionRegistry::new();
        let topic = Topic::room("lab1");
        registry.subscribe(topic.clone());
        assert!(registry.unsubscribe(&topic));
        assert!(registry.is_empty());
        assert!(!registry.unsubscribe(&topic));
    }

    #[test]
    fn list_preserves_registration_order() {
        let mut registry = SubscriptionRegistry::new();
        registry.subscribe(Topic::task("A"));
        registry.subscribe(Topic::room("lab1"));
        registry.subscribe(Topic::workflow("W"));
        registry.unsubscribe(&Topic::room("lab1"));
        registry.subscribe(Topic::room("lab1"));
        assert_eq!(
            registry.list_active(),
            vec![Topic::task("A"), Topic::workflow("W"), Topic::room("lab1")]
        );
    }
}
