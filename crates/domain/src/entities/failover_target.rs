//! Failover target entity

use serde::{Deserialize, Serialize};

/// A routable failover target; lower `priority` is preferred
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailoverTarget {
    /// Unique target id
    pub id: String,
    /// Ordering key, ascending
    pub priority: i32,
    /// Current health as last reported to the owning manager
    pub healthy: bool,
}

impl FailoverTarget {
    /// Create a healthy target
    pub fn new(id: impl Into<String>, priority: i32) -> Self {
        Self {
            id: id.into(),
            priority,
            healthy: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_target_is_healthy() {
        let t = FailoverTarget::new("eu-west", 1);
        assert_eq!(t.id, "eu-west");
        assert_eq!(t.priority, 1);
        assert!(t.healthy);
    }
}
