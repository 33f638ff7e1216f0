//! Audit collaborator: fire-and-forget action records.

use std::sync::{Arc, RwLock};

/// One audit record.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub entity_id: String,
    pub action: String,
    pub actor_id: String,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
    pub reason: Option<String>,
}

/// Trait for the external audit log.
///
/// Fire-and-forget: implementations must neither block nor fail the
/// caller's success path. Formatting and retention are out of scope.
pub trait AuditService: Send + Sync {
    fn log_action(&self, entry: AuditEntry);
}

/// In-memory audit service capturing entries for assertions.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAuditService {
    entries: Arc<RwLock<Vec<AuditEntry>>>,
}

impl InMemoryAuditService {
    /// Creates an empty audit capture.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all captured entries.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().unwrap().clone()
    }

    /// Number of captured entries.
    pub fn entry_count(&self) -> usize {
        self.entries.read().unwrap().len()
    }
}

impl AuditService for InMemoryAuditService {
    fn log_action(&self, entry: AuditEntry) {
        self.entries.write().unwrap().push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_captured_in_order() {
        let audit = InMemoryAuditService::new();
        audit.log_action(AuditEntry {
            entity_id: "order-1".to_string(),
            action: "order.created".to_string(),
            actor_id: "customer-1".to_string(),
            before: None,
            after: Some(serde_json::json!({ "status": "Pending" })),
            reason: None,
        });

        assert_eq!(audit.entry_count(), 1);
        assert_eq!(audit.entries()[0].action, "order.created");
    }
}
