use std::sync::Arc;

use posture_model::OperationKind;

use super::RequestStateManager;

/// Claims held by one request for the duration of a pipeline phase.
///
/// Dropping the guard ends the request, releasing its claims and marking it
/// done, on every exit path of the phase.
#[derive(Debug)]
pub struct ClaimGuard {
    manager: Arc<RequestStateManager>,
    kind: OperationKind,
    id: String,
    requested: Vec<String>,
    granted: Vec<String>,
}

impl ClaimGuard {
    /// Registers `id` and claims what it can of `requested`.
    pub fn acquire(
        manager: Arc<RequestStateManager>,
        kind: OperationKind,
        id: impl Into<String>,
        requested: &[String],
    ) -> Self {
        let id = id.into();
        let granted = manager.add(kind, &id, requested);
        Self {
            manager,
            kind,
            id,
            requested: requested.to_vec(),
            granted,
        }
    }

    /// Groups this request claimed and must do the work for.
    pub fn granted(&self) -> &[String] {
        &self.granted
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        self.manager.end(self.kind, &self.id, &self.requested);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use posture_model::RequestStatus;

    #[test]
    fn dropping_the_guard_ends_the_request() {
        let manager = Arc::new(RequestStateManager::new());
        let groups = vec!["g1".to_string()];

        let guard = ClaimGuard::acquire(manager.clone(), OperationKind::Scan, "s1", &groups);
        assert_eq!(guard.granted(), groups.as_slice());
        assert_eq!(manager.state(OperationKind::Scan, "s1"), RequestStatus::Running);

        drop(guard);
        assert_eq!(manager.state(OperationKind::Scan, "s1"), RequestStatus::Done);
        assert!(manager.claim_holder(OperationKind::Scan, "g1").is_none());
    }

    #[test]
    fn ending_does_not_release_claims_held_by_others() {
        let manager = Arc::new(RequestStateManager::new());
        let groups = vec!["g1".to_string()];

        let holder = ClaimGuard::acquire(manager.clone(), OperationKind::Collect, "c1", &groups);
        let waiter = ClaimGuard::acquire(manager.clone(), OperationKind::Collect, "c2", &groups);
        assert!(waiter.granted().is_empty());
        drop(waiter);

        assert_eq!(
            manager.claim_holder(OperationKind::Collect, "g1").as_deref(),
            Some("c1")
        );
        drop(holder);
    }
}
