use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use parking_lot::Mutex;
use posture_model::{CollectId, OperationKind, RequestStatus, ScanId};

/// Claim, dependency and status tables for one operation kind.
#[derive(Default)]
struct KindTables {
    /// resource group -> request currently holding the claim
    claims: HashMap<String, String>,
    /// request -> requests whose claims blocked it
    dependencies: HashMap<String, BTreeSet<String>>,
    statuses: HashMap<String, RequestStatus>,
}

impl KindTables {
    fn add(&mut self, id: &str, groups: &[String]) -> Vec<String> {
        self.statuses.insert(id.to_string(), RequestStatus::Running);

        let mut filtered: Vec<String> = Vec::with_capacity(groups.len());
        for group in groups {
            match self.claims.get(group) {
                Some(owner) if owner == id => {
                    if !filtered.contains(group) {
                        filtered.push(group.clone());
                    }
                }
                Some(owner) => {
                    self.dependencies
                        .entry(id.to_string())
                        .or_default()
                        .insert(owner.clone());
                }
                None => {
                    self.claims.insert(group.clone(), id.to_string());
                    filtered.push(group.clone());
                }
            }
        }

        if filtered.is_empty() {
            self.statuses
                .insert(id.to_string(), RequestStatus::AlreadyRunning);
        }
        filtered
    }

    fn end(&mut self, id: &str, groups: &[String]) {
        let Some(status) = self.statuses.get_mut(id) else {
            return;
        };
        *status = RequestStatus::Done;
        for group in groups {
            if self.claims.get(group).is_some_and(|owner| owner == id) {
                self.claims.remove(group);
            }
        }
    }

    fn resolve(&mut self, id: &str, path: &mut HashSet<String>) -> RequestStatus {
        let mut status = self.statuses.get(id).copied().unwrap_or_default();
        match status {
            RequestStatus::Cancelled | RequestStatus::Unknown => return status,
            RequestStatus::AlreadyRunning => {
                self.statuses.insert(id.to_string(), RequestStatus::Done);
                status = RequestStatus::Done;
            }
            _ => {}
        }

        // A request revisited on the current path contributes its own
        // status only.
        if !path.insert(id.to_string()) {
            return status;
        }

        let deps: Vec<String> = self
            .dependencies
            .get(id)
            .map(|deps| deps.iter().cloned().collect())
            .unwrap_or_default();

        for dep in deps {
            match self.resolve(&dep, path) {
                RequestStatus::Running => {
                    path.remove(id);
                    return RequestStatus::Running;
                }
                RequestStatus::Unknown | RequestStatus::Cancelled => {
                    // Seen by later queries, not by this one.
                    self.statuses
                        .insert(id.to_string(), RequestStatus::Cancelled);
                }
                _ => {}
            }
        }

        path.remove(id);
        status
    }
}

/// Deduplicates collect and scan work across concurrent requests.
///
/// At most one request holds the claim on a resource group per operation
/// kind. A request that asks for an already claimed group records a
/// dependency on the holder instead, and its status resolves through that
/// holder. None of the operations fail; unknown ids degrade to
/// [`RequestStatus::Unknown`].
///
/// Each kind is guarded by its own mutex covering all three of its tables.
/// Entries are never evicted, so memory grows with the number of requests
/// seen over the life of the process.
#[derive(Default)]
pub struct RequestStateManager {
    collect: Mutex<KindTables>,
    scan: Mutex<KindTables>,
}

impl fmt::Debug for RequestStateManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let collect = self.collect.lock();
        let scan = self.scan.lock();
        f.debug_struct("RequestStateManager")
            .field("collect_claims", &collect.claims.len())
            .field("collect_requests", &collect.statuses.len())
            .field("scan_claims", &scan.claims.len())
            .field("scan_requests", &scan.statuses.len())
            .finish()
    }
}

impl RequestStateManager {
    /// Manager with no requests.
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self, kind: OperationKind) -> &Mutex<KindTables> {
        match kind {
            OperationKind::Collect => &self.collect,
            OperationKind::Scan => &self.scan,
        }
    }

    /// Registers `id` as running and claims every unclaimed group in
    /// `groups`. Returns the groups the caller now owns and must work on.
    pub fn add(&self, kind: OperationKind, id: &str, groups: &[String]) -> Vec<String> {
        self.tables(kind).lock().add(id, groups)
    }

    /// Releases the claims of `id` on `groups` and marks it done. No-op for
    /// ids that were never added.
    pub fn end(&self, kind: OperationKind, id: &str, groups: &[String]) {
        self.tables(kind).lock().end(id, groups)
    }

    /// Resolves the status of `id` through its dependencies.
    ///
    /// A dependency that resolves to `Unknown` or `Cancelled` marks `id` as
    /// cancelled for subsequent queries while this call still returns the
    /// value it computed before visiting that dependency.
    pub fn state(&self, kind: OperationKind, id: &str) -> RequestStatus {
        let mut path = HashSet::new();
        self.tables(kind).lock().resolve(id, &mut path)
    }

    /// [`Self::add`] for a collect.
    pub fn add_collect(&self, id: &CollectId, groups: &[String]) -> Vec<String> {
        self.add(OperationKind::Collect, id.as_str(), groups)
    }

    /// [`Self::end`] for a collect.
    pub fn end_collect(&self, id: &CollectId, groups: &[String]) {
        self.end(OperationKind::Collect, id.as_str(), groups)
    }

    /// [`Self::state`] for a collect.
    pub fn collect_state(&self, id: &CollectId) -> RequestStatus {
        self.state(OperationKind::Collect, id.as_str())
    }

    /// [`Self::add`] for a scan.
    pub fn add_scan(&self, id: &ScanId, groups: &[String]) -> Vec<String> {
        self.add(OperationKind::Scan, id.as_str(), groups)
    }

    /// [`Self::end`] for a scan.
    pub fn end_scan(&self, id: &ScanId, groups: &[String]) {
        self.end(OperationKind::Scan, id.as_str(), groups)
    }

    /// [`Self::state`] for a scan.
    pub fn scan_state(&self, id: &ScanId) -> RequestStatus {
        self.state(OperationKind::Scan, id.as_str())
    }

    /// Requests `id` waits on because they held a claim it asked for.
    pub fn dependencies(&self, kind: OperationKind, id: &str) -> Vec<String> {
        self.tables(kind)
            .lock()
            .dependencies
            .get(id)
            .map(|deps| deps.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Request currently holding the claim on `group`, if any.
    pub fn claim_holder(&self, kind: OperationKind, group: &str) -> Option<String> {
        self.tables(kind).lock().claims.get(group).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn groups(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn disjoint_requests_keep_all_groups() {
        let manager = RequestStateManager::new();
        let a = CollectId::from("a");
        let b = CollectId::from("b");
        let c = CollectId::from("c");

        assert_eq!(manager.add_collect(&a, &groups(&["g1", "g2"])), groups(&["g1", "g2"]));
        assert_eq!(manager.add_collect(&b, &groups(&["g3"])), groups(&["g3"]));
        assert_eq!(manager.add_collect(&c, &groups(&["g4", "g5"])), groups(&["g4", "g5"]));
        assert_eq!(manager.collect_state(&a), RequestStatus::Running);
    }

    #[test]
    fn identical_request_defers_to_first_holder() {
        let manager = RequestStateManager::new();
        let first = CollectId::from("first");
        let second = CollectId::from("second");
        let requested = groups(&["g1", "g2"]);

        assert_eq!(manager.add_collect(&first, &requested), requested);
        assert!(manager.add_collect(&second, &requested).is_empty());

        assert_eq!(manager.collect_state(&second), RequestStatus::Running);

        manager.end_collect(&first, &requested);
        assert_eq!(manager.collect_state(&first), RequestStatus::Done);
        assert_eq!(manager.collect_state(&second), RequestStatus::Done);
    }

    #[test]
    fn already_running_is_promoted_on_first_query() {
        let manager = RequestStateManager::new();
        let first = ScanId::from("first");
        let second = ScanId::from("second");
        let requested = groups(&["g1"]);

        manager.add_scan(&first, &requested);
        manager.add_scan(&second, &requested);
        manager.end_scan(&first, &requested);

        {
            let tables = manager.scan.lock();
            assert_eq!(tables.statuses.get("second"), Some(&RequestStatus::AlreadyRunning));
        }
        assert_eq!(manager.scan_state(&second), RequestStatus::Done);
        let tables = manager.scan.lock();
        assert_eq!(tables.statuses.get("second"), Some(&RequestStatus::Done));
    }

    #[test]
    fn end_marks_done_and_is_idempotent() {
        let manager = RequestStateManager::new();
        let id = CollectId::from("one");
        let requested = groups(&["g1"]);

        manager.add_collect(&id, &requested);
        manager.end_collect(&id, &requested);
        assert_eq!(manager.collect_state(&id), RequestStatus::Done);
        manager.end_collect(&id, &requested);
        assert_eq!(manager.collect_state(&id), RequestStatus::Done);
        assert!(manager.claim_holder(OperationKind::Collect, "g1").is_none());
    }

    #[test]
    fn end_of_unknown_id_is_a_no_op() {
        let manager = RequestStateManager::new();
        let holder = CollectId::from("holder");
        manager.add_collect(&holder, &groups(&["g1"]));

        manager.end_collect(&CollectId::from("ghost"), &groups(&["g1"]));

        assert_eq!(manager.collect_state(&CollectId::from("ghost")), RequestStatus::Unknown);
        assert_eq!(
            manager.claim_holder(OperationKind::Collect, "g1").as_deref(),
            Some("holder")
        );
    }

    #[test]
    fn unregistered_id_is_unknown() {
        let manager = RequestStateManager::new();
        assert_eq!(manager.collect_state(&CollectId::from("nope")), RequestStatus::Unknown);
        assert_eq!(manager.scan_state(&ScanId::from("nope")), RequestStatus::Unknown);
    }

    #[test]
    fn overlapping_request_only_gets_new_groups() {
        let manager = RequestStateManager::new();
        let first = CollectId::from("first");
        let second = CollectId::from("second");

        manager.add_collect(&first, &groups(&["A", "B", "C"]));
        let filtered = manager.add_collect(&second, &groups(&["A", "D"]));

        assert_eq!(filtered, groups(&["D"]));
        assert_eq!(
            manager.dependencies(OperationKind::Collect, "second"),
            vec!["first".to_string()]
        );
        assert_eq!(manager.collect_state(&second), RequestStatus::Running);
    }

    #[test]
    fn running_dependency_blocks_completion() {
        let manager = RequestStateManager::new();
        let first = CollectId::from("first");
        let second = CollectId::from("second");

        manager.add_collect(&first, &groups(&["A"]));
        manager.add_collect(&second, &groups(&["A", "B"]));
        manager.end_collect(&second, &groups(&["B"]));

        assert_eq!(manager.collect_state(&second), RequestStatus::Running);
        manager.end_collect(&first, &groups(&["A"]));
        assert_eq!(manager.collect_state(&second), RequestStatus::Done);
    }

    #[test]
    fn unknown_dependency_cancels_on_the_next_query() {
        let manager = RequestStateManager::new();
        // Dependency edge on a request whose status was never stored.
        {
            let mut tables = manager.collect.lock();
            tables.statuses.insert("dependent".into(), RequestStatus::Done);
            tables
                .dependencies
                .entry("dependent".into())
                .or_default()
                .insert("vanished".into());
        }
        let dependent = CollectId::from("dependent");

        assert_eq!(manager.collect_state(&dependent), RequestStatus::Done);
        assert_eq!(manager.collect_state(&dependent), RequestStatus::Cancelled);
    }

    #[test]
    fn cancellation_propagates_through_chains() {
        let manager = RequestStateManager::new();
        {
            let mut tables = manager.scan.lock();
            tables.statuses.insert("a".into(), RequestStatus::Done);
            tables.statuses.insert("b".into(), RequestStatus::Cancelled);
            tables.dependencies.entry("a".into()).or_default().insert("b".into());
        }
        let a = ScanId::from("a");
        assert_eq!(manager.scan_state(&a), RequestStatus::Done);
        assert_eq!(manager.scan_state(&a), RequestStatus::Cancelled);
    }

    #[test]
    fn kinds_are_independent() {
        let manager = RequestStateManager::new();
        let requested = groups(&["g1"]);

        assert_eq!(manager.add(OperationKind::Collect, "x", &requested), requested);
        assert_eq!(manager.add(OperationKind::Scan, "y", &requested), requested);
        assert_eq!(manager.state(OperationKind::Scan, "x"), RequestStatus::Unknown);
    }

    #[test]
    fn dependency_cycles_terminate() {
        let manager = RequestStateManager::new();
        {
            let mut tables = manager.collect.lock();
            tables.statuses.insert("a".into(), RequestStatus::Done);
            tables.statuses.insert("b".into(), RequestStatus::Done);
            tables.dependencies.entry("a".into()).or_default().insert("b".into());
            tables.dependencies.entry("b".into()).or_default().insert("a".into());
        }
        assert_eq!(manager.state(OperationKind::Collect, "a"), RequestStatus::Done);
    }

    #[test]
    fn concurrent_claims_grant_each_group_once() {
        let manager = Arc::new(RequestStateManager::new());
        let requested = groups(&["g1", "g2", "g3", "g4"]);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let manager = Arc::clone(&manager);
                let requested = requested.clone();
                std::thread::spawn(move || {
                    manager.add(OperationKind::Collect, &format!("req-{i}"), &requested)
                })
            })
            .collect();

        let mut granted: Vec<String> = handles
            .into_iter()
            .flat_map(|h| h.join().expect("thread"))
            .collect();
        granted.sort();
        assert_eq!(granted, requested);
    }
}
