use futures::future::join_all;
use log::{debug, info, warn};
use thiserror::Error;

use super::models::{
    DeleteOutcome, ExclusionReport, ProtectedSet, RecordOutcome, Strategy, Targets,
};
use crate::api::query::Filter;
use crate::api::{ApiError, ConcurrencyConfig, ConcurrencyLimiter, Operation, Record, RecordStore};

#[derive(Debug, Error)]
pub enum ExclusionError {
    #[error("no protected keys given; refusing to delete every record in {collection}")]
    NoProtectedKeys { collection: String },
    #[error("failed to fetch records from {collection}")]
    Fetch {
        collection: String,
        source: ApiError,
    },
    #[error("bulk delete on {collection} failed")]
    BulkDelete {
        collection: String,
        source: ApiError,
    },
}

/// Deletes every record of a store except the protected ones.
///
/// The operator never prints. It returns an [`ExclusionReport`] and leaves
/// rendering to the caller.
pub struct BulkExclusion<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    protected: ProtectedSet,
    concurrency: ConcurrencyConfig,
}

impl<'a, S: RecordStore + ?Sized> BulkExclusion<'a, S> {
    pub fn new(store: &'a S, protected: ProtectedSet) -> Self {
        Self {
            store,
            protected,
            concurrency: ConcurrencyConfig::sequential(),
        }
    }

    pub fn with_concurrency(mut self, concurrency: ConcurrencyConfig) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn protected(&self) -> &ProtectedSet {
        &self.protected
    }

    /// Server-side filter matching every non-protected record
    pub fn exclusion_filter(&self) -> Result<Filter, ExclusionError> {
        if self.protected.is_empty() {
            return Err(ExclusionError::NoProtectedKeys {
                collection: self.store.name().to_string(),
            });
        }
        Ok(self.protected.exclusion_filter(self.store.key_column()))
    }

    /// Fetch the records an enumerate run would delete
    pub async fn targets(&self) -> Result<Targets, ExclusionError> {
        let filter = self.exclusion_filter()?;
        let fetched = self
            .store
            .list_records(&filter)
            .await
            .map_err(|source| ExclusionError::Fetch {
                collection: self.store.name().to_string(),
                source,
            })?;
        let fetched_count = fetched.len();

        let targets = Targets::select(fetched, &self.protected);
        if targets.skipped_protected() > 0 {
            warn!(
                "{} returned {} protected record(s) despite the exclusion filter; skipping them",
                self.store.name(),
                targets.skipped_protected()
            );
        }
        debug!(
            "Fetched {} record(s) from {}, {} to delete",
            fetched_count,
            self.store.name(),
            targets.len()
        );

        Ok(targets)
    }

    /// Delete each target by id, continuing past failures
    pub async fn delete_targets(&self, targets: Targets) -> ExclusionReport {
        let (records, skipped_protected) = targets.into_parts();
        let fan_out = self.concurrency.fan_out();

        let outcomes = if fan_out <= 1 {
            let mut outcomes = Vec::with_capacity(records.len());
            for record in records {
                let outcome = self.delete_one(&record).await;
                outcomes.push(RecordOutcome { record, outcome });
            }
            outcomes
        } else {
            info!(
                "Deleting {} record(s) from {} with up to {} in flight",
                records.len(),
                self.store.name(),
                fan_out
            );
            let limiter = ConcurrencyLimiter::new(&self.concurrency);
            let results = join_all(records.iter().map(|record| {
                let limiter = &limiter;
                async move {
                    let _permit = match limiter.acquire().await {
                        Ok(permit) => permit,
                        Err(e) => return DeleteOutcome::Failed(e.to_string()),
                    };
                    self.delete_one(record).await
                }
            }))
            .await;
            debug!("Concurrency stats: {:?}", limiter.stats());

            records
                .into_iter()
                .zip(results)
                .map(|(record, outcome)| RecordOutcome { record, outcome })
                .collect()
        };

        ExclusionReport {
            strategy: Strategy::Enumerate,
            targeted: outcomes.len(),
            outcomes,
            bulk_deleted: None,
            skipped_protected,
        }
    }

    /// One filtered delete; any failure fails the whole operation
    pub async fn bulk_delete(&self) -> Result<ExclusionReport, ExclusionError> {
        let filter = self.exclusion_filter()?;
        let deleted = self
            .store
            .delete_records(&filter)
            .await
            .map_err(|source| ExclusionError::BulkDelete {
                collection: self.store.name().to_string(),
                source,
            })?;
        debug!("Bulk delete removed {} record(s) from {}", deleted, self.store.name());

        Ok(ExclusionReport {
            strategy: Strategy::Bulk,
            targeted: deleted,
            outcomes: Vec::new(),
            bulk_deleted: Some(deleted),
            skipped_protected: 0,
        })
    }

    pub async fn run(&self, strategy: Strategy) -> Result<ExclusionReport, ExclusionError> {
        match strategy {
            Strategy::Bulk => self.bulk_delete().await,
            Strategy::Enumerate => {
                let targets = self.targets().await?;
                Ok(self.delete_targets(targets).await)
            }
        }
    }

    /// Remote calls a run would make, without deleting anything.
    /// The enumerate plan still fetches to know which records it would hit.
    pub async fn plan(&self, strategy: Strategy) -> Result<Vec<Operation>, ExclusionError> {
        let filter = self.exclusion_filter()?;
        match strategy {
            Strategy::Bulk => Ok(vec![self.store.bulk_delete_operation(&filter)]),
            Strategy::Enumerate => {
                let targets = self.targets().await?;
                let mut operations = Vec::with_capacity(targets.len() + 1);
                operations.push(self.store.list_operation(&filter));
                operations.extend(
                    targets
                        .records()
                        .iter()
                        .map(|record| self.store.delete_operation(record)),
                );
                Ok(operations)
            }
        }
    }

    async fn delete_one(&self, record: &Record) -> DeleteOutcome {
        match self.store.delete_record_by_id(&record.id).await {
            Ok(()) => {
                debug!("Deleted {} from {}", record.label(), self.store.name());
                DeleteOutcome::Deleted
            }
            Err(e) => {
                debug!(
                    "Failed to delete {} from {}: {}",
                    record.label(),
                    self.store.name(),
                    e
                );
                DeleteOutcome::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RecordId;
    use crate::services::exclusion::BatchOutcome;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory collection keyed by email
    #[derive(Default)]
    struct MemoryStore {
        rows: Mutex<Vec<Record>>,
        failing: HashSet<String>,
        fail_fetch: bool,
        fail_bulk: bool,
        /// Ignore the filter when listing, like a misbehaving service
        leak_protected: bool,
        delete_calls: Mutex<Vec<String>>,
        bulk_calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl MemoryStore {
        fn with_emails(emails: &[&str]) -> Self {
            let rows = emails
                .iter()
                .enumerate()
                .map(|(i, email)| Record::new((i + 1).to_string(), Some(email)))
                .collect();
            Self {
                rows: Mutex::new(rows),
                ..Self::default()
            }
        }

        fn failing_on(mut self, email: &str) -> Self {
            self.failing.insert(email.to_string());
            self
        }

        fn remaining(&self) -> Vec<String> {
            let mut keys: Vec<String> = self
                .rows
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.label().to_string())
                .collect();
            keys.sort();
            keys
        }

        fn delete_calls(&self) -> Vec<String> {
            self.delete_calls.lock().unwrap().clone()
        }
    }

    fn row(record: &Record) -> serde_json::Value {
        json!({ "id": record.id.as_str(), "email": record.key })
    }

    #[async_trait]
    impl RecordStore for MemoryStore {
        fn name(&self) -> &str {
            "memory"
        }

        fn key_column(&self) -> &str {
            "email"
        }

        async fn list_records(&self, filter: &Filter) -> Result<Vec<Record>, ApiError> {
            if self.fail_fetch {
                return Err(ApiError::Unsupported("listing in this test"));
            }
            let rows = self.rows.lock().unwrap();
            Ok(rows
                .iter()
                .filter(|r| self.leak_protected || filter.matches(&row(r)))
                .cloned()
                .collect())
        }

        async fn delete_records(&self, filter: &Filter) -> Result<usize, ApiError> {
            self.bulk_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_bulk {
                return Err(ApiError::Unsupported("bulk delete in this test"));
            }
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|r| !filter.matches(&row(r)));
            Ok(before - rows.len())
        }

        async fn delete_record_by_id(&self, id: &RecordId) -> Result<(), ApiError> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let mut rows = self.rows.lock().unwrap();
            let Some(pos) = rows.iter().position(|r| &r.id == id) else {
                return Ok(());
            };
            let label = rows[pos].label().to_string();
            self.delete_calls.lock().unwrap().push(label.clone());

            if self.failing.contains(&label) {
                return Err(ApiError::Unsupported("deleting this record"));
            }
            rows.remove(pos);
            Ok(())
        }

        fn list_operation(&self, filter: &Filter) -> Operation {
            Operation::ListRecords {
                table: "memory".to_string(),
                filter: Some(filter.clone()),
            }
        }

        fn bulk_delete_operation(&self, filter: &Filter) -> Operation {
            Operation::bulk_delete("memory", filter.clone())
        }

        fn delete_operation(&self, record: &Record) -> Operation {
            Operation::delete_record("memory", "id", record.id.clone(), record.key.clone())
        }
    }

    fn keep(keys: &[&str]) -> ProtectedSet {
        ProtectedSet::new(keys.iter().copied())
    }

    #[tokio::test]
    async fn test_deletes_everything_but_the_admin() {
        let store = MemoryStore::with_emails(&["admin@x.com", "a@x.com", "b@x.com"]);
        let operator = BulkExclusion::new(&store, keep(&["admin@x.com"]));

        let report = operator.run(Strategy::Enumerate).await.unwrap();

        assert_eq!(store.delete_calls(), vec!["a@x.com", "b@x.com"]);
        assert_eq!(store.remaining(), vec!["admin@x.com"]);
        assert_eq!(report.outcome(), BatchOutcome::AllDeleted);
        assert_eq!(report.targeted, 2);
        assert_eq!(report.deleted(), 2);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_going() {
        let store = MemoryStore::with_emails(&["admin@x.com", "a@x.com", "b@x.com"])
            .failing_on("b@x.com");
        let operator = BulkExclusion::new(&store, keep(&["admin@x.com"]));

        let report = operator.run(Strategy::Enumerate).await.unwrap();

        assert_eq!(store.remaining(), vec!["admin@x.com", "b@x.com"]);
        assert_eq!(report.outcome(), BatchOutcome::PartialFailure { failed: 1 });
        let outcomes: Vec<(&str, bool)> = report
            .outcomes
            .iter()
            .map(|o| (o.record.label(), o.outcome.is_deleted()))
            .collect();
        assert_eq!(outcomes, vec![("a@x.com", true), ("b@x.com", false)]);
    }

    #[tokio::test]
    async fn test_failure_in_the_middle_does_not_abort() {
        let store = MemoryStore::with_emails(&["admin@x.com", "a@x.com", "b@x.com", "c@x.com"])
            .failing_on("b@x.com");
        let operator = BulkExclusion::new(&store, keep(&["admin@x.com"]));

        let report = operator.run(Strategy::Enumerate).await.unwrap();

        assert_eq!(store.delete_calls(), vec!["a@x.com", "b@x.com", "c@x.com"]);
        assert_eq!(store.remaining(), vec!["admin@x.com", "b@x.com"]);
        assert_eq!(report.deleted(), 2);
        let (failed, reason) = report.failures().next().unwrap();
        assert_eq!(failed.label(), "b@x.com");
        assert!(reason.contains("not supported"));
    }

    #[tokio::test]
    async fn test_second_run_is_a_noop() {
        let store = MemoryStore::with_emails(&["admin@x.com", "a@x.com", "b@x.com"]);
        let operator = BulkExclusion::new(&store, keep(&["admin@x.com"]));

        operator.run(Strategy::Enumerate).await.unwrap();
        let calls_after_first = store.delete_calls().len();
        let second = operator.run(Strategy::Enumerate).await.unwrap();

        assert_eq!(second.outcome(), BatchOutcome::Empty);
        assert_eq!(store.delete_calls().len(), calls_after_first);
        assert_eq!(store.remaining(), vec!["admin@x.com"]);
    }

    #[tokio::test]
    async fn test_rerun_after_partial_failure_retries_only_leftovers() {
        let mut store = MemoryStore::with_emails(&["admin@x.com", "a@x.com", "b@x.com"])
            .failing_on("b@x.com");
        {
            let operator = BulkExclusion::new(&store, keep(&["admin@x.com"]));
            operator.run(Strategy::Enumerate).await.unwrap();
        }
        store.failing.clear();
        store.delete_calls.lock().unwrap().clear();

        let operator = BulkExclusion::new(&store, keep(&["admin@x.com"]));
        let report = operator.run(Strategy::Enumerate).await.unwrap();

        assert_eq!(store.delete_calls(), vec!["b@x.com"]);
        assert_eq!(report.outcome(), BatchOutcome::AllDeleted);
        assert_eq!(store.remaining(), vec!["admin@x.com"]);
    }

    #[tokio::test]
    async fn test_nothing_to_delete() {
        let store = MemoryStore::with_emails(&["admin@x.com"]);
        let operator = BulkExclusion::new(&store, keep(&["admin@x.com"]));

        let report = operator.run(Strategy::Enumerate).await.unwrap();

        assert!(store.delete_calls().is_empty());
        assert_eq!(report.outcome(), BatchOutcome::Empty);
    }

    #[tokio::test]
    async fn test_remaining_is_exactly_the_protected_records() {
        let emails = ["admin@x.com", "ops@x.com", "a@x.com", "b@x.com", "c@x.com"];
        let cases: [&[&str]; 4] = [
            &["admin@x.com"],
            &["admin@x.com", "ops@x.com"],
            &["a@x.com", "nobody@x.com"],
            &["admin@x.com", "ops@x.com", "a@x.com", "b@x.com", "c@x.com"],
        ];

        for protected in cases {
            let store = MemoryStore::with_emails(&emails);
            let operator = BulkExclusion::new(&store, keep(protected));
            operator.run(Strategy::Enumerate).await.unwrap();

            let mut expected: Vec<String> = emails
                .iter()
                .filter(|e| protected.contains(*e))
                .map(|e| e.to_string())
                .collect();
            expected.sort();
            assert_eq!(store.remaining(), expected, "protected = {:?}", protected);
            assert!(
                store.delete_calls().iter().all(|k| !protected.contains(&k.as_str())),
                "protected key deleted with protected = {:?}",
                protected
            );
        }
    }

    #[tokio::test]
    async fn test_protected_records_returned_by_the_service_are_skipped() {
        let store = MemoryStore {
            leak_protected: true,
            ..MemoryStore::with_emails(&["admin@x.com", "a@x.com"])
        };
        let operator = BulkExclusion::new(&store, keep(&["admin@x.com"]));

        let report = operator.run(Strategy::Enumerate).await.unwrap();

        assert_eq!(store.delete_calls(), vec!["a@x.com"]);
        assert_eq!(report.skipped_protected, 1);
        assert_eq!(store.remaining(), vec!["admin@x.com"]);
    }

    #[tokio::test]
    async fn test_fetch_failure_deletes_nothing() {
        let store = MemoryStore {
            fail_fetch: true,
            ..MemoryStore::with_emails(&["admin@x.com", "a@x.com"])
        };
        let operator = BulkExclusion::new(&store, keep(&["admin@x.com"]));

        let err = operator.run(Strategy::Enumerate).await.unwrap_err();

        assert!(matches!(err, ExclusionError::Fetch { .. }));
        assert!(store.delete_calls().is_empty());
        assert_eq!(store.remaining(), vec!["a@x.com", "admin@x.com"]);
    }

    #[tokio::test]
    async fn test_empty_protected_set_is_refused() {
        let store = MemoryStore::with_emails(&["a@x.com"]);
        let operator = BulkExclusion::new(&store, keep(&["  "]));

        let err = operator.run(Strategy::Bulk).await.unwrap_err();

        assert!(matches!(err, ExclusionError::NoProtectedKeys { .. }));
        assert_eq!(store.bulk_calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.remaining(), vec!["a@x.com"]);
    }

    #[tokio::test]
    async fn test_bulk_strategy() {
        let store = MemoryStore::with_emails(&["admin@x.com", "a@x.com", "b@x.com"]);
        let operator = BulkExclusion::new(&store, keep(&["admin@x.com"]));

        let report = operator.run(Strategy::Bulk).await.unwrap();

        assert_eq!(store.bulk_calls.load(Ordering::SeqCst), 1);
        assert!(store.delete_calls().is_empty());
        assert_eq!(report.strategy, Strategy::Bulk);
        assert_eq!(report.deleted(), 2);
        assert_eq!(report.outcome(), BatchOutcome::AllDeleted);
        assert_eq!(store.remaining(), vec!["admin@x.com"]);

        let again = operator.run(Strategy::Bulk).await.unwrap();
        assert_eq!(again.outcome(), BatchOutcome::Empty);
    }

    #[tokio::test]
    async fn test_bulk_failure_is_one_error() {
        let store = MemoryStore {
            fail_bulk: true,
            ..MemoryStore::with_emails(&["admin@x.com", "a@x.com"])
        };
        let operator = BulkExclusion::new(&store, keep(&["admin@x.com"]));

        let err = operator.run(Strategy::Bulk).await.unwrap_err();

        assert!(matches!(err, ExclusionError::BulkDelete { .. }));
        assert_eq!(err.to_string(), "bulk delete on memory failed");
    }

    #[tokio::test]
    async fn test_sequential_by_default() {
        let store = MemoryStore::with_emails(&["admin@x.com", "a@x.com", "b@x.com", "c@x.com"]);
        let operator = BulkExclusion::new(&store, keep(&["admin@x.com"]));

        operator.run(Strategy::Enumerate).await.unwrap();

        assert_eq!(store.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_bounded_fan_out_keeps_results_and_order() {
        let emails = ["admin@x.com", "a@x.com", "b@x.com", "c@x.com", "d@x.com", "e@x.com"];
        let store = MemoryStore::with_emails(&emails).failing_on("c@x.com");
        let operator = BulkExclusion::new(&store, keep(&["admin@x.com"]))
            .with_concurrency(ConcurrencyConfig::bounded(2));

        let report = operator.run(Strategy::Enumerate).await.unwrap();

        let max = store.max_in_flight.load(Ordering::SeqCst);
        assert!(max >= 1 && max <= 2, "max in flight was {}", max);
        let order: Vec<&str> = report.outcomes.iter().map(|o| o.record.label()).collect();
        assert_eq!(order, vec!["a@x.com", "b@x.com", "c@x.com", "d@x.com", "e@x.com"]);
        assert_eq!(report.outcome(), BatchOutcome::PartialFailure { failed: 1 });
        assert_eq!(store.remaining(), vec!["admin@x.com", "c@x.com"]);
    }

    #[tokio::test]
    async fn test_plan_does_not_delete() {
        let store = MemoryStore::with_emails(&["admin@x.com", "a@x.com", "b@x.com"]);
        let operator = BulkExclusion::new(&store, keep(&["admin@x.com"]));

        let plan = operator.plan(Strategy::Enumerate).await.unwrap();
        let rendered: Vec<String> = plan.iter().map(|op| op.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "GET /rest/v1/memory?email=neq.admin@x.com".to_string(),
                "DELETE /rest/v1/memory?id=eq.2 (a@x.com)".to_string(),
                "DELETE /rest/v1/memory?id=eq.3 (b@x.com)".to_string(),
            ]
        );

        let bulk = operator.plan(Strategy::Bulk).await.unwrap();
        assert_eq!(bulk.len(), 1);
        assert!(bulk[0].is_destructive());

        assert!(store.delete_calls().is_empty());
        assert_eq!(store.bulk_calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.remaining().len(), 3);
    }
}
