use crate::tasks::store::{JobStore, StoreError};

/// Requeues every job a previous process left marked running.
///
/// Must run before the first claim: it cannot tell an orphan from a job this process owns.
pub(crate) async fn recover_orphaned_jobs(store: &dyn JobStore) -> Result<u64, StoreError> {
    let recovered = store.reset_all_running_to_queued().await?;
    metrics::counter!("queue_jobs_recovered_total").increment(recovered);

    if recovered > 0 {
        tracing::warn!(recovered, "Requeued jobs orphaned by a previous run");
    } else {
        tracing::info!("No orphaned jobs to recover");
    }

    Ok(recovered)
}

#[cfg(test)]
mod tests {
    use super::recover_orphaned_jobs;
    use crate::db::types::{EntityRef, JobKind};
    use crate::tasks::store::JobStore;
    use crate::test_support::{self, MemoryStore};

    #[tokio::test]
    async fn recovered_jobs_become_claimable_again() {
        let store = MemoryStore::default();
        for _ in 0..3 {
            store.enqueue(&test_support::file_payload(EntityRef::new_random())).await.expect("enqueue");
        }
        let first = store.claim_one(JobKind::File).await.expect("claim").expect("job");
        let second = store.claim_one(JobKind::File).await.expect("claim").expect("job");

        let recovered = recover_orphaned_jobs(&store).await.expect("recover");

        assert_eq!(recovered, 2);
        let mut reclaimed = Vec::new();
        while let Some(job) = store.claim_one(JobKind::File).await.expect("claim") {
            reclaimed.push(job.id);
        }
        assert_eq!(reclaimed.len(), 3);
        assert!(reclaimed.contains(&first.id));
        assert!(reclaimed.contains(&second.id));
    }

    #[tokio::test]
    async fn nothing_running_recovers_zero() {
        let store = MemoryStore::default();
        store.enqueue(&test_support::file_payload(EntityRef::new_random())).await.expect("enqueue");

        assert_eq!(recover_orphaned_jobs(&store).await.expect("recover"), 0);
    }
}
