//! Fault injection.
//!
//! [`FailingStore`] wraps another driver and fails writes on demand, to
//! exercise partial flushes and compensating aborts.

use docjar_codec::{Document, DocumentId};
use docjar_store::{DocumentStore, Filter, Namespace, Projection, StoreError, StoreResult};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// A store that starts failing writes after a budget runs out.
pub struct FailingStore {
    inner: Arc<dyn DocumentStore>,
    /// Writes still allowed; `usize::MAX` means unlimited.
    write_budget: AtomicUsize,
    fail_reads: AtomicBool,
    failed_writes: AtomicUsize,
}

impl FailingStore {
    /// Wraps a driver; nothing fails until configured.
    pub fn new(inner: Arc<dyn DocumentStore>) -> Self {
        Self {
            inner,
            write_budget: AtomicUsize::new(usize::MAX),
            fail_reads: AtomicBool::new(false),
            failed_writes: AtomicUsize::new(0),
        }
    }

    /// Allows `count` more writes, then fails every write.
    pub fn fail_writes_after(&self, count: usize) {
        self.write_budget.store(count, Ordering::SeqCst);
    }

    /// Makes every read fail, or stops doing so.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Stops failing.
    pub fn heal(&self) {
        self.write_budget.store(usize::MAX, Ordering::SeqCst);
        self.fail_reads.store(false, Ordering::SeqCst);
    }

    /// Number of writes refused so far.
    pub fn failed_writes(&self) -> usize {
        self.failed_writes.load(Ordering::SeqCst)
    }

    fn check_write(&self) -> StoreResult<()> {
        let allowed = self
            .write_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |budget| match budget {
                usize::MAX => Some(usize::MAX),
                0 => None,
                n => Some(n - 1),
            })
            .is_ok();
        if allowed {
            Ok(())
        } else {
            self.failed_writes.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::unavailable("injected write failure"))
        }
    }

    fn check_read(&self) -> StoreResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("injected read failure"));
        }
        Ok(())
    }
}

impl DocumentStore for FailingStore {
    fn find(
        &self,
        namespace: &Namespace,
        filter: &Filter,
        projection: &Projection,
    ) -> StoreResult<Vec<Document>> {
        self.check_read()?;
        self.inner.find(namespace, filter, projection)
    }

    fn insert(&self, namespace: &Namespace, document: Document) -> StoreResult<DocumentId> {
        self.check_write()?;
        self.inner.insert(namespace, document)
    }

    fn replace(
        &self,
        namespace: &Namespace,
        filter: &Filter,
        document: Document,
        upsert: bool,
    ) -> StoreResult<u64> {
        self.check_write()?;
        self.inner.replace(namespace, filter, document, upsert)
    }

    fn delete(&self, namespace: &Namespace, filter: &Filter) -> StoreResult<u64> {
        self.check_write()?;
        self.inner.delete(namespace, filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docjar_codec::doc;
    use docjar_store::InMemoryStore;

    #[test]
    fn write_budget_runs_out() {
        let store = FailingStore::new(Arc::new(InMemoryStore::new()));
        let ns = Namespace::new("db", "c");
        store.fail_writes_after(1);

        assert!(store.insert(&ns, doc! { "a" => 1i64 }).is_ok());
        assert!(matches!(
            store.insert(&ns, doc! { "a" => 2i64 }),
            Err(StoreError::Unavailable(_))
        ));
        assert_eq!(store.failed_writes(), 1);
        assert_eq!(store.count(&ns, &Filter::new()).unwrap(), 1);

        store.heal();
        assert!(store.insert(&ns, doc! { "a" => 3i64 }).is_ok());
    }

    #[test]
    fn reads_can_fail() {
        let store = FailingStore::new(Arc::new(InMemoryStore::new()));
        store.fail_reads(true);
        assert!(store
            .find(&Namespace::new("db", "c"), &Filter::new(), &Projection::All)
            .is_err());
    }
}
