//! First-writer-wins bundle ownership.

use std::sync::Arc;

use haystack_index::{IndexError, Key, MetadataIndex, Row};
use haystack_types::{order_key, BundleName, BundleOwner, Clock, OwnerId};
use tracing::{debug, info};

use crate::error::{LedgerError, LedgerResult};

/// Index kind of [`BundleOwner`] rows. Rows have no ancestor; the name is
/// the bundle name.
pub const OWNER_KIND: &str = "BundleOwner";

/// Default number of attempts for the registration transaction.
pub const DEFAULT_REGISTRATION_ATTEMPTS: usize = 5;

/// Outcome of a read-path ownership check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ownership {
    /// The caller is the registered owner.
    Owned(BundleOwner),
    /// Nobody has registered the bundle yet.
    Unclaimed,
}

impl Ownership {
    pub fn is_owned(&self) -> bool {
        matches!(self, Ownership::Owned(_))
    }
}

/// Maps bundle names to their owners.
pub struct BundleRegistry {
    index: Arc<dyn MetadataIndex>,
    clock: Arc<dyn Clock>,
    attempts: usize,
}

impl BundleRegistry {
    pub fn new(index: Arc<dyn MetadataIndex>, clock: Arc<dyn Clock>, attempts: usize) -> Self {
        Self {
            index,
            clock,
            attempts: attempts.max(1),
        }
    }

    fn key(bundle: &BundleName) -> Key {
        Key::root(OWNER_KIND, bundle.as_str())
    }

    /// The registered owner record, if any.
    pub async fn lookup(&self, bundle: &BundleName) -> LedgerResult<Option<BundleOwner>> {
        match self.index.get(&Self::key(bundle)).await? {
            Some(row) => Ok(Some(row.decode()?)),
            None => Ok(None),
        }
    }

    /// Read-path check: fails with [`LedgerError::NotAllowed`] if the bundle
    /// belongs to someone other than `owner`.
    pub async fn check(&self, bundle: &BundleName, owner: &OwnerId) -> LedgerResult<Ownership> {
        match self.lookup(bundle).await? {
            Some(record) if record.is_owned_by(owner) => Ok(Ownership::Owned(record)),
            Some(_) => Err(LedgerError::NotAllowed {
                bundle: bundle.clone(),
            }),
            None => Ok(Ownership::Unclaimed),
        }
    }

    /// Register `owner` as the owner of `bundle`, or verify that it already is.
    ///
    /// The read and the insert run in one transaction, so concurrent first
    /// claims on the same name produce exactly one winner. Losers see the
    /// winner's row on retry and get [`LedgerError::NotAllowed`].
    pub async fn claim(&self, bundle: &BundleName, owner: &OwnerId) -> LedgerResult<BundleOwner> {
        let key = Self::key(bundle);

        for attempt in 1..=self.attempts {
            let mut tx = self.index.begin().await?;
            if let Some(row) = tx.get(&key).await? {
                let record: BundleOwner = row.decode()?;
                return if record.is_owned_by(owner) {
                    Ok(record)
                } else {
                    Err(LedgerError::NotAllowed {
                        bundle: bundle.clone(),
                    })
                };
            }

            let record = BundleOwner {
                bundle: bundle.clone(),
                owner: owner.clone(),
                registered_at: self.clock.now(),
            };
            tx.put(Row::encode(key.clone(), order_key(&record.registered_at), &record)?);

            match tx.commit().await {
                Ok(()) => {
                    info!(%bundle, owner = owner.as_str(), "bundle registered");
                    return Ok(record);
                }
                Err(IndexError::Conflict) => {
                    debug!(%bundle, attempt, "registration conflict; retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(LedgerError::RegistrationContended {
            bundle: bundle.clone(),
            attempts: self.attempts,
        })
    }
}

impl std::fmt::Debug for BundleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleRegistry")
            .field("attempts", &self.attempts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use haystack_index::{IndexResult, LocalIndex, Query, QueryPage, Transaction};
    use haystack_types::SystemClock;

    use super::*;

    /// Index whose transactions always lose the commit race.
    struct AlwaysConflicting {
        inner: LocalIndex,
        commits: Arc<AtomicUsize>,
    }

    struct ConflictingTransaction {
        inner: Box<dyn Transaction>,
        commits: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Transaction for ConflictingTransaction {
        async fn get(&mut self, key: &Key) -> IndexResult<Option<Row>> {
            self.inner.get(key).await
        }

        fn put(&mut self, row: Row) {
            self.inner.put(row);
        }

        async fn commit(self: Box<Self>) -> IndexResult<()> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            Err(IndexError::Conflict)
        }
    }

    #[async_trait]
    impl MetadataIndex for AlwaysConflicting {
        async fn get(&self, key: &Key) -> IndexResult<Option<Row>> {
            self.inner.get(key).await
        }

        async fn put(&self, row: Row) -> IndexResult<()> {
            self.inner.put(row).await
        }

        async fn delete(&self, key: &Key) -> IndexResult<bool> {
            self.inner.delete(key).await
        }

        async fn query(&self, query: &Query) -> IndexResult<QueryPage> {
            self.inner.query(query).await
        }

        async fn begin(&self) -> IndexResult<Box<dyn Transaction>> {
            Ok(Box::new(ConflictingTransaction {
                inner: self.inner.begin().await?,
                commits: Arc::clone(&self.commits),
            }))
        }
    }

    fn registry(index: Arc<dyn MetadataIndex>) -> BundleRegistry {
        BundleRegistry::new(index, Arc::new(SystemClock::new()), DEFAULT_REGISTRATION_ATTEMPTS)
    }

    fn bundle(name: &str) -> BundleName {
        BundleName::new(name).unwrap()
    }

    fn owner(id: &str) -> OwnerId {
        OwnerId::new(id).unwrap()
    }

    #[tokio::test]
    async fn first_claim_wins() {
        let registry = registry(Arc::new(LocalIndex::in_memory()));

        let record = registry.claim(&bundle("app"), &owner("alice")).await.unwrap();
        assert_eq!(record.owner, owner("alice"));

        // Re-claiming by the owner is a no-op that returns the original record.
        let again = registry.claim(&bundle("app"), &owner("alice")).await.unwrap();
        assert_eq!(again, record);

        let err = registry.claim(&bundle("app"), &owner("bob")).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotAllowed { .. }));
    }

    #[tokio::test]
    async fn check_reports_each_state() {
        let registry = registry(Arc::new(LocalIndex::in_memory()));
        assert_eq!(
            registry.check(&bundle("app"), &owner("alice")).await.unwrap(),
            Ownership::Unclaimed
        );

        registry.claim(&bundle("app"), &owner("alice")).await.unwrap();
        assert!(registry
            .check(&bundle("app"), &owner("alice"))
            .await
            .unwrap()
            .is_owned());
        assert!(matches!(
            registry.check(&bundle("app"), &owner("bob")).await,
            Err(LedgerError::NotAllowed { .. })
        ));
    }

    #[tokio::test]
    async fn bundles_are_independent() {
        let registry = registry(Arc::new(LocalIndex::in_memory()));
        registry.claim(&bundle("one"), &owner("alice")).await.unwrap();
        registry.claim(&bundle("two"), &owner("bob")).await.unwrap();
        assert!(registry.lookup(&bundle("three")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_claims_have_one_winner() {
        let registry = Arc::new(registry(Arc::new(LocalIndex::in_memory())));
        let name = bundle("contested");

        let mut handles = Vec::new();
        for i in 0..16 {
            let registry = Arc::clone(&registry);
            let name = name.clone();
            handles.push(tokio::spawn(async move {
                registry.claim(&name, &owner(&format!("user-{i}"))).await
            }));
        }

        let mut winners = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(record) => winners.push(record.owner),
                Err(LedgerError::NotAllowed { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(winners.len(), 1);

        let stored = registry.lookup(&name).await.unwrap().unwrap();
        assert_eq!(stored.owner, winners[0]);
    }

    #[tokio::test]
    async fn claim_gives_up_after_configured_attempts() {
        let commits = Arc::new(AtomicUsize::new(0));
        let index = Arc::new(AlwaysConflicting {
            inner: LocalIndex::in_memory(),
            commits: Arc::clone(&commits),
        });
        let registry = BundleRegistry::new(index, Arc::new(SystemClock::new()), 3);

        let err = registry.claim(&bundle("busy"), &owner("alice")).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::RegistrationContended { ref bundle, attempts: 3 } if bundle.as_str() == "busy"
        ));
        assert_eq!(commits.load(Ordering::SeqCst), 3);
        assert!(registry.lookup(&bundle("busy")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let commits = Arc::new(AtomicUsize::new(0));
        let index = Arc::new(AlwaysConflicting {
            inner: LocalIndex::in_memory(),
            commits: Arc::clone(&commits),
        });
        let registry = BundleRegistry::new(index, Arc::new(SystemClock::new()), 0);

        let err = registry.claim(&bundle("busy"), &owner("alice")).await.unwrap_err();
        assert!(matches!(err, LedgerError::RegistrationContended { attempts: 1, .. }));
        assert_eq!(commits.load(Ordering::SeqCst), 1);
    }
}
