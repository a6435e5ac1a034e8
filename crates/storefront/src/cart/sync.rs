//! Debounced mirroring of session carts to the commerce backend.
//!
//! Every cart mutation calls [`CartSyncer::schedule`]. Rapid mutations
//! coalesce: each one re-arms a per-cart timer, and only the newest snapshot
//! is pushed once the timer fires. [`CartSyncer::flush`] skips the wait and is
//! used before redirecting to checkout.
//!
//! Pushes for one cart are serialized by a per-token lock, and a snapshot
//! that is not newer than the last pushed revision is dropped. Failures are
//! recorded on the sync state and left for the next mutation or flush.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::store::{LocalCart, LocalCartLine};
use crate::shopify::{
    Cart, CartLine, CartLineInput, CartLineUpdateInput, ShopifyError, StorefrontClient,
};

/// Sync state is dropped after a week without activity.
const SYNC_STATE_IDLE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

// =============================================================================
// Backend seam
// =============================================================================

/// The remote cart operations a sync needs.
pub trait CartBackend: Send + Sync + 'static {
    fn create_cart(
        &self,
        lines: Vec<CartLineInput>,
    ) -> impl Future<Output = Result<Cart, ShopifyError>> + Send;

    /// `Ok(None)` when the cart has expired or never existed.
    fn fetch_cart(
        &self,
        cart_id: &str,
    ) -> impl Future<Output = Result<Option<Cart>, ShopifyError>> + Send;

    fn apply_diff(
        &self,
        cart_id: &str,
        diff: CartDiff,
    ) -> impl Future<Output = Result<Cart, ShopifyError>> + Send;
}

impl CartBackend for StorefrontClient {
    async fn create_cart(&self, lines: Vec<CartLineInput>) -> Result<Cart, ShopifyError> {
        Self::create_cart(self, lines).await
    }

    async fn fetch_cart(&self, cart_id: &str) -> Result<Option<Cart>, ShopifyError> {
        match self.get_cart(cart_id).await {
            Ok(cart) => Ok(Some(cart)),
            Err(ShopifyError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Removals first, then updates, then additions.
    async fn apply_diff(&self, cart_id: &str, diff: CartDiff) -> Result<Cart, ShopifyError> {
        let CartDiff {
            add,
            update,
            remove,
        } = diff;
        let mut cart = None;

        if !remove.is_empty() {
            cart = Some(self.remove_from_cart(cart_id, remove).await?);
        }
        if !update.is_empty() {
            cart = Some(self.update_cart_lines(cart_id, update).await?);
        }
        if !add.is_empty() {
            cart = Some(self.add_to_cart(cart_id, add).await?);
        }

        match cart {
            Some(cart) => Ok(cart),
            None => self.get_cart(cart_id).await,
        }
    }
}

// =============================================================================
// Diffing
// =============================================================================

/// Mutations that bring a remote cart in line with the local one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartDiff {
    pub add: Vec<CartLineInput>,
    pub update: Vec<CartLineUpdateInput>,
    /// Remote cart line IDs.
    pub remove: Vec<String>,
}

impl CartDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.update.is_empty() && self.remove.is_empty()
    }
}

fn line_input(line: &LocalCartLine) -> CartLineInput {
    CartLineInput {
        merchandise_id: line.variant_id.clone(),
        quantity: i64::from(line.quantity),
        selling_plan_id: line.selling_plan_id.clone(),
    }
}

/// Compute the mutations turning `remote` into `local`, matching by variant.
///
/// A remote line whose selling plan was dropped locally is removed and
/// re-added, since an update cannot clear the plan. Duplicate remote lines
/// for one variant beyond the first are removed.
#[must_use]
pub fn diff_lines(local: &[LocalCartLine], remote: &[CartLine]) -> CartDiff {
    let mut diff = CartDiff::default();
    let mut matched: HashSet<&str> = HashSet::new();

    for remote_line in remote {
        let variant = remote_line.merchandise.id.as_str();
        let wanted = local.iter().find(|l| l.variant_id == variant);

        let Some(wanted) = wanted.filter(|_| !matched.contains(variant)) else {
            diff.remove.push(remote_line.id.clone());
            continue;
        };
        matched.insert(variant);

        let quantity = i64::from(wanted.quantity);
        let plan_changed = wanted.selling_plan_id != remote_line.selling_plan_id;

        if plan_changed && wanted.selling_plan_id.is_none() {
            diff.remove.push(remote_line.id.clone());
            diff.add.push(line_input(wanted));
        } else if plan_changed || remote_line.quantity != quantity {
            diff.update.push(CartLineUpdateInput {
                id: remote_line.id.clone(),
                quantity,
                merchandise_id: None,
                selling_plan_id: wanted.selling_plan_id.clone().filter(|_| plan_changed),
            });
        }
    }

    diff.add.extend(
        local
            .iter()
            .filter(|l| !matched.contains(l.variant_id.as_str()))
            .map(line_input),
    );

    diff
}

// =============================================================================
// CartSyncer
// =============================================================================

/// What is known about the remote mirror of one cart.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncState {
    pub remote_id: Option<String>,
    pub checkout_url: Option<String>,
    /// Revision of the last snapshot pushed successfully.
    pub synced_revision: u64,
    pub last_error: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Debounces and serializes cart pushes to a [`CartBackend`].
pub struct CartSyncer<B> {
    inner: Arc<SyncerInner<B>>,
}

impl<B> Clone for CartSyncer<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct SyncerInner<B> {
    backend: B,
    debounce: Duration,
    timers: Mutex<HashMap<String, JoinHandle<()>>>,
    slots: Cache<String, Arc<Mutex<SyncState>>>,
}

impl<B: CartBackend> CartSyncer<B> {
    #[must_use]
    pub fn new(backend: B, debounce: Duration) -> Self {
        let slots = Cache::builder()
            .max_capacity(100_000)
            .time_to_idle(SYNC_STATE_IDLE)
            .build();

        Self {
            inner: Arc::new(SyncerInner {
                backend,
                debounce,
                timers: Mutex::new(HashMap::new()),
                slots,
            }),
        }
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    async fn slot(&self, token: &str) -> Arc<Mutex<SyncState>> {
        self.inner
            .slots
            .get_with(token.to_string(), async {
                Arc::new(Mutex::new(SyncState::default()))
            })
            .await
    }

    /// Record `cart` as the newest snapshot and (re)arm its timer.
    #[instrument(skip_all, fields(token = %cart.token, revision = cart.revision))]
    pub async fn schedule(&self, cart: &LocalCart) {
        let snapshot = cart.clone();
        let syncer = self.clone();
        let debounce = self.inner.debounce;

        let mut timers = self.inner.timers.lock().await;
        timers.retain(|_, handle| !handle.is_finished());
        if let Some(previous) = timers.remove(&cart.token) {
            previous.abort();
        }

        let timer = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            // Aborting the timer must not cancel a push already under way.
            tokio::spawn(async move {
                syncer.sync_now(&snapshot, false).await;
            });
        });
        timers.insert(cart.token.clone(), timer);
        debug!("Cart sync scheduled");
    }

    /// Cancel any pending timer and push `cart` now.
    ///
    /// A revision that was already pushed still has its remote cart fetched,
    /// so a cart the backend expired is recreated before checkout.
    #[instrument(skip_all, fields(token = %cart.token, revision = cart.revision))]
    pub async fn flush(&self, cart: &LocalCart) -> SyncState {
        if let Some(pending) = self.inner.timers.lock().await.remove(&cart.token) {
            pending.abort();
        }
        self.sync_now(cart, true).await
    }

    /// Whether a debounce timer is armed for this cart.
    pub async fn is_pending(&self, token: &str) -> bool {
        self.inner
            .timers
            .lock()
            .await
            .get(token)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Current sync state, if this cart was ever synced.
    pub async fn state(&self, token: &str) -> Option<SyncState> {
        let slot = self.inner.slots.get(token).await?;
        let state = slot.lock().await;
        Some(state.clone())
    }

    /// Push `cart` unless a newer revision already went out. With
    /// `recheck`, a snapshot equal to the synced revision is pushed again.
    async fn sync_now(&self, cart: &LocalCart, recheck: bool) -> SyncState {
        let slot = self.slot(&cart.token).await;
        let mut state = slot.lock().await;

        let stale = if recheck {
            cart.revision < state.synced_revision
        } else {
            cart.revision <= state.synced_revision
        };
        if stale {
            debug!(
                revision = cart.revision,
                synced = state.synced_revision,
                "Skipping stale cart snapshot"
            );
            return state.clone();
        }

        match self.push(cart, &mut state).await {
            Ok(()) => {
                state.synced_revision = cart.revision;
                state.last_error = None;
                state.last_synced_at = Some(Utc::now());
                info!(
                    token = %cart.token,
                    revision = cart.revision,
                    remote_id = state.remote_id.as_deref().unwrap_or("-"),
                    "Cart synced"
                );
            }
            Err(e) => {
                warn!(token = %cart.token, error = %e, "Cart sync failed");
                state.last_error = Some(e.to_string());
            }
        }

        state.clone()
    }

    async fn push(&self, cart: &LocalCart, state: &mut SyncState) -> Result<(), ShopifyError> {
        let backend = &self.inner.backend;

        let remote = match &state.remote_id {
            Some(id) => backend.fetch_cart(id).await?,
            None => None,
        };

        let Some(remote) = remote else {
            if state.remote_id.take().is_some() {
                info!(token = %cart.token, "Remote cart expired");
            }
            state.checkout_url = None;
            if cart.is_empty() {
                return Ok(());
            }
            let created = backend
                .create_cart(cart.lines.iter().map(line_input).collect())
                .await?;
            state.remote_id = Some(created.id);
            state.checkout_url = Some(created.checkout_url);
            return Ok(());
        };

        let diff = diff_lines(&cart.lines, &remote.lines);
        let updated = if diff.is_empty() {
            remote
        } else {
            backend.apply_diff(&remote.id, diff).await?
        };

        state.remote_id = Some(updated.id);
        state.checkout_url = Some(updated.checkout_url);
        Ok(())
    }
}
