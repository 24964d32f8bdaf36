use std::{
    fmt,
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use parking_lot::{Mutex, MutexGuard};
use thiserror::Error;

use crate::{
    cart::{
        identity::{AuthUser, SessionIdentity},
        service::{CartService, CartServiceError},
    },
    dto::cart::AddToCartRequest,
    models::{CartOwner, CartSnapshot, ItemRef, ItemType, StoredCartPayload},
    storage::{StorageAdapter, StorageManager},
};

#[derive(Debug, Error)]
pub enum CartError {
    #[error("Please select a branch before adding items")]
    NoBranchSelected,

    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    #[error(transparent)]
    Service(#[from] CartServiceError),
}

#[derive(Debug, Default)]
struct CartState {
    cart: Option<CartSnapshot>,
    branch_id: Option<i64>,
    user: Option<AuthUser>,
    error: Option<String>,
    in_flight: usize,
    /// Sequence number of the response currently held in `cart`.
    applied: u64,
}

/// Client-side holder of the server's cart.
///
/// Every successful call replaces the whole local cart with the server's
/// answer. Calls are numbered as they are issued and a response is only
/// adopted when it is newer than the one already applied, so a slow early
/// call can never overwrite the result of a later one.
pub struct CartContext {
    service: Arc<dyn CartService>,
    identity: SessionIdentity,
    mirror: Option<Arc<StorageManager>>,
    state: Mutex<CartState>,
    issued: AtomicU64,
}

impl fmt::Debug for CartContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CartContext")
            .field("identity", &self.identity)
            .field("state", &self.state)
            .field("issued", &self.issued)
            .finish_non_exhaustive()
    }
}

impl CartContext {
    pub fn new(service: Arc<dyn CartService>, storage: Arc<StorageAdapter>) -> Self {
        Self {
            service,
            identity: SessionIdentity::new(storage),
            mirror: None,
            state: Mutex::new(CartState::default()),
            issued: AtomicU64::new(0),
        }
    }

    /// Mirrors every adopted cart into `manager`.
    pub fn with_storage_manager(mut self, manager: Arc<StorageManager>) -> Self {
        self.mirror = Some(manager);
        self
    }

    pub fn owner(&self) -> CartOwner {
        let user = self.state.lock().user;
        self.identity.owner(user.as_ref())
    }

    /// Picks up the branch remembered by the storage manager when none is
    /// selected yet. Does not touch the network.
    pub fn restore_branch(&self) -> Option<i64> {
        let stored = self.mirror.as_ref()?.load()?.selected_branch_id?;
        let mut state = self.state.lock();
        Some(*state.branch_id.get_or_insert(stored))
    }

    pub async fn set_branch(&self, branch_id: i64) -> Result<(), CartError> {
        {
            let mut state = self.state.lock();
            if state.branch_id != Some(branch_id) {
                state.branch_id = Some(branch_id);
                self.reset_locked(&mut state);
            }
        }
        self.refresh().await
    }

    /// Switches the owner between guest and account and reloads the cart.
    pub async fn set_user(&self, user: Option<AuthUser>) -> Result<(), CartError> {
        {
            let mut state = self.state.lock();
            if state.user == user {
                return Ok(());
            }
            state.user = user;
            self.reset_locked(&mut state);
        }
        self.refresh().await
    }

    pub async fn refresh(&self) -> Result<(), CartError> {
        let Some(branch_id) = self.branch_id() else {
            self.state.lock().cart = None;
            return Ok(());
        };
        let owner = self.owner();
        let service = Arc::clone(&self.service);
        self.apply("refresh", async move {
            match service.get_cart(owner.clone(), branch_id).await {
                Err(CartServiceError::NotFound) => {
                    tracing::debug!(branch_id, "no cart yet, creating one");
                    service.create_cart(owner, branch_id).await
                }
                other => other,
            }
        })
        .await
    }

    pub async fn add_item(
        &self,
        item: ItemRef,
        quantity: u32,
        special_instructions: Option<String>,
    ) -> Result<(), CartError> {
        let Some(branch_id) = self.branch_id() else {
            return self.fail(CartError::NoBranchSelected);
        };
        if quantity == 0 {
            return self.fail(CartError::InvalidQuantity);
        }
        let request = AddToCartRequest {
            owner: self.owner(),
            branch_id,
            item,
            quantity,
            special_instructions,
        };
        let service = Arc::clone(&self.service);
        self.apply("add_item", async move { service.add_item(request).await })
            .await
    }

    /// Sets a line's quantity. Zero is rejected; use [`Self::remove_item`].
    pub async fn update_item(&self, line_id: i64, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return self.fail(CartError::InvalidQuantity);
        }
        let service = Arc::clone(&self.service);
        self.apply("update_item", async move {
            service.update_item(line_id, quantity).await
        })
        .await
    }

    pub async fn remove_item(&self, line_id: i64) -> Result<(), CartError> {
        let service = Arc::clone(&self.service);
        self.apply("remove_item", async move { service.remove_item(line_id).await })
            .await
    }

    /// Empties the loaded cart. Nothing happens when no cart is loaded.
    pub async fn clear(&self) -> Result<(), CartError> {
        let Some(cart_id) = self.state.lock().cart.as_ref().map(|cart| cart.id) else {
            return Ok(());
        };
        let service = Arc::clone(&self.service);
        self.apply("clear", async move { service.clear_cart(cart_id).await })
            .await
    }

    pub fn snapshot(&self) -> Option<CartSnapshot> {
        self.state.lock().cart.clone()
    }

    pub fn branch_id(&self) -> Option<i64> {
        self.state.lock().branch_id
    }

    pub fn error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }

    pub fn clear_error(&self) {
        self.state.lock().error = None;
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().in_flight > 0
    }

    pub fn total_items(&self) -> u32 {
        self.with_items(|cart| cart.items.iter().map(|line| line.quantity).sum())
    }

    pub fn total_amount(&self) -> i64 {
        self.with_items(|cart| cart.items.iter().map(|line| line.final_price).sum())
    }

    pub fn is_empty(&self) -> bool {
        self.total_items() == 0
    }

    /// Quantity across every line holding this catalog item.
    pub fn item_quantity(&self, item_id: i64, item_type: ItemType) -> u32 {
        let item = ItemRef { item_id, item_type };
        self.with_items(|cart| {
            cart.items
                .iter()
                .filter(|line| line.item == item)
                .map(|line| line.quantity)
                .sum()
        })
    }

    pub fn contains_item(&self, item_id: i64, item_type: ItemType) -> bool {
        let item = ItemRef { item_id, item_type };
        self.with_items(|cart| cart.find_line(item).is_some())
    }

    fn with_items<R: Default>(&self, read: impl FnOnce(&CartSnapshot) -> R) -> R {
        self.state.lock().cart.as_ref().map(read).unwrap_or_default()
    }

    /// Drops the current cart and every response still in flight for it.
    fn reset_locked(&self, state: &mut CartState) {
        state.cart = None;
        state.error = None;
        state.applied = self.issued.load(Ordering::SeqCst);
    }

    fn fail(&self, err: CartError) -> Result<(), CartError> {
        tracing::debug!(error = %err, "cart call rejected locally");
        self.state.lock().error = Some(err.to_string());
        Err(err)
    }

    async fn apply<F>(&self, operation: &'static str, call: F) -> Result<(), CartError>
    where
        F: Future<Output = Result<CartSnapshot, CartServiceError>>,
    {
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let pending = InFlight::enter(&self.state);

        let result = call.await;

        let adopted = {
            let mut state = pending.finish();
            match result {
                Ok(cart) if seq > state.applied => {
                    state.applied = seq;
                    state.error = None;
                    state.cart = Some(cart.clone());
                    cart
                }
                Ok(_) => {
                    tracing::debug!(operation, seq, applied = state.applied, "discarding stale cart response");
                    return Ok(());
                }
                Err(err) if seq > state.applied => {
                    tracing::warn!(operation, error = %err, "cart request failed");
                    state.error = Some(err.to_string());
                    return Err(err.into());
                }
                Err(err) => {
                    tracing::debug!(operation, seq, applied = state.applied, error = %err, "stale cart request failed");
                    return Err(err.into());
                }
            }
        };

        if let Some(manager) = &self.mirror {
            manager.save(StoredCartPayload::from_snapshot(&adopted));
        }
        Ok(())
    }
}

/// Counts one call in `in_flight` until it finishes or its future is dropped.
struct InFlight<'a>(&'a Mutex<CartState>);

impl<'a> InFlight<'a> {
    fn enter(state: &'a Mutex<CartState>) -> Self {
        state.lock().in_flight += 1;
        Self(state)
    }

    /// Leaves the count and hands back the locked state.
    fn finish(self) -> MutexGuard<'a, CartState> {
        let mut state = self.0.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        std::mem::forget(self);
        state
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.0.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use chrono::Utc;
    use tokio::sync::oneshot;

    use super::*;
    use crate::{
        cart::service::MockCartService,
        models::CartLineItem,
        storage::{StorageConfig, StorageType},
    };

    fn cart(lines: &[(i64, ItemRef, u32)]) -> CartSnapshot {
        let now = Utc::now();
        let mut cart = CartSnapshot {
            id: 10,
            owner: CartOwner::Session("guest".into()),
            branch_id: 1,
            items: lines
                .iter()
                .map(|&(id, item, quantity)| {
                    let mut line = CartLineItem {
                        id,
                        item,
                        name: format!("item {}", item.item_id),
                        image: None,
                        quantity,
                        unit_price: 1000,
                        discount_amount: 0,
                        final_price: 0,
                        special_instructions: None,
                    };
                    line.reprice(0).expect("test prices fit");
                    line
                })
                .collect(),
            total_items: 0,
            total_amount: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
            expires_at: now,
        };
        cart.recompute_totals().expect("test totals fit");
        cart
    }

    fn context(mock: MockCartService) -> CartContext {
        CartContext::new(Arc::new(mock), Arc::new(StorageAdapter::in_memory()))
    }

    fn mock_with_cart(initial: CartSnapshot) -> MockCartService {
        let mut mock = MockCartService::new();
        mock.expect_get_cart()
            .returning(move |_, _| Ok(initial.clone()));
        mock
    }

    #[tokio::test]
    async fn add_without_branch_never_calls_service() {
        let mut mock = MockCartService::new();
        mock.expect_add_item().never();
        let ctx = context(mock);

        let result = ctx.add_item(ItemRef::dish(7), 1, None).await;

        assert!(matches!(result, Err(CartError::NoBranchSelected)));
        assert_eq!(ctx.snapshot(), None);
        assert_eq!(
            ctx.error().as_deref(),
            Some("Please select a branch before adding items")
        );
    }

    #[tokio::test]
    async fn failed_mutation_keeps_previous_cart() -> anyhow::Result<()> {
        let mut mock = mock_with_cart(cart(&[(1, ItemRef::dish(7), 2)]));
        mock.expect_add_item().returning(|_| {
            Err(CartServiceError::UnexpectedResponse {
                status: 503,
                message: "unavailable".into(),
            })
        });
        let ctx = context(mock);
        ctx.set_branch(1).await?;
        let before = serde_json::to_vec(&ctx.snapshot())?;

        let result = ctx.add_item(ItemRef::combo(1), 1, None).await;

        assert!(matches!(result, Err(CartError::Service(_))));
        assert_eq!(serde_json::to_vec(&ctx.snapshot())?, before);
        assert!(ctx.error().is_some());
        assert!(!ctx.is_loading());
        Ok(())
    }

    #[tokio::test]
    async fn refresh_creates_missing_cart_silently() -> anyhow::Result<()> {
        let mut mock = MockCartService::new();
        mock.expect_get_cart()
            .times(1)
            .returning(|_, _| Err(CartServiceError::NotFound));
        mock.expect_create_cart()
            .times(1)
            .returning(|_, _| Ok(cart(&[])));
        let ctx = context(mock);

        ctx.set_branch(1).await?;

        assert_eq!(ctx.error(), None);
        assert!(ctx.snapshot().is_some());
        assert!(ctx.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn derived_reads_scan_current_lines() -> anyhow::Result<()> {
        let ctx = context(mock_with_cart(cart(&[
            (1, ItemRef::dish(7), 2),
            (2, ItemRef::combo(7), 1),
            (3, ItemRef::dish(8), 3),
        ])));
        ctx.set_branch(1).await?;

        assert_eq!(ctx.total_items(), 6);
        assert_eq!(ctx.total_amount(), 6000);
        assert_eq!(ctx.item_quantity(7, ItemType::Dish), 2);
        assert_eq!(ctx.item_quantity(7, ItemType::Combo), 1);
        assert!(ctx.contains_item(8, ItemType::Dish));
        assert!(!ctx.contains_item(8, ItemType::Combo));
        assert!(!ctx.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn zero_quantity_and_empty_clear_stay_local() -> anyhow::Result<()> {
        let mut mock = MockCartService::new();
        mock.expect_update_item().never();
        mock.expect_clear_cart().never();
        let ctx = context(mock);

        assert!(matches!(
            ctx.update_item(1, 0).await,
            Err(CartError::InvalidQuantity)
        ));
        ctx.clear().await?;
        assert_eq!(ctx.snapshot(), None);
        Ok(())
    }

    #[tokio::test]
    async fn guest_owner_switches_to_account() -> anyhow::Result<()> {
        let mut mock = MockCartService::new();
        mock.expect_get_cart()
            .withf(|owner, branch| matches!(owner, CartOwner::Session(_)) && *branch == 1)
            .times(1)
            .returning(|_, _| Ok(cart(&[])));
        mock.expect_get_cart()
            .withf(|owner, branch| *owner == CartOwner::User(5) && *branch == 1)
            .times(1)
            .returning(|_, _| Ok(cart(&[(1, ItemRef::dish(1), 1)])));
        let ctx = context(mock);

        ctx.set_branch(1).await?;
        assert!(ctx.is_empty());

        ctx.set_user(Some(AuthUser { user_id: 5 })).await?;
        assert_eq!(ctx.owner(), CartOwner::User(5));
        assert_eq!(ctx.total_items(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn adopted_cart_is_mirrored_to_storage() -> anyhow::Result<()> {
        let mut mock = mock_with_cart(cart(&[]));
        mock.expect_add_item()
            .returning(|_| Ok(cart(&[(1, ItemRef::dish(7), 2)])));
        let storage = Arc::new(StorageAdapter::in_memory());
        let manager = Arc::new(StorageManager::new(
            Arc::clone(&storage),
            StorageConfig {
                primary_storage: StorageType::Memory,
                auto_save: false,
                ..StorageConfig::default()
            },
        ));
        let ctx = CartContext::new(Arc::new(mock), storage).with_storage_manager(Arc::clone(&manager));

        ctx.set_branch(1).await?;
        ctx.add_item(ItemRef::dish(7), 2, None).await?;

        let stored = manager.load().expect("mirrored payload");
        assert_eq!(stored.selected_branch_id, Some(1));
        assert_eq!(stored.items.len(), 1);
        assert_eq!(stored.items[0].quantity, 2);

        let restored = CartContext::new(Arc::new(MockCartService::new()), Arc::new(StorageAdapter::in_memory()))
            .with_storage_manager(manager);
        assert_eq!(restored.restore_branch(), Some(1));
        Ok(())
    }

    /// Answers `add_item` calls with whatever the test sends down the gates,
    /// in the order the calls were made.
    struct GatedService {
        gates: Mutex<VecDeque<oneshot::Receiver<CartSnapshot>>>,
    }

    #[async_trait]
    impl CartService for GatedService {
        async fn get_cart(&self, _: CartOwner, _: i64) -> Result<CartSnapshot, CartServiceError> {
            Err(CartServiceError::NotFound)
        }

        async fn create_cart(&self, _: CartOwner, _: i64) -> Result<CartSnapshot, CartServiceError> {
            Err(CartServiceError::NotFound)
        }

        async fn add_item(&self, _: AddToCartRequest) -> Result<CartSnapshot, CartServiceError> {
            let gate = self.gates.lock().pop_front().expect("a gate per call");
            gate.await.map_err(|_| CartServiceError::UnexpectedResponse {
                status: 0,
                message: "gate dropped".into(),
            })
        }

        async fn update_item(&self, _: i64, _: u32) -> Result<CartSnapshot, CartServiceError> {
            Err(CartServiceError::NotFound)
        }

        async fn remove_item(&self, _: i64) -> Result<CartSnapshot, CartServiceError> {
            Err(CartServiceError::NotFound)
        }

        async fn clear_cart(&self, _: i64) -> Result<CartSnapshot, CartServiceError> {
            Err(CartServiceError::NotFound)
        }
    }

    #[tokio::test]
    async fn later_issued_add_wins_even_if_it_resolves_first() {
        let (first_tx, first_rx) = oneshot::channel();
        let (second_tx, second_rx) = oneshot::channel();
        let service = GatedService {
            gates: Mutex::new(VecDeque::from([first_rx, second_rx])),
        };
        let ctx = CartContext::new(Arc::new(service), Arc::new(StorageAdapter::in_memory()));
        ctx.state.lock().branch_id = Some(1);

        let release = async {
            second_tx
                .send(cart(&[(1, ItemRef::dish(7), 2)]))
                .expect("second receiver alive");
            tokio::task::yield_now().await;
            first_tx
                .send(cart(&[(1, ItemRef::dish(7), 1)]))
                .expect("first receiver alive");
        };
        let (first, second, ()) = tokio::join!(
            ctx.add_item(ItemRef::dish(7), 1, None),
            ctx.add_item(ItemRef::dish(7), 1, None),
            release
        );

        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(ctx.item_quantity(7, ItemType::Dish), 2);
        assert!(!ctx.is_loading());
    }

    #[tokio::test]
    async fn stale_failure_leaves_no_error_behind() {
        let (first_tx, first_rx) = oneshot::channel();
        let (second_tx, second_rx) = oneshot::channel();
        let service = GatedService {
            gates: Mutex::new(VecDeque::from([first_rx, second_rx])),
        };
        let ctx = CartContext::new(Arc::new(service), Arc::new(StorageAdapter::in_memory()));
        ctx.state.lock().branch_id = Some(1);

        let release = async {
            second_tx
                .send(cart(&[(1, ItemRef::dish(7), 1)]))
                .expect("second receiver alive");
            tokio::task::yield_now().await;
            // the first call now fails after the second was adopted
            drop(first_tx);
        };
        let (first, second, ()) = tokio::join!(
            ctx.add_item(ItemRef::dish(7), 1, None),
            ctx.add_item(ItemRef::dish(7), 1, None),
            release
        );

        assert!(matches!(
            first,
            Err(CartError::Service(CartServiceError::UnexpectedResponse { status: 0, .. }))
        ));
        assert!(second.is_ok());
        assert_eq!(ctx.error(), None);
        assert_eq!(ctx.item_quantity(7, ItemType::Dish), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_call_stops_counting_as_loading() {
        let (_held_tx, rx) = oneshot::channel();
        let service = GatedService {
            gates: Mutex::new(VecDeque::from([rx])),
        };
        let ctx = CartContext::new(Arc::new(service), Arc::new(StorageAdapter::in_memory()));
        ctx.state.lock().branch_id = Some(1);

        let timed_out = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            ctx.add_item(ItemRef::dish(7), 1, None),
        )
        .await;

        assert!(timed_out.is_err());
        assert!(!ctx.is_loading());
    }
}
