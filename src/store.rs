use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

use crate::{
    error::{AppError, AppResult},
    models::{CartOwner, CartSnapshot},
};

/// Carts expire this long after their last update.
pub const CART_TTL_DAYS: i64 = 7;

#[derive(Debug, Default)]
struct CartTables {
    carts: HashMap<i64, CartSnapshot>,
    active: HashMap<(CartOwner, i64), i64>,
    lines: HashMap<i64, i64>,
    next_cart_id: i64,
    next_line_id: i64,
}

impl CartTables {
    fn deactivate(&mut self, cart_id: i64) {
        if let Some(cart) = self.carts.get_mut(&cart_id) {
            cart.is_active = false;
            self.active.remove(&(cart.owner.clone(), cart.branch_id));
            for line in &cart.items {
                self.lines.remove(&line.id);
            }
        }
    }
}

/// In-memory cart tables for the reference service, one active cart per
/// (owner, branch).
#[derive(Debug, Default)]
pub struct CartStore {
    tables: RwLock<CartTables>,
}

impl CartStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the live cart, deactivating it first if it has expired.
    pub fn active_cart(
        &self,
        owner: &CartOwner,
        branch_id: i64,
        now: DateTime<Utc>,
    ) -> Option<CartSnapshot> {
        let mut tables = self.tables.write();
        let cart_id = *tables.active.get(&(owner.clone(), branch_id))?;
        let expired = tables
            .carts
            .get(&cart_id)
            .is_none_or(|cart| cart.expires_at <= now);
        if expired {
            tracing::debug!(cart_id, "cart expired");
            tables.deactivate(cart_id);
            return None;
        }
        tables.carts.get(&cart_id).cloned()
    }

    /// Creates an empty cart unless a live one already exists.
    pub fn create_cart(&self, owner: &CartOwner, branch_id: i64, now: DateTime<Utc>) -> CartSnapshot {
        if let Some(cart) = self.active_cart(owner, branch_id, now) {
            return cart;
        }
        let mut tables = self.tables.write();
        tables.next_cart_id += 1;
        let cart = CartSnapshot {
            id: tables.next_cart_id,
            owner: owner.clone(),
            branch_id,
            items: Vec::new(),
            total_items: 0,
            total_amount: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
            expires_at: now + Duration::days(CART_TTL_DAYS),
        };
        tables.active.insert((owner.clone(), branch_id), cart.id);
        tables.carts.insert(cart.id, cart.clone());
        cart
    }

    pub fn cart_for_line(&self, line_id: i64) -> Option<i64> {
        self.tables.read().lines.get(&line_id).copied()
    }

    pub fn next_line_id(&self) -> i64 {
        let mut tables = self.tables.write();
        tables.next_line_id += 1;
        tables.next_line_id
    }

    /// Applies `change` to an active cart, then recomputes totals, refreshes
    /// timestamps and reindexes its lines. The cart is left untouched when
    /// `change` fails.
    pub fn modify<F>(&self, cart_id: i64, now: DateTime<Utc>, change: F) -> AppResult<CartSnapshot>
    where
        F: FnOnce(&mut CartSnapshot) -> AppResult<()>,
    {
        let mut tables = self.tables.write();
        let current = tables
            .carts
            .get(&cart_id)
            .filter(|cart| cart.is_active)
            .ok_or(AppError::NotFound)?;

        let mut cart = current.clone();
        let previous_lines: Vec<i64> = current.items.iter().map(|line| line.id).collect();
        change(&mut cart)?;
        cart.recompute_totals()?;
        cart.updated_at = now;
        cart.expires_at = now + Duration::days(CART_TTL_DAYS);

        for line_id in previous_lines {
            tables.lines.remove(&line_id);
        }
        for line in &cart.items {
            tables.lines.insert(line.id, cart.id);
        }
        tables.carts.insert(cart.id, cart.clone());
        Ok(cart)
    }
}
