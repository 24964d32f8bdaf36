use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// A quantity or amount left the range its field can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cart quantity or amount is too large")]
pub struct AmountOverflow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Dish,
    Combo,
}

/// Reference to a catalog entry by id and kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct ItemRef {
    pub item_id: i64,
    pub item_type: ItemType,
}

impl ItemRef {
    pub fn dish(item_id: i64) -> Self {
        Self {
            item_id,
            item_type: ItemType::Dish,
        }
    }

    pub fn combo(item_id: i64) -> Self {
        Self {
            item_id,
            item_type: ItemType::Combo,
        }
    }
}

/// Who a cart belongs to: an authenticated account or an anonymous session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CartOwner {
    User(i64),
    Session(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CartLineItem {
    pub id: i64,
    pub item: ItemRef,
    pub name: String,
    pub image: Option<String>,
    pub quantity: u32,
    pub unit_price: i64,
    pub discount_amount: i64,
    pub final_price: i64,
    pub special_instructions: Option<String>,
}

impl CartLineItem {
    /// Recomputes `discount_amount` and `final_price` for the current quantity.
    pub fn reprice(&mut self, discount_percent: u8) -> Result<(), AmountOverflow> {
        let gross = self
            .unit_price
            .checked_mul(i64::from(self.quantity))
            .ok_or(AmountOverflow)?;
        let discount = gross
            .checked_mul(i64::from(discount_percent.min(100)))
            .ok_or(AmountOverflow)?
            / 100;
        self.discount_amount = discount.max(0);
        self.final_price = gross
            .checked_sub(self.discount_amount)
            .ok_or(AmountOverflow)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CartSnapshot {
    pub id: i64,
    pub owner: CartOwner,
    pub branch_id: i64,
    pub items: Vec<CartLineItem>,
    pub total_items: u32,
    pub total_amount: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CartSnapshot {
    pub fn recompute_totals(&mut self) -> Result<(), AmountOverflow> {
        let mut total_items: u32 = 0;
        let mut total_amount: i64 = 0;
        for line in &self.items {
            total_items = total_items.checked_add(line.quantity).ok_or(AmountOverflow)?;
            total_amount = total_amount
                .checked_add(line.final_price)
                .ok_or(AmountOverflow)?;
        }
        self.total_items = total_items;
        self.total_amount = total_amount;
        Ok(())
    }

    pub fn find_line(&self, item: ItemRef) -> Option<&CartLineItem> {
        self.items.iter().find(|line| line.item == item)
    }
}

/// A catalog entry served by the menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MenuItem {
    #[serde(flatten)]
    pub item: ItemRef,
    pub name: String,
    pub image: Option<String>,
    pub price: i64,
    #[serde(default)]
    pub discount_percent: u8,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

/// Simplified line kept in client-side storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCartItem {
    pub id: i64,
    #[serde(default)]
    pub item: Option<ItemRef>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(alias = "qty")]
    pub quantity: u32,
    #[serde(default)]
    pub unit_price: i64,
    #[serde(default)]
    pub special_instructions: Option<String>,
}

impl From<&CartLineItem> for StoredCartItem {
    fn from(line: &CartLineItem) -> Self {
        Self {
            id: line.id,
            item: Some(line.item),
            name: Some(line.name.clone()),
            quantity: line.quantity,
            unit_price: line.unit_price,
            special_instructions: line.special_instructions.clone(),
        }
    }
}

/// Record persisted by the storage manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCartPayload {
    pub items: Vec<StoredCartItem>,
    pub selected_branch_id: Option<i64>,
    #[serde(default)]
    pub last_updated: String,
    #[serde(default)]
    pub version: String,
}

impl StoredCartPayload {
    pub fn new(items: Vec<StoredCartItem>, selected_branch_id: Option<i64>) -> Self {
        Self {
            items,
            selected_branch_id,
            last_updated: String::new(),
            version: String::new(),
        }
    }

    pub fn from_snapshot(cart: &CartSnapshot) -> Self {
        Self::new(
            cart.items.iter().map(StoredCartItem::from).collect(),
            Some(cart.branch_id),
        )
    }
}
