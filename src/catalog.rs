use std::{collections::HashMap, path::Path};

use anyhow::Context;
use tokio::fs;

use crate::models::{ItemRef, ItemType, MenuItem};

/// Menu the reference service prices cart lines against.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    items: HashMap<ItemRef, MenuItem>,
}

impl Catalog {
    pub fn new(items: impl IntoIterator<Item = MenuItem>) -> Self {
        Self {
            items: items.into_iter().map(|item| (item.item, item)).collect(),
        }
    }

    /// Loads a JSON array of menu items.
    pub async fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .await
            .with_context(|| format!("reading catalog {}", path.display()))?;
        let items: Vec<MenuItem> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing catalog {}", path.display()))?;
        Ok(Self::new(items))
    }

    pub fn demo() -> Self {
        let dish = |id, name: &str, price, discount_percent| MenuItem {
            item: ItemRef::dish(id),
            name: name.to_string(),
            image: Some(format!("/images/dishes/{id}.jpg")),
            price,
            discount_percent,
            available: true,
        };
        let combo = |id, name: &str, price, discount_percent| MenuItem {
            item: ItemRef::combo(id),
            name: name.to_string(),
            image: Some(format!("/images/combos/{id}.jpg")),
            price,
            discount_percent,
            available: true,
        };
        Self::new([
            dish(1, "Beef Pho", 6500, 0),
            dish(2, "Spring Rolls", 3500, 10),
            dish(7, "Broken Rice", 5500, 0),
            dish(8, "Iced Coffee", 2500, 0),
            combo(1, "Family Set", 19900, 15),
            combo(2, "Lunch Combo", 8900, 0),
        ])
    }

    pub fn get(&self, item: ItemRef) -> Option<&MenuItem> {
        self.items.get(&item)
    }

    /// Menu sorted with dishes first, then by id.
    pub fn list(&self) -> Vec<MenuItem> {
        let mut items: Vec<MenuItem> = self.items.values().cloned().collect();
        items.sort_by_key(|item| (item.item.item_type == ItemType::Combo, item.item.item_id));
        items
    }
}
