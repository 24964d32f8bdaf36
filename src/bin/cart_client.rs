//! Drives the cart client against a running cart service:
//! `cart_client <branch_id> [dish|combo:<id>[x<qty>] ...]`.

use std::sync::Arc;

use anyhow::{Context, bail};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use restaurant_cart::{
    cart::{CartContext, HttpCartService},
    config::ClientConfig,
    models::ItemRef,
    storage::StorageManager,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,restaurant_cart=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let branch_id: i64 = args
        .next()
        .context("usage: cart_client <branch_id> [dish:<id>[x<qty>] ...]")?
        .parse()
        .context("branch_id must be a number")?;
    let items = args.map(|arg| parse_item(&arg)).collect::<anyhow::Result<Vec<_>>>()?;

    let config = ClientConfig::from_env()?;
    let storage = Arc::new(config.storage_adapter());
    let manager = Arc::new(StorageManager::new(Arc::clone(&storage), config.storage.clone()));
    let context = CartContext::new(Arc::new(HttpCartService::new(&config.api_url)), storage)
        .with_storage_manager(manager);

    if let Some(previous) = context.restore_branch() {
        tracing::info!(branch_id = previous, "restored branch from local storage");
    }
    context.set_branch(branch_id).await?;
    for (item, quantity) in items {
        context.add_item(item, quantity, None).await?;
    }

    let cart = context.snapshot().context("no cart loaded")?;
    println!("Cart {} for {:?} at branch {}", cart.id, cart.owner, cart.branch_id);
    for line in &cart.items {
        println!(
            "  #{} {} x{} = {} (discount {})",
            line.id, line.name, line.quantity, line.final_price, line.discount_amount
        );
    }
    println!("Total: {} items, {}", context.total_items(), context.total_amount());
    Ok(())
}

fn parse_item(arg: &str) -> anyhow::Result<(ItemRef, u32)> {
    let (kind, rest) = arg.split_once(':').context("expected <dish|combo>:<id>")?;
    let (id, quantity) = match rest.split_once('x') {
        Some((id, quantity)) => (id, quantity.parse().context("quantity")?),
        None => (rest, 1),
    };
    let id: i64 = id.parse().context("item id")?;
    let item = match kind {
        "dish" => ItemRef::dish(id),
        "combo" => ItemRef::combo(id),
        other => bail!("unknown item type {other}"),
    };
    Ok((item, quantity))
}
