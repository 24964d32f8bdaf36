use restaurant_cart::{catalog::Catalog, routes::create_app, state::AppState};

/// Serves the cart API on an ephemeral port and returns its `/api` base URL.
pub async fn spawn_server() -> anyhow::Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = create_app(AppState::new(Catalog::demo()));
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            eprintln!("test server stopped: {err}");
        }
    });
    Ok(format!("http://{addr}/api"))
}
