use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};

use crate::{
    cart::service::{CartService, CartServiceError},
    dto::cart::{AddToCartRequest, CartQuery, CreateCartRequest, UpdateCartItemRequest},
    models::{CartOwner, CartSnapshot},
    response::ApiResponse,
};

/// [`CartService`] over the JSON API, e.g. `http://127.0.0.1:3000/api`.
#[derive(Debug, Clone)]
pub struct HttpCartService {
    base_url: String,
    http: Client,
}

impl HttpCartService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, http: Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, http }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/carts{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<CartSnapshot, CartServiceError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(CartServiceError::NotFound);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiResponse<serde_json::Value>>(&text)
                .map(|body| body.message)
                .unwrap_or(text);
            return Err(CartServiceError::UnexpectedResponse {
                status: status.as_u16(),
                message,
            });
        }

        let body: ApiResponse<CartSnapshot> = response.json().await?;
        body.data.ok_or_else(|| CartServiceError::UnexpectedResponse {
            status: status.as_u16(),
            message: "response carried no cart".to_string(),
        })
    }
}

#[async_trait]
impl CartService for HttpCartService {
    async fn get_cart(
        &self,
        owner: CartOwner,
        branch_id: i64,
    ) -> Result<CartSnapshot, CartServiceError> {
        let query = CartQuery::new(&owner, branch_id);
        self.send(self.http.get(self.url("")).query(&query)).await
    }

    async fn create_cart(
        &self,
        owner: CartOwner,
        branch_id: i64,
    ) -> Result<CartSnapshot, CartServiceError> {
        let body = CreateCartRequest { owner, branch_id };
        self.send(self.http.post(self.url("")).json(&body)).await
    }

    async fn add_item(&self, request: AddToCartRequest) -> Result<CartSnapshot, CartServiceError> {
        self.send(self.http.post(self.url("/items")).json(&request))
            .await
    }

    async fn update_item(
        &self,
        line_id: i64,
        quantity: u32,
    ) -> Result<CartSnapshot, CartServiceError> {
        let body = UpdateCartItemRequest { quantity };
        self.send(
            self.http
                .put(self.url(&format!("/items/{line_id}")))
                .json(&body),
        )
        .await
    }

    async fn remove_item(&self, line_id: i64) -> Result<CartSnapshot, CartServiceError> {
        self.send(self.http.delete(self.url(&format!("/items/{line_id}"))))
            .await
    }

    async fn clear_cart(&self, cart_id: i64) -> Result<CartSnapshot, CartServiceError> {
        self.send(self.http.delete(self.url(&format!("/{cart_id}"))))
            .await
    }
}
