//! Storefront API client.
//!
//! `reqwest` for transport, `graphql_client` request/response envelopes, and
//! a `moka` cache for catalog reads (5 minute TTL).

mod conversions;
pub mod queries;

use std::sync::Arc;
use std::time::Duration;

use graphql_client::{GraphQLQuery, Response};
use moka::future::Cache;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument};

use crate::config::ShopifyStorefrontConfig;
use crate::shopify::types::{
    Cart, CartLineInput, CartLineUpdateInput, Collection, CollectionConnection, Customer,
    CustomerAccessToken, Product, ProductConnection, ProductSortKey, VariantInventory,
};
use crate::shopify::{GraphQLError, GraphQLErrorLocation, ShopifyError};

use conversions::{
    convert_cart, convert_collection, convert_collection_connection, convert_customer,
    convert_inventory, convert_product, convert_product_card, convert_product_connection,
    convert_user_errors,
};
use queries::{
    AddToCart, CartMutationResponse, CreateCart, CustomerAccessTokenCreate,
    CustomerAccessTokenDelete, GetCart, GetCollectionByHandle, GetCollections, GetCustomer,
    GetProductByHandle, GetProductRecommendations, GetProducts, GetVariantInventory,
    RemoveFromCart, UpdateCartDiscountCodes, UpdateCartLines, add_to_cart, create_cart,
    customer_access_token_create, customer_access_token_delete, get_cart,
    get_collection_by_handle, get_collections, get_customer, get_product_by_handle,
    get_product_recommendations, get_products, get_variant_inventory, remove_from_cart,
    update_cart_discount_codes, update_cart_lines,
};

/// Catalog reads held in the client cache, keyed by operation and arguments.
#[derive(Debug, Clone)]
enum CacheValue {
    Product(Box<Product>),
    Products(ProductConnection),
    Recommendations(Vec<Product>),
    Collection(Box<Collection>),
    Collections(CollectionConnection),
}

/// Truncate a response body for logs and error messages.
fn snippet(body: &str, max: usize) -> String {
    body.chars().take(max).collect()
}

// =============================================================================
// StorefrontClient
// =============================================================================

/// Client for the commerce backend's Storefront API.
///
/// Cheap to clone; clones share the HTTP connection pool and the cache.
#[derive(Clone)]
pub struct StorefrontClient {
    inner: Arc<StorefrontClientInner>,
}

struct StorefrontClientInner {
    client: reqwest::Client,
    endpoint: String,
    access_token: SecretString,
    cache: Cache<String, CacheValue>,
}

impl StorefrontClient {
    #[must_use]
    pub fn new(config: &ShopifyStorefrontConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300))
            .build();

        Self {
            inner: Arc::new(StorefrontClientInner {
                client: reqwest::Client::new(),
                endpoint: config.endpoint(),
                access_token: config.storefront_private_token.clone(),
                cache,
            }),
        }
    }

    /// Execute a GraphQL operation and unwrap its `data`.
    async fn execute<Q: GraphQLQuery>(
        &self,
        variables: Q::Variables,
    ) -> Result<Q::ResponseData, ShopifyError> {
        let request_body = Q::build_query(variables);

        let response = self
            .inner
            .client
            .post(&self.inner.endpoint)
            .header(
                "Shopify-Storefront-Private-Token",
                self.inner.access_token.expose_secret(),
            )
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ShopifyError::RateLimited(retry_after));
        }

        let response_text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                operation = request_body.operation_name,
                body = %snippet(&response_text, 500),
                "Storefront API returned non-success status"
            );
            return Err(ShopifyError::GraphQL(vec![GraphQLError {
                message: format!("HTTP {status}: {}", snippet(&response_text, 200)),
                locations: vec![],
                path: vec![],
            }]));
        }

        let response: Response<Q::ResponseData> = match serde_json::from_str(&response_text) {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    operation = request_body.operation_name,
                    body = %snippet(&response_text, 500),
                    "Failed to parse Storefront API response"
                );
                return Err(ShopifyError::Parse(e));
            }
        };

        if let Some(errors) = response.errors
            && !errors.is_empty()
        {
            debug!(errors = ?errors, "GraphQL errors in response");

            return Err(ShopifyError::GraphQL(
                errors
                    .into_iter()
                    .map(|e| GraphQLError {
                        message: e.message,
                        locations: e
                            .locations
                            .unwrap_or_default()
                            .into_iter()
                            .map(|l| GraphQLErrorLocation {
                                line: i64::from(l.line),
                                column: i64::from(l.column),
                            })
                            .collect(),
                        path: e
                            .path
                            .unwrap_or_default()
                            .into_iter()
                            .map(|fragment| match fragment {
                                graphql_client::PathFragment::Key(s) => {
                                    serde_json::Value::String(s)
                                }
                                graphql_client::PathFragment::Index(i) => {
                                    serde_json::Value::Number(i.into())
                                }
                            })
                            .collect(),
                    })
                    .collect(),
            ));
        }

        response.data.ok_or_else(|| {
            tracing::error!(
                operation = request_body.operation_name,
                body = %snippet(&response_text, 500),
                "Storefront API response has no data and no errors"
            );
            ShopifyError::GraphQL(vec![GraphQLError {
                message: "No data in response".to_string(),
                locations: vec![],
                path: vec![],
            }])
        })
    }

    // =========================================================================
    // Product Methods
    // =========================================================================

    /// Get a product with variants, images and selling plans.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown handle, or the API error.
    #[instrument(skip(self), fields(handle = %handle))]
    pub async fn get_product_by_handle(&self, handle: &str) -> Result<Product, ShopifyError> {
        let cache_key = format!("product:{handle}");

        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let data = self
            .execute::<GetProductByHandle>(get_product_by_handle::Variables {
                handle: handle.to_string(),
                image_count: 10,
                variant_count: 50,
            })
            .await?;

        let product = data
            .product
            .map(convert_product)
            .ok_or_else(|| ShopifyError::NotFound(format!("Product not found: {handle}")))?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// Get a page of products, optionally filtered by a search query.
    ///
    /// Search results are not cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn get_products(
        &self,
        first: i64,
        after: Option<String>,
        query: Option<String>,
    ) -> Result<ProductConnection, ShopifyError> {
        let cache_key = format!("products:{first}:{}", after.as_deref().unwrap_or(""));

        if query.is_none()
            && let Some(CacheValue::Products(products)) = self.inner.cache.get(&cache_key).await
        {
            debug!("Cache hit for products");
            return Ok(products);
        }

        let sort_key = if query.is_some() {
            ProductSortKey::Relevance
        } else {
            ProductSortKey::BestSelling
        };

        let data = self
            .execute::<GetProducts>(get_products::Variables {
                first,
                after,
                query: query.clone(),
                sort_key: Some(sort_key),
                reverse: None,
            })
            .await?;

        let connection = convert_product_connection(data.products);

        if query.is_none() {
            self.inner
                .cache
                .insert(cache_key, CacheValue::Products(connection.clone()))
                .await;
        }

        Ok(connection)
    }

    /// Get related products for a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn get_product_recommendations(
        &self,
        product_id: &str,
    ) -> Result<Vec<Product>, ShopifyError> {
        let cache_key = format!("recommendations:{product_id}");

        if let Some(CacheValue::Recommendations(products)) =
            self.inner.cache.get(&cache_key).await
        {
            debug!("Cache hit for recommendations");
            return Ok(products);
        }

        let data = self
            .execute::<GetProductRecommendations>(get_product_recommendations::Variables {
                product_id: product_id.to_string(),
            })
            .await?;

        let products: Vec<Product> = data
            .product_recommendations
            .unwrap_or_default()
            .into_iter()
            .map(convert_product_card)
            .collect();

        self.inner
            .cache
            .insert(cache_key, CacheValue::Recommendations(products.clone()))
            .await;

        Ok(products)
    }

    /// Look up stock for a set of variants.
    ///
    /// IDs that do not resolve to a variant are dropped from the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(count = variant_ids.len()))]
    pub async fn get_variant_inventory(
        &self,
        variant_ids: &[String],
    ) -> Result<Vec<VariantInventory>, ShopifyError> {
        if variant_ids.is_empty() {
            return Ok(Vec::new());
        }

        let data = self
            .execute::<GetVariantInventory>(get_variant_inventory::Variables {
                ids: variant_ids.to_vec(),
            })
            .await?;

        Ok(convert_inventory(data.nodes))
    }

    // =========================================================================
    // Collection Methods
    // =========================================================================

    /// Get a collection with a page of its products.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown handle, or the API error.
    #[instrument(skip(self), fields(handle = %handle))]
    pub async fn get_collection_by_handle(
        &self,
        handle: &str,
        first: i64,
        after: Option<String>,
    ) -> Result<Collection, ShopifyError> {
        let cache_key = format!(
            "collection:{handle}:{first}:{}",
            after.as_deref().unwrap_or("")
        );

        if let Some(CacheValue::Collection(collection)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for collection");
            return Ok(*collection);
        }

        let data = self
            .execute::<GetCollectionByHandle>(get_collection_by_handle::Variables {
                handle: handle.to_string(),
                first,
                after,
            })
            .await?;

        let collection = data
            .collection
            .map(convert_collection)
            .ok_or_else(|| ShopifyError::NotFound(format!("Collection not found: {handle}")))?;

        self.inner
            .cache
            .insert(
                cache_key,
                CacheValue::Collection(Box::new(collection.clone())),
            )
            .await;

        Ok(collection)
    }

    /// Get a page of collections.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn get_collections(
        &self,
        first: i64,
        after: Option<String>,
    ) -> Result<CollectionConnection, ShopifyError> {
        let cache_key = format!("collections:{first}:{}", after.as_deref().unwrap_or(""));

        if let Some(CacheValue::Collections(collections)) = self.inner.cache.get(&cache_key).await
        {
            debug!("Cache hit for collections");
            return Ok(collections);
        }

        let data = self
            .execute::<GetCollections>(get_collections::Variables { first, after })
            .await?;

        let connection = convert_collection_connection(data.collections);

        self.inner
            .cache
            .insert(cache_key, CacheValue::Collections(connection.clone()))
            .await;

        Ok(connection)
    }

    // =========================================================================
    // Cart Methods (never cached)
    // =========================================================================

    /// Turn a cart mutation payload into the updated cart.
    fn mutation_cart(data: CartMutationResponse) -> Result<Cart, ShopifyError> {
        let payload = data
            .result
            .ok_or_else(|| ShopifyError::NotFound("Cart mutation returned no payload".into()))?;

        if !payload.user_errors.is_empty() {
            let errors = convert_user_errors(payload.user_errors);
            return Err(ShopifyError::from_user_errors(&errors));
        }

        payload
            .cart
            .map(convert_cart)
            .ok_or_else(|| ShopifyError::NotFound("Cart not found".to_string()))
    }

    /// Create a cart holding `lines`.
    ///
    /// # Errors
    ///
    /// Returns `UserError` if the backend rejects a line, or the API error.
    #[instrument(skip(self, lines), fields(line_count = lines.len()))]
    pub async fn create_cart(&self, lines: Vec<CartLineInput>) -> Result<Cart, ShopifyError> {
        let data = self
            .execute::<CreateCart>(create_cart::Variables {
                input: create_cart::CartInput { lines },
            })
            .await?;
        Self::mutation_cart(data)
    }

    /// Fetch a cart.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the cart expired or never existed.
    #[instrument(skip(self), fields(cart_id = %cart_id))]
    pub async fn get_cart(&self, cart_id: &str) -> Result<Cart, ShopifyError> {
        let data = self
            .execute::<GetCart>(get_cart::Variables {
                cart_id: cart_id.to_string(),
            })
            .await?;

        data.cart
            .map(convert_cart)
            .ok_or_else(|| ShopifyError::NotFound(format!("Cart not found: {cart_id}")))
    }

    /// Add lines to a cart.
    ///
    /// # Errors
    ///
    /// Returns `UserError` if the backend rejects a line, or the API error.
    #[instrument(skip(self, lines), fields(cart_id = %cart_id, line_count = lines.len()))]
    pub async fn add_to_cart(
        &self,
        cart_id: &str,
        lines: Vec<CartLineInput>,
    ) -> Result<Cart, ShopifyError> {
        let data = self
            .execute::<AddToCart>(add_to_cart::Variables {
                cart_id: cart_id.to_string(),
                lines,
            })
            .await?;
        Self::mutation_cart(data)
    }

    /// Change quantities (or variants) of existing cart lines.
    ///
    /// # Errors
    ///
    /// Returns `UserError` if the backend rejects an update, or the API error.
    #[instrument(skip(self, lines), fields(cart_id = %cart_id, line_count = lines.len()))]
    pub async fn update_cart_lines(
        &self,
        cart_id: &str,
        lines: Vec<CartLineUpdateInput>,
    ) -> Result<Cart, ShopifyError> {
        let data = self
            .execute::<UpdateCartLines>(update_cart_lines::Variables {
                cart_id: cart_id.to_string(),
                lines,
            })
            .await?;
        Self::mutation_cart(data)
    }

    /// Remove lines from a cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, line_ids), fields(cart_id = %cart_id, line_count = line_ids.len()))]
    pub async fn remove_from_cart(
        &self,
        cart_id: &str,
        line_ids: Vec<String>,
    ) -> Result<Cart, ShopifyError> {
        let data = self
            .execute::<RemoveFromCart>(remove_from_cart::Variables {
                cart_id: cart_id.to_string(),
                line_ids,
            })
            .await?;
        Self::mutation_cart(data)
    }

    /// Replace the discount codes on a cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(cart_id = %cart_id))]
    pub async fn update_discount_codes(
        &self,
        cart_id: &str,
        codes: Vec<String>,
    ) -> Result<Cart, ShopifyError> {
        let data = self
            .execute::<UpdateCartDiscountCodes>(update_cart_discount_codes::Variables {
                cart_id: cart_id.to_string(),
                discount_codes: codes,
            })
            .await?;
        Self::mutation_cart(data)
    }

    // =========================================================================
    // Customer Methods
    // =========================================================================

    /// Sign a customer in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `UserError` for bad credentials, or the API error.
    #[instrument(skip(self, password))]
    pub async fn customer_access_token_create(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<CustomerAccessToken, ShopifyError> {
        let data = self
            .execute::<CustomerAccessTokenCreate>(customer_access_token_create::Variables {
                input: customer_access_token_create::CustomerAccessTokenCreateInput {
                    email: email.to_string(),
                    password: password.expose_secret().to_string(),
                },
            })
            .await?;

        let payload = data.customer_access_token_create.ok_or_else(|| {
            ShopifyError::UserError("Sign-in returned no payload".to_string())
        })?;

        if !payload.customer_user_errors.is_empty() {
            let errors = convert_user_errors(payload.customer_user_errors);
            return Err(ShopifyError::from_user_errors(&errors));
        }

        payload
            .customer_access_token
            .map(|t| CustomerAccessToken {
                access_token: t.access_token,
                expires_at: t.expires_at,
            })
            .ok_or_else(|| ShopifyError::UserError("Unidentified customer".to_string()))
    }

    /// Revoke a customer access token.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or rejects the token.
    #[instrument(skip_all)]
    pub async fn customer_access_token_delete(&self, token: &str) -> Result<(), ShopifyError> {
        let data = self
            .execute::<CustomerAccessTokenDelete>(customer_access_token_delete::Variables {
                customer_access_token: token.to_string(),
            })
            .await?;

        match data.customer_access_token_delete {
            Some(payload) if !payload.user_errors.is_empty() => {
                let errors = convert_user_errors(payload.user_errors);
                Err(ShopifyError::from_user_errors(&errors))
            }
            _ => Ok(()),
        }
    }

    /// Get the signed-in customer with addresses and recent orders.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the token is invalid or expired.
    #[instrument(skip_all)]
    pub async fn get_customer(&self, token: &str) -> Result<Customer, ShopifyError> {
        let data = self
            .execute::<GetCustomer>(get_customer::Variables {
                customer_access_token: token.to_string(),
            })
            .await?;

        data.customer
            .map(convert_customer)
            .ok_or_else(|| ShopifyError::NotFound("Customer not found".to_string()))
    }
}
