//! JSON endpoints used by client-side scripts.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tower_sessions::Session;
use tracing::{instrument, warn};

use crate::cart::{LocalCart, SyncState};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CartLineJson {
    pub product_id: String,
    pub variant_id: String,
    pub handle: String,
    pub title: String,
    pub variant_title: String,
    pub quantity: u32,
    pub unit_price: String,
    pub line_total: String,
    pub selling_plan_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CartJson {
    pub token: String,
    pub revision: u64,
    pub lines: Vec<CartLineJson>,
    pub total_quantity: u32,
    pub subtotal: Option<String>,
    /// A debounced push is waiting to run.
    pub sync_pending: bool,
    pub sync: Option<SyncState>,
}

impl CartJson {
    fn new(cart: &LocalCart, sync_pending: bool, sync: Option<SyncState>) -> Self {
        Self {
            token: cart.token.clone(),
            revision: cart.revision,
            lines: cart
                .lines
                .iter()
                .map(|l| CartLineJson {
                    product_id: l.product_id.clone(),
                    variant_id: l.variant_id.clone(),
                    handle: l.handle.clone(),
                    title: l.title.clone(),
                    variant_title: l.variant_title.clone(),
                    quantity: l.quantity,
                    unit_price: l.unit_price.display(),
                    line_total: l.line_total().display(),
                    selling_plan_id: l.selling_plan_id.clone(),
                })
                .collect(),
            total_quantity: cart.total_quantity(),
            subtotal: cart.subtotal().map(|p| p.display()),
            sync_pending,
            sync,
        }
    }
}

/// The session cart and what is known about its backend mirror.
#[instrument(skip_all)]
pub async fn cart(State(state): State<AppState>, session: Session) -> Json<CartJson> {
    let cart = LocalCart::load(&session).await;
    let (pending, sync) = tokio::join!(
        state.cart_sync().is_pending(&cart.token),
        state.cart_sync().state(&cart.token),
    );
    Json(CartJson::new(&cart, pending, sync))
}

#[derive(Debug, Serialize)]
pub struct InventoryJson {
    pub variant_id: String,
    pub available_for_sale: bool,
    pub currently_not_in_stock: bool,
    pub quantity_available: Option<i64>,
}

/// Accept either a variant GID or its numeric tail.
fn variant_gid(raw: &str) -> String {
    if raw.starts_with("gid://") {
        raw.to_string()
    } else {
        format!("gid://shopify/ProductVariant/{raw}")
    }
}

/// Live stock for one variant.
#[instrument(skip(state))]
pub async fn inventory(
    State(state): State<AppState>,
    Path(variant_id): Path<String>,
) -> Response {
    let gid = variant_gid(variant_id.trim());
    match state
        .storefront()
        .get_variant_inventory(std::slice::from_ref(&gid))
        .await
    {
        Ok(found) => match found.into_iter().find(|i| i.variant_id == gid) {
            Some(inv) => Json(InventoryJson {
                variant_id: inv.variant_id,
                available_for_sale: inv.available_for_sale,
                currently_not_in_stock: inv.currently_not_in_stock,
                quantity_available: inv.quantity_available,
            })
            .into_response(),
            None => (StatusCode::NOT_FOUND, Json(serde_json::json!({"error": "Not found"})))
                .into_response(),
        },
        Err(e) if e.is_not_found() => {
            (StatusCode::NOT_FOUND, Json(serde_json::json!({"error": "Not found"}))).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Inventory lookup failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({"error": "Inventory unavailable"})),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_gid() {
        assert_eq!(variant_gid("123"), "gid://shopify/ProductVariant/123");
        assert_eq!(
            variant_gid("gid://shopify/ProductVariant/9"),
            "gid://shopify/ProductVariant/9"
        );
    }

    #[test]
    fn test_empty_cart_json() {
        let cart = LocalCart::new();
        let json = CartJson::new(&cart, false, None);
        assert_eq!(json.total_quantity, 0);
        assert!(json.subtotal.is_none());
        assert!(json.lines.is_empty());
    }
}
