//! Session-held cart.
//!
//! The cart lives in the visitor's session and is the source of truth for
//! what they intend to buy. The backend cart is a mirror pushed by
//! [`super::sync::CartSyncer`].

use larder_core::Price;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::warn;
use uuid::Uuid;

use crate::models::session::keys;

/// Largest quantity a single cart line may hold.
pub const MAX_LINE_QUANTITY: u32 = 99;

/// One product in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalCartLine {
    /// Product global ID; at most one line per product.
    pub product_id: String,
    /// Variant being bought.
    pub variant_id: String,
    pub handle: String,
    pub title: String,
    pub variant_title: String,
    pub unit_price: Price,
    /// Always at least 1.
    pub quantity: u32,
    pub selling_plan_id: Option<String>,
    pub image_url: Option<String>,
}

impl LocalCartLine {
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.times(self.quantity)
    }
}

/// A visitor's cart.
///
/// `revision` increases on every mutation so the sync layer can tell which
/// snapshot is newest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalCart {
    /// Random ID naming this cart across requests.
    pub token: String,
    pub lines: Vec<LocalCartLine>,
    pub revision: u64,
}

impl Default for LocalCart {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalCart {
    #[must_use]
    pub fn new() -> Self {
        Self {
            token: Uuid::new_v4().to_string(),
            lines: Vec::new(),
            revision: 0,
        }
    }

    /// Add a line, merging into an existing line for the same product.
    ///
    /// A merged line keeps its position, gains the added quantity, and takes
    /// the new variant, price and selling plan. Quantities are capped at
    /// [`MAX_LINE_QUANTITY`]. Adding zero units is a no-op.
    pub fn add(&mut self, line: LocalCartLine) {
        if line.quantity == 0 {
            return;
        }

        if let Some(existing) = self
            .lines
            .iter_mut()
            .find(|l| l.product_id == line.product_id)
        {
            let quantity = existing
                .quantity
                .saturating_add(line.quantity)
                .min(MAX_LINE_QUANTITY);
            *existing = LocalCartLine { quantity, ..line };
        } else {
            let quantity = line.quantity.min(MAX_LINE_QUANTITY);
            self.lines.push(LocalCartLine { quantity, ..line });
        }
        self.revision += 1;
    }

    /// Set a line's quantity; zero removes it.
    ///
    /// Returns `false` if the product is not in the cart.
    pub fn set_quantity(&mut self, product_id: &str, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove(product_id);
        }

        let quantity = quantity.min(MAX_LINE_QUANTITY);
        let Some(line) = self.lines.iter_mut().find(|l| l.product_id == product_id) else {
            return false;
        };
        if line.quantity != quantity {
            line.quantity = quantity;
            self.revision += 1;
        }
        true
    }

    /// Returns `false` if the product is not in the cart.
    pub fn remove(&mut self, product_id: &str) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        let removed = self.lines.len() != before;
        if removed {
            self.revision += 1;
        }
        removed
    }

    pub fn clear(&mut self) {
        if !self.lines.is_empty() {
            self.lines.clear();
            self.revision += 1;
        }
    }

    #[must_use]
    pub fn line(&self, product_id: &str) -> Option<&LocalCartLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.lines
            .iter()
            .fold(0, |sum, l| sum.saturating_add(l.quantity))
    }

    /// Sum of line totals; `None` when empty or when currencies differ.
    #[must_use]
    pub fn subtotal(&self) -> Option<Price> {
        let (first, rest) = self.lines.split_first()?;
        rest.iter()
            .try_fold(first.line_total(), |sum, l| sum.checked_add(&l.line_total()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    // =========================================================================
    // Session persistence
    // =========================================================================

    /// Load the cart from the session, or start an empty one.
    pub async fn load(session: &Session) -> Self {
        match session.get::<Self>(keys::CART).await {
            Ok(Some(cart)) => cart,
            Ok(None) => Self::new(),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable cart in session");
                Self::new()
            }
        }
    }

    /// Write the cart back to the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store rejects the write.
    pub async fn save(&self, session: &Session) -> Result<(), tower_sessions::session::Error> {
        session.insert(keys::CART, self).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::Arc;

    use larder_core::CurrencyCode;
    use tower_sessions::MemoryStore;

    use super::*;

    fn line(product: &str, variant: &str, cents: i64, quantity: u32) -> LocalCartLine {
        LocalCartLine {
            product_id: product.to_string(),
            variant_id: variant.to_string(),
            handle: product.to_lowercase(),
            title: product.to_string(),
            variant_title: "Default Title".to_string(),
            unit_price: Price::from_cents(cents, CurrencyCode::USD),
            quantity,
            selling_plan_id: None,
            image_url: None,
        }
    }

    #[test]
    fn test_add_merges_same_product() {
        let mut cart = LocalCart::new();
        cart.add(line("P1", "V1", 500, 1));
        cart.add(line("P2", "V9", 300, 1));

        let mut again = line("P1", "V2", 650, 2);
        again.selling_plan_id = Some("SP1".to_string());
        cart.add(again);

        assert_eq!(cart.lines.len(), 2);
        let merged = cart.line("P1").unwrap();
        assert_eq!(merged.quantity, 3);
        assert_eq!(merged.variant_id, "V2");
        assert_eq!(merged.unit_price, Price::from_cents(650, CurrencyCode::USD));
        assert_eq!(merged.selling_plan_id.as_deref(), Some("SP1"));
        assert_eq!(cart.lines[0].product_id, "P1");
        assert_eq!(cart.revision, 3);
    }

    #[test]
    fn test_add_caps_merged_quantity() {
        let mut cart = LocalCart::new();
        cart.add(line("P1", "V1", 500, 60));
        cart.add(line("P1", "V1", 500, 60));
        assert_eq!(cart.line("P1").unwrap().quantity, MAX_LINE_QUANTITY);

        cart.add(line("P1", "V1", 500, u32::MAX));
        assert_eq!(cart.line("P1").unwrap().quantity, MAX_LINE_QUANTITY);

        cart.add(line("P2", "V2", 300, 500));
        assert_eq!(cart.line("P2").unwrap().quantity, MAX_LINE_QUANTITY);

        cart.set_quantity("P2", 1000);
        assert_eq!(cart.line("P2").unwrap().quantity, MAX_LINE_QUANTITY);
        assert_eq!(cart.total_quantity(), 2 * MAX_LINE_QUANTITY);
    }

    #[test]
    fn test_add_zero_is_noop() {
        let mut cart = LocalCart::new();
        cart.add(line("P1", "V1", 500, 0));
        assert!(cart.is_empty());
        assert_eq!(cart.revision, 0);
    }

    #[test]
    fn test_set_quantity_zero_removes() {
        let mut cart = LocalCart::new();
        cart.add(line("P1", "V1", 500, 2));
        assert!(cart.set_quantity("P1", 5));
        assert_eq!(cart.total_quantity(), 5);

        assert!(cart.set_quantity("P1", 0));
        assert!(cart.is_empty());
        assert!(!cart.set_quantity("P1", 1));
    }

    #[test]
    fn test_set_same_quantity_keeps_revision() {
        let mut cart = LocalCart::new();
        cart.add(line("P1", "V1", 500, 2));
        let revision = cart.revision;
        assert!(cart.set_quantity("P1", 2));
        assert_eq!(cart.revision, revision);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cart = LocalCart::new();
        cart.add(line("P1", "V1", 500, 1));
        cart.add(line("P2", "V2", 500, 1));
        assert!(cart.remove("P1"));
        assert!(!cart.remove("P1"));
        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.revision, 4);
    }

    #[test]
    fn test_subtotal() {
        let mut cart = LocalCart::new();
        assert!(cart.subtotal().is_none());

        cart.add(line("P1", "V1", 450, 2));
        cart.add(line("P2", "V2", 199, 1));
        assert_eq!(cart.subtotal().unwrap().display(), "$10.99");

        let mut euro = line("P3", "V3", 100, 1);
        euro.unit_price = Price::from_cents(100, CurrencyCode::EUR);
        cart.add(euro);
        assert!(cart.subtotal().is_none());
    }

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(LocalCart::new().token, LocalCart::new().token);
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        let empty = LocalCart::load(&session).await;
        assert!(empty.is_empty());

        let mut cart = LocalCart::new();
        cart.add(line("P1", "V1", 500, 1));
        cart.save(&session).await.unwrap();

        let loaded = LocalCart::load(&session).await;
        assert_eq!(loaded, cart);
    }

    #[tokio::test]
    async fn test_corrupt_session_value_yields_empty_cart() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        session.insert(keys::CART, "not a cart").await.unwrap();
        assert!(LocalCart::load(&session).await.is_empty());
    }
}
