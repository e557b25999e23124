//! # Domain Types
//!
//! Core domain types for the sale transaction lifecycle.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                │
//! │                                                                     │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐   │
//! │  │    Product      │   │      Sale       │   │    SaleItem     │   │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │   │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │   │
//! │  │  barcode (key)  │   │  invoice_number │   │  product_id     │   │
//! │  │  price_cents    │   │  status/totals  │   │  qty × price    │   │
//! │  │  stock          │   │  items (owned)  │   │  − discount     │   │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for storage relations
//! - Business key: barcode for products, invoice number for sales
//!
//! ## Ownership
//! A `Sale` exclusively owns its ordered `SaleItem` lines. Lines carry a
//! product id and name snapshot, never a pointer back to the sale or a live
//! link to the catalog row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01% = 1/10000, so 2100 bps = 21%.
/// Integer basis points keep the tax multiply exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Product
// =============================================================================

/// A catalog product available for sale.
///
/// The sale lifecycle reads price and stock from here at add-time and writes
/// stock back only when a sale completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Barcode (EAN-13, UPC-A, etc.) - unique, immutable business key.
    pub barcode: String,

    /// Display name shown to the cashier and on the receipt.
    pub name: String,

    /// Optional description for product details.
    pub description: Option<String>,

    /// Unit price in cents.
    pub price_cents: i64,

    /// Current stock level.
    pub stock: i64,

    /// Whether the product is sellable (soft delete).
    pub is_active: bool,

    /// When the product was created.
    pub created_at: DateTime<Utc>,

    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,

    /// Optimistic-concurrency version, bumped on every write.
    pub version: i64,
}

impl Product {
    /// Returns the unit price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Checks whether `quantity` units can be sold from current stock.
    #[inline]
    pub fn can_sell(&self, quantity: i64) -> bool {
        self.stock >= quantity
    }
}

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a sale transaction.
///
/// ```text
///                ┌──────────────┐
///    create ───► │ IN_PROGRESS  │ ───► COMPLETED (stock debited)
///                │  (mutable)   │ ───► CANCELLED (no stock effect)
///                └──────────────┘
///
///    COMPLETED ──► REFUNDED   (reserved for post-completion adjustment,
///                              not produced by the lifecycle engine)
/// ```
///
/// `InProgress` is the only state in which lines may change. The other three
/// states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Sale is open on the register, lines being added.
    InProgress,
    /// Sale has been paid and finalized.
    Completed,
    /// Sale was abandoned before payment.
    Cancelled,
    /// Completed sale later reversed.
    Refunded,
}

impl SaleStatus {
    /// Terminal states accept no further transitions.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, SaleStatus::InProgress)
    }
}

impl Default for SaleStatus {
    fn default() -> Self {
        SaleStatus::InProgress
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How a completed sale was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    CreditCard,
    DebitCard,
    Transfer,
    Other,
}

// =============================================================================
// Sale Item
// =============================================================================

/// One product line within a sale.
///
/// Uses the snapshot pattern: unit price and name are frozen at the moment
/// the product is added, so later catalog edits never rewrite history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleItem {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// The catalog product this line sells.
    pub product_id: String,

    /// Product name at time of add (frozen).
    pub name_snapshot: String,

    /// Units sold. Always positive.
    pub quantity: i64,

    /// Unit price in cents at time of add (frozen).
    pub unit_price_cents: i64,

    /// Absolute discount on the line, in cents. Non-negative, zero by default.
    pub discount_cents: i64,

    /// quantity × unit price − discount.
    pub line_total_cents: i64,
}

impl SaleItem {
    /// Creates a new line from a product, freezing its current price and name.
    pub fn snapshot(product: &Product, quantity: i64) -> Self {
        let mut item = SaleItem {
            id: Uuid::new_v4().to_string(),
            product_id: product.id.clone(),
            name_snapshot: product.name.clone(),
            quantity,
            unit_price_cents: product.price_cents,
            discount_cents: 0,
            line_total_cents: 0,
        };
        item.recompute_total();
        item
    }

    /// Increases the quantity and recomputes the line total.
    pub fn add_quantity(&mut self, quantity: i64) {
        self.quantity += quantity;
        self.recompute_total();
    }

    /// Applies an absolute discount to the line.
    ///
    /// Rejected if it would drive the line total negative.
    pub fn set_discount(&mut self, discount: Money) -> crate::ValidationResult<()> {
        crate::validation::validate_discount_cents(
            discount.cents(),
            self.quantity * self.unit_price_cents,
        )?;
        self.discount_cents = discount.cents();
        self.recompute_total();
        Ok(())
    }

    /// Recomputes `line_total_cents` from quantity, price, and discount.
    fn recompute_total(&mut self) {
        self.line_total_cents = self.quantity * self.unit_price_cents - self.discount_cents;
    }

    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the line total as Money.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A sale transaction aggregate: one customer checkout.
///
/// ## Invariants
/// - `subtotal + tax == total` after every `recalculate`
/// - lines change only while `status == InProgress`
/// - lines are unique by `product_id`; adding the same product again merges
///   into the existing line
/// - insertion order of `items` is display order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sale {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Human-facing invoice number, `YYYYMMDD-NNNN`. Unique, immutable.
    pub invoice_number: String,

    /// When the sale was opened.
    pub sale_date: DateTime<Utc>,

    /// Identity of the operator who opened the sale.
    pub cashier_id: String,

    pub status: SaleStatus,

    /// Sum of line totals, in cents.
    pub subtotal_cents: i64,

    /// Tax on the subtotal, in cents.
    pub tax_cents: i64,

    /// subtotal + tax, in cents.
    pub total_cents: i64,

    /// Set only at completion.
    pub payment_method: Option<PaymentMethod>,

    pub customer_name: Option<String>,

    pub customer_tax_id: Option<String>,

    /// When the sale reached `Completed`.
    pub completed_at: Option<DateTime<Utc>>,

    /// When the sale was last written.
    pub updated_at: DateTime<Utc>,

    /// Optimistic-concurrency version, bumped on every write.
    pub version: i64,

    /// Owned lines, in display order.
    pub items: Vec<SaleItem>,
}

impl Sale {
    /// Opens a new, empty sale in `InProgress` with zero totals.
    pub fn new(
        id: impl Into<String>,
        invoice_number: impl Into<String>,
        cashier_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Sale {
            id: id.into(),
            invoice_number: invoice_number.into(),
            sale_date: now,
            cashier_id: cashier_id.into(),
            status: SaleStatus::InProgress,
            subtotal_cents: 0,
            tax_cents: 0,
            total_cents: 0,
            payment_method: None,
            customer_name: None,
            customer_tax_id: None,
            completed_at: None,
            updated_at: now,
            version: 0,
            items: Vec::new(),
        }
    }

    /// Whether lines may still be added or removed.
    #[inline]
    pub fn is_in_progress(&self) -> bool {
        self.status == SaleStatus::InProgress
    }

    /// Whether the sale has no lines.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Units of `product_id` already on the sale (0 if absent).
    pub fn quantity_of(&self, product_id: &str) -> i64 {
        self.items
            .iter()
            .find(|i| i.product_id == product_id)
            .map(|i| i.quantity)
            .unwrap_or(0)
    }

    /// Returns the line with the given item id, if present.
    pub fn line(&self, item_id: &str) -> Option<&SaleItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    /// Merges `quantity` of `product` into the sale.
    ///
    /// If a line for the product already exists its quantity grows; otherwise
    /// a new line is appended with the product's current price snapshotted
    /// and no discount. Returns the index of the affected line.
    ///
    /// Totals are NOT recomputed here; callers follow up with
    /// [`Sale::recalculate`].
    pub fn upsert_line(&mut self, product: &Product, quantity: i64) -> usize {
        if let Some(pos) = self.items.iter().position(|i| i.product_id == product.id) {
            self.items[pos].add_quantity(quantity);
            return pos;
        }

        self.items.push(SaleItem::snapshot(product, quantity));
        self.items.len() - 1
    }

    /// Removes the line with the given item id.
    ///
    /// Returns the removed line, or `None` if no line matches. Callers follow
    /// up with [`Sale::recalculate`].
    pub fn remove_line(&mut self, item_id: &str) -> Option<SaleItem> {
        let pos = self.items.iter().position(|i| i.id == item_id)?;
        Some(self.items.remove(pos))
    }

    /// Recomputes subtotal, tax, and total from the current lines.
    ///
    /// ```text
    /// subtotal = Σ line_total              (exact cents)
    /// tax      = subtotal × rate           (rounded half-up to a cent)
    /// total    = subtotal + tax
    /// ```
    pub fn recalculate(&mut self, tax_rate: TaxRate) {
        let subtotal: Money = self.items.iter().map(|i| i.line_total()).sum();
        let tax = subtotal.tax(tax_rate);

        self.subtotal_cents = subtotal.cents();
        self.tax_cents = tax.cents();
        self.total_cents = (subtotal + tax).cents();
    }

    /// Marks the sale as written at `now`.
    #[inline]
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    /// Returns the subtotal as Money.
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    /// Returns the tax amount as Money.
    #[inline]
    pub fn tax_amount(&self) -> Money {
        Money::from_cents(self.tax_cents)
    }

    /// Returns the grand total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
