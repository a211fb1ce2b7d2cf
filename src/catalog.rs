//! Catalog rows: products carrying the stock cache, and the parties that
//! supply or buy them.
use super::error::StockError;
use super::types::TimeStamp;
use chrono::Utc;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartyKind {
    #[n(0)]
    Supplier,
    #[n(1)]
    Customer,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Party {
    #[n(0)]
    pub id: String, // bech32, prefix depends on the kind
    #[n(1)]
    pub kind: PartyKind,
    #[n(2)]
    pub name: String,
    #[n(3)]
    pub deleted: bool,
}

impl Party {
    pub fn is_live(&self, kind: PartyKind) -> bool {
        self.kind == kind && !self.deleted
    }
}

/// A product row. `stock_quantity` is the cached on-hand quantity and only the
/// ledger workflows write it; `version` moves on every write of the row.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Product {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub unit_price: u64, // minor currency units
    #[n(3)]
    pub description: Option<String>,
    #[n(4)]
    pub category: Option<String>,
    #[n(5)]
    pub stock_quantity: u64,
    #[n(6)]
    pub version: u64,
    #[n(7)]
    pub created_at: TimeStamp<Utc>,
    #[n(8)]
    pub updated_at: TimeStamp<Utc>,
    #[n(9)]
    pub deleted: bool,
}

impl Product {
    /// Apply a signed change to the stock cache. Fails without touching the row
    /// when the result would be negative.
    pub fn apply_delta(&mut self, delta: i64) -> Result<u64, StockError> {
        let next = self.stock_quantity as i128 + delta as i128;
        if next < 0 {
            return Err(StockError::InsufficientStock {
                product_id: self.id.clone(),
                available: self.stock_quantity,
                requested: delta.unsigned_abs(),
            });
        }
        self.stock_quantity = u64::try_from(next).map_err(StockError::internal)?;
        self.touch();
        Ok(self.stock_quantity)
    }

    pub(crate) fn touch(&mut self) {
        self.version += 1;
        self.updated_at = TimeStamp::new();
    }
}

// used for registering products and editing their catalog fields
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProductDraft {
    name: Option<String>,
    unit_price: u64,
    description: Option<String>,
    category: Option<String>,
}

impl ProductDraft {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }
    pub fn set_unit_price(mut self, price: u64) -> Self {
        self.unit_price = price;
        self
    }
    pub fn set_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
    pub fn set_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    /// Checks the draft fields and builds a fresh product with an empty stock cache.
    pub fn validate_and_finalise(&self, id: String) -> Result<Product, StockError> {
        let name = self.checked_name()?;
        let now = TimeStamp::new();

        Ok(Product {
            id,
            name,
            unit_price: self.unit_price,
            description: self.description.clone(),
            category: self.category.clone(),
            stock_quantity: 0,
            version: 0,
            created_at: now.clone(),
            updated_at: now,
            deleted: false,
        })
    }

    /// Copy the catalog fields onto an existing product. The stock cache is left alone.
    pub fn apply_to(&self, product: &mut Product) -> Result<(), StockError> {
        product.name = self.checked_name()?;
        product.unit_price = self.unit_price;
        product.description = self.description.clone();
        product.category = self.category.clone();
        product.touch();
        Ok(())
    }

    fn checked_name(&self) -> Result<String, StockError> {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(name.to_string()),
            _ => Err(StockError::InvalidDetails("product name is not set".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget(stock: u64) -> Product {
        let mut product = ProductDraft::new()
            .set_name("widget")
            .validate_and_finalise("product_test".into())
            .unwrap();
        product.stock_quantity = stock;
        product
    }

    #[test]
    fn draft_requires_a_name() {
        let err = ProductDraft::new().set_unit_price(100).validate_and_finalise("p".into());
        assert!(matches!(err, Err(StockError::InvalidDetails(_))));

        let err = ProductDraft::new().set_name("   ").validate_and_finalise("p".into());
        assert!(matches!(err, Err(StockError::InvalidDetails(_))));
    }

    #[test]
    fn apply_delta_refuses_to_go_negative() {
        let mut product = widget(10);

        let err = product.apply_delta(-11).unwrap_err();
        assert_eq!(
            err,
            StockError::InsufficientStock {
                product_id: "product_test".into(),
                available: 10,
                requested: 11,
            }
        );
        // untouched on failure
        assert_eq!(product.stock_quantity, 10);
        assert_eq!(product.version, 0);

        assert_eq!(product.apply_delta(-10).unwrap(), 0);
        assert_eq!(product.version, 1);
    }

    #[test]
    fn catalog_edits_keep_the_stock_cache() {
        let mut product = widget(42);

        ProductDraft::new()
            .set_name("gadget")
            .set_unit_price(999)
            .apply_to(&mut product)
            .unwrap();

        assert_eq!(product.name, "gadget");
        assert_eq!(product.unit_price, 999);
        assert_eq!(product.stock_quantity, 42);
    }

    #[test]
    fn product_cbor_roundtrip() {
        let original = widget(7);

        let encoded = minicbor::to_vec(&original).unwrap();
        let decoded: Product = minicbor::decode(&encoded).unwrap();

        assert_eq!(original, decoded);
    }
}
