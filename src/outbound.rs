//! Sell workflow: deduction on creation, edits relative to the existing
//! record, and cancellation.
use super::catalog::PartyKind;
use super::error::StockError;
use super::ledger::OutboundRecord;
use super::service::InventoryService;
use super::types::{OUTBOUND_HRP, TimeStamp, positive_quantity};
use super::utils::new_uuid_to_bech32;
use tracing::{info, instrument};

/// Edit of a sell record. `None` keeps the current value.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OutboundUpdate {
    pub product_id: Option<String>,
    pub quantity: Option<i64>,
    pub customer_id: Option<String>,
}

impl OutboundUpdate {
    pub fn quantity(quantity: i64) -> Self {
        Self {
            quantity: Some(quantity),
            ..Self::default()
        }
    }
    pub fn product(product_id: &str) -> Self {
        Self {
            product_id: Some(product_id.to_string()),
            ..Self::default()
        }
    }
    pub fn with_quantity(mut self, quantity: i64) -> Self {
        self.quantity = Some(quantity);
        self
    }
    pub fn with_customer(mut self, customer_id: &str) -> Self {
        self.customer_id = Some(customer_id.to_string());
        self
    }
}

/// What an applied update did to the stock caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundChange {
    Unchanged,
    /// Only non-stock fields were rewritten.
    Details,
    /// Same product, the quantity moved by the given delta on the cache.
    Quantity { stock_delta: i64 },
    /// The record now draws from another product.
    Moved,
}

impl InventoryService {
    /// Sell `quantity` units. Fails with `InsufficientStock` and writes nothing
    /// when the product does not hold enough.
    #[instrument(skip(self), err)]
    pub fn create_outbound(
        &self,
        product_id: &str,
        customer_id: &str,
        quantity: i64,
    ) -> Result<String, StockError> {
        let quantity = positive_quantity(quantity)?;
        let record = OutboundRecord::new(
            new_uuid_to_bech32(OUTBOUND_HRP)?,
            product_id.to_string(),
            customer_id.to_string(),
            quantity,
        );

        let remaining = self.unit_of_work(product_id, |tx| {
            tx.require_party(customer_id, PartyKind::Customer)?;
            let mut product = tx.live_product(product_id)?;
            tx.adjust_stock(&mut product, record.contribution())?;
            tx.save_outbound(&record)?;
            Ok(product.stock_quantity)
        })?;

        info!(record_id = %record.id, remaining, "sell recorded");
        Ok(record.id)
    }

    /// Edit a sell record. The stock effect is worked out against the record's
    /// current contribution: a quantity change on the same product applies the
    /// difference, a product change restores the old product and deducts from
    /// the new one, both in the same unit of work.
    #[instrument(skip(self), err)]
    pub fn update_outbound(
        &self,
        record_id: &str,
        update: OutboundUpdate,
    ) -> Result<OutboundChange, StockError> {
        let new_quantity = update.quantity.map(positive_quantity).transpose()?;

        let change = self.unit_of_work(record_id, |tx| {
            let mut record = tx.outbound(record_id)?;
            let old_quantity = record.quantity;
            let new_quantity = new_quantity.unwrap_or(old_quantity);
            let new_product = update
                .product_id
                .as_deref()
                .filter(|product_id| *product_id != record.product_id);
            let new_customer = update
                .customer_id
                .as_deref()
                .filter(|customer_id| *customer_id != record.customer_id);

            if let Some(customer_id) = new_customer {
                tx.require_party(customer_id, PartyKind::Customer)?;
                record.customer_id = customer_id.to_string();
            }

            let change = match new_product {
                Some(product_id) => {
                    let mut source = tx.existing_product(&record.product_id)?;
                    let mut target = tx.live_product(product_id)?;
                    tx.adjust_stock(&mut source, old_quantity as i64)?;
                    tx.adjust_stock(&mut target, -(new_quantity as i64))?;

                    record.product_id = product_id.to_string();
                    OutboundChange::Moved
                }
                None if new_quantity != old_quantity => {
                    let stock_delta = old_quantity as i64 - new_quantity as i64;
                    // selling more needs a live product, selling less never does
                    let mut product = if stock_delta < 0 {
                        tx.live_product(&record.product_id)?
                    } else {
                        tx.existing_product(&record.product_id)?
                    };
                    tx.adjust_stock(&mut product, stock_delta)?;
                    OutboundChange::Quantity { stock_delta }
                }
                None if new_customer.is_some() => OutboundChange::Details,
                None => return Ok(OutboundChange::Unchanged),
            };

            record.quantity = new_quantity;
            record.updated_at = TimeStamp::new();
            tx.save_outbound(&record)?;
            Ok(change)
        })?;

        info!(?change, "sell updated");
        Ok(change)
    }

    /// Give the record's quantity back to its product and soft delete it.
    #[instrument(skip(self), err)]
    pub fn cancel_outbound(&self, record_id: &str) -> Result<(), StockError> {
        self.unit_of_work(record_id, |tx| {
            let mut record = tx.outbound(record_id)?;
            let mut product = tx.existing_product(&record.product_id)?;
            tx.adjust_stock(&mut product, -record.contribution())?;

            record.deleted = true;
            record.updated_at = TimeStamp::new();
            tx.save_outbound(&record)
        })?;

        info!(record_id, "sell cancelled");
        Ok(())
    }
}
