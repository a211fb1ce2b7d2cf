//! Supply workflow: submission, approval transitions, reassignment and removal.
use super::catalog::PartyKind;
use super::error::StockError;
use super::ledger::{ApprovalState, InboundRecord};
use super::service::InventoryService;
use super::transition::{Transition, TransitionPlan};
use super::types::{INBOUND_HRP, TimeStamp, positive_quantity};
use super::utils::new_uuid_to_bech32;
use tracing::{info, instrument};

/// Reassignment of a supply record. `None` keeps the current value.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InboundUpdate {
    pub product_id: Option<String>,
    pub supplier_id: Option<String>,
}

impl InventoryService {
    /// Record incoming supply. The record starts Pending and contributes nothing
    /// until it is approved.
    #[instrument(skip(self), err)]
    pub fn submit_inbound(
        &self,
        product_id: &str,
        supplier_id: &str,
        quantity: i64,
    ) -> Result<String, StockError> {
        let quantity = positive_quantity(quantity)?;
        let record = InboundRecord::new(
            new_uuid_to_bech32(INBOUND_HRP)?,
            product_id.to_string(),
            supplier_id.to_string(),
            quantity,
        );

        self.unit_of_work(product_id, |tx| {
            tx.live_product(product_id)?;
            tx.require_party(supplier_id, PartyKind::Supplier)?;
            tx.save_inbound(&record)
        })?;

        info!(record_id = %record.id, "supply submitted");
        Ok(record.id)
    }

    /// Move a supply record to `requested`, optionally correcting its quantity.
    ///
    /// The stock change is the record's contribution after the transition minus
    /// its contribution before it. Requesting the current state with no
    /// quantity change writes nothing.
    #[instrument(skip(self), err)]
    pub fn set_approval_state(
        &self,
        record_id: &str,
        requested: ApprovalState,
        corrected_quantity: Option<i64>,
    ) -> Result<Transition, StockError> {
        let corrected_quantity = corrected_quantity.map(positive_quantity).transpose()?;

        let plan = self.unit_of_work(record_id, |tx| {
            let mut record = tx.inbound(record_id)?;
            let new_quantity = corrected_quantity.unwrap_or(record.quantity);
            let plan = TransitionPlan::new(record.state, record.quantity, requested, new_quantity);

            if plan.is_noop() {
                return Ok(plan);
            }

            if plan.stock_delta != 0 {
                // only approvals grow a supply contribution
                let mut product = if plan.stock_delta > 0 {
                    tx.live_product(&record.product_id)?
                } else {
                    tx.existing_product(&record.product_id)?
                };
                tx.adjust_stock(&mut product, plan.stock_delta)?;
            }

            record.state = requested;
            record.quantity = new_quantity;
            record.updated_at = TimeStamp::new();
            tx.save_inbound(&record)?;

            Ok(plan)
        })?;

        info!(
            transition = ?plan.transition,
            stock_delta = plan.stock_delta,
            "approval state applied"
        );
        Ok(plan.transition)
    }

    /// Point a supply record at another product and/or supplier. An approved
    /// record carries its contribution over to the new product.
    #[instrument(skip(self), err)]
    pub fn update_inbound(&self, record_id: &str, update: InboundUpdate) -> Result<(), StockError> {
        self.unit_of_work(record_id, |tx| {
            let mut record = tx.inbound(record_id)?;
            let mut changed = false;

            if let Some(supplier_id) = update.supplier_id.as_deref() {
                if supplier_id != record.supplier_id {
                    tx.require_party(supplier_id, PartyKind::Supplier)?;
                    record.supplier_id = supplier_id.to_string();
                    changed = true;
                }
            }

            if let Some(product_id) = update.product_id.as_deref() {
                if product_id != record.product_id {
                    let mut target = tx.live_product(product_id)?;
                    let contribution = record.contribution();

                    if contribution != 0 {
                        let mut source = tx.existing_product(&record.product_id)?;
                        tx.adjust_stock(&mut source, -contribution)?;
                        tx.adjust_stock(&mut target, contribution)?;
                    }
                    record.product_id = product_id.to_string();
                    changed = true;
                }
            }

            if changed {
                record.updated_at = TimeStamp::new();
                tx.save_inbound(&record)?;
            }
            Ok(())
        })
    }

    /// Soft delete a supply record, first taking back what it contributed.
    #[instrument(skip(self), err)]
    pub fn delete_inbound(&self, record_id: &str) -> Result<(), StockError> {
        self.unit_of_work(record_id, |tx| {
            let mut record = tx.inbound(record_id)?;
            let contribution = record.contribution();

            if contribution != 0 {
                let mut product = tx.existing_product(&record.product_id)?;
                tx.adjust_stock(&mut product, -contribution)?;
            }

            record.deleted = true;
            record.updated_at = TimeStamp::new();
            tx.save_inbound(&record)
        })?;

        info!(record_id, "supply removed");
        Ok(())
    }

    /// Convenience for the common Pending to Approved step.
    pub fn approve_inbound(&self, record_id: &str) -> Result<Transition, StockError> {
        self.set_approval_state(record_id, ApprovalState::Approved, None)
    }

    /// Convenience for rejecting a supply record.
    pub fn reject_inbound(&self, record_id: &str) -> Result<Transition, StockError> {
        self.set_approval_state(record_id, ApprovalState::Rejected, None)
    }
}
