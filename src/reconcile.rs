//! Reconciliation of the stock cache against the ledger.
//!
//! The ledger is the ground truth: a product's stock is the sum of its
//! approved live supply minus the sum of its live sells. Recomputing scans the
//! ledger outside of a transaction, then writes the result only if the
//! product row has not moved since the scan began. Every workflow that
//! changes a product's contribution bumps its version, so an unchanged
//! version means the scan saw a consistent ledger.
use super::error::StockError;
use super::service::InventoryService;
use tracing::{debug, info, instrument, warn};

/// Cached versus recomputed stock for one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockReport {
    pub product_id: String,
    pub cached: u64,
    pub computed: u64,
}

impl StockReport {
    pub fn is_consistent(&self) -> bool {
        self.cached == self.computed
    }
}

impl InventoryService {
    /// Rebuild the product's stock cache from the ledger and return it.
    #[instrument(skip(self), err)]
    pub fn recompute_stock(&self, product_id: &str) -> Result<u64, StockError> {
        self.recompute_with(product_id, |service| service.computed_stock(product_id))
    }

    /// Recompute loop around a ledger scan. A write-back that finds the
    /// product moved since the scan started rescans, up to the retry budget.
    fn recompute_with<S>(&self, product_id: &str, scan: S) -> Result<u64, StockError>
    where
        S: Fn(&Self) -> Result<u64, StockError>,
    {
        let max_attempts = self.config().max_conflict_retries + 1;

        for attempt in 1..=max_attempts {
            let observed = self
                .store()
                .product(product_id)?
                .ok_or_else(|| StockError::ProductNotFound(product_id.to_string()))?;
            let computed = scan(self)?;

            let outcome = self.unit_of_work(product_id, |tx| {
                let mut product = tx.existing_product(product_id)?;
                if product.version != observed.version {
                    return Err(StockError::Conflict {
                        scope: product_id.to_string(),
                        attempts: attempt,
                    });
                }
                if product.stock_quantity != computed {
                    warn!(
                        product_id,
                        cached = product.stock_quantity,
                        computed,
                        "stock cache drifted from ledger, correcting"
                    );
                    product.stock_quantity = computed;
                    product.touch();
                    tx.save_product(&product)?;
                }
                Ok(computed)
            });

            match outcome {
                Err(StockError::Conflict { .. }) if attempt < max_attempts => {
                    debug!(product_id, attempt, "ledger moved during recompute, rescanning");
                }
                other => return other,
            }
        }

        Err(StockError::Conflict {
            scope: product_id.to_string(),
            attempts: max_attempts,
        })
    }

    /// Compare the cache with the ledger without writing anything.
    pub fn verify_stock(&self, product_id: &str) -> Result<StockReport, StockError> {
        let product = self
            .store()
            .product(product_id)?
            .ok_or_else(|| StockError::ProductNotFound(product_id.to_string()))?;

        Ok(StockReport {
            product_id: product.id,
            cached: product.stock_quantity,
            computed: self.computed_stock(product_id)?,
        })
    }

    /// Consistency audit over every product, removed ones included.
    #[instrument(skip(self), err)]
    pub fn audit(&self) -> Result<Vec<StockReport>, StockError> {
        let mut reports = Vec::new();
        for product in self.store().products()? {
            reports.push(self.verify_stock(&product.id)?);
        }

        let drifted = reports.iter().filter(|r| !r.is_consistent()).count();
        if drifted > 0 {
            warn!(products = reports.len(), drifted, "stock audit found drift");
        } else {
            info!(products = reports.len(), "stock audit clean");
        }
        Ok(reports)
    }

    fn computed_stock(&self, product_id: &str) -> Result<u64, StockError> {
        let totals = self.store().ledger_totals(product_id)?;
        totals.on_hand().ok_or_else(|| {
            StockError::InternalFailure(format!(
                "ledger for {product_id} sells {} against {} approved",
                totals.outbound, totals.approved_inbound
            ))
        })
    }
}
