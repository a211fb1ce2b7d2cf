//! Service layer API for the inventory core.
//!
//! The ledger workflows live in `inbound`, `outbound` and `reconcile`; this
//! module owns the handle, catalog upkeep and read queries.
use super::catalog::{Party, PartyKind, Product, ProductDraft};
use super::config::InventoryConfig;
use super::error::StockError;
use super::ledger::{InboundFilter, InboundRecord, OutboundFilter, OutboundRecord};
use super::store::{Store, TxView};
use super::types::{CUSTOMER_HRP, PRODUCT_HRP, SUPPLIER_HRP};
use super::telemetry;
use super::utils::new_uuid_to_bech32;
use std::sync::Arc;
use tracing::info;

pub struct InventoryService {
    instance: Arc<sled::Db>,
    store: Store,
    config: InventoryConfig,
}

impl InventoryService {
    pub fn new(instance: Arc<sled::Db>, config: InventoryConfig) -> Result<Self, StockError> {
        let store = Store::open(&instance)?;
        Ok(Self {
            instance,
            store,
            config,
        })
    }

    /// Open (or create) the database at `config.db_path`, installing the
    /// tracing subscriber with `config.log_filter` if none is set yet.
    pub fn open(config: InventoryConfig) -> Result<Self, StockError> {
        telemetry::init_tracing(&config.log_filter);

        let db = sled::open(&config.db_path)?;
        info!(db_path = %config.db_path.display(), "inventory database opened");
        Self::new(Arc::new(db), config)
    }

    pub fn config(&self) -> &InventoryConfig {
        &self.config
    }

    /// Block until every committed unit of work is on disk.
    pub fn flush(&self) -> Result<(), StockError> {
        self.instance.flush()?;
        Ok(())
    }

    pub(crate) fn store(&self) -> &Store {
        &self.store
    }

    pub(crate) fn unit_of_work<T, F>(&self, scope: &str, body: F) -> Result<T, StockError>
    where
        F: Fn(&TxView<'_>) -> Result<T, StockError>,
    {
        self.store
            .unit_of_work(scope, self.config.max_conflict_retries, body)
    }

    // catalog

    pub fn register_product(&self, draft: ProductDraft) -> Result<Product, StockError> {
        let product = draft.validate_and_finalise(new_uuid_to_bech32(PRODUCT_HRP)?)?;

        self.unit_of_work(&product.id, |tx| {
            tx.save_product(&product)?;
            Ok(())
        })?;

        info!(product_id = %product.id, name = %product.name, "product registered");
        Ok(product)
    }

    /// Rewrite a product's catalog fields. The stock cache is read and written
    /// back inside the same unit of work so a concurrent ledger write is never lost.
    pub fn update_product_details(
        &self,
        product_id: &str,
        draft: ProductDraft,
    ) -> Result<Product, StockError> {
        self.unit_of_work(product_id, |tx| {
            let mut product = tx.live_product(product_id)?;
            draft.apply_to(&mut product)?;
            tx.save_product(&product)?;
            Ok(product)
        })
    }

    /// Soft delete. Existing ledger rows keep referencing the product.
    pub fn remove_product(&self, product_id: &str) -> Result<(), StockError> {
        self.unit_of_work(product_id, |tx| {
            let mut product = tx.live_product(product_id)?;
            product.deleted = true;
            product.touch();
            tx.save_product(&product)
        })?;

        info!(product_id, "product removed");
        Ok(())
    }

    pub fn register_supplier(&self, name: &str) -> Result<Party, StockError> {
        self.register_party(name, PartyKind::Supplier, SUPPLIER_HRP)
    }

    pub fn register_customer(&self, name: &str) -> Result<Party, StockError> {
        self.register_party(name, PartyKind::Customer, CUSTOMER_HRP)
    }

    fn register_party(&self, name: &str, kind: PartyKind, hrp: &str) -> Result<Party, StockError> {
        if name.trim().is_empty() {
            return Err(StockError::InvalidDetails(format!("{kind:?} name is not set")));
        }

        let party = Party {
            id: new_uuid_to_bech32(hrp)?,
            kind,
            name: name.trim().to_string(),
            deleted: false,
        };
        self.unit_of_work(&party.id, |tx| tx.save_party(&party))?;

        info!(party_id = %party.id, ?kind, "party registered");
        Ok(party)
    }

    pub fn remove_party(&self, party_id: &str) -> Result<(), StockError> {
        self.unit_of_work(party_id, |tx| {
            let Some(mut party) = tx.party(party_id)?.filter(|p| !p.deleted) else {
                return Err(StockError::RecordNotFound(party_id.to_string()));
            };
            party.deleted = true;
            tx.save_party(&party)
        })
    }

    pub fn party_exists(&self, party_id: &str, kind: PartyKind) -> Result<bool, StockError> {
        Ok(self
            .store
            .party(party_id)?
            .is_some_and(|party| party.is_live(kind)))
    }

    // reads

    /// Product lookup. Soft deleted products are reported as missing.
    pub fn product(&self, product_id: &str) -> Result<Product, StockError> {
        self.store
            .product(product_id)?
            .filter(|product| !product.deleted)
            .ok_or_else(|| StockError::ProductNotFound(product_id.to_string()))
    }

    pub fn stock_quantity(&self, product_id: &str) -> Result<u64, StockError> {
        Ok(self.product(product_id)?.stock_quantity)
    }

    pub fn inbound(&self, record_id: &str) -> Result<InboundRecord, StockError> {
        self.store
            .inbound(record_id)?
            .filter(|record| !record.deleted)
            .ok_or_else(|| StockError::RecordNotFound(record_id.to_string()))
    }

    pub fn outbound(&self, record_id: &str) -> Result<OutboundRecord, StockError> {
        self.store
            .outbound(record_id)?
            .filter(|record| !record.deleted)
            .ok_or_else(|| StockError::RecordNotFound(record_id.to_string()))
    }

    /// Live supply records matching the filter, oldest first.
    pub fn list_inbound(&self, filter: &InboundFilter) -> Result<Vec<InboundRecord>, StockError> {
        let mut records: Vec<_> = self
            .store
            .inbound_records()?
            .into_iter()
            .filter(|record| filter.matches(record))
            .collect();
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(records)
    }

    /// Live sell records matching the filter, oldest first.
    pub fn list_outbound(
        &self,
        filter: &OutboundFilter,
    ) -> Result<Vec<OutboundRecord>, StockError> {
        let mut records: Vec<_> = self
            .store
            .outbound_records()?
            .into_iter()
            .filter(|record| filter.matches(record))
            .collect();
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(records)
    }
}
