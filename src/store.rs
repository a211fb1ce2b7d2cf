//! Sled backed storage and the atomic unit of work.
//!
//! Products, parties and both ledgers live in separate trees of the same
//! database. A unit of work runs optimistically: its body reads rows straight
//! from the trees and buffers every write. The buffered writes then commit in
//! one sled transaction which first checks that every row the body read is
//! still byte for byte what it saw. A stale read throws the writes away and
//! runs the body again; once the retry budget is spent the unit gives up with
//! [`StockError::Conflict`]. Units over disjoint rows never invalidate each
//! other, and no lock is held while a body runs.
use super::catalog::{Party, PartyKind, Product};
use super::error::StockError;
use super::ledger::{InboundRecord, LedgerTotals, OutboundRecord};
use super::utils::{decode_row, encode_row};
use sled::transaction::ConflictableTransactionResult;
use sled::{IVec, Transactional};
use std::cell::RefCell;
use std::collections::BTreeMap;
use tracing::{debug, warn};

const PRODUCTS: &str = "products";
const PARTIES: &str = "parties";
const INBOUND: &str = "inbound";
const OUTBOUND: &str = "outbound";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Table {
    Products = 0,
    Parties = 1,
    Inbound = 2,
    Outbound = 3,
}

type RowKey = (Table, String);
type CommitResult = ConflictableTransactionResult<bool, StockError>;

#[derive(Clone)]
pub struct Store {
    products: sled::Tree,
    parties: sled::Tree,
    inbound: sled::Tree,
    outbound: sled::Tree,
}

impl Store {
    pub fn open(db: &sled::Db) -> Result<Self, StockError> {
        Ok(Self {
            products: db.open_tree(PRODUCTS)?,
            parties: db.open_tree(PARTIES)?,
            inbound: db.open_tree(INBOUND)?,
            outbound: db.open_tree(OUTBOUND)?,
        })
    }

    pub fn product(&self, id: &str) -> Result<Option<Product>, StockError> {
        read_row(&self.products, id)
    }

    pub fn party(&self, id: &str) -> Result<Option<Party>, StockError> {
        read_row(&self.parties, id)
    }

    pub fn inbound(&self, id: &str) -> Result<Option<InboundRecord>, StockError> {
        read_row(&self.inbound, id)
    }

    pub fn outbound(&self, id: &str) -> Result<Option<OutboundRecord>, StockError> {
        read_row(&self.outbound, id)
    }

    pub fn products(&self) -> Result<Vec<Product>, StockError> {
        scan_rows(&self.products)
    }

    pub fn inbound_records(&self) -> Result<Vec<InboundRecord>, StockError> {
        scan_rows(&self.inbound)
    }

    pub fn outbound_records(&self) -> Result<Vec<OutboundRecord>, StockError> {
        scan_rows(&self.outbound)
    }

    /// Sum of approved live supply and of live sells referencing the product.
    pub fn ledger_totals(&self, product_id: &str) -> Result<LedgerTotals, StockError> {
        let mut totals = LedgerTotals::default();

        for record in self.inbound_records()? {
            if record.product_id == product_id && record.contribution() > 0 {
                totals.approved_inbound += u128::from(record.quantity);
            }
        }
        for record in self.outbound_records()? {
            if record.product_id == product_id && !record.deleted {
                totals.outbound += u128::from(record.quantity);
            }
        }

        Ok(totals)
    }

    fn tree(&self, table: Table) -> &sled::Tree {
        match table {
            Table::Products => &self.products,
            Table::Parties => &self.parties,
            Table::Inbound => &self.inbound,
            Table::Outbound => &self.outbound,
        }
    }

    /// Run `body` as one atomic unit of work over every tree, re-running it
    /// at most `max_retries` times when a row it read was changed before the
    /// commit.
    pub fn unit_of_work<T, F>(
        &self,
        scope: &str,
        max_retries: u32,
        body: F,
    ) -> Result<T, StockError>
    where
        F: Fn(&TxView<'_>) -> Result<T, StockError>,
    {
        let max_attempts = max_retries + 1;

        for attempt in 1..=max_attempts {
            let view = TxView::new(self);
            match body(&view) {
                Ok(value) => {
                    if view.commit()? {
                        return Ok(value);
                    }
                }
                // a refusal decided on rows that have since moved is not final
                Err(err) => {
                    if !view.is_stale()? {
                        return Err(err);
                    }
                }
            }
            debug!(scope, attempt, "unit of work read stale rows, retrying");
        }

        warn!(scope, attempts = max_attempts, "unit of work kept conflicting");
        Err(StockError::Conflict {
            scope: scope.to_string(),
            attempts: max_attempts,
        })
    }
}

/// Row access for a unit of work body. Reads are recorded for validation at
/// commit, writes are buffered until then and visible to later reads.
pub struct TxView<'a> {
    store: &'a Store,
    reads: RefCell<BTreeMap<RowKey, Option<IVec>>>,
    writes: RefCell<BTreeMap<RowKey, Vec<u8>>>,
}

impl<'a> TxView<'a> {
    fn new(store: &'a Store) -> Self {
        Self {
            store,
            reads: RefCell::new(BTreeMap::new()),
            writes: RefCell::new(BTreeMap::new()),
        }
    }

    pub fn product(&self, id: &str) -> Result<Option<Product>, StockError> {
        self.read(Table::Products, id)
    }

    /// Load a product for a change that grows a contribution. Removed products
    /// are reported as missing.
    pub fn live_product(&self, id: &str) -> Result<Product, StockError> {
        match self.product(id)? {
            Some(product) if !product.deleted => Ok(product),
            _ => Err(StockError::ProductNotFound(id.to_string())),
        }
    }

    /// Load a product for a change that only shrinks or reverts a contribution.
    /// Soft deleted products are still returned so the ledger can be unwound.
    pub fn existing_product(&self, id: &str) -> Result<Product, StockError> {
        self.product(id)?
            .ok_or_else(|| StockError::ProductNotFound(id.to_string()))
    }

    pub fn save_product(&self, product: &Product) -> Result<(), StockError> {
        self.write(Table::Products, &product.id, product)
    }

    /// Apply a signed delta to a product's stock cache and persist it.
    pub fn adjust_stock(&self, product: &mut Product, delta: i64) -> Result<(), StockError> {
        if delta == 0 {
            return Ok(());
        }
        product.apply_delta(delta)?;
        self.save_product(product)
    }

    pub fn party(&self, id: &str) -> Result<Option<Party>, StockError> {
        self.read(Table::Parties, id)
    }

    pub fn party_exists(&self, id: &str, kind: PartyKind) -> Result<bool, StockError> {
        Ok(self.party(id)?.is_some_and(|party| party.is_live(kind)))
    }

    pub fn require_party(&self, id: &str, kind: PartyKind) -> Result<(), StockError> {
        if self.party_exists(id, kind)? {
            return Ok(());
        }
        match kind {
            PartyKind::Supplier => Err(StockError::SupplierNotFound(id.to_string())),
            PartyKind::Customer => Err(StockError::CustomerNotFound(id.to_string())),
        }
    }

    pub fn save_party(&self, party: &Party) -> Result<(), StockError> {
        self.write(Table::Parties, &party.id, party)
    }

    pub fn inbound(&self, id: &str) -> Result<InboundRecord, StockError> {
        match self.read::<InboundRecord>(Table::Inbound, id)? {
            Some(record) if !record.deleted => Ok(record),
            _ => Err(StockError::RecordNotFound(id.to_string())),
        }
    }

    pub fn save_inbound(&self, record: &InboundRecord) -> Result<(), StockError> {
        self.write(Table::Inbound, &record.id, record)
    }

    pub fn outbound(&self, id: &str) -> Result<OutboundRecord, StockError> {
        match self.read::<OutboundRecord>(Table::Outbound, id)? {
            Some(record) if !record.deleted => Ok(record),
            _ => Err(StockError::RecordNotFound(id.to_string())),
        }
    }

    pub fn save_outbound(&self, record: &OutboundRecord) -> Result<(), StockError> {
        self.write(Table::Outbound, &record.id, record)
    }

    fn read<T>(&self, table: Table, id: &str) -> Result<Option<T>, StockError>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        let key = (table, id.to_string());
        if let Some(bytes) = self.writes.borrow().get(&key) {
            return decode_row(bytes).map(Some);
        }

        let cached = self.reads.borrow().get(&key).cloned();
        let seen = match cached {
            Some(seen) => seen,
            None => {
                let seen = self.store.tree(table).get(id.as_bytes())?;
                self.reads.borrow_mut().insert(key, seen.clone());
                seen
            }
        };
        seen.map(|bytes| decode_row(&bytes)).transpose()
    }

    fn write<T>(&self, table: Table, id: &str, row: &T) -> Result<(), StockError>
    where
        T: minicbor::Encode<()>,
    {
        let bytes = encode_row(row)?;
        self.writes.borrow_mut().insert((table, id.to_string()), bytes);
        Ok(())
    }

    /// Whether any row read so far has changed underneath the view.
    fn is_stale(&self) -> Result<bool, StockError> {
        for ((table, id), seen) in self.reads.borrow().iter() {
            if self.store.tree(*table).get(id.as_bytes())? != *seen {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Validate the read set and apply the buffered writes in one transaction.
    /// Returns `false`, writing nothing, when a read row has moved.
    fn commit(&self) -> Result<bool, StockError> {
        let reads = self.reads.borrow();
        let writes = self.writes.borrow();
        let store = self.store;

        let committed = (&store.products, &store.parties, &store.inbound, &store.outbound)
            .transaction(|(products, parties, inbound, outbound)| -> CommitResult {
                let trees = [products, parties, inbound, outbound];

                for ((table, id), seen) in reads.iter() {
                    if trees[*table as usize].get(id.as_bytes())? != *seen {
                        return Ok(false);
                    }
                }
                for ((table, id), bytes) in writes.iter() {
                    trees[*table as usize].insert(id.as_bytes(), bytes.as_slice())?;
                }
                Ok(true)
            })?;

        Ok(committed)
    }
}

fn read_row<T>(tree: &sled::Tree, id: &str) -> Result<Option<T>, StockError>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    tree.get(id.as_bytes())?
        .map(|bytes| decode_row(&bytes))
        .transpose()
}

fn scan_rows<T>(tree: &sled::Tree) -> Result<Vec<T>, StockError>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    let mut rows = Vec::new();
    for item in tree.iter() {
        let (_, bytes) = item?;
        rows.push(decode_row(&bytes)?);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ProductDraft;
    use std::cell::Cell;
    use tempfile::{TempDir, tempdir};

    fn store_with(names: &[&str]) -> (TempDir, sled::Db, Store, Vec<String>) {
        let dir = tempdir().unwrap();
        let db = sled::open(dir.path().join("store.db")).unwrap();
        let store = Store::open(&db).unwrap();

        let ids = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let product = ProductDraft::new()
                    .set_name(name)
                    .validate_and_finalise(format!("product_{i}"))
                    .unwrap();
                store
                    .unit_of_work("seed", 0, |tx| tx.save_product(&product))
                    .unwrap();
                product.id
            })
            .collect();

        (dir, db, store, ids)
    }

    fn stock(store: &Store, id: &str) -> u64 {
        store.product(id).unwrap().unwrap().stock_quantity
    }

    fn bump(store: &Store, id: &str, delta: i64) -> Result<(), StockError> {
        store.unit_of_work(id, 0, |tx| {
            let mut product = tx.live_product(id)?;
            tx.adjust_stock(&mut product, delta)
        })
    }

    #[test]
    fn a_row_changed_before_commit_reruns_the_body() {
        let (_dir, _db, store, ids) = store_with(&["bolt"]);
        let runs = Cell::new(0);

        let on_hand = store
            .unit_of_work(&ids[0], 3, |tx| {
                runs.set(runs.get() + 1);
                let mut product = tx.live_product(&ids[0])?;
                if runs.get() == 1 {
                    // another writer lands between this read and the commit
                    bump(&store, &ids[0], 5)?;
                }
                tx.adjust_stock(&mut product, 2)?;
                Ok(product.stock_quantity)
            })
            .unwrap();

        assert_eq!(runs.get(), 2);
        assert_eq!(on_hand, 7);
        assert_eq!(stock(&store, &ids[0]), 7);
    }

    #[test]
    fn a_spent_retry_budget_is_a_conflict() {
        let (_dir, _db, store, ids) = store_with(&["bolt"]);
        let runs = Cell::new(0);

        let err = store
            .unit_of_work(&ids[0], 2, |tx| {
                runs.set(runs.get() + 1);
                let mut product = tx.live_product(&ids[0])?;
                bump(&store, &ids[0], 1)?;
                tx.adjust_stock(&mut product, 10)
            })
            .unwrap_err();

        assert_eq!(
            err,
            StockError::Conflict {
                scope: ids[0].clone(),
                attempts: 3
            }
        );
        assert!(err.is_retryable());
        assert_eq!(runs.get(), 3);
        // only the interleaved writes landed
        assert_eq!(stock(&store, &ids[0]), 3);
    }

    #[test]
    fn units_on_different_products_neither_wait_nor_conflict() {
        let (_dir, _db, store, ids) = store_with(&["bolt", "nut"]);
        let runs = Cell::new(0);

        store
            .unit_of_work(&ids[0], 0, |tx| {
                runs.set(runs.get() + 1);
                let mut bolt = tx.live_product(&ids[0])?;
                // a whole unit on the other product commits while this one is open
                bump(&store, &ids[1], 9)?;
                tx.adjust_stock(&mut bolt, 4)
            })
            .unwrap();

        assert_eq!(runs.get(), 1);
        assert_eq!(stock(&store, &ids[0]), 4);
        assert_eq!(stock(&store, &ids[1]), 9);
    }

    #[test]
    fn a_refused_unit_writes_nothing() {
        let (_dir, _db, store, ids) = store_with(&["bolt", "nut"]);
        bump(&store, &ids[1], 2).unwrap();

        let err = store
            .unit_of_work(&ids[0], 3, |tx| {
                let mut bolt = tx.live_product(&ids[0])?;
                let mut nut = tx.live_product(&ids[1])?;
                tx.adjust_stock(&mut bolt, 3)?;
                tx.adjust_stock(&mut nut, -5)
            })
            .unwrap_err();

        assert_eq!(err.kind(), crate::ErrorKind::InsufficientStock);
        assert_eq!(stock(&store, &ids[0]), 0);
        assert_eq!(stock(&store, &ids[1]), 2);
    }

    #[test]
    fn buffered_writes_are_visible_to_later_reads() {
        let (_dir, _db, store, ids) = store_with(&["bolt"]);

        let seen = store
            .unit_of_work(&ids[0], 0, |tx| {
                let mut product = tx.live_product(&ids[0])?;
                tx.adjust_stock(&mut product, 6)?;
                Ok(tx.live_product(&ids[0])?.stock_quantity)
            })
            .unwrap();

        assert_eq!(seen, 6);
    }
}
