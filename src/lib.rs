//! Inventory consistency engine.
//!
//! Keeps each product's cached on-hand quantity in step with its supply and
//! sell ledgers. Ledger writes and cache adjustments commit together in one
//! sled transaction, and [`InventoryService::recompute_stock`] can always
//! rebuild the cache from the ledger.

pub mod catalog;
pub mod config;
pub mod error;
pub mod inbound;
pub mod ledger;
pub mod outbound;
pub mod reconcile;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod transition;
pub mod types;
pub mod utils;

pub use catalog::{Party, PartyKind, Product, ProductDraft};
pub use config::InventoryConfig;
pub use error::{ErrorKind, StockError};
pub use inbound::InboundUpdate;
pub use ledger::{
    ApprovalState, InboundFilter, InboundRecord, OutboundFilter, OutboundRecord, RowBounds,
};
pub use outbound::{OutboundChange, OutboundUpdate};
pub use reconcile::StockReport;
pub use service::InventoryService;
pub use transition::Transition;
