//! Ledger rows and the quantity each one contributes to its product
use super::types::TimeStamp;
use chrono::{DateTime, Utc};

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApprovalState {
    #[n(0)]
    Pending,
    #[n(1)]
    Approved,
    #[n(2)]
    Rejected,
}

impl ApprovalState {
    pub const ALL: [ApprovalState; 3] = [
        ApprovalState::Pending,
        ApprovalState::Approved,
        ApprovalState::Rejected,
    ];
}

/// A supply record. Only approved, live rows add to the product's stock.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct InboundRecord {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub product_id: String,
    #[n(2)]
    pub supplier_id: String,
    #[n(3)]
    pub quantity: u64,
    #[n(4)]
    pub state: ApprovalState,
    #[n(5)]
    pub created_at: TimeStamp<Utc>,
    #[n(6)]
    pub updated_at: TimeStamp<Utc>,
    #[n(7)]
    pub deleted: bool,
}

/// A sell record. Every live row takes its quantity out of the product's stock.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct OutboundRecord {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub product_id: String,
    #[n(2)]
    pub customer_id: String,
    #[n(3)]
    pub quantity: u64,
    #[n(4)]
    pub created_at: TimeStamp<Utc>,
    #[n(5)]
    pub updated_at: TimeStamp<Utc>,
    #[n(6)]
    pub deleted: bool,
}

/// Signed contribution of an inbound row in the given state.
pub fn inbound_contribution(state: ApprovalState, quantity: u64) -> i64 {
    match state {
        ApprovalState::Approved => quantity as i64,
        ApprovalState::Pending | ApprovalState::Rejected => 0,
    }
}

impl InboundRecord {
    pub fn new(id: String, product_id: String, supplier_id: String, quantity: u64) -> Self {
        let now = TimeStamp::new();
        Self {
            id,
            product_id,
            supplier_id,
            quantity,
            state: ApprovalState::Pending,
            created_at: now.clone(),
            updated_at: now,
            deleted: false,
        }
    }

    pub fn contribution(&self) -> i64 {
        if self.deleted {
            return 0;
        }
        inbound_contribution(self.state, self.quantity)
    }
}

impl OutboundRecord {
    pub fn new(id: String, product_id: String, customer_id: String, quantity: u64) -> Self {
        let now = TimeStamp::new();
        Self {
            id,
            product_id,
            customer_id,
            quantity,
            created_at: now.clone(),
            updated_at: now,
            deleted: false,
        }
    }

    pub fn contribution(&self) -> i64 {
        if self.deleted {
            return 0;
        }
        -(self.quantity as i64)
    }
}

/// Ledger aggregates for one product. Summed wide so any number of `u64`
/// rows fits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LedgerTotals {
    pub approved_inbound: u128,
    pub outbound: u128,
}

impl LedgerTotals {
    /// On-hand quantity implied by the ledger, `None` when sells exceed
    /// approved supply or the difference does not fit a stock cache.
    pub fn on_hand(&self) -> Option<u64> {
        let on_hand = self.approved_inbound.checked_sub(self.outbound)?;
        u64::try_from(on_hand).ok()
    }
}

/// Inclusive quantity and time bounds shared by both ledger filters. An
/// unset bound admits everything on its side.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RowBounds {
    pub min_quantity: Option<u64>,
    pub max_quantity: Option<u64>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub updated_from: Option<DateTime<Utc>>,
    pub updated_to: Option<DateTime<Utc>>,
}

impl RowBounds {
    pub fn quantity_between(mut self, min: Option<u64>, max: Option<u64>) -> Self {
        self.min_quantity = min;
        self.max_quantity = max;
        self
    }
    pub fn created_between(mut self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        self.created_from = from;
        self.created_to = to;
        self
    }
    pub fn updated_between(mut self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        self.updated_from = from;
        self.updated_to = to;
        self
    }

    fn admits(&self, quantity: u64, created: &TimeStamp<Utc>, updated: &TimeStamp<Utc>) -> bool {
        let created = created.to_datetime_utc();
        let updated = updated.to_datetime_utc();

        self.min_quantity.is_none_or(|min| quantity >= min)
            && self.max_quantity.is_none_or(|max| quantity <= max)
            && self.created_from.is_none_or(|from| created >= from)
            && self.created_to.is_none_or(|to| created <= to)
            && self.updated_from.is_none_or(|from| updated >= from)
            && self.updated_to.is_none_or(|to| updated <= to)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InboundFilter {
    pub product_id: Option<String>,
    pub supplier_id: Option<String>,
    pub state: Option<ApprovalState>,
    pub bounds: RowBounds,
}

impl InboundFilter {
    pub fn for_product(product_id: &str) -> Self {
        Self {
            product_id: Some(product_id.to_string()),
            ..Self::default()
        }
    }
    pub fn with_state(mut self, state: ApprovalState) -> Self {
        self.state = Some(state);
        self
    }
    pub fn with_supplier(mut self, supplier_id: &str) -> Self {
        self.supplier_id = Some(supplier_id.to_string());
        self
    }
    pub fn with_bounds(mut self, bounds: RowBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn matches(&self, record: &InboundRecord) -> bool {
        !record.deleted
            && self.product_id.as_ref().is_none_or(|p| *p == record.product_id)
            && self.supplier_id.as_ref().is_none_or(|s| *s == record.supplier_id)
            && self.state.is_none_or(|s| s == record.state)
            && self
                .bounds
                .admits(record.quantity, &record.created_at, &record.updated_at)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OutboundFilter {
    pub product_id: Option<String>,
    pub customer_id: Option<String>,
    pub bounds: RowBounds,
}

impl OutboundFilter {
    pub fn for_product(product_id: &str) -> Self {
        Self {
            product_id: Some(product_id.to_string()),
            ..Self::default()
        }
    }
    pub fn with_customer(mut self, customer_id: &str) -> Self {
        self.customer_id = Some(customer_id.to_string());
        self
    }
    pub fn with_bounds(mut self, bounds: RowBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn matches(&self, record: &OutboundRecord) -> bool {
        !record.deleted
            && self.product_id.as_ref().is_none_or(|p| *p == record.product_id)
            && self.customer_id.as_ref().is_none_or(|c| *c == record.customer_id)
            && self
                .bounds
                .admits(record.quantity, &record.created_at, &record.updated_at)
    }
}
