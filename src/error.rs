//! Error taxonomy for the inventory core
use sled::transaction::TransactionError;

/// Coarse classification handed to callers that map failures onto a wire
/// response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidQuantity,
    InvalidInput,
    InsufficientStock,
    Conflict,
    InternalFailure,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StockError {
    #[error("Product {0} does not exist or has been removed")]
    ProductNotFound(String),
    #[error("Ledger record {0} does not exist or has been removed")]
    RecordNotFound(String),
    #[error("Supplier {0} does not exist or has been removed")]
    SupplierNotFound(String),
    #[error("Customer {0} does not exist or has been removed")]
    CustomerNotFound(String),
    #[error("Quantity must be a positive integer, got {0}")]
    InvalidQuantity(i64),
    #[error("Invalid details: {0}")]
    InvalidDetails(String),
    #[error("Insufficient stock for {product_id}: {available} on hand, {requested} required")]
    InsufficientStock {
        product_id: String,
        available: u64,
        requested: u64,
    },
    #[error("Concurrent update on {scope} still conflicting after {attempts} attempts")]
    Conflict { scope: String, attempts: u32 },
    #[error("Persistence failure: {0}")]
    InternalFailure(String),
}

impl StockError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StockError::ProductNotFound(_)
            | StockError::RecordNotFound(_)
            | StockError::SupplierNotFound(_)
            | StockError::CustomerNotFound(_) => ErrorKind::NotFound,
            StockError::InvalidQuantity(_) => ErrorKind::InvalidQuantity,
            StockError::InvalidDetails(_) => ErrorKind::InvalidInput,
            StockError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            StockError::Conflict { .. } => ErrorKind::Conflict,
            StockError::InternalFailure(_) => ErrorKind::InternalFailure,
        }
    }

    /// Business errors reproduce the same outcome on retry, only conflicts don't.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    pub(crate) fn internal(err: impl std::fmt::Display) -> Self {
        StockError::InternalFailure(err.to_string())
    }
}

impl From<sled::Error> for StockError {
    fn from(err: sled::Error) -> Self {
        StockError::internal(err)
    }
}

impl From<minicbor::decode::Error> for StockError {
    fn from(err: minicbor::decode::Error) -> Self {
        StockError::internal(err)
    }
}

impl From<minicbor::encode::Error<std::convert::Infallible>> for StockError {
    fn from(err: minicbor::encode::Error<std::convert::Infallible>) -> Self {
        StockError::internal(err)
    }
}

impl From<TransactionError<StockError>> for StockError {
    fn from(err: TransactionError<StockError>) -> Self {
        match err {
            TransactionError::Abort(err) => err,
            TransactionError::Storage(err) => err.into(),
        }
    }
}
