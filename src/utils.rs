//! Utility functions for identifiers and row serialization

use super::error::StockError;
use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> Result<String, StockError> {
    let hrp = bech32::Hrp::parse(hrp).map_err(StockError::internal)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes()).map_err(StockError::internal)?;
    Ok(encode)
}

pub(crate) fn encode_row<T: minicbor::Encode<()>>(row: &T) -> Result<Vec<u8>, StockError> {
    Ok(minicbor::to_vec(row)?)
}

pub(crate) fn decode_row<T>(bytes: &[u8]) -> Result<T, StockError>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    Ok(minicbor::decode(bytes)?)
}
