use serde::de::DeserializeOwned;
use serde::Serialize;

use super::link::LD_DAG_CBOR_CODEC;

/// Marker for the DAG-CBOR block codec
pub struct DagCborCodec;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("cbor encode error: {0}")]
    Encode(String),
    #[error("cbor decode error: {0}")]
    Decode(String),
    #[error("multihash error: {0}")]
    Multihash(String),
}

/// Types that are persisted as DAG-CBOR blocks.
///
/// Blanket implementations are intentionally avoided: a type opts in by
/// declaring `impl BlockEncoded<DagCborCodec> for T {}`, which keeps the
/// set of on-wire structures visible in one grep.
pub trait BlockEncoded<C>: Serialize + DeserializeOwned {
    fn encode(&self) -> Result<Vec<u8>, CodecError> {
        serde_ipld_dagcbor::to_vec(self).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(data: &[u8]) -> Result<Self, CodecError> {
        serde_ipld_dagcbor::from_slice(data).map_err(|e| CodecError::Decode(e.to_string()))
    }

    fn codec(&self) -> u64 {
        LD_DAG_CBOR_CODEC
    }
}
