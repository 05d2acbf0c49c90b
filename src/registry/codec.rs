use thiserror::Error;

use crate::ticket::Ticket;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("ticket decode failed: {0}")]
    Decode(String),
    #[error("ticket encode failed: {0}")]
    Encode(String),
}

/// Transforms tickets to and from their stored representation.
///
/// The trait is the seam for layering encryption or signing over the plain
/// serialization; backends never see a ticket, only encoded bytes.
pub trait TicketCodec: Send + Sync {
    fn encode(&self, ticket: &Ticket) -> Result<Vec<u8>, CodecError>;
    fn decode(&self, bytes: &[u8]) -> Result<Ticket, CodecError>;
}

/// Plain bincode serialization.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl TicketCodec for BincodeCodec {
    fn encode(&self, ticket: &Ticket) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(ticket).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Ticket, CodecError> {
        bincode::deserialize(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}
