//! Our error types for the KA3005P.

use thiserror::Error;

use crate::{command::Query, reply::ReplyError, request::OutOfRange};

pub type Result<T, I> = core::result::Result<T, Error<I>>;

/// Custom error type for Korad KA3005P communications.
///
/// `I` is the error type of the underlying [embedded_io] transport.
#[derive(Error, Debug)]
pub enum Error<I: embedded_io::Error> {
    #[error("Serial read failed: {0:?}")]
    TransportRead(I),
    /// The transport reported end of stream before a reply arrived.
    #[error("Serial read returned no data (end of stream)")]
    EndOfStream,
    #[error("Serial write failed: {0:?}")]
    TransportWrite(I),
    #[error(transparent)]
    ValueOutOfRange(#[from] OutOfRange),
    #[error("Malformed reply to {query}: {reason}")]
    MalformedReply {
        query: Query,
        #[source]
        reason: ReplyError,
    },
    #[error("Command batch exceeds the {capacity} byte buffer")]
    CommandBufferFull { capacity: usize },
}

impl<I: embedded_io::Error> Error<I> {
    /// True for errors raised by the transport itself rather than by the protocol layer.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::TransportRead(_) | Error::EndOfStream | Error::TransportWrite(_)
        )
    }
}
