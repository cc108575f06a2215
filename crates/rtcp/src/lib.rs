pub mod header;
pub mod receiver_report;

use bytes::Bytes;
use thiserror::Error;

pub trait Marshall {
    fn marshall(self) -> Result<Bytes, MarshallError>
    where
        Self: Sized;
}

pub trait Unmarshall {
    fn unmarshall(bytes: Bytes) -> Result<Self, UnmarshallError>
    where
        Self: Sized;
}

#[derive(Debug, PartialEq, Error)]
pub enum MarshallError {
    #[error("{0} report blocks do not fit in a single receiver report")]
    TooManyReportBlocks(usize),
}

#[derive(Debug, PartialEq, Error)]
pub enum UnmarshallError {
    #[error("unexpected RTCP frame")]
    UnexpectedFrame,
    #[error("RTCP frame length does not match its content")]
    InvalidLength,
}
