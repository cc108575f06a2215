use byteorder::{BigEndian, ReadBytesExt};
use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{Marshall, MarshallError, Unmarshall, UnmarshallError};

/// Common RTCP header. `count` carries the reception report count (RC) for
/// sender and receiver reports.
#[derive(Debug, PartialEq, Clone)]
pub struct Header {
    pub payload_type: PayloadType,
    pub length: u16,
    pub count: u8,
    pub padding: bool,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum PayloadType {
    SenderReport,
    ReceiverReport,
}

impl Unmarshall for Header {
    fn unmarshall(value: Bytes) -> Result<Self, UnmarshallError> {
        if value.len() < HEADER_LEN {
            return Err(UnmarshallError::InvalidLength);
        }

        let mut value = value.reader();
        let first_octet = value.read_u8().or(Err(UnmarshallError::UnexpectedFrame))?;

        let version = (VERSION_MASK & first_octet) >> VERSION_SHIFT;
        if version != RTCP_VERSION {
            return Err(UnmarshallError::UnexpectedFrame);
        }

        let padding = (PADDING_MASK & first_octet) >> PADDING_SHIFT == 1;
        let count = COUNT_MASK & first_octet;

        let payload_type = match value.read_u8().or(Err(UnmarshallError::UnexpectedFrame))? {
            SENDER_REPORT_PT => PayloadType::SenderReport,
            RECEIVER_REPORT_PT => PayloadType::ReceiverReport,
            _ => return Err(UnmarshallError::UnexpectedFrame),
        };
        let length = value
            .read_u16::<BigEndian>()
            .or(Err(UnmarshallError::UnexpectedFrame))?;

        Ok(Header {
            padding,
            length,
            count,
            payload_type,
        })
    }
}

impl Marshall for Header {
    fn marshall(self) -> Result<Bytes, MarshallError>
    where
        Self: Sized,
    {
        let mut bytes = BytesMut::with_capacity(HEADER_LEN);
        let version = RTCP_VERSION << VERSION_SHIFT;
        let padding = if self.padding { PADDING_MASK } else { 0 };
        let first_octet = version | padding | (self.count & COUNT_MASK);
        let second_octet = match self.payload_type {
            PayloadType::SenderReport => SENDER_REPORT_PT,
            PayloadType::ReceiverReport => RECEIVER_REPORT_PT,
        };
        bytes.put_u8(first_octet);
        bytes.put_u8(second_octet);
        bytes.put_u16(self.length);

        Ok(bytes.freeze())
    }
}

pub const HEADER_LEN: usize = 4;
const VERSION_MASK: u8 = 0b1100_0000;
const RTCP_VERSION: u8 = 2;
const VERSION_SHIFT: u8 = 6;
const PADDING_MASK: u8 = 0b0010_0000;
const PADDING_SHIFT: u8 = 5;
const COUNT_MASK: u8 = 0b0001_1111;
const SENDER_REPORT_PT: u8 = 200;
const RECEIVER_REPORT_PT: u8 = 201;
