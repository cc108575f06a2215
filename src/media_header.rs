use std::ops::Range;

use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct RTPHeader {
    pub padding: bool,
    pub marker: bool,
    pub seq: u16,
    pub payload_type: u8,
    pub timestamp: u32,
    pub ssrc: u32,
    pub csrc_identifiers: Vec<u32>,
    pub extension: Option<HeaderExtension>,
    /// Payload position inside the datagram, padding excluded.
    pub payload_range: Range<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderExtension {
    pub profile: u16,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RTPPacket {
    pub header: RTPHeader,
    pub payload: Bytes,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("malformed RTP packet: {0}")]
    Malformed(&'static str),
    #[error("unsupported RTP version {0}")]
    Unsupported(u8),
}

impl RTPPacket {
    /// Splits a datagram into its RTP header and payload. The payload shares
    /// the datagram's allocation.
    pub fn parse(datagram: Bytes) -> Result<Self, ParseError> {
        let data = &datagram[..];
        let mut size = data.len();

        if size < RTP_HEADER_LEN {
            return Err(ParseError::Malformed("shorter than the fixed header"));
        }

        let first_octet = data[0];
        let version = (first_octet & VERSION_MASK) >> VERSION_SHIFT;
        if version != RTP_VERSION {
            return Err(ParseError::Unsupported(version));
        }

        let padding = first_octet & PADDING_MASK != 0;
        if padding {
            let padding_len = data[size - 1] as usize;
            if padding_len + RTP_HEADER_LEN > size {
                return Err(ParseError::Malformed("padding overlaps the fixed header"));
            }
            size -= padding_len;
        }

        let csrc_count = (first_octet & CSRC_COUNT_MASK) as usize;
        let mut payload_offset = RTP_HEADER_LEN + CSRC_LEN * csrc_count;
        if size < payload_offset {
            return Err(ParseError::Malformed("CSRC list is truncated"));
        }

        let extension = if first_octet & EXTENSION_MASK != 0 {
            if size < payload_offset + EXTENSION_HEADER_LEN {
                return Err(ParseError::Malformed("extension header is truncated"));
            }

            let profile = BigEndian::read_u16(&data[payload_offset..]);
            let words = BigEndian::read_u16(&data[payload_offset + 2..]) as usize;
            let extension_len = EXTENSION_HEADER_LEN + 4 * words;
            if size < payload_offset + extension_len {
                return Err(ParseError::Malformed("extension overruns the packet"));
            }

            let data_start = payload_offset + EXTENSION_HEADER_LEN;
            payload_offset += extension_len;

            Some(HeaderExtension {
                profile,
                data: datagram.slice(data_start..payload_offset),
            })
        } else {
            None
        };

        let second_octet = data[1];
        let csrc_identifiers = (0..csrc_count)
            .map(|index| BigEndian::read_u32(&data[RTP_HEADER_LEN + CSRC_LEN * index..]))
            .collect();

        let header = RTPHeader {
            padding,
            marker: second_octet & MARKER_MASK != 0,
            payload_type: second_octet & PAYLOAD_TYPE_MASK,
            seq: BigEndian::read_u16(&data[2..]),
            timestamp: BigEndian::read_u32(&data[4..]),
            ssrc: BigEndian::read_u32(&data[8..]),
            csrc_identifiers,
            extension,
            payload_range: payload_offset..size,
        };
        let payload = datagram.slice(header.payload_range.clone());

        Ok(Self { header, payload })
    }
}

pub const RTP_HEADER_LEN: usize = 12;
const CSRC_LEN: usize = 4;
const EXTENSION_HEADER_LEN: usize = 4;
const RTP_VERSION: u8 = 2;
const VERSION_MASK: u8 = 0b1100_0000;
const VERSION_SHIFT: u8 = 6;
const PADDING_MASK: u8 = 0b0010_0000;
const EXTENSION_MASK: u8 = 0b0001_0000;
const CSRC_COUNT_MASK: u8 = 0b0000_1111;
const MARKER_MASK: u8 = 0b1000_0000;
const PAYLOAD_TYPE_MASK: u8 = 0b0111_1111;
