use byteorder::{BigEndian, ReadBytesExt};
use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::header::{Header, PayloadType, HEADER_LEN};
use crate::{Marshall, MarshallError, Unmarshall, UnmarshallError};

/// RTCP receiver report (PT=201): header, reporter SSRC and one block per
/// observed media source.
#[derive(Debug, PartialEq, Clone)]
pub struct ReceiverReport {
    pub sender_ssrc: u32,
    pub reports: Vec<ReportBlock>,
}

impl ReceiverReport {
    pub fn new(sender_ssrc: u32, reports: Vec<ReportBlock>) -> Self {
        Self {
            sender_ssrc,
            reports,
        }
    }

    fn header(&self) -> Header {
        Header {
            // Length in 32-bit words minus one
            length: (1 + self.reports.len() * REPORT_BLOCK_WORDS) as u16,
            payload_type: PayloadType::ReceiverReport,
            padding: false,
            count: self.reports.len() as u8,
        }
    }
}

impl Marshall for ReceiverReport {
    fn marshall(self) -> Result<Bytes, MarshallError>
    where
        Self: Sized,
    {
        if self.reports.len() > MAX_REPORT_BLOCKS {
            return Err(MarshallError::TooManyReportBlocks(self.reports.len()));
        }

        let mut bytes =
            BytesMut::with_capacity(HEADER_LEN + SSRC_LEN + self.reports.len() * REPORT_BLOCK_LEN);
        bytes.put(self.header().marshall()?);
        bytes.put_u32(self.sender_ssrc);
        for report in &self.reports {
            report.write_to(&mut bytes);
        }
        Ok(bytes.freeze())
    }
}

impl Unmarshall for ReceiverReport {
    fn unmarshall(bytes: Bytes) -> Result<Self, UnmarshallError>
    where
        Self: Sized,
    {
        let header = Header::unmarshall(bytes.clone())?;
        if header.payload_type != PayloadType::ReceiverReport {
            return Err(UnmarshallError::UnexpectedFrame);
        }

        let packet_len = (header.length as usize + 1) * 4;
        let content_len = HEADER_LEN + SSRC_LEN + header.count as usize * REPORT_BLOCK_LEN;
        if bytes.len() < packet_len || packet_len < content_len {
            return Err(UnmarshallError::InvalidLength);
        }

        let mut body = bytes.slice(HEADER_LEN..packet_len);
        let sender_ssrc = body.get_u32();

        let mut reports = Vec::with_capacity(header.count as usize);
        for _ in 0..header.count {
            reports.push(ReportBlock::unmarshall(body.split_to(REPORT_BLOCK_LEN))?);
        }

        Ok(Self {
            sender_ssrc,
            reports,
        })
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct ReportBlock {
    pub ssrc: u32,
    pub fraction_lost: u8,
    /// Signed 24-bit quantity on the wire; callers clamp before encoding.
    pub cumulative_packets_lost: i32,
    pub ext_highest_sequence: u32,
    pub jitter: u32,
    pub lsr: u32,
    pub dlsr: u32,
}

impl ReportBlock {
    /// Appends the 24-byte block at the end of `buf`.
    pub fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32(self.ssrc);
        buf.put_u8(self.fraction_lost);
        buf.put_slice(&self.cumulative_packets_lost.to_be_bytes()[1..]);
        buf.put_u32(self.ext_highest_sequence);
        buf.put_u32(self.jitter);
        buf.put_u32(self.lsr);
        buf.put_u32(self.dlsr);
    }
}

impl Marshall for ReportBlock {
    fn marshall(self) -> Result<Bytes, MarshallError>
    where
        Self: Sized,
    {
        let mut bytes = BytesMut::with_capacity(REPORT_BLOCK_LEN);
        self.write_to(&mut bytes);
        Ok(bytes.freeze())
    }
}

impl Unmarshall for ReportBlock {
    fn unmarshall(bytes: Bytes) -> Result<Self, UnmarshallError>
    where
        Self: Sized,
    {
        if bytes.len() < REPORT_BLOCK_LEN {
            return Err(UnmarshallError::InvalidLength);
        }

        let mut reader = bytes.reader();
        let read_err = |_| UnmarshallError::InvalidLength;

        Ok(Self {
            ssrc: reader.read_u32::<BigEndian>().map_err(read_err)?,
            fraction_lost: reader.read_u8().map_err(read_err)?,
            cumulative_packets_lost: reader.read_i24::<BigEndian>().map_err(read_err)?,
            ext_highest_sequence: reader.read_u32::<BigEndian>().map_err(read_err)?,
            jitter: reader.read_u32::<BigEndian>().map_err(read_err)?,
            lsr: reader.read_u32::<BigEndian>().map_err(read_err)?,
            dlsr: reader.read_u32::<BigEndian>().map_err(read_err)?,
        })
    }
}

pub const REPORT_BLOCK_LEN: usize = 24;
pub const MAX_REPORT_BLOCKS: usize = 31;
const REPORT_BLOCK_WORDS: usize = REPORT_BLOCK_LEN / 4;
const SSRC_LEN: usize = 4;

#[cfg(test)]
mod report_block_marshall {
    use bytes::{Bytes, BytesMut};

    use crate::receiver_report::ReportBlock;
    use crate::Marshall;

    #[test]
    fn marshall_ok() {
        let input = ReportBlock {
            ssrc: 123213414,
            fraction_lost: 20,
            cumulative_packets_lost: 2120,
            ext_highest_sequence: 32131,
            jitter: 1200,
            lsr: 230232,
            dlsr: 200,
        };
        let output = input.marshall().unwrap();

        let expected_output = Bytes::from_static(&[
            7, 88, 22, 102, // SSRC = 123213414
            20, 0, 8, 72, // Fraction Lost = 20, Packets Lost = 2120
            0, 0, 125, 131, // Extended Highest Sequence =  32131
            0, 0, 4, 176, // Jitter = 1200
            0, 3, 131, 88, // LSR = 230232,
            0, 0, 0, 200, // DLSR = 200
        ]);

        assert_eq!(output, expected_output);
    }

    #[test]
    fn negative_loss_is_twos_complement_24_bit() {
        let input = ReportBlock {
            ssrc: 1,
            fraction_lost: 0,
            cumulative_packets_lost: -2,
            ext_highest_sequence: 0,
            jitter: 0,
            lsr: 0,
            dlsr: 0,
        };
        let output = input.marshall().unwrap();

        assert_eq!(&output[4..8], &[0, 0xff, 0xff, 0xfe]);
    }

    #[test]
    fn write_to_appends_after_existing_content() {
        let mut buf = BytesMut::from(&[0xaa, 0xbb][..]);
        let input = ReportBlock {
            ssrc: 2,
            fraction_lost: 1,
            cumulative_packets_lost: 3,
            ext_highest_sequence: 4,
            jitter: 0,
            lsr: 0,
            dlsr: 0,
        };

        input.write_to(&mut buf);

        assert_eq!(buf.len(), 2 + 24);
        assert_eq!(&buf[..6], &[0xaa, 0xbb, 0, 0, 0, 2]);
    }
}

#[cfg(test)]
mod report_block_unmarshall {
    use bytes::Bytes;

    use crate::receiver_report::ReportBlock;
    use crate::{Unmarshall, UnmarshallError};

    #[test]
    fn sign_extends_cumulative_loss() {
        let input = Bytes::from_static(&[
            0, 0, 0, 9, // SSRC = 9
            0, 0x80, 0, 0, // Fraction Lost = 0, Packets Lost = -0x800000
            0, 1, 0, 5, // Extended Highest Sequence = 65541
            0, 0, 0, 0, //
            0, 0, 0, 0, //
            0, 0, 0, 0,
        ]);

        let output = ReportBlock::unmarshall(input).unwrap();

        assert_eq!(output.cumulative_packets_lost, -0x800000);
        assert_eq!(output.ext_highest_sequence, 65541);
    }

    #[test]
    fn rejects_short_block() {
        let input = Bytes::from_static(&[0, 0, 0, 9, 0, 0, 0]);

        assert_eq!(
            ReportBlock::unmarshall(input).unwrap_err(),
            UnmarshallError::InvalidLength
        );
    }
}
