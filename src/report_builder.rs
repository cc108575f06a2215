use bytes::BytesMut;
use rtcp::receiver_report::ReportBlock;

use crate::source_validator::SourceValidator;

/// Builds the reception report block for `ssrc` from the validator's
/// counters. Advances the validator's reporting interval.
pub fn build_report_block(ssrc: u32, validator: &mut SourceValidator) -> ReportBlock {
    let cumulative_packets_lost = cumulative_lost(validator);
    let fraction_lost = fraction_lost(validator);

    ReportBlock {
        ssrc,
        fraction_lost,
        cumulative_packets_lost,
        ext_highest_sequence: validator.extended_max_seq(),
        // No jitter or sender report tracking
        jitter: 0,
        lsr: 0,
        dlsr: 0,
    }
}

/// Appends the 24-byte report block for `ssrc` at the end of `buf`.
pub fn add_report_block(ssrc: u32, validator: &mut SourceValidator, buf: &mut BytesMut) {
    build_report_block(ssrc, validator).write_to(buf);
}

fn cumulative_lost(validator: &SourceValidator) -> i32 {
    let lost = validator.expected() as i64 - validator.received() as i64;
    lost.clamp(MIN_CUMULATIVE_LOST, MAX_CUMULATIVE_LOST) as i32
}

fn fraction_lost(validator: &mut SourceValidator) -> u8 {
    let (expected_interval, received_interval) = validator.roll_interval();

    let lost_interval = expected_interval as i64 - received_interval as i64;
    if expected_interval == 0 || lost_interval <= 0 {
        return 0;
    }
    ((lost_interval << 8) / expected_interval as i64) as u8
}

const MAX_CUMULATIVE_LOST: i64 = 0x7fffff;
const MIN_CUMULATIVE_LOST: i64 = -0x800000;


#[cfg(test)]
mod cumulative_lost {
    use crate::report_builder::build_report_block;
    use crate::source_validator::{SourceValidator, RTP_SEQ_MOD};

    #[test]
    fn two_packets_lost() {
        let mut validator = SourceValidator::with_counters(0, 2, 1, 2);
        validator.update_seq(5);

        assert_eq!(build_report_block(1, &mut validator).cumulative_packets_lost, 2);
    }

    #[test]
    fn three_packets_lost_when_wrapping() {
        let mut validator = SourceValidator::with_counters(0, u16::MAX - 1, u16::MAX as u32 - 2, 2);
        validator.update_seq(2);

        let block = build_report_block(1, &mut validator);

        assert_eq!(block.cumulative_packets_lost, 3);
        assert_eq!(block.ext_highest_sequence, RTP_SEQ_MOD + 2);
    }

    #[test]
    fn saturates_at_max() {
        let mut validator = SourceValidator::with_counters(256 * RTP_SEQ_MOD, 0, 0, 0);

        assert_eq!(
            build_report_block(1, &mut validator).cumulative_packets_lost,
            0x7fffff
        );
    }

    #[test]
    fn saturates_at_min() {
        let mut validator = SourceValidator::with_counters(0, 10, 10, 0x900000);

        assert_eq!(
            build_report_block(1, &mut validator).cumulative_packets_lost,
            -0x800000
        );
    }
}
