use bytes::Bytes;
use rtcp::header::{Header, PayloadType};
use rtcp::receiver_report::{ReceiverReport, ReportBlock};
use rtcp::{Marshall, Unmarshall, UnmarshallError};

#[test]
fn receiver_report_with_two_blocks_ok() {
    let input = Bytes::from_static(&[
        130, 201, 0, 13, // RR header, RC = 2, length = 13
        0, 0, 0, 1, // Reporter ssrc = 1
        0, 0, 0, 2, // Block 1: ssrc = 2
        64, 0, 0, 3, // Fraction lost = 64, cumulative lost = 3
        0, 1, 0, 10, // Extended highest sequence = 65546
        0, 0, 0, 0, // Jitter
        0, 0, 0, 0, // LSR
        0, 0, 0, 0, // DLSR
        0, 0, 0, 7, // Block 2: ssrc = 7
        0, 255, 255, 255, // Fraction lost = 0, cumulative lost = -1
        0, 0, 1, 0, // Extended highest sequence = 256
        0, 0, 0, 0, //
        0, 0, 0, 0, //
        0, 0, 0, 0,
    ]);

    let output = ReceiverReport::unmarshall(input.clone()).unwrap();

    assert_eq!(output.sender_ssrc, 1);
    assert_eq!(
        output.reports,
        vec![
            ReportBlock {
                ssrc: 2,
                fraction_lost: 64,
                cumulative_packets_lost: 3,
                ext_highest_sequence: 65546,
                jitter: 0,
                lsr: 0,
                dlsr: 0,
            },
            ReportBlock {
                ssrc: 7,
                fraction_lost: 0,
                cumulative_packets_lost: -1,
                ext_highest_sequence: 256,
                jitter: 0,
                lsr: 0,
                dlsr: 0,
            },
        ]
    );
    assert_eq!(output.marshall().unwrap(), input);
}

#[test]
fn receiver_report_shorter_than_declared_length() {
    let input = Bytes::from_static(&[
        129, 201, 0, 7, // RR header, RC = 1, length = 7
        0, 0, 0, 1, // Reporter ssrc = 1
        0, 0, 0, 2, // Truncated block
    ]);

    let output = ReceiverReport::unmarshall(input);

    assert_eq!(output.unwrap_err(), UnmarshallError::InvalidLength);
}

#[test]
fn sender_report_is_not_a_receiver_report() {
    let input = Bytes::from_static(&[128, 200, 0, 1, 0, 0, 0, 1]);

    let header = Header::unmarshall(input.clone()).unwrap();
    assert_eq!(header.payload_type, PayloadType::SenderReport);
    assert_eq!(
        ReceiverReport::unmarshall(input).unwrap_err(),
        UnmarshallError::UnexpectedFrame
    );
}
