use bytes::Bytes;

use crate::actors::Renderer;

/// Trust level of a synchronization source. A new or re-seeded source stays on
/// probation until `MIN_SEQUENTIAL` packets arrived in strict sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValidationState {
    Probation(u32),
    Trusted,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SequenceStatus {
    /// In sequence while still on probation.
    Probation,
    /// Out of sequence while on probation, the countdown starts over.
    ProbationReset,
    /// Last packet of the probation run; counters re-seeded.
    ProbationComplete,
    /// In order, possibly after a permissible gap or a 16-bit wrap.
    InOrder,
    /// Duplicate or reordered packet.
    Reordered,
    /// Second packet of a repeated large jump; the sender restarted.
    Resynchronized,
    /// Unconfirmed large jump.
    Rejected,
}

impl SequenceStatus {
    pub fn is_forwarded(&self) -> bool {
        !matches!(self, SequenceStatus::Rejected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequenceUpdate {
    pub status: SequenceStatus,
    pub extended_seq: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceValidator {
    state: ValidationState,
    max_seq: u16,
    cycles: u32,
    base_seq: u32,
    bad_seq: u32,
    received: u32,
    expected_prior: u32,
    received_prior: u32,
}

impl SourceValidator {
    /// Creates the validator for a source seen for the first time and
    /// forwards that first packet.
    pub fn new(seq: u16, payload: Bytes, renderer: &mut impl Renderer) -> Self {
        let mut validator = Self::seeded(seq);
        validator.accept(seq, payload, renderer);
        validator
    }

    fn seeded(seq: u16) -> Self {
        let mut validator = Self {
            state: ValidationState::Probation(MIN_SEQUENTIAL),
            max_seq: 0,
            cycles: 0,
            base_seq: 0,
            bad_seq: 0,
            received: 0,
            expected_prior: 0,
            received_prior: 0,
        };
        validator.init_seq(seq);
        validator.max_seq = seq.wrapping_sub(1);
        validator
    }

    fn init_seq(&mut self, seq: u16) {
        self.max_seq = seq;
        self.cycles = 0;
        self.base_seq = seq as u32;
        self.bad_seq = RTP_SEQ_MOD + 1;
        self.received = 0;
        self.expected_prior = 0;
        self.received_prior = 0;
    }

    /// Runs `seq` through the validation state machine and forwards the
    /// payload unless the packet is rejected. Returns whether it was forwarded.
    pub fn accept(&mut self, seq: u16, payload: Bytes, renderer: &mut impl Renderer) -> bool {
        let update = self.update_seq(seq);
        if !update.status.is_forwarded() {
            return false;
        }

        renderer.queue(payload, update.extended_seq);
        true
    }

    pub fn update_seq(&mut self, seq: u16) -> SequenceUpdate {
        match self.state {
            ValidationState::Probation(remaining) => self.update_on_probation(seq, remaining),
            ValidationState::Trusted => self.update_trusted(seq),
        }
    }

    fn update_on_probation(&mut self, seq: u16, remaining: u32) -> SequenceUpdate {
        let extended_seq = self.cycles | seq as u32;

        if seq != self.max_seq.wrapping_add(1) {
            self.state = ValidationState::Probation(MIN_SEQUENTIAL - 1);
            self.max_seq = seq;
            return SequenceUpdate {
                status: SequenceStatus::ProbationReset,
                extended_seq,
            };
        }

        self.max_seq = seq;
        let remaining = remaining.saturating_sub(1);
        if remaining > 0 {
            self.state = ValidationState::Probation(remaining);
            return SequenceUpdate {
                status: SequenceStatus::Probation,
                extended_seq,
            };
        }

        self.init_seq(seq);
        self.received += 1;
        self.state = ValidationState::Trusted;
        SequenceUpdate {
            status: SequenceStatus::ProbationComplete,
            extended_seq,
        }
    }

    fn update_trusted(&mut self, seq: u16) -> SequenceUpdate {
        let u_delta = seq.wrapping_sub(self.max_seq);

        let status = if u_delta < MAX_DROPOUT {
            // in order, with permissible gap
            if seq < self.max_seq {
                self.cycles = self.cycles.wrapping_add(RTP_SEQ_MOD);
            }
            self.max_seq = seq;
            SequenceStatus::InOrder
        } else if u_delta as u32 <= RTP_SEQ_MOD - MAX_MISORDER {
            // the sequence number made a very large jump
            if seq as u32 == self.bad_seq {
                self.init_seq(seq);
                SequenceStatus::Resynchronized
            } else {
                self.bad_seq = (seq as u32 + 1) & (RTP_SEQ_MOD - 1);
                return SequenceUpdate {
                    status: SequenceStatus::Rejected,
                    extended_seq: self.cycles | seq as u32,
                };
            }
        } else {
            SequenceStatus::Reordered
        };

        self.received = self.received.wrapping_add(1);
        SequenceUpdate {
            status,
            extended_seq: self.cycles | seq as u32,
        }
    }

    pub fn state(&self) -> ValidationState {
        self.state
    }

    pub fn is_trusted(&self) -> bool {
        self.state == ValidationState::Trusted
    }

    pub fn received(&self) -> u32 {
        self.received
    }

    pub fn extended_max_seq(&self) -> u32 {
        self.cycles | self.max_seq as u32
    }

    pub fn expected(&self) -> u32 {
        self.extended_max_seq()
            .wrapping_sub(self.base_seq)
            .wrapping_add(1)
    }

    /// Closes the current reporting interval and returns the packets expected
    /// and received during it.
    pub fn roll_interval(&mut self) -> (u32, u32) {
        let expected = self.expected();
        let expected_interval = expected.wrapping_sub(self.expected_prior);
        self.expected_prior = expected;

        let received_interval = self.received.wrapping_sub(self.received_prior);
        self.received_prior = self.received;

        (expected_interval, received_interval)
    }

    /// Validator in the state reached right after probation ended on `seq`.
    #[cfg(test)]
    pub(crate) fn trusted(seq: u16) -> Self {
        let mut validator = Self::seeded(seq);
        validator.init_seq(seq);
        validator.received = 1;
        validator.state = ValidationState::Trusted;
        validator
    }

    #[cfg(test)]
    pub(crate) fn with_counters(cycles: u32, max_seq: u16, base_seq: u32, received: u32) -> Self {
        let mut validator = Self::trusted(max_seq);
        validator.cycles = cycles;
        validator.base_seq = base_seq;
        validator.received = received;
        validator
    }
}

pub const MIN_SEQUENTIAL: u32 = 2;
pub const MAX_DROPOUT: u16 = 3000;
pub const MAX_MISORDER: u32 = 100;
pub const RTP_SEQ_MOD: u32 = 1 << 16;
