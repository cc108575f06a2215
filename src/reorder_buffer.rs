use std::collections::BTreeMap;

use bytes::Bytes;

use crate::source_validator::RTP_SEQ_MOD;

pub const DEFAULT_REORDER_DEPTH: usize = 32;

/// Sequence distance past which a payload is taken as a sender restart
/// instead of a late or early packet.
const RESTART_DISTANCE: u32 = 3000;

/// Restores extended-sequence order for forwarded payloads. Holds at most
/// `depth` payloads waiting for a gap to fill before skipping it.
#[derive(Debug)]
pub(crate) struct ReorderBuffer {
    pending: BTreeMap<u32, Bytes>,
    next_seq: Option<u32>,
    depth: usize,
}

impl Default for ReorderBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_REORDER_DEPTH)
    }
}

impl ReorderBuffer {
    pub fn new(depth: usize) -> Self {
        Self {
            pending: BTreeMap::new(),
            next_seq: None,
            depth,
        }
    }

    /// Inserts a payload and returns every payload now ready, in order.
    pub fn push(&mut self, extended_seq: u32, payload: Bytes) -> Vec<Bytes> {
        let mut ready = Vec::new();
        let next_seq = *self.next_seq.get_or_insert(extended_seq);
        let extended_seq = previous_cycle(extended_seq, next_seq).unwrap_or(extended_seq);

        if extended_seq.abs_diff(next_seq) >= RESTART_DISTANCE {
            ready.extend(self.drain());
            self.next_seq = Some(extended_seq);
        } else if extended_seq < next_seq || self.pending.contains_key(&extended_seq) {
            // Late or duplicate
            return ready;
        }

        self.pending.insert(extended_seq, payload);
        self.release(&mut ready);

        while self.pending.len() > self.depth {
            self.next_seq = self.pending.keys().next().copied();
            self.release(&mut ready);
        }

        ready
    }

    /// Empties the buffer in order, skipping any gaps.
    pub fn drain(&mut self) -> Vec<Bytes> {
        if let Some(last) = self.pending.keys().next_back() {
            self.next_seq = Some(last.wrapping_add(1));
        }
        std::mem::take(&mut self.pending).into_values().collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    fn release(&mut self, ready: &mut Vec<Bytes>) {
        while let Some(next_seq) = self.next_seq {
            match self.pending.remove(&next_seq) {
                Some(payload) => {
                    ready.push(payload);
                    self.next_seq = Some(next_seq.wrapping_add(1));
                }
                None => break,
            }
        }
    }
}

/// A packet reordered across a 16-bit wrap is tagged with the newer cycle.
/// Returns its tag in the previous cycle when that lands near `next_seq`.
fn previous_cycle(extended_seq: u32, next_seq: u32) -> Option<u32> {
    let previous = extended_seq.checked_sub(RTP_SEQ_MOD)?;
    let far_ahead = extended_seq > next_seq && extended_seq - next_seq >= RESTART_DISTANCE;
    (far_ahead && previous.abs_diff(next_seq) < RESTART_DISTANCE).then_some(previous)
}
