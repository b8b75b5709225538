use std::collections::VecDeque;

use crate::shared::constants::{DEFAULT_HIGH_WATERMARK, DEFAULT_LOW_WATERMARK};
use crate::shared::frame::Frame;
use crate::shared::media_time::MediaTime;
use crate::shared::pipeline_error::PipelineError;

/// Queue-size thresholds of a bounded frame buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferConfig {
    /// Refill starts when the queue holds fewer frames than this.
    pub low_watermark: usize,
    /// Refill stops once the queue holds more frames than this.
    pub high_watermark: usize,
}

impl BufferConfig {
    pub fn new(low_watermark: usize, high_watermark: usize) -> Result<Self, PipelineError> {
        if high_watermark == 0 || low_watermark > high_watermark {
            return Err(PipelineError::InvalidRequest(format!(
                "watermarks must satisfy low <= high and high > 0, got low={low_watermark} high={high_watermark}"
            )));
        }
        Ok(Self {
            low_watermark,
            high_watermark,
        })
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            low_watermark: DEFAULT_LOW_WATERMARK,
            high_watermark: DEFAULT_HIGH_WATERMARK,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    Pending,
    Issued,
    Skipped,
}

/// Positions (into the timestamp list) to extract, tagged with the
/// generation that was current when the batch was issued.
#[derive(Clone, Debug)]
pub struct RefillBatch {
    pub generation: u64,
    pub requests: Vec<(usize, MediaTime)>,
}

/// Outcome of handing one extraction result to the buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    Appended,
    Skipped,
    /// The buffer is full or under pressure; the batch was cancelled.
    Aborted,
    /// The batch had already been cancelled; the result was dropped.
    Stale,
}

impl Delivery {
    pub fn keep_going(self) -> bool {
        matches!(self, Delivery::Appended | Delivery::Skipped)
    }
}

struct QueuedFrame {
    position: usize,
    frame: Frame,
}

/// Shared state of a bounded frame buffer.
///
/// Pure bookkeeping with no locking of its own: the owner serializes every
/// call. Each timestamp position is `Pending` until its frame is queued
/// (`Issued`) or it fails to decode (`Skipped`, shrinking the total).
/// Trimming under memory pressure returns the newest queued positions to
/// `Pending`, so queued positions always precede pending ones.
pub struct BufferState {
    config: BufferConfig,
    timestamps: Vec<MediaTime>,
    slots: Vec<Slot>,
    pending: usize,
    queue: VecDeque<QueuedFrame>,
    issued_count: usize,
    total_frame_count: usize,
    current_index: usize,
    refilling: bool,
    memory_pressure: bool,
    generation: u64,
}

impl BufferState {
    pub fn new(timestamps: Vec<MediaTime>, config: BufferConfig) -> Self {
        let total = timestamps.len();
        Self {
            config,
            slots: vec![Slot::Pending; total],
            timestamps,
            pending: total,
            queue: VecDeque::with_capacity(config.high_watermark + 1),
            issued_count: 0,
            total_frame_count: total,
            current_index: 0,
            refilling: false,
            memory_pressure: false,
            generation: 0,
        }
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn issued_count(&self) -> usize {
        self.issued_count
    }

    pub fn total_frame_count(&self) -> usize {
        self.total_frame_count
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn is_refilling(&self) -> bool {
        self.refilling
    }

    pub fn is_under_pressure(&self) -> bool {
        self.memory_pressure
    }

    pub fn pending_count(&self) -> usize {
        self.pending
    }

    pub fn is_exhausted(&self) -> bool {
        self.current_index >= self.total_frame_count
    }

    /// Removes the oldest queued frame, stamping it with its emission index.
    pub fn take_front(&mut self) -> Option<Frame> {
        if self.is_exhausted() {
            return None;
        }
        let queued = self.queue.pop_front()?;
        let index = self.current_index;
        self.current_index += 1;
        Some(queued.frame.with_index(index))
    }

    fn wants_refill(&self) -> bool {
        if self.refilling || self.pending == 0 {
            return false;
        }
        self.queue.is_empty()
            || (!self.memory_pressure && self.queue.len() < self.config.low_watermark)
    }

    /// Starts a refill covering every pending position, if one is due.
    ///
    /// Starting a refill clears the pressure flag.
    pub fn begin_refill(&mut self) -> Option<RefillBatch> {
        if !self.wants_refill() {
            return None;
        }
        self.refilling = true;
        self.memory_pressure = false;
        let requests = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| **slot == Slot::Pending)
            .map(|(position, _)| (position, self.timestamps[position]))
            .collect();
        Some(RefillBatch {
            generation: self.generation,
            requests,
        })
    }

    fn is_current_pending(&self, generation: u64, position: usize) -> bool {
        generation == self.generation && self.slots.get(position) == Some(&Slot::Pending)
    }

    /// Appends a decoded frame unless the queue is over the high watermark
    /// or memory is under pressure, in which case the refill is cancelled.
    pub fn deliver_frame(&mut self, generation: u64, position: usize, frame: Frame) -> Delivery {
        if !self.is_current_pending(generation, position) {
            return Delivery::Stale;
        }
        if self.queue.len() > self.config.high_watermark || self.memory_pressure {
            self.cancel_refill();
            return Delivery::Aborted;
        }
        self.queue.push_back(QueuedFrame { position, frame });
        self.slots[position] = Slot::Issued;
        self.pending -= 1;
        self.issued_count += 1;
        Delivery::Appended
    }

    /// Permanently drops a position that could not be decoded.
    pub fn skip(&mut self, generation: u64, position: usize) -> Delivery {
        if !self.is_current_pending(generation, position) {
            return Delivery::Stale;
        }
        self.slots[position] = Slot::Skipped;
        self.pending -= 1;
        self.total_frame_count = self.total_frame_count.saturating_sub(1);
        Delivery::Skipped
    }

    /// Ends a batch the extractor has finished with. Positions it never
    /// answered are skipped so they are not requested forever. Returns how
    /// many were skipped. A batch that was cancelled meanwhile is ignored.
    pub fn complete_batch(&mut self, batch: &RefillBatch) -> usize {
        if batch.generation != self.generation {
            return 0;
        }
        let unanswered = batch
            .requests
            .iter()
            .filter(|&&(position, _)| self.skip(batch.generation, position) == Delivery::Skipped)
            .count();
        self.refilling = false;
        unanswered
    }

    /// Invalidates the in-flight batch; its later deliveries become stale.
    pub fn cancel_refill(&mut self) {
        self.generation += 1;
        self.refilling = false;
    }

    /// Records memory pressure. A queue over the high watermark loses its
    /// newest frames down to the watermark, and their positions will be
    /// requested again; an in-flight refill is cancelled. Returns the
    /// number of frames discarded.
    pub fn on_memory_pressure(&mut self) -> usize {
        self.memory_pressure = true;
        let high = self.config.high_watermark;
        if self.queue.len() <= high {
            return 0;
        }

        let discarded: Vec<QueuedFrame> = self.queue.drain(high..).collect();
        for queued in &discarded {
            self.slots[queued.position] = Slot::Pending;
        }
        self.pending += discarded.len();
        self.issued_count -= discarded.len();
        if self.refilling {
            self.cancel_refill();
        }
        discarded.len()
    }

    /// Settles a buffer that can make no further progress (empty queue, no
    /// refill in flight, nothing left to request) by cutting the total to
    /// what was delivered. Returns true if the total changed.
    pub fn settle(&mut self) -> bool {
        let stalled = self.queue.is_empty() && !self.refilling && self.pending == 0;
        if stalled && self.current_index < self.total_frame_count {
            self.total_frame_count = self.current_index;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timestamps(count: usize) -> Vec<MediaTime> {
        (0..count).map(|i| MediaTime::new(i as i64, 30)).collect()
    }

    fn frame(position: usize) -> Frame {
        Frame::new(vec![position as u8; 3], 1, 1, 3, position)
    }

    fn state(count: usize, low: usize, high: usize) -> BufferState {
        BufferState::new(timestamps(count), BufferConfig::new(low, high).unwrap())
    }

    /// Delivers every request of `batch` until the buffer stops accepting.
    fn run_batch(state: &mut BufferState, batch: &RefillBatch) -> usize {
        let mut appended = 0;
        for &(position, _) in &batch.requests {
            match state.deliver_frame(batch.generation, position, frame(position)) {
                Delivery::Appended => appended += 1,
                _ => return appended,
            }
        }
        state.complete_batch(batch);
        appended
    }

    #[test]
    fn test_config_rejects_inverted_watermarks() {
        assert!(BufferConfig::new(10, 5).is_err());
        assert!(BufferConfig::new(0, 0).is_err());
        assert!(BufferConfig::new(0, 1).is_ok());
        assert_eq!(BufferConfig::default(), BufferConfig::new(5, 20).unwrap());
    }

    #[test]
    fn test_first_refill_requests_everything() {
        let mut s = state(30, 5, 20);
        let batch = s.begin_refill().unwrap();
        assert_eq!(batch.requests.len(), 30);
        assert_eq!(batch.requests[3], (3, MediaTime::new(3, 30)));
        assert!(s.is_refilling());
        assert!(s.begin_refill().is_none());
    }

    #[test]
    fn test_refill_aborts_past_high_watermark() {
        let mut s = state(30, 5, 20);
        let batch = s.begin_refill().unwrap();
        let appended = run_batch(&mut s, &batch);

        assert_eq!(appended, 21);
        assert_eq!(s.queue_len(), 21);
        assert_eq!(s.issued_count(), 21);
        assert!(!s.is_refilling());
        assert_eq!(s.pending_count(), 9);
    }

    #[test]
    fn test_refill_resumes_below_low_watermark() {
        let mut s = state(30, 5, 20);
        let batch = s.begin_refill().unwrap();
        run_batch(&mut s, &batch);

        for _ in 0..16 {
            s.take_front().unwrap();
            assert!(s.begin_refill().is_none());
        }
        assert_eq!(s.queue_len(), 5);
        s.take_front().unwrap();

        let batch = s.begin_refill().unwrap();
        assert_eq!(batch.requests.first().map(|r| r.0), Some(21));
        assert_eq!(batch.requests.len(), 9);
    }

    #[test]
    fn test_frames_come_out_in_timestamp_order() {
        let mut s = state(50, 5, 20);
        let mut out = Vec::new();
        while !s.is_exhausted() {
            if let Some(batch) = s.begin_refill() {
                run_batch(&mut s, &batch);
            }
            out.push(s.take_front().unwrap());
        }
        let pixels: Vec<u8> = out.iter().map(|f| f.data()[0]).collect();
        assert_eq!(pixels, (0..50).collect::<Vec<u8>>());
        let indices: Vec<usize> = out.iter().map(Frame::index).collect();
        assert_eq!(indices, (0..50).collect::<Vec<usize>>());
        assert!(s.take_front().is_none());
    }

    #[test]
    fn test_pressure_trims_queue_to_high_watermark() {
        let mut s = state(30, 2, 3);
        let batch = s.begin_refill().unwrap();
        for position in 0..4 {
            assert_eq!(
                s.deliver_frame(batch.generation, position, frame(position)),
                Delivery::Appended
            );
        }
        assert_eq!(s.queue_len(), 4);
        assert_eq!(s.issued_count(), 4);

        let discarded = s.on_memory_pressure();

        assert_eq!(discarded, 1);
        assert_eq!(s.queue_len(), 3);
        assert_eq!(s.issued_count(), 3);
        assert!(!s.is_refilling());
        // Late results from the cancelled batch are dropped
        assert_eq!(s.deliver_frame(batch.generation, 4, frame(4)), Delivery::Stale);
        assert_eq!(s.pending_count(), 27);
    }

    #[test]
    fn test_pressure_trim_discards_newest_frames() {
        let mut s = state(40, 5, 20);
        let batch = s.begin_refill().unwrap();
        // Queue 25 frames while the refill is still in flight
        for position in 0..25 {
            s.queue.push_back(QueuedFrame {
                position,
                frame: frame(position),
            });
            s.slots[position] = Slot::Issued;
        }
        s.pending -= 25;
        s.issued_count = 25;

        let discarded = s.on_memory_pressure();

        assert_eq!(discarded, 5);
        assert_eq!(s.queue_len(), 20);
        assert_eq!(s.issued_count(), 20);
        assert_eq!(s.take_front().unwrap().data()[0], 0);

        // Discarded positions are requested again, starting at the oldest
        s.queue.clear();
        let retry = s.begin_refill().unwrap();
        assert_ne!(retry.generation, batch.generation);
        assert_eq!(retry.requests.first().map(|r| r.0), Some(20));
        assert_eq!(retry.requests.len(), 20);
    }

    #[test]
    fn test_pressure_after_finished_batch_trims_resting_queue() {
        let mut s = state(30, 5, 20);
        let batch = s.begin_refill().unwrap();
        run_batch(&mut s, &batch);
        assert_eq!(s.queue_len(), 21);
        assert!(!s.is_refilling());

        let discarded = s.on_memory_pressure();

        assert_eq!(discarded, 1);
        assert_eq!(s.queue_len(), 20);
        assert_eq!(s.issued_count(), 20);
        assert_eq!(s.pending_count(), 10);
        assert!(s.is_under_pressure());
        assert_eq!(s.take_front().map(|f| f.data()[0]), Some(0));
    }

    #[test]
    fn test_pressure_at_or_under_high_watermark_only_sets_flag() {
        let mut s = state(30, 5, 20);
        let batch = s.begin_refill().unwrap();
        for position in 0..20 {
            s.deliver_frame(batch.generation, position, frame(position));
        }
        s.complete_batch(&RefillBatch {
            generation: batch.generation,
            requests: Vec::new(),
        });

        assert_eq!(s.on_memory_pressure(), 0);
        assert!(s.is_under_pressure());
        assert_eq!(s.queue_len(), 20);
        assert_eq!(s.issued_count(), 20);
    }

    #[test]
    fn test_pressure_aborts_next_delivery() {
        let mut s = state(10, 5, 20);
        let batch = s.begin_refill().unwrap();
        s.deliver_frame(batch.generation, 0, frame(0));
        s.on_memory_pressure();

        assert_eq!(s.deliver_frame(batch.generation, 1, frame(1)), Delivery::Aborted);
        assert!(!s.is_refilling());
        assert_eq!(s.queue_len(), 1);
    }

    #[test]
    fn test_pressure_suspends_refill_until_queue_empty() {
        let mut s = state(30, 5, 20);
        let batch = s.begin_refill().unwrap();
        run_batch(&mut s, &batch);
        s.on_memory_pressure();

        while s.queue_len() > 0 {
            assert!(s.begin_refill().is_none());
            s.take_front().unwrap();
        }

        let batch = s.begin_refill().unwrap();
        assert!(!s.is_under_pressure());
        // The trimmed 21st frame is requested again
        assert_eq!(batch.requests.first().map(|r| r.0), Some(20));
        assert_eq!(batch.requests.len(), 10);
    }

    #[test]
    fn test_decode_error_shrinks_total() {
        let mut s = state(5, 1, 10);
        let batch = s.begin_refill().unwrap();
        let g = batch.generation;
        assert_eq!(s.deliver_frame(g, 0, frame(0)), Delivery::Appended);
        assert_eq!(s.skip(g, 1), Delivery::Skipped);
        assert_eq!(s.deliver_frame(g, 2, frame(2)), Delivery::Appended);
        assert_eq!(s.total_frame_count(), 4);
        // A second failure report for the same position changes nothing
        assert_eq!(s.skip(g, 1), Delivery::Stale);
        assert_eq!(s.total_frame_count(), 4);
    }

    #[test]
    fn test_complete_batch_skips_unanswered_positions() {
        let mut s = state(4, 1, 10);
        let batch = s.begin_refill().unwrap();
        s.deliver_frame(batch.generation, 0, frame(0));

        assert_eq!(s.complete_batch(&batch), 3);
        assert_eq!(s.total_frame_count(), 1);
        assert!(!s.is_refilling());
        assert!(s.begin_refill().is_none());
    }

    #[test]
    fn test_complete_batch_ignores_cancelled_batch() {
        let mut s = state(4, 1, 10);
        let batch = s.begin_refill().unwrap();
        s.cancel_refill();
        assert_eq!(s.complete_batch(&batch), 0);
        assert_eq!(s.total_frame_count(), 4);
    }

    #[test]
    fn test_settle_cuts_total_when_stalled() {
        let mut s = state(3, 1, 10);
        let batch = s.begin_refill().unwrap();
        s.deliver_frame(batch.generation, 0, frame(0));
        assert!(!s.settle());
        s.slots[1] = Slot::Issued;
        s.slots[2] = Slot::Issued;
        s.pending = 0;
        s.refilling = false;

        s.take_front().unwrap();
        assert!(s.settle());
        assert!(s.is_exhausted());
    }

    #[test]
    fn test_zero_low_watermark_still_refills_when_empty() {
        let mut s = state(3, 0, 2);
        assert!(s.begin_refill().is_some());
    }

    #[test]
    fn test_empty_buffer_is_exhausted() {
        let mut s = state(0, 5, 20);
        assert!(s.is_exhausted());
        assert!(s.begin_refill().is_none());
        assert!(s.take_front().is_none());
    }
}
