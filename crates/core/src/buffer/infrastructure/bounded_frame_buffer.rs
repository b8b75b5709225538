use std::ops::ControlFlow;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use crate::buffer::domain::buffer_state::{BufferConfig, BufferState, Delivery, RefillBatch};
use crate::buffer::domain::frame_extractor::FrameExtractor;
use crate::buffer::domain::memory_pressure::{MemoryPressureSignal, PressureSubscription};
use crate::shared::frame::{Frame, FrameSize};
use crate::shared::media_time::MediaTime;
use crate::source::domain::frame_source::FrameSource;

struct Shared {
    state: Mutex<BufferState>,
    changed: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_memory_pressure(&self) {
        let discarded = self.lock().on_memory_pressure();
        if discarded > 0 {
            log::info!("Memory pressure: discarded {discarded} buffered frames");
        }
        self.changed.notify_all();
    }
}

/// Point-in-time view of a buffer's bookkeeping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferStats {
    pub queue_len: usize,
    pub issued_count: usize,
    pub total_frame_count: usize,
    pub current_index: usize,
    pub refilling: bool,
    pub memory_pressure: bool,
}

/// Frame source that decodes a video at a fixed list of timestamps,
/// holding a bounded window of decoded frames ahead of the consumer.
///
/// Layout: `consumer (take_next) ⇄ state ⇄ producer thread [extractor]`
///
/// The consumer requests a refill whenever the queue drops below the low
/// watermark; the producer thread runs the extractor over every pending
/// timestamp and stops once the queue passes the high watermark. Decode
/// failures shrink the total instead of ending the stream.
pub struct BoundedFrameBuffer {
    shared: Arc<Shared>,
    frame_size: FrameSize,
    batches: Option<crossbeam_channel::Sender<RefillBatch>>,
    producer: Option<JoinHandle<()>>,
    subscription: Option<PressureSubscription>,
}

impl BoundedFrameBuffer {
    /// Starts the producer and requests the first refill. When `pressure`
    /// is given, the buffer trims itself whenever the signal fires.
    pub fn new(
        extractor: Box<dyn FrameExtractor>,
        frame_size: FrameSize,
        timestamps: Vec<MediaTime>,
        config: BufferConfig,
        pressure: Option<&MemoryPressureSignal>,
    ) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(BufferState::new(timestamps, config)),
            changed: Condvar::new(),
        });
        let (batch_tx, batch_rx) = crossbeam_channel::unbounded::<RefillBatch>();
        let producer = spawn_producer(extractor, batch_rx, shared.clone());

        let subscription = pressure.map(|signal| {
            let weak = Arc::downgrade(&shared);
            signal.subscribe(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.on_memory_pressure();
                }
            })
        });

        let buffer = Self {
            shared,
            frame_size,
            batches: Some(batch_tx),
            producer: Some(producer),
            subscription,
        };
        {
            let mut state = buffer.shared.lock();
            buffer.request_refill(&mut state);
        }
        buffer
    }

    pub fn stats(&self) -> BufferStats {
        let state = self.shared.lock();
        BufferStats {
            queue_len: state.queue_len(),
            issued_count: state.issued_count(),
            total_frame_count: state.total_frame_count(),
            current_index: state.current_index(),
            refilling: state.is_refilling(),
            memory_pressure: state.is_under_pressure(),
        }
    }

    /// Same as a signal notification, for callers that watch memory
    /// themselves.
    pub fn signal_memory_pressure(&self) {
        self.shared.on_memory_pressure();
    }

    fn request_refill(&self, state: &mut BufferState) {
        let Some(batch) = state.begin_refill() else {
            return;
        };
        log::debug!(
            "Refilling {} frames (queue {}, next position {})",
            batch.requests.len(),
            state.queue_len(),
            state.current_index()
        );
        let undelivered = match &self.batches {
            Some(tx) => tx.send(batch).err().map(|e| e.into_inner()),
            None => Some(batch),
        };
        if let Some(batch) = undelivered {
            log::warn!("Frame producer is gone, dropping {} frames", batch.requests.len());
            state.complete_batch(&batch);
        }
    }
}

impl FrameSource for BoundedFrameBuffer {
    fn frame_size(&self) -> FrameSize {
        self.frame_size
    }

    fn total_frame_count(&self) -> usize {
        self.shared.lock().total_frame_count()
    }

    fn current_index(&self) -> usize {
        self.shared.lock().current_index()
    }

    fn has_more(&self) -> bool {
        !self.shared.lock().is_exhausted()
    }

    fn take_next(&mut self) -> Option<Frame> {
        let mut state = self.shared.lock();
        loop {
            if let Some(frame) = state.take_front() {
                self.request_refill(&mut state);
                return Some(frame);
            }
            if state.is_exhausted() {
                return None;
            }
            self.request_refill(&mut state);
            if state.settle() {
                log::warn!(
                    "Frame buffer stalled, ending stream at {} frames",
                    state.total_frame_count()
                );
                return None;
            }
            state = self
                .shared
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

impl Drop for BoundedFrameBuffer {
    fn drop(&mut self) {
        self.subscription = None;
        self.shared.lock().cancel_refill();
        self.batches = None;
        if let Some(handle) = self.producer.take() {
            if handle.join().is_err() {
                log::warn!("Frame producer thread panicked");
            }
        }
    }
}

fn spawn_producer(
    mut extractor: Box<dyn FrameExtractor>,
    batch_rx: crossbeam_channel::Receiver<RefillBatch>,
    shared: Arc<Shared>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for batch in batch_rx {
            run_batch(&mut *extractor, &batch, &shared);
        }
    })
}

/// Feeds one batch through the extractor, delivering each result to the
/// shared state and waking the consumer after every frame.
fn run_batch(extractor: &mut dyn FrameExtractor, batch: &RefillBatch, shared: &Shared) {
    let times: Vec<MediaTime> = batch.requests.iter().map(|&(_, time)| time).collect();

    let result = extractor.extract(&times, &mut |i, result| {
        let Some(&(position, time)) = batch.requests.get(i) else {
            return ControlFlow::Continue(());
        };
        let delivery = {
            let mut state = shared.lock();
            match result {
                Ok(frame) => state.deliver_frame(batch.generation, position, frame),
                Err(e) => {
                    log::warn!("Skipping frame at {time}: {e}");
                    state.skip(batch.generation, position)
                }
            }
        };
        shared.changed.notify_all();
        if delivery.keep_going() {
            ControlFlow::Continue(())
        } else {
            ControlFlow::Break(())
        }
    });

    let unanswered = shared.lock().complete_batch(batch);
    match result {
        Err(e) => log::warn!("Frame extraction failed, dropped {unanswered} frames: {e}"),
        Ok(()) if unanswered > 0 => {
            log::warn!("Extractor returned no result for {unanswered} frames")
        }
        Ok(()) => {}
    }
    shared.changed.notify_all();
}
