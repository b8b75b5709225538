use crate::shared::frame::{Frame, FrameSize};
use crate::shared::pipeline_error::PipelineError;

use super::frame_source::{CompositeFrameSource, FrameSource};

/// Local index of a source with `source_total` frames at virtual
/// `position` of a timeline `reference_total` frames long.
pub fn resolve_index(position: usize, source_total: usize, reference_total: usize) -> usize {
    if reference_total == 0 {
        return 0;
    }
    (position as u128 * source_total as u128 / reference_total as u128) as usize
}

struct CachedFrame {
    index: usize,
    frame: Frame,
}

/// Presents several independently timed sources as one timeline as long
/// as the longest of them.
///
/// Shorter sources are stretched: at virtual position `i` each source shows
/// its frame `floor(i * total / reference_total)`. A source is only pulled
/// when that index advances; otherwise its last frame is reused from a
/// one-slot cache. There is no interpolation or back-fill, so a source that
/// runs dry ends the whole timeline.
pub struct MultiplexedFrameSource {
    sources: Vec<Box<dyn FrameSource>>,
    reference: usize,
    cache: Vec<Option<CachedFrame>>,
    position: usize,
    failed: bool,
}

impl MultiplexedFrameSource {
    pub fn new(sources: Vec<Box<dyn FrameSource>>) -> Result<Self, PipelineError> {
        let reference = reference_source(&sources).ok_or(PipelineError::NoUsableSource)?;
        let cache = sources.iter().map(|_| None).collect();
        Ok(Self {
            sources,
            reference,
            cache,
            position: 0,
            failed: false,
        })
    }

    /// Index of the source that sets the timeline length.
    pub fn reference(&self) -> usize {
        self.reference
    }

    /// Virtual positions resolved so far.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Local index last resolved for `source`, if it has been pulled.
    pub fn resolved_index(&self, source: usize) -> Option<usize> {
        self.cache.get(source)?.as_ref().map(|c| c.index)
    }

    fn reference_total(&self) -> usize {
        self.sources[self.reference].total_frame_count()
    }
}

/// The source with the most frames; the first one wins ties.
fn reference_source(sources: &[Box<dyn FrameSource>]) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (i, source) in sources.iter().enumerate() {
        let total = source.total_frame_count();
        if best.map_or(true, |(_, t)| total > t) {
            best = Some((i, total));
        }
    }
    best.filter(|&(_, total)| total > 0).map(|(i, _)| i)
}

impl CompositeFrameSource for MultiplexedFrameSource {
    fn frame_size(&self) -> FrameSize {
        self.sources
            .first()
            .map(|s| s.frame_size())
            .unwrap_or_default()
    }

    fn total_frame_count(&self) -> usize {
        self.reference_total()
    }

    fn has_more(&self) -> bool {
        !self.failed && self.sources[self.reference].has_more()
    }

    fn next_layers(&mut self) -> Option<Vec<&Frame>> {
        if !self.has_more() {
            return None;
        }

        let position = self.position;
        let reference_total = self.reference_total();

        for (i, source) in self.sources.iter_mut().enumerate() {
            let target = resolve_index(position, source.total_frame_count(), reference_total);
            if matches!(&self.cache[i], Some(cached) if cached.index == target) {
                continue;
            }
            match source.take_next() {
                Some(frame) => self.cache[i] = Some(CachedFrame { index: target, frame }),
                None => {
                    log::warn!(
                        "Source {i} has no frame for local index {target} (position {position})"
                    );
                    self.failed = true;
                    return None;
                }
            }
        }

        self.position += 1;
        Some(self.cache.iter().flatten().map(|c| &c.frame).collect())
    }
}
