use std::path::PathBuf;

use crate::shared::constants::DEFAULT_PROBE_LIMIT;
use crate::shared::frame::{Frame, FrameSize};
use crate::source::domain::frame_source::FrameSource;
use crate::source::domain::image_decoder::ImageDecoder;

/// A numbered file path such as `shots/frame_%04d.png`.
///
/// `%d` is replaced by the decimal index and `%0Nd` by the index padded to
/// `N` digits. A template without a placeholder names a single file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathTemplate {
    prefix: String,
    suffix: String,
    width: Option<usize>,
}

impl PathTemplate {
    pub fn parse(template: &str) -> Self {
        let Some(start) = template.find('%') else {
            return Self::literal(template);
        };
        let rest = &template[start + 1..];
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if !rest[digits.len()..].starts_with('d') {
            return Self::literal(template);
        }
        let width = digits.parse::<usize>().ok().filter(|&w| w > 0);
        Self {
            prefix: template[..start].to_string(),
            suffix: rest[digits.len() + 1..].to_string(),
            width: Some(width.unwrap_or(0)),
        }
    }

    fn literal(path: &str) -> Self {
        Self {
            prefix: path.to_string(),
            suffix: String::new(),
            width: None,
        }
    }

    pub fn is_literal(&self) -> bool {
        self.width.is_none()
    }

    pub fn path_for(&self, index: usize) -> PathBuf {
        match self.width {
            None => PathBuf::from(&self.prefix),
            Some(width) => PathBuf::from(format!(
                "{}{:0width$}{}",
                self.prefix,
                index,
                self.suffix,
                width = width
            )),
        }
    }
}

/// How a numbered sequence is located on disk.
#[derive(Clone, Debug)]
pub struct FileSequenceOptions {
    pub first_index: usize,
    /// Known length; probed from the file system when `None`.
    pub total_frames: Option<usize>,
    /// Probing stops after this many files even if more exist.
    pub probe_limit: usize,
}

impl Default for FileSequenceOptions {
    fn default() -> Self {
        Self {
            first_index: 0,
            total_frames: None,
            probe_limit: DEFAULT_PROBE_LIMIT,
        }
    }
}

/// Lazily decodes one image file per pull from a numbered sequence.
///
/// A file that fails to decode ends the sequence: the total is cut to the
/// frames already delivered and no later index is tried.
pub struct FileSequenceFrameSource {
    template: PathTemplate,
    decoder: Box<dyn ImageDecoder>,
    first_index: usize,
    total: usize,
    index: usize,
    frame_size: FrameSize,
    first_frame: Option<Frame>,
}

impl FileSequenceFrameSource {
    pub fn open(
        template: &str,
        options: FileSequenceOptions,
        decoder: Box<dyn ImageDecoder>,
    ) -> Self {
        let template = PathTemplate::parse(template);
        let total = match (template.is_literal(), options.total_frames) {
            (true, _) => usize::from(template.path_for(0).is_file()),
            (false, Some(total)) => total,
            (false, None) => probe_length(&template, options.first_index, options.probe_limit),
        };

        let mut source = Self {
            template,
            decoder,
            first_index: options.first_index,
            total,
            index: 0,
            frame_size: FrameSize::default(),
            first_frame: None,
        };

        // The first frame is decoded up front to learn the frame size.
        if source.total > 0 {
            match source.decode_at(0) {
                Some(frame) => {
                    source.frame_size = frame.size();
                    source.first_frame = Some(frame);
                }
                None => source.total = 0,
            }
        }

        log::debug!(
            "Image sequence {:?}: {} frames of {}x{}",
            source.template.path_for(source.first_index),
            source.total,
            source.frame_size.width,
            source.frame_size.height
        );
        source
    }

    fn decode_at(&self, offset: usize) -> Option<Frame> {
        let path = self.template.path_for(self.first_index + offset);
        match self.decoder.decode(&path) {
            Ok(frame) => Some(frame.with_index(offset)),
            Err(e) => {
                log::warn!("Stopping image sequence at {}: {e}", path.display());
                None
            }
        }
    }
}

/// Counts consecutive existing files starting at `first_index`.
fn probe_length(template: &PathTemplate, first_index: usize, limit: usize) -> usize {
    (0..limit)
        .take_while(|offset| template.path_for(first_index + offset).is_file())
        .count()
}

impl FrameSource for FileSequenceFrameSource {
    fn frame_size(&self) -> FrameSize {
        self.frame_size
    }

    fn total_frame_count(&self) -> usize {
        self.total
    }

    fn current_index(&self) -> usize {
        self.index
    }

    fn take_next(&mut self) -> Option<Frame> {
        if !self.has_more() {
            return None;
        }
        let frame = match self.first_frame.take() {
            Some(frame) => Some(frame),
            None => self.decode_at(self.index),
        };
        match frame {
            Some(frame) => {
                self.index += 1;
                Some(frame)
            }
            None => {
                self.total = self.index;
                None
            }
        }
    }
}
