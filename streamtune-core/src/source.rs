use std::{
    sync::{
        Arc, RwLock,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use rodio::Source;

/// Samples copied out of the shared buffer per lock acquisition
const READ_CHUNK: usize = 4096;

/// Decoded PCM shared between the loader (writer) and the audio callback (reader).
///
/// Samples are interleaved f32. The loader appends segment by segment and calls
/// [`StreamBuffer::finish`] once nothing more will arrive.
#[derive(Debug)]
pub struct StreamBuffer {
    samples: RwLock<Vec<f32>>,
    sample_rate: u32,
    channels: u16,
    finished: AtomicBool,
}

impl StreamBuffer {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: RwLock::new(Vec::new()),
            sample_rate,
            channels: channels.max(1),
            finished: AtomicBool::new(false),
        }
    }

    /// Build an already-complete buffer
    pub fn complete(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        let buffer = Self::new(sample_rate, channels);
        buffer.append(&samples);
        buffer.finish();
        buffer
    }

    pub fn append(&self, samples: &[f32]) {
        match self.samples.write() {
            Ok(mut guard) => guard.extend_from_slice(samples),
            Err(poisoned) => poisoned.into_inner().extend_from_slice(samples),
        }
    }

    pub fn finish(&self) {
        self.finished.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        match self.samples.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Copy up to `out.capacity()` samples starting at `from` into `out`
    fn read_into(&self, from: usize, out: &mut Vec<f32>) -> usize {
        out.clear();
        let guard = match self.samples.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if from < guard.len() {
            let end = (from + READ_CHUNK).min(guard.len());
            out.extend_from_slice(&guard[from..end]);
        }
        out.len()
    }
}

/// Shared position tracker between source and engine
#[derive(Clone, Debug)]
pub struct PositionTracker {
    /// Current sample position (atomic for thread-safe access)
    position: Arc<AtomicUsize>,
    /// Sample rate for time calculations
    sample_rate: u32,
    /// Number of channels
    channels: u16,
}

impl PositionTracker {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            position: Arc::new(AtomicUsize::new(0)),
            sample_rate: sample_rate.max(1),
            channels: channels.max(1),
        }
    }

    pub fn sample_position(&self) -> usize {
        self.position.load(Ordering::Relaxed)
    }

    /// Get current position in seconds
    pub fn position_seconds(&self) -> f32 {
        let frames = self.sample_position() / (self.channels as usize);
        (frames as f32) / (self.sample_rate as f32)
    }

    /// Set position from seconds, aligned to a frame boundary
    pub fn seek_to_seconds(&self, seconds: f32) {
        let frames = (seconds.max(0.0) * (self.sample_rate as f32)) as usize;
        self.position
            .store(frames * (self.channels as usize), Ordering::Relaxed);
    }

    /// Reset position to start
    pub fn reset(&self) {
        self.position.store(0, Ordering::Relaxed);
    }

    fn advance_to(&self, sample: usize) {
        self.position.store(sample, Ordering::Relaxed);
    }
}

/// A prepared stream: the shared buffer plus what is known from the manifest
#[derive(Clone, Debug)]
pub struct PreparedStream {
    pub buffer: Arc<StreamBuffer>,
    /// Duration announced by the manifest (or measured for progressive audio)
    pub duration_seconds: f32,
}

impl PreparedStream {
    pub fn new(buffer: Arc<StreamBuffer>, duration_seconds: f32) -> Self {
        Self {
            buffer,
            duration_seconds,
        }
    }

    pub fn tracker(&self) -> PositionTracker {
        PositionTracker::new(self.buffer.sample_rate(), self.buffer.channels())
    }

    /// Whether playback reached the end of a fully loaded stream
    pub fn is_exhausted(&self, tracker: &PositionTracker) -> bool {
        self.buffer.is_finished() && tracker.sample_position() >= self.buffer.len()
    }

    /// Create a rodio Source reading this stream at the tracker's position
    pub fn create_source(&self, tracker: &PositionTracker) -> BufferedSource {
        BufferedSource {
            buffer: Arc::clone(&self.buffer),
            duration_seconds: self.duration_seconds,
            position_tracker: tracker.clone(),
            chunk: Vec::with_capacity(READ_CHUNK),
            chunk_start: 0,
        }
    }
}

/// A streaming audio source that implements rodio's Source trait.
///
/// Reads ahead in chunks; emits silence without advancing while the buffer is
/// starved, and ends once the buffer is finished and fully read.
pub struct BufferedSource {
    buffer: Arc<StreamBuffer>,
    duration_seconds: f32,
    position_tracker: PositionTracker,
    chunk: Vec<f32>,
    chunk_start: usize,
}

impl Iterator for BufferedSource {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let pos = self.position_tracker.sample_position();

        let cached = pos >= self.chunk_start && pos < self.chunk_start + self.chunk.len();
        if !cached {
            self.chunk_start = pos;
            if self.buffer.read_into(pos, &mut self.chunk) == 0 {
                return if self.buffer.is_finished() && pos >= self.buffer.len() {
                    None
                } else {
                    Some(0.0)
                };
            }
        }

        let sample = self.chunk[pos - self.chunk_start];
        self.position_tracker.advance_to(pos + 1);
        Some(sample)
    }
}

impl Source for BufferedSource {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.buffer.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.buffer.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        Duration::try_from_secs_f32(self.duration_seconds).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Vec<f32> {
        (0..len).map(|i| i as f32).collect()
    }

    #[test]
    fn source_reads_whole_buffer_then_ends() {
        let stream = PreparedStream::new(Arc::new(StreamBuffer::complete(ramp(10_000), 1000, 2)), 5.0);
        let tracker = stream.tracker();
        let samples: Vec<f32> = stream.create_source(&tracker).collect();
        assert_eq!(samples, ramp(10_000));
        assert!(stream.is_exhausted(&tracker));
        assert_eq!(tracker.position_seconds(), 5.0);
    }

    #[test]
    fn source_outputs_silence_while_starved() {
        let buffer = Arc::new(StreamBuffer::new(1000, 1));
        buffer.append(&[0.5, 0.5]);
        let stream = PreparedStream::new(Arc::clone(&buffer), 1.0);
        let tracker = stream.tracker();
        let mut source = stream.create_source(&tracker);

        assert_eq!(source.next(), Some(0.5));
        assert_eq!(source.next(), Some(0.5));
        assert_eq!(source.next(), Some(0.0));
        assert!(!stream.is_exhausted(&tracker));
        assert_eq!(tracker.sample_position(), 2);

        buffer.append(&[0.25]);
        buffer.finish();
        assert_eq!(source.next(), Some(0.25));
        assert_eq!(source.next(), None);
    }

    #[test]
    fn seeking_moves_the_reader() {
        let stream = PreparedStream::new(Arc::new(StreamBuffer::complete(ramp(4000), 1000, 2)), 2.0);
        let tracker = stream.tracker();
        let mut source = stream.create_source(&tracker);
        assert_eq!(source.next(), Some(0.0));

        tracker.seek_to_seconds(1.5);
        assert_eq!(tracker.sample_position(), 3000);
        assert_eq!(source.next(), Some(3000.0));
        assert_eq!(tracker.position_seconds(), 1.5);
    }
}
