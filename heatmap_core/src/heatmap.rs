use log::{debug, trace};
use rand::Rng;
use rand_core::RngCore;
use serde::Deserialize;
use std::fmt;

/// Chunk size in bytes used when classifying data as constant or interesting.
///
/// A single non-repeated byte marks its whole chunk as interesting, so this is
/// also the resolution at which locations are chosen.
pub const GRANULARITY: usize = 64;

/// A `Heatmap` assigns a probability distribution to the bytes of a buffer and
/// selects offsets according to it.
///
/// Mutators use a heatmap to decide *where* to mutate, not *what* to do there.
/// Different implementations model different distributions; callers only ever
/// see this trait, so a new distribution can be introduced without touching them.
pub trait Heatmap: Send + Sync {
    /// Chooses a random offset into the data the heatmap was built from.
    ///
    /// The returned offset is always in `0..raw_length`.
    fn choose_location(&self, rng: &mut dyn RngCore) -> usize;
}

/// Selects which `Heatmap` implementation to build.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum HeatmapKind {
    /// Uniform over the non-constant chunks of the data, see [`GenericHeatmap`].
    #[default]
    Generic,
}

/// Builds the heatmap of the requested kind over `data`.
pub fn make_heatmap(kind: HeatmapKind, data: &[u8]) -> Box<dyn Heatmap> {
    match kind {
        HeatmapKind::Generic => Box::new(GenericHeatmap::new(data)),
    }
}

/// An "interesting" run of bytes in the original data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// Absolute start position in the original data.
    pub offset: usize,
    /// Number of bytes in the run, always positive.
    pub length: usize,
}

impl Segment {
    /// One past the last byte of the segment.
    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// A heatmap over sparse data that prioritises regions which are not a single
/// repeated byte.
///
/// The data is viewed as a series of chunks of [`GRANULARITY`] bytes. Chunks
/// consisting of one repeated value are ignored, and offsets are chosen
/// uniformly among the bytes of the remaining "interesting" segments.
///
/// If the whole buffer is one repeated byte there are no segments, and
/// [`GenericHeatmap::choose_location`] falls back to choosing uniformly over the
/// entire buffer. That is the only case in which a constant byte can be chosen.
#[derive(Debug, Clone, Default)]
pub struct GenericHeatmap {
    /// Interesting parts of the data, sorted by offset.
    segments: Vec<Segment>,
    /// Sum of all segment lengths.
    length: usize,
    /// Length of the original data.
    raw_length: usize,
}

impl GenericHeatmap {
    /// Scans `data` once and builds the heatmap for it.
    pub fn new(data: &[u8]) -> Self {
        let mut heatmap = Self::default();
        heatmap.repopulate(data);
        heatmap
    }

    /// Discards the current segments and rebuilds the heatmap for `data`.
    pub fn repopulate(&mut self, data: &[u8]) {
        let (length, segments) = calculate_length_and_segments(data, GRANULARITY);
        self.segments = segments;
        self.length = length;
        self.raw_length = data.len();
        debug!(
            "heatmap built: {} segments, {} interesting of {} bytes",
            self.segments.len(),
            self.length,
            self.raw_length
        );
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Total number of bytes covered by the interesting segments.
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn raw_length(&self) -> usize {
        self.raw_length
    }
}

impl Heatmap for GenericHeatmap {
    /// # Panics
    /// If the heatmap was built from an empty buffer.
    fn choose_location(&self, rng: &mut dyn RngCore) -> usize {
        assert!(
            self.raw_length > 0,
            "choose_location: heatmap was built from empty data"
        );

        if self.length == 0 {
            // No segments, the data is all one byte. Fall back to uniform selection.
            let raw_idx = rng.random_range(0..self.raw_length);
            trace!("heatmap has no segments, uniform fallback chose {raw_idx}");
            return raw_idx;
        }

        let heatmap_idx = rng.random_range(0..self.length);
        let raw_idx = translate_index(heatmap_idx, &self.segments);
        trace!("heatmap index {heatmap_idx} translated to {raw_idx}");
        raw_idx
    }
}

impl fmt::Display for GenericHeatmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "heatmap: {} segments, {} interesting of {} bytes",
            self.segments.len(),
            self.length,
            self.raw_length
        )?;
        for (i, segment) in self.segments.iter().enumerate() {
            writeln!(
                f,
                "segment {i:4}: {:8} - {:8}",
                segment.offset,
                segment.end()
            )?;
        }
        Ok(())
    }
}

/// Determines the interesting segments of `data`, also returning their combined length.
///
/// `data` is read in chunks of `granularity` bytes (the last chunk may be shorter).
/// Consecutive chunks that are not a single repeated byte are merged into one segment.
///
/// # Panics
/// If `granularity` is zero.
pub fn calculate_length_and_segments(data: &[u8], granularity: usize) -> (usize, Vec<Segment>) {
    assert!(
        granularity > 0,
        "calculate_length_and_segments: granularity must be positive"
    );

    let mut segments = Vec::new();
    let mut total_length = 0;
    let mut current: Option<Segment> = None;

    for (chunk_idx, chunk) in data.chunks(granularity).enumerate() {
        if is_constant(chunk) {
            if let Some(segment) = current.take() {
                total_length += segment.length;
                segments.push(segment);
            }
        } else {
            current
                .get_or_insert(Segment {
                    offset: chunk_idx * granularity,
                    length: 0,
                })
                .length += chunk.len();
        }
    }

    if let Some(segment) = current {
        total_length += segment.length;
        segments.push(segment);
    }

    (total_length, segments)
}

fn is_constant(chunk: &[u8]) -> bool {
    chunk.windows(2).all(|pair| pair[0] == pair[1])
}

/// Converts an index into the concatenated `segments` into an index into the raw data.
///
/// For example, with segments `{offset: 10, length: 20}` and `{offset: 50, length: 10}`,
/// index 25 is element 5 of the second segment, i.e. raw offset 55.
///
/// # Panics
/// If `idx` is not smaller than the combined length of `segments`. That means the
/// caller drew the index against the wrong bound.
pub fn translate_index(idx: usize, segments: &[Segment]) -> usize {
    let mut remaining = idx;
    for segment in segments {
        if remaining < segment.length {
            return segment.offset + remaining;
        }
        remaining -= segment.length;
    }
    panic!("translate_index: index out of range {idx}");
}
