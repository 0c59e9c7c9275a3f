use crate::codec;
use crate::heatmap::{HeatmapKind, make_heatmap};
use crate::input::Input;
use log::{debug, warn};
use rand::Rng;

/// Default upper bound on the number of point mutations applied per call.
pub const DEFAULT_MAX_MUTATIONS: usize = 8;

/// A `Mutator` is responsible for transforming an `Input` into a new, potentially modified `Input`.
///
/// # Type Parameters
/// * `I`: The type of `Input` this mutator operates on.
/// * `R`: The type of random number generator used for mutation decisions.
pub trait Mutator<I: Input, R: Rng + ?Sized> {
    /// Applies a mutation strategy to an optional input to produce a new input.
    ///
    /// # Arguments
    /// * `input_opt`: The input to mutate, or `None` to start from the mutator's
    ///   default starting point.
    /// * `rng`: A mutable reference to a random number generator.
    ///
    /// # Returns
    /// `Result<I, anyhow::Error>`:
    ///   - `Ok(new_input)`: The newly generated or mutated input.
    ///   - `Err(error)`: If any error occurred during the mutation process.
    fn mutate(&mut self, input_opt: Option<&I>, rng: &mut R) -> Result<I, anyhow::Error>;
}

/// A `Mutator` that overwrites small integers at offsets chosen by a heatmap.
///
/// Each call builds a heatmap over the input and performs between 1 and
/// `max_mutations` point mutations. A point mutation picks an offset from the
/// heatmap, a width of 1, 2, 4 or 8 bytes (shrunk to 1 if it would run past the
/// end of the data) and stores a random little-endian integer of that width.
///
/// Because the heatmap avoids runs of a single repeated byte, mutations land in
/// the structured parts of the input rather than in padding.
#[derive(Debug, Clone, Copy)]
pub struct HeatmapMutator {
    kind: HeatmapKind,
    max_mutations: usize,
}

impl HeatmapMutator {
    /// Creates a new `HeatmapMutator`. A `max_mutations` of zero selects
    /// [`DEFAULT_MAX_MUTATIONS`].
    pub fn new(kind: HeatmapKind, max_mutations: usize) -> Self {
        Self {
            kind,
            max_mutations: if max_mutations == 0 {
                DEFAULT_MAX_MUTATIONS
            } else {
                max_mutations
            },
        }
    }

    pub fn max_mutations(&self) -> usize {
        self.max_mutations
    }

    /// Mutates `data` in place and returns the number of point mutations applied.
    ///
    /// Empty data is left untouched.
    pub fn mutate_bytes<R: Rng>(&self, data: &mut [u8], rng: &mut R) -> usize {
        if data.is_empty() {
            return 0;
        }

        let heatmap = make_heatmap(self.kind, data);
        let num_mutations = 1 + rng.random_range(0..self.max_mutations);
        for _ in 0..num_mutations {
            let index = heatmap.choose_location(&mut *rng);
            let mut width = 1usize << rng.random_range(0..4u32);
            if index + width > data.len() {
                width = 1;
            }
            let value = rng.random::<u64>().to_le_bytes();
            data[index..index + width].copy_from_slice(&value[..width]);
        }
        num_mutations
    }
}

impl Default for HeatmapMutator {
    fn default() -> Self {
        Self::new(HeatmapKind::default(), DEFAULT_MAX_MUTATIONS)
    }
}

impl<I, R> Mutator<I, R> for HeatmapMutator
where
    I: Input + From<Vec<u8>>,
    Vec<u8>: From<I>,
    R: Rng,
{
    /// `None` starts from a single zero byte. An empty input is returned unchanged,
    /// since there is no location to choose.
    fn mutate(&mut self, input_opt: Option<&I>, rng: &mut R) -> Result<I, anyhow::Error> {
        let mut input_bytes = match input_opt {
            Some(input_ref) => Vec::from(input_ref.clone()),
            None => vec![0u8; 1],
        };

        let applied = self.mutate_bytes(&mut input_bytes, rng);
        debug!(
            "applied {} point mutations to {} bytes",
            applied,
            input_bytes.len()
        );
        Ok(I::from(input_bytes))
    }
}

/// A `Mutator` for gzip-compressed images.
///
/// The image is decompressed, mutated with a [`HeatmapMutator`] and compressed
/// again. Images are typically mostly zero-filled, which is exactly the data the
/// heatmap steers away from.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompressedImageMutator {
    inner: HeatmapMutator,
}

impl CompressedImageMutator {
    pub fn new(inner: HeatmapMutator) -> Self {
        Self { inner }
    }
}

impl<I, R> Mutator<I, R> for CompressedImageMutator
where
    I: Input + From<Vec<u8>>,
    R: Rng,
{
    /// `None` starts from an image holding a single zero byte. An image that
    /// decompresses to nothing is returned unchanged.
    fn mutate(&mut self, input_opt: Option<&I>, rng: &mut R) -> Result<I, anyhow::Error> {
        let mut data = match input_opt {
            Some(input) => {
                let data = codec::decompress(input.as_bytes())
                    .map_err(|e| anyhow::anyhow!("Failed to decompress image: {}", e))?;
                if data.is_empty() {
                    warn!("image decompressed to no data, leaving it unchanged");
                    return Ok(input.clone());
                }
                data
            }
            None => vec![0u8; 1],
        };

        self.inner.mutate_bytes(&mut data, rng);

        let compressed = codec::compress(&data)
            .map_err(|e| anyhow::anyhow!("Failed to recompress mutated image: {}", e))?;
        Ok(I::from(compressed))
    }
}
