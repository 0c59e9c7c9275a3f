pub mod codec;
pub mod config;
pub mod heatmap;
pub mod input;
pub mod mutator;

pub use codec::{CodecError, compress, decode_b64, decompress, decompress_into, encode_b64};
pub use config::{ConfigError, HeatmapConfig};
pub use heatmap::{
    GRANULARITY, GenericHeatmap, Heatmap, HeatmapKind, Segment, calculate_length_and_segments,
    make_heatmap, translate_index,
};
pub use input::Input;
pub use mutator::{CompressedImageMutator, HeatmapMutator, Mutator};
