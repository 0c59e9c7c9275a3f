/// A byte buffer that a heatmap can be built over and that mutators can rewrite.
///
/// Inputs are fully materialised; the heatmap only ever reads them through
/// [`Input::as_bytes`].
pub trait Input: Clone + Send + Sync + std::fmt::Debug + 'static {
    fn as_bytes(&self) -> &[u8];

    fn len(&self) -> usize {
        self.as_bytes().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Input for Vec<u8> {
    fn as_bytes(&self) -> &[u8] {
        self.as_slice()
    }
}
