#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Options {
    /// Maximum number of characters buffered while waiting for JSON to start.
    /// Once the bound is crossed without a `{` or `[`, the healer commits to
    /// plain-text passthrough and stops interpreting the stream.
    pub max_preamble: usize,
    /// Upper bound on the number of `$ref` hops followed while resolving a
    /// sub-schema. Reference chains longer than this (including cycles) make
    /// the affected path unresolvable; the frame is still closed structurally.
    pub max_ref_hops: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_preamble: 500,
            max_ref_hops: 32,
        }
    }
}
