//! Memory descriptors for SIMD-blocked tensors.
//!
//! Blocked layouts split one or more logical axes into fixed-size blocks so
//! vector kernels can process a full block at a time. The physical extent of
//! a blocked axis is rounded up to a multiple of the block size, and the
//! slots past the logical extent are padding.
//!
//! # Core Types
//!
//! - [`Format`]: closed catalog of layout tags, each with a [`LayoutMeta`] record
//! - [`MemoryDesc`]: logical and padded shape plus the offset functions
//!   [`MemoryDesc::blk_off`], [`MemoryDesc::off_v`] and [`MemoryDesc::off_l`]
//! - [`BlockedArray`]: owned storage paired with its descriptor
//! - [`DataType`] / [`Element`]: element kinds and the Rust scalars backing them
//!
//! # Example
//!
//! ```rust
//! use blocked_view::{DataType, Format, MemoryDesc};
//!
//! // 5 channels blocked by 8: the channel axis is padded to 8.
//! let md = MemoryDesc::new(&[2, 5, 3, 3], DataType::F32, Format::nChw8c).unwrap();
//! assert_eq!(md.padded_dims(), &[2, 8, 3, 3]);
//! assert_eq!(md.nelems(false), 90);
//! assert_eq!(md.nelems(true), 144);
//!
//! // Channel 5 of image 1, pixel (0, 0) sits in the padding lanes of block 0.
//! assert_eq!(md.off_v(&[1, 5, 0, 0]), 72 + 5);
//! ```

pub mod array;
mod data_type;
pub mod desc;
pub mod format;

pub use array::BlockedArray;
pub use data_type::{DataType, Element};
pub use desc::{BlockingDesc, MemoryDesc, MAX_NDIMS};
pub use format::{BlockOrder, Format, LayoutMeta, TensorKind};

// ============================================================================
// Error types
// ============================================================================

/// Errors raised while building or using a memory descriptor.
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    /// The dims do not have the rank the layout tag requires.
    #[error("rank mismatch for {format}: expected {expected}, got {got}")]
    RankMismatch {
        format: Format,
        expected: usize,
        got: usize,
    },

    /// Rank above [`MAX_NDIMS`].
    #[error("too many dimensions: {0} (max {MAX_NDIMS})")]
    TooManyDims(usize),

    /// Descriptors need a concrete element kind.
    #[error("undefined data type")]
    UndefinedDataType,

    /// A padded extent is smaller than its logical extent.
    #[error("padded extent {padded} of axis {axis} is smaller than dim {dim}")]
    InvalidPadding {
        axis: usize,
        dim: usize,
        padded: usize,
    },

    /// A padded extent is not a whole number of blocks.
    #[error("padded extent {padded} of axis {axis} is not a multiple of block {block}")]
    InvalidBlock {
        axis: usize,
        block: usize,
        padded: usize,
    },

    /// Blocking arrays do not all have one entry per axis.
    #[error("blocking description length mismatch")]
    StrideLengthMismatch,

    /// The element type does not match the descriptor's data type.
    #[error("data type mismatch: descriptor holds {expected:?}, found {found:?}")]
    DataTypeMismatch { expected: DataType, found: DataType },

    /// A buffer cannot hold every storage slot of the descriptor.
    #[error("buffer too small: need {needed} elements, got {got}")]
    BufferTooSmall { needed: usize, got: usize },

    /// Two positions of the padded box would share a storage slot.
    #[error("stride {stride} of axis {axis} overlaps the span {span} of finer strides")]
    OverlappingStrides {
        axis: usize,
        stride: usize,
        span: usize,
    },

    /// A tag name that is not in the catalog.
    #[error("unknown format tag {0:?}")]
    UnknownFormat(String),
}

/// Result type for descriptor operations.
pub type Result<T> = std::result::Result<T, LayoutError>;
