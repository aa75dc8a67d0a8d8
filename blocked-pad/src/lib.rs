//! Zero padding for blocked tensor storage.
//!
//! Vector kernels read and write whole blocks, so the padding slots of a
//! blocked tensor must hold zeros for results to stay correct. This crate
//! writes those zeros in place, touching nothing but padding.
//!
//! # Routines
//!
//! - Family routines for the common tags: channel-blocked activations and
//!   weights blocked on output channels, input channels, both, or groups
//!   (see [`Family`] and [`classify`])
//! - A generic engine for any other fully described blocking
//!   ([`zero_pad_generic`])
//!
//! Work is split over rayon's thread pool with the `parallel` feature
//! (enabled by default).
//!
//! # Example
//!
//! ```rust
//! use blocked_pad::{zero_pad_array, BlockedArray, DataType, Format, MemoryDesc};
//!
//! let md = MemoryDesc::new(&[1, 5, 2, 2], DataType::F32, Format::nChw8c).unwrap();
//! let mut a = BlockedArray::<f32>::from_fn(md, f32::NAN, |_| 1.0).unwrap();
//! assert!(a.get(&[0, 7, 1, 1]).is_nan());
//!
//! zero_pad_array(&mut a).unwrap();
//! assert_eq!(a.get(&[0, 7, 1, 1]), 0.0);
//! assert_eq!(a.get(&[0, 4, 1, 1]), 1.0);
//! ```

pub mod classify;
mod dispatch;
mod family;
mod generic;
mod threading;

pub use blocked_view::{BlockedArray, DataType, Element, Format, LayoutError, MemoryDesc};
pub use classify::{
    classify, is_data_blocked, is_wei_g_blocked, is_wei_i_blocked, is_wei_io_blocked,
    is_wei_o_blocked, Family,
};
pub use dispatch::{zero_pad, zero_pad_array, zero_pad_typed};
pub use generic::zero_pad_generic;

// ============================================================================
// Error types
// ============================================================================

/// Errors raised by the padding entry points.
#[derive(Debug, thiserror::Error)]
pub enum PadError {
    /// The layout has a blocking description but no padding routine.
    #[error("zero padding not implemented for format {0}")]
    Unimplemented(Format),

    /// The element kind has no padding routine.
    #[error("unsupported data type: {0:?}")]
    UnsupportedDataType(DataType),

    /// The buffer's element type does not match the descriptor.
    #[error("data type mismatch: descriptor holds {expected:?}, found {found:?}")]
    DataTypeMismatch { expected: DataType, found: DataType },

    /// The buffer does not cover every storage slot of the descriptor.
    #[error("buffer too small: need {needed} elements, got {got}")]
    BufferTooSmall { needed: usize, got: usize },

    /// A byte buffer is not aligned for the descriptor's element type.
    #[error("buffer not aligned for {0:?}")]
    Misaligned(DataType),

    #[error(transparent)]
    Layout(#[from] LayoutError),
}

/// Result type for padding operations.
pub type Result<T> = std::result::Result<T, PadError>;
