//! Element kinds stored in blocked tensors.

use num_traits::Zero;

/// Numeric kind of the elements in a tensor buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// No element kind has been chosen yet.
    Undef,
    F32,
    S32,
    S16,
    S8,
    U8,
    /// Brain floating point. Describable, but not handled by padding kernels.
    Bf16,
}

impl DataType {
    /// Size of one element in bytes (0 for [`DataType::Undef`]).
    pub fn size(self) -> usize {
        match self {
            DataType::Undef => 0,
            DataType::F32 | DataType::S32 => 4,
            DataType::S16 | DataType::Bf16 => 2,
            DataType::S8 | DataType::U8 => 1,
        }
    }
}

/// Rust scalar types that back a [`DataType`].
///
/// The bounds cover what storage kernels need: plain-old-data reinterpretation
/// of byte buffers, an additive identity, and sharing across worker threads.
pub trait Element: bytemuck::Pod + Zero + PartialEq + std::fmt::Debug + Send + Sync {
    const DATA_TYPE: DataType;
}

impl Element for f32 {
    const DATA_TYPE: DataType = DataType::F32;
}

impl Element for i32 {
    const DATA_TYPE: DataType = DataType::S32;
}

impl Element for i16 {
    const DATA_TYPE: DataType = DataType::S16;
}

impl Element for i8 {
    const DATA_TYPE: DataType = DataType::S8;
}

impl Element for u8 {
    const DATA_TYPE: DataType = DataType::U8;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size_matches<T: Element>() {
        assert_eq!(T::DATA_TYPE.size(), std::mem::size_of::<T>());
    }

    #[test]
    fn test_element_sizes() {
        size_matches::<f32>();
        size_matches::<i32>();
        size_matches::<i16>();
        size_matches::<i8>();
        size_matches::<u8>();
    }

    #[test]
    fn test_non_element_kinds() {
        assert_eq!(DataType::Undef.size(), 0);
        assert_eq!(DataType::Bf16.size(), 2);
    }
}
