//! Owned blocked tensor storage.

use crate::{Element, LayoutError, MemoryDesc, Result};

/// A [`MemoryDesc`] together with the storage it describes.
///
/// Storage holds [`MemoryDesc::size`] elements, padding slots included.
/// Element access goes through the descriptor's offset arithmetic.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockedArray<T> {
    desc: MemoryDesc,
    data: Vec<T>,
}

fn check_data_type<T: Element>(desc: &MemoryDesc) -> Result<()> {
    if desc.data_type() != T::DATA_TYPE {
        return Err(LayoutError::DataTypeMismatch {
            expected: desc.data_type(),
            found: T::DATA_TYPE,
        });
    }
    Ok(())
}

impl<T: Element> BlockedArray<T> {
    /// Storage filled with `value`, padding slots included.
    pub fn from_elem(desc: MemoryDesc, value: T) -> Result<Self> {
        check_data_type::<T>(&desc)?;
        let data = vec![value; desc.size()];
        Ok(Self { desc, data })
    }

    /// Wrap existing storage.
    ///
    /// The padding region is taken as is; callers that need zero padding run
    /// a padding pass afterwards.
    pub fn from_vec(desc: MemoryDesc, data: Vec<T>) -> Result<Self> {
        check_data_type::<T>(&desc)?;
        if data.len() < desc.size() {
            return Err(LayoutError::BufferTooSmall {
                needed: desc.size(),
                got: data.len(),
            });
        }
        Ok(Self { desc, data })
    }

    /// Storage filled with `fill`, then every logical element set to `f(pos)`.
    pub fn from_fn<F>(desc: MemoryDesc, fill: T, mut f: F) -> Result<Self>
    where
        F: FnMut(&[usize]) -> T,
    {
        let mut array = Self::from_elem(desc, fill)?;
        for l in 0..array.desc.nelems(false) {
            let pos = array.desc.position(l, false);
            let off = array.desc.off_v(&pos);
            array.data[off] = f(&pos);
        }
        Ok(array)
    }

    #[inline]
    pub fn desc(&self) -> &MemoryDesc {
        &self.desc
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        self.desc.dims()
    }

    #[inline]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Descriptor and mutable storage at once, for in-place passes.
    #[inline]
    pub fn parts_mut(&mut self) -> (&MemoryDesc, &mut [T]) {
        (&self.desc, &mut self.data)
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Element at `pos` (padding positions allowed).
    #[inline]
    pub fn get(&self, pos: &[usize]) -> T {
        self.data[self.desc.off_v(pos)]
    }

    #[inline]
    pub fn set(&mut self, pos: &[usize], value: T) {
        let off = self.desc.off_v(pos);
        self.data[off] = value;
    }
}
