//! Entry points: skip checks, element-kind dispatch and routine selection.

use blocked_view::{BlockedArray, DataType, Element, Format, MemoryDesc};

use crate::classify::classify;
use crate::family::zero_pad_family;
use crate::generic::zero_pad_generic_blocked;
use crate::threading::ZeroWriter;
use crate::{PadError, Result};

/// Zero the padding of the buffer described by `md`.
///
/// The buffer is raw storage of `md.size_in_bytes()` bytes holding elements
/// of `md.data_type()`. An absent buffer, a tensor without elements and an
/// opaque layout are all no-ops. Layouts with no padding routine return
/// [`PadError::Unimplemented`] and leave the buffer untouched.
pub fn zero_pad(md: &MemoryDesc, data: Option<&mut [u8]>) -> Result<()> {
    let Some(data) = data else {
        tracing::debug!(format = %md.format(), "zero padding skipped: no buffer");
        return Ok(());
    };
    if skip_zeroing(md) || !has_padding(md) {
        return Ok(());
    }

    match md.data_type() {
        DataType::F32 => typed_zero_pad(md, cast_buffer::<f32>(md, data)?),
        DataType::S32 => typed_zero_pad(md, cast_buffer::<i32>(md, data)?),
        DataType::S16 => typed_zero_pad(md, cast_buffer::<i16>(md, data)?),
        DataType::S8 => typed_zero_pad(md, cast_buffer::<i8>(md, data)?),
        DataType::U8 => typed_zero_pad(md, data),
        other => {
            tracing::error!(data_type = ?other, "zero padding: unsupported data type");
            Err(PadError::UnsupportedDataType(other))
        }
    }
}

/// Typed variant of [`zero_pad`]: `T` must be the descriptor's element kind.
pub fn zero_pad_typed<T: Element>(md: &MemoryDesc, data: &mut [T]) -> Result<()> {
    check_data_type::<T>(md)?;
    if skip_zeroing(md) {
        return Ok(());
    }
    typed_zero_pad(md, data)
}

/// Zero the padding of an owned blocked array in place.
pub fn zero_pad_array<T: Element>(array: &mut BlockedArray<T>) -> Result<()> {
    let (md, data) = array.parts_mut();
    zero_pad_typed(md, data)
}

/// Tensors without elements and layouts without a blocking description have
/// no padding to write.
pub(crate) fn skip_zeroing(md: &MemoryDesc) -> bool {
    if md.is_zero() {
        tracing::debug!(format = %md.format(), "zero padding skipped: empty tensor");
        return true;
    }
    if !md.is_blocking_desc() {
        tracing::debug!(format = %md.format(), "zero padding skipped: opaque layout");
        return true;
    }
    false
}

fn has_padding(md: &MemoryDesc) -> bool {
    if md.nelems(false) == md.nelems(true) {
        tracing::debug!(format = %md.format(), "zero padding skipped: no padded axis");
        return false;
    }
    true
}

pub(crate) fn check_data_type<T: Element>(md: &MemoryDesc) -> Result<()> {
    if md.data_type() != T::DATA_TYPE {
        return Err(PadError::DataTypeMismatch {
            expected: md.data_type(),
            found: T::DATA_TYPE,
        });
    }
    Ok(())
}

/// Every slot of the descriptor must be inside the buffer before any worker
/// writes through a raw pointer.
pub(crate) fn check_len(md: &MemoryDesc, len: usize) -> Result<()> {
    let needed = md.size();
    if len < needed {
        return Err(PadError::BufferTooSmall { needed, got: len });
    }
    Ok(())
}

/// View raw bytes as elements of `T`, dropping a trailing partial element.
fn cast_buffer<'a, T: Element>(md: &MemoryDesc, data: &'a mut [u8]) -> Result<&'a mut [T]> {
    let whole = data.len() / std::mem::size_of::<T>() * std::mem::size_of::<T>();
    bytemuck::try_cast_slice_mut(&mut data[..whole])
        .map_err(|_| PadError::Misaligned(md.data_type()))
}

fn typed_zero_pad<T: Element>(md: &MemoryDesc, data: &mut [T]) -> Result<()> {
    if !has_padding(md) {
        return Ok(());
    }
    check_len(md, data.len())?;

    let format = md.format();
    let out = ZeroWriter::new(data);
    match (classify(format), md.meta()) {
        (Some(family), Some(meta)) => {
            tracing::debug!(%format, ?family, "zero padding");
            zero_pad_family(family, md, meta, &out);
        }
        _ if format.normalized() == Format::blocked => {
            tracing::debug!(%format, "zero padding through the generic engine");
            zero_pad_generic_blocked(md, &out);
        }
        _ => {
            tracing::warn!(%format, "zero padding not implemented for layout");
            return Err(PadError::Unimplemented(format));
        }
    }
    Ok(())
}
