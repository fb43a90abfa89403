// Stride arithmetic shared by views and copy planning. Everything here is in elements.

use crate::error::{Result, RuntimeError};

pub fn row_major_strides(extent: &[usize]) -> Vec<isize> {
    let mut s = vec![1isize; extent.len()];
    for i in (0..extent.len().saturating_sub(1)).rev() {
        s[i] = s[i + 1] * extent[i + 1] as isize;
    }
    s
}

pub fn element_count(extent: &[usize]) -> usize {
    extent.iter().product()
}

/// Dense row-major test. Size-1 dimensions may carry any stride.
pub fn is_contiguous(extent: &[usize], stride: &[isize]) -> bool {
    let mut expected = 1isize;
    for (&e, &s) in extent.iter().zip(stride.iter()).rev() {
        if e != 1 && s != expected {
            return false;
        }
        expected *= e as isize;
    }
    true
}

/// Lowest and highest element offset touched, `None` for an empty extent.
pub(crate) fn element_span(
    offset: usize,
    extent: &[usize],
    stride: &[isize],
) -> Result<Option<(isize, isize)>> {
    if extent.contains(&0) {
        return Ok(None);
    }

    let overflow = || RuntimeError::OutOfBounds("offset arithmetic overflows".to_string());

    let base = isize::try_from(offset).map_err(|_| overflow())?;
    let (mut low, mut high) = (base, base);
    for (&e, &s) in extent.iter().zip(stride.iter()) {
        let reach = (e as isize - 1).checked_mul(s).ok_or_else(overflow)?;
        if reach < 0 {
            low = low.checked_add(reach).ok_or_else(overflow)?;
        } else {
            high = high.checked_add(reach).ok_or_else(overflow)?;
        }
    }
    Ok(Some((low, high)))
}

/// Fails unless every element of the layout lies inside `region_len` bytes.
pub(crate) fn check_bounds(
    region_len: usize,
    offset: usize,
    extent: &[usize],
    stride: &[isize],
    elem_size: usize,
) -> Result<()> {
    let Some((low, high)) = element_span(offset, extent, stride)? else {
        return Ok(());
    };

    if low < 0 {
        return Err(RuntimeError::OutOfBounds(format!(
            "layout reaches element {} before the start of the allocation",
            low
        )));
    }

    let end = (high as usize + 1)
        .checked_mul(elem_size)
        .ok_or_else(|| RuntimeError::OutOfBounds("byte span overflows".to_string()))?;
    if end > region_len {
        return Err(RuntimeError::OutOfBounds(format!(
            "layout ends at byte {} but the allocation holds {} bytes",
            end, region_len
        )));
    }

    Ok(())
}
