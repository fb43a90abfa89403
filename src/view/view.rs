use std::marker::PhantomData;

use bytemuck::Pod;

use crate::error::{Result, RuntimeError};
use crate::math::intset::{IndexSpace, Range};
use crate::storage::{Address, Region, StorageLocation};

use super::layout::{self, check_bounds, element_count, row_major_strides};

/// Non-owning N-dimensional strided window into an allocation.
///
/// Offset and strides are counted in elements of `elem_size` bytes. Every
/// operation is a metadata transform returning a new view; the parent is never
/// modified and no data moves. Views may alias freely, any ordering between
/// writes through aliasing views is the caller's business.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct View<'a> {
    region: Region,
    offset: usize,
    extent: Vec<usize>,
    stride: Vec<isize>,
    elem_size: usize,
    _owner: PhantomData<&'a ()>,
}

impl<'a> View<'a> {
    /// # Safety
    /// The memory behind `region` must stay allocated for `'a`.
    pub unsafe fn new(
        region: Region,
        offset: usize,
        extent: Vec<usize>,
        stride: Vec<isize>,
        elem_size: usize,
    ) -> Result<Self> {
        if extent.len() != stride.len() {
            return Err(RuntimeError::RankMismatch {
                expected: extent.len(),
                actual: stride.len(),
            });
        }
        if elem_size == 0 {
            return Err(RuntimeError::OutOfBounds(
                "element size must be non-zero".to_string(),
            ));
        }

        check_bounds(region.len(), offset, &extent, &stride, elem_size)?;

        Ok(Self {
            region,
            offset,
            extent,
            stride,
            elem_size,
            _owner: PhantomData,
        })
    }

    /// # Safety
    /// Same contract as [`View::new`].
    pub unsafe fn contiguous(
        region: Region,
        offset: usize,
        extent: &[usize],
        elem_size: usize,
    ) -> Result<Self> {
        unsafe {
            Self::new(
                region,
                offset,
                extent.to_vec(),
                row_major_strides(extent),
                elem_size,
            )
        }
    }

    /// Row-major view over a host slice.
    pub fn from_slice_mut<T: Pod>(data: &'a mut [T], extent: &[usize]) -> Result<Self> {
        let stride = row_major_strides(extent);
        Self::from_slice_strided(data, 0, extent, &stride)
    }

    pub fn from_slice_strided<T: Pod>(
        data: &'a mut [T],
        offset: usize,
        extent: &[usize],
        stride: &[isize],
    ) -> Result<Self> {
        let len = std::mem::size_of_val(data);
        // SAFETY: the slice is exclusively borrowed for 'a
        unsafe {
            let region = Region::from_host_ptr(
                data.as_mut_ptr() as *mut u8,
                len,
                StorageLocation::Host,
            )?;
            Self::new(
                region,
                offset,
                extent.to_vec(),
                stride.to_vec(),
                std::mem::size_of::<T>(),
            )
        }
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn location(&self) -> StorageLocation {
        self.region.location()
    }

    /// Base offset in elements from the start of the allocation.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn byte_offset(&self) -> usize {
        self.offset * self.elem_size
    }

    pub fn extent(&self) -> &[usize] {
        &self.extent
    }

    pub fn stride(&self) -> &[isize] {
        &self.stride
    }

    pub fn elem_size(&self) -> usize {
        self.elem_size
    }

    pub fn rank(&self) -> usize {
        self.extent.len()
    }

    /// Number of addressed elements, 1 for a scalar.
    pub fn len(&self) -> usize {
        element_count(&self.extent)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_contiguous(&self) -> bool {
        layout::is_contiguous(&self.extent, &self.stride)
    }

    /// Element offset of a multi-index, counted from the start of the allocation.
    pub fn offset_of(&self, index: &[usize]) -> Result<usize> {
        if index.len() != self.rank() {
            return Err(RuntimeError::RankMismatch {
                expected: self.rank(),
                actual: index.len(),
            });
        }
        if let Some(dim) = (0..self.rank()).find(|&d| index[d] >= self.extent[d]) {
            return Err(RuntimeError::OutOfBounds(format!(
                "index {} out of range for dimension {} of size {}",
                index[dim], dim, self.extent[dim]
            )));
        }
        Ok(self.offset_unchecked(index))
    }

    pub fn address_of(&self, index: &[usize]) -> Result<Address> {
        let offset = self.offset_of(index)?;
        Ok(self.region.at(offset * self.elem_size))
    }

    // Caller guarantees the index is in bounds, which keeps the sum non-negative.
    pub(crate) fn offset_unchecked(&self, index: &[usize]) -> usize {
        let delta: isize = index
            .iter()
            .zip(self.stride.iter())
            .map(|(&i, &s)| i as isize * s)
            .sum();
        (self.offset as isize + delta) as usize
    }

    /// Element offsets of every index in row-major order.
    pub fn offsets(&self) -> impl Iterator<Item = usize> + '_ {
        IndexSpace::new(&self.extent).map(move |idx| self.offset_unchecked(&idx))
    }

    /// Smallest byte range of the allocation that covers every element.
    pub fn byte_range(&self) -> Option<std::ops::Range<usize>> {
        let (low, high) = layout::element_span(self.offset, &self.extent, &self.stride)
            .ok()
            .flatten()?;
        Some(low as usize * self.elem_size..(high as usize + 1) * self.elem_size)
    }

    /// Selects a sub-range in every dimension.
    ///
    /// Fails with `OutOfBounds` when any non-empty range leaves its dimension.
    pub fn slice(&self, ranges: &[Range]) -> Result<View<'a>> {
        if ranges.len() != self.rank() {
            return Err(RuntimeError::RankMismatch {
                expected: self.rank(),
                actual: ranges.len(),
            });
        }

        let mut offset = self.offset as isize;
        let mut extent = Vec::with_capacity(self.rank());
        let mut stride = Vec::with_capacity(self.rank());

        let overflow = |dim: usize| {
            RuntimeError::OutOfBounds(format!(
                "slice of dimension {} overflows the address space",
                dim
            ))
        };

        for (dim, range) in ranges.iter().enumerate() {
            if range.step == 0 {
                return Err(RuntimeError::OutOfBounds(format!(
                    "zero step in dimension {}",
                    dim
                )));
            }

            let size = self.extent[dim] as isize;
            let n = range.len();
            if let Some(last) = range.last() {
                let in_dim = |i: isize| i >= 0 && i < size;
                if !in_dim(range.start) || !in_dim(last) {
                    return Err(RuntimeError::OutOfBounds(format!(
                        "range {}..{} step {} outside dimension {} of size {}",
                        range.start, range.stop, range.step, dim, size
                    )));
                }
                offset = range
                    .start
                    .checked_mul(self.stride[dim])
                    .and_then(|delta| offset.checked_add(delta))
                    .ok_or_else(|| overflow(dim))?;
            }

            extent.push(n);
            stride.push(
                self.stride[dim]
                    .checked_mul(range.step)
                    .ok_or_else(|| overflow(dim))?,
            );
        }

        let offset = usize::try_from(offset).map_err(|_| {
            RuntimeError::OutOfBounds("slice starts before the allocation".to_string())
        })?;

        self.derive(offset, extent, stride)
    }

    /// Fixes dimension `dim` at `index` and drops it.
    pub fn index(&self, dim: usize, index: usize) -> Result<View<'a>> {
        self.check_dim(dim)?;
        if index >= self.extent[dim] {
            return Err(RuntimeError::OutOfBounds(format!(
                "index {} out of range for dimension {} of size {}",
                index, dim, self.extent[dim]
            )));
        }

        let offset = (self.offset as isize + index as isize * self.stride[dim]) as usize;
        let mut extent = self.extent.clone();
        let mut stride = self.stride.clone();
        extent.remove(dim);
        stride.remove(dim);
        self.derive(offset, extent, stride)
    }

    /// Drops a size-1 dimension.
    pub fn squeeze(&self, dim: usize) -> Result<View<'a>> {
        self.check_dim(dim)?;
        if self.extent[dim] != 1 {
            let mut dst = self.extent.clone();
            dst[dim] = 1;
            return Err(RuntimeError::ShapeMismatch {
                src: self.extent.clone(),
                dst,
            });
        }
        self.index(dim, 0)
    }

    /// Drops every size-1 dimension.
    pub fn squeeze_all(&self) -> View<'a> {
        let (extent, stride): (Vec<usize>, Vec<isize>) = self
            .extent
            .iter()
            .zip(self.stride.iter())
            .filter(|&(&e, _)| e != 1)
            .map(|(&e, &s)| (e, s))
            .unzip();

        View {
            extent,
            stride,
            ..self.clone()
        }
    }

    /// Reorders dimensions: dimension `k` of the result is dimension `order[k]` of self.
    pub fn permute(&self, order: &[usize]) -> Result<View<'a>> {
        if order.len() != self.rank() {
            return Err(RuntimeError::RankMismatch {
                expected: self.rank(),
                actual: order.len(),
            });
        }

        let mut seen = vec![false; self.rank()];
        for &d in order {
            if d >= self.rank() || seen[d] {
                return Err(RuntimeError::OutOfBounds(format!(
                    "{:?} is not a permutation of 0..{}",
                    order,
                    self.rank()
                )));
            }
            seen[d] = true;
        }

        Ok(View {
            extent: order.iter().map(|&d| self.extent[d]).collect(),
            stride: order.iter().map(|&d| self.stride[d]).collect(),
            ..self.clone()
        })
    }

    /// Reverses the dimension order.
    pub fn transpose(&self) -> View<'a> {
        View {
            extent: self.extent.iter().rev().copied().collect(),
            stride: self.stride.iter().rev().copied().collect(),
            ..self.clone()
        }
    }

    /// Reinterprets a dense view with a new extent of the same element count.
    pub fn reshape(&self, extent: &[usize]) -> Result<View<'a>> {
        if element_count(extent) != self.len() {
            return Err(RuntimeError::ShapeMismatch {
                src: self.extent.clone(),
                dst: extent.to_vec(),
            });
        }
        if !self.is_contiguous() {
            return Err(RuntimeError::NotContiguous(format!(
                "cannot reshape extent {:?} with stride {:?} without copying",
                self.extent, self.stride
            )));
        }
        self.derive(self.offset, extent.to_vec(), row_major_strides(extent))
    }

    /// Expands a size-1 dimension to `n` by giving it stride 0.
    pub fn broadcast(&self, dim: usize, n: usize) -> Result<View<'a>> {
        self.check_dim(dim)?;
        if self.extent[dim] != 1 {
            let mut dst = self.extent.clone();
            dst[dim] = n;
            return Err(RuntimeError::ShapeMismatch {
                src: self.extent.clone(),
                dst,
            });
        }

        let mut extent = self.extent.clone();
        let mut stride = self.stride.clone();
        extent[dim] = n;
        stride[dim] = 0;
        self.derive(self.offset, extent, stride)
    }

    fn check_dim(&self, dim: usize) -> Result<()> {
        if dim >= self.rank() {
            return Err(RuntimeError::OutOfBounds(format!(
                "dimension {} out of range for rank {}",
                dim,
                self.rank()
            )));
        }
        Ok(())
    }

    fn derive(&self, offset: usize, extent: Vec<usize>, stride: Vec<isize>) -> Result<View<'a>> {
        check_bounds(self.region.len(), offset, &extent, &stride, self.elem_size)?;
        Ok(View {
            region: self.region,
            offset,
            extent,
            stride,
            elem_size: self.elem_size,
            _owner: PhantomData,
        })
    }
}
