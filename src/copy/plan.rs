use crate::math::intset::IndexSpace;
use crate::view::View;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Dim {
    extent: usize,
    src_stride: isize,
    dst_stride: isize,
}

/// A copy broken into equal-sized contiguous runs.
///
/// Size-1 dimensions are dropped, neighbouring dimensions that are dense on
/// both sides are fused, and when the innermost remaining dimension is unit
/// stride on both sides it becomes one bulk run. Whatever is left is walked by
/// an odometer, one run per outer index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct CopyPlan {
    outer: Vec<Dim>,
    src_offset: usize,
    dst_offset: usize,
    run_elems: usize,
    elem_size: usize,
    empty: bool,
}

impl CopyPlan {
    /// Views must already share an extent and element size.
    pub fn new(src: &View<'_>, dst: &View<'_>) -> Self {
        let empty = src.extent().contains(&0);

        let dims: Vec<Dim> = src
            .extent()
            .iter()
            .zip(src.stride().iter().zip(dst.stride().iter()))
            .filter(|&(&extent, _)| extent != 1)
            .map(|(&extent, (&src_stride, &dst_stride))| Dim {
                extent,
                src_stride,
                dst_stride,
            })
            .collect();

        // fuse from the innermost dimension outwards
        let mut fused: Vec<Dim> = Vec::with_capacity(dims.len());
        for dim in dims.into_iter().rev() {
            match fused.last_mut() {
                Some(inner)
                    if dim.src_stride == inner.src_stride * inner.extent as isize
                        && dim.dst_stride == inner.dst_stride * inner.extent as isize =>
                {
                    inner.extent *= dim.extent;
                }
                _ => fused.push(dim),
            }
        }
        fused.reverse();

        let run_elems = match fused.last() {
            Some(inner) if inner.src_stride == 1 && inner.dst_stride == 1 => {
                let n = inner.extent;
                fused.pop();
                n
            }
            _ => 1,
        };

        Self {
            outer: fused,
            src_offset: src.offset(),
            dst_offset: dst.offset(),
            run_elems,
            elem_size: src.elem_size(),
            empty,
        }
    }

    pub fn run_bytes(&self) -> usize {
        self.run_elems * self.elem_size
    }

    pub fn run_count(&self) -> usize {
        if self.empty {
            0
        } else {
            self.outer.iter().map(|d| d.extent).product()
        }
    }

    pub fn total_bytes(&self) -> usize {
        self.run_count() * self.run_bytes()
    }

    /// Rank of the odometer that walks the runs.
    pub fn outer_rank(&self) -> usize {
        self.outer.len()
    }

    /// Byte offsets of each run from the start of the source and destination allocations.
    pub fn runs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let extent: Vec<usize> = if self.empty {
            vec![0]
        } else {
            self.outer.iter().map(|d| d.extent).collect()
        };

        IndexSpace::new(&extent).map(move |index| {
            let (mut s, mut d) = (self.src_offset as isize, self.dst_offset as isize);
            for (&i, dim) in index.iter().zip(self.outer.iter()) {
                s += i as isize * dim.src_stride;
                d += i as isize * dim.dst_stride;
            }
            (s as usize * self.elem_size, d as usize * self.elem_size)
        })
    }
}
