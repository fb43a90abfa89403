use crate::error::{Result, RuntimeError};
use crate::view::View;

/// A validated source/destination pair for one copy.
///
/// Both views have the same extent and element size; their strides may differ
/// in any way, including a different dimension order.
#[derive(Clone, Debug)]
pub struct CopyDescriptor<'a> {
    src: View<'a>,
    dst: View<'a>,
}

impl<'a> CopyDescriptor<'a> {
    pub fn new(src: &View<'a>, dst: &View<'a>) -> Result<Self> {
        if src.extent() != dst.extent() {
            return Err(RuntimeError::ShapeMismatch {
                src: src.extent().to_vec(),
                dst: dst.extent().to_vec(),
            });
        }
        if src.elem_size() != dst.elem_size() {
            return Err(RuntimeError::ElementSizeMismatch {
                src: src.elem_size(),
                dst: dst.elem_size(),
            });
        }

        Ok(Self {
            src: src.clone(),
            dst: dst.clone(),
        })
    }

    pub fn src(&self) -> &View<'a> {
        &self.src
    }

    pub fn dst(&self) -> &View<'a> {
        &self.dst
    }

    pub fn bytes(&self) -> usize {
        self.src.len() * self.src.elem_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extents_must_match() {
        let mut a = vec![0f32; 6];
        let mut b = vec![0f32; 6];
        let va = View::from_slice_mut(&mut a, &[2, 3]).unwrap();
        let vb = View::from_slice_mut(&mut b, &[3, 2]).unwrap();

        assert_eq!(
            CopyDescriptor::new(&va, &vb).unwrap_err(),
            RuntimeError::ShapeMismatch {
                src: vec![2, 3],
                dst: vec![3, 2]
            }
        );
        let desc = CopyDescriptor::new(&va, &vb.transpose()).unwrap();
        assert_eq!(desc.bytes(), 24);
    }

    #[test]
    fn element_sizes_must_match() {
        let mut a = vec![0f32; 4];
        let mut b = vec![0f64; 4];
        let va = View::from_slice_mut(&mut a, &[4]).unwrap();
        let vb = View::from_slice_mut(&mut b, &[4]).unwrap();
        assert!(matches!(
            CopyDescriptor::new(&va, &vb),
            Err(RuntimeError::ElementSizeMismatch { src: 4, dst: 8 })
        ));
    }
}
