//! Zero-copy export of host-resident views in the array-interface layout used
//! by host scripting environments (pointer, shape, byte strides, type string).

use bytemuck::Pod;

use crate::error::{Result, RuntimeError};
use crate::math::{Complex32, Complex64};
use crate::storage::{Region, StorageLocation};
use crate::view::View;

/// Element types with an array-interface type code.
pub trait HostElement: Pod {
    /// `i` signed, `u` unsigned, `f` float, `c` complex
    const KIND: char;
}

macro_rules! host_element {
    ($($t:ty => $kind:literal),* $(,)?) => {
        $(impl HostElement for $t {
            const KIND: char = $kind;
        })*
    };
}

host_element!(
    u8 => 'u', u16 => 'u', u32 => 'u', u64 => 'u',
    i8 => 'i', i16 => 'i', i32 => 'i', i64 => 'i',
    f32 => 'f', f64 => 'f',
    Complex32 => 'c', Complex64 => 'c',
);

/// Type string such as `<f4` or `|u1`.
pub fn typestr<T: HostElement>() -> String {
    let size = std::mem::size_of::<T>();
    let order = if size == 1 {
        '|'
    } else if cfg!(target_endian = "little") {
        '<'
    } else {
        '>'
    };
    format!("{}{}{}", order, T::KIND, size)
}

/// A published view. The host side must keep the owning buffer alive while
/// it uses `data`; nothing here is reference counted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostArray {
    pub data: usize,
    pub readonly: bool,
    pub shape: Vec<usize>,
    /// In bytes
    pub strides: Vec<isize>,
    pub typestr: String,
    pub itemsize: usize,
    pub version: u32,
}

impl HostArray {
    pub fn publish<T: HostElement>(view: &View<'_>) -> Result<Self> {
        Self::export::<T>(view, false)
    }

    pub fn publish_readonly<T: HostElement>(view: &View<'_>) -> Result<Self> {
        Self::export::<T>(view, true)
    }

    fn export<T: HostElement>(view: &View<'_>, readonly: bool) -> Result<Self> {
        let itemsize = std::mem::size_of::<T>();
        if view.elem_size() != itemsize {
            return Err(RuntimeError::ElementSizeMismatch {
                src: view.elem_size(),
                dst: itemsize,
            });
        }

        let base = view
            .region()
            .host_ptr()
            .ok_or(RuntimeError::UnsupportedLocation {
                location: view.location(),
                operation: "host array export",
            })?;

        Ok(HostArray {
            data: base as usize + view.byte_offset(),
            readonly,
            shape: view.extent().to_vec(),
            strides: view
                .stride()
                .iter()
                .map(|&s| s * itemsize as isize)
                .collect(),
            typestr: typestr::<T>(),
            itemsize,
            version: 3,
        })
    }

    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_c_contiguous(&self) -> bool {
        let mut expected = self.itemsize as isize;
        for (&n, &s) in self.shape.iter().zip(self.strides.iter()).rev() {
            if n != 1 && s != expected {
                return false;
            }
            expected *= n as isize;
        }
        true
    }

    /// Reinterprets an array handed over by the host as a view.
    ///
    /// # Safety
    /// `data` and every byte the shape and strides reach must stay valid for
    /// `'a`.
    pub unsafe fn view<'a>(&self) -> Result<View<'a>> {
        if self.shape.len() != self.strides.len() {
            return Err(RuntimeError::RankMismatch {
                expected: self.shape.len(),
                actual: self.strides.len(),
            });
        }
        let item = self.itemsize as isize;
        if item == 0 || self.strides.iter().any(|s| s % item != 0) {
            return Err(RuntimeError::OutOfBounds(format!(
                "byte strides {:?} are not multiples of the item size {}",
                self.strides, self.itemsize
            )));
        }

        let stride: Vec<isize> = self.strides.iter().map(|s| s / item).collect();

        // lowest and highest element reached relative to `data`
        let (mut low, mut high) = (0isize, 0isize);
        if !self.shape.contains(&0) {
            for (&n, &s) in self.shape.iter().zip(stride.iter()) {
                let reach = (n as isize - 1) * s;
                if reach < 0 {
                    low += reach;
                } else {
                    high += reach;
                }
            }
        }

        let start = (self.data as isize + low * item) as *mut u8;
        let len = ((high - low + 1) * item) as usize;
        unsafe {
            let region = Region::from_host_ptr(start, len, StorageLocation::Host)?;
            View::new(
                region,
                (-low) as usize,
                self.shape.clone(),
                stride,
                self.itemsize,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::intset::Range;

    #[test]
    fn type_strings() {
        assert_eq!(typestr::<u8>(), "|u1");
        let f4 = typestr::<f32>();
        assert!(f4 == "<f4" || f4 == ">f4");
        assert_eq!(&typestr::<Complex64>()[1..], "c16");
        assert_eq!(&typestr::<i64>()[1..], "i8");
    }

    #[test]
    fn publish_reports_byte_strides() {
        let mut data = vec![0f64; 12];
        let base = data.as_ptr() as usize;
        let v = View::from_slice_mut(&mut data, &[4, 3]).unwrap();
        let s = v.slice(&[Range::from(1..3), Range::new(2, -1, -2)]).unwrap();

        let a = HostArray::publish::<f64>(&s).unwrap();
        assert_eq!(a.shape, vec![2, 2]);
        assert_eq!(a.strides, vec![24, -16]);
        assert_eq!(a.data, base + 5 * 8);
        assert_eq!(a.version, 3);
        assert!(!a.is_c_contiguous());
        assert!(HostArray::publish::<f32>(&s).is_err());
    }

    #[test]
    fn published_array_views_the_same_elements() {
        let mut data: Vec<i32> = (0..12).collect();
        let v = View::from_slice_mut(&mut data, &[3, 4]).unwrap();
        let t = v.transpose();
        let a = HostArray::publish_readonly::<i32>(&t).unwrap();
        assert!(a.readonly);

        let back = unsafe { a.view() }.unwrap();
        assert_eq!(back.extent(), t.extent());
        assert_eq!(back.stride(), t.stride());

        assert_eq!(back.region().host_ptr().unwrap() as usize, a.data);
        assert_eq!(
            back.offsets().collect::<Vec<_>>(),
            t.offsets().collect::<Vec<_>>()
        );
    }

    #[test]
    fn reversed_array_view_starts_below_data() {
        let mut data: Vec<u16> = (0..5).collect();
        let v = View::from_slice_mut(&mut data, &[5]).unwrap();
        let r = v.slice(&[Range::new(4, -1, -1)]).unwrap();
        let a = HostArray::publish::<u16>(&r).unwrap();

        let back = unsafe { a.view() }.unwrap();
        assert_eq!(back.offset(), 4);
        assert_eq!(back.stride(), &[-1]);
        assert_eq!(back.region().len(), 10);
    }
}
