/// Half-open integer range `start..stop` walked with `step`.
///
/// A negative step walks downwards, so `Range::new(3, -1, -1)` covers `3, 2, 1, 0`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Range {
    pub start: isize,
    pub stop: isize,
    pub step: isize,
}

impl Range {
    pub fn new(start: isize, stop: isize, step: isize) -> Self {
        Self { start, stop, step }
    }

    /// Every index of a dimension of size `n`.
    pub fn full(n: usize) -> Self {
        Self::new(0, n as isize, 1)
    }

    pub fn single(index: usize) -> Self {
        Self::new(index as isize, index as isize + 1, 1)
    }

    /// Number of indices covered. Extreme bounds never overflow.
    pub fn len(&self) -> usize {
        if self.step == 0 {
            return 0;
        }
        let (span, step) = (self.stop as i128 - self.start as i128, self.step as i128);
        let (span, step) = if step < 0 { (-span, -step) } else { (span, step) };
        let n = (span + step - 1).div_euclid(step);
        usize::try_from(n.max(0)).unwrap_or(usize::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last(&self) -> Option<isize> {
        match self.len() {
            0 => None,
            n => Some(self.nth(n - 1)),
        }
    }

    pub fn contains(&self, index: isize) -> bool {
        let Some(last) = self.last() else {
            return false;
        };
        let (low, high) = if self.step > 0 {
            (self.start, last)
        } else {
            (last, self.start)
        };
        index >= low
            && index <= high
            && (index as i128 - self.start as i128) % self.step as i128 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = isize> + use<> {
        let range = *self;
        (0..self.len()).map(move |i| range.nth(i))
    }

    // Lies between start and stop for any i < len, so the narrowing is exact.
    fn nth(&self, i: usize) -> isize {
        (self.start as i128 + i as i128 * self.step as i128) as isize
    }
}

impl From<std::ops::Range<usize>> for Range {
    fn from(r: std::ops::Range<usize>) -> Self {
        Range::new(r.start as isize, r.end as isize, 1)
    }
}

/// Row-major walk over every multi-index of an extent.
///
/// Rank 0 yields a single empty index; any zero-sized dimension yields nothing.
pub struct IndexSpace {
    extent: Vec<usize>,
    current: Vec<usize>,
    done: bool,
}

impl IndexSpace {
    pub fn new(extent: &[usize]) -> Self {
        Self {
            extent: extent.to_vec(),
            current: vec![0; extent.len()],
            done: extent.contains(&0),
        }
    }

    pub fn len(&self) -> usize {
        if self.extent.contains(&0) {
            0
        } else {
            self.extent.iter().product()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Iterator for IndexSpace {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let item = self.current.clone();

        // advance the odometer, innermost dimension first
        let mut dim = self.extent.len();
        loop {
            if dim == 0 {
                self.done = true;
                break;
            }
            dim -= 1;
            self.current[dim] += 1;
            if self.current[dim] < self.extent[dim] {
                break;
            }
            self.current[dim] = 0;
        }

        Some(item)
    }
}
