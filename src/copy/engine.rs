use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytemuck::Pod;
use parking_lot::Mutex;

use crate::error::{Result, RuntimeError};
use crate::interop::{Backends, CompletionToken, DeviceInterop, TransferMode, wait_all};
use crate::math::intset::IndexSpace;
use crate::math::reduction::{Reducible, ReductionType};
use crate::math::scalar::ceil_div;
use crate::view::View;

use super::descriptor::CopyDescriptor;
use super::plan::CopyPlan;
use super::policy::TransferPolicy;

/// Moves elements between views in any pair of storage locations.
pub struct CopyEngine {
    interop: Arc<DeviceInterop>,
    policy: TransferPolicy,
}

impl CopyEngine {
    pub fn new(interop: Arc<DeviceInterop>, policy: TransferPolicy) -> Self {
        Self { interop, policy }
    }

    pub fn policy(&self) -> &TransferPolicy {
        &self.policy
    }

    pub fn interop(&self) -> &Arc<DeviceInterop> {
        &self.interop
    }

    /// Copies every element and returns once all bytes have landed.
    ///
    /// Same-location host copies run locally, everything else goes through the
    /// device shim one contiguous run at a time. On failure the runs already
    /// written stay written. Overlapping views are not detected.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(src = %desc.src().location(), dst = %desc.dst().location(), bytes = desc.bytes())
    )]
    pub fn copy(&self, desc: &CopyDescriptor<'_>) -> Result<()> {
        let (src, dst) = (desc.src(), desc.dst());
        let plan = CopyPlan::new(src, dst);
        let run_bytes = plan.run_bytes();

        tracing::debug!(
            runs = plan.run_count(),
            run_bytes,
            total_bytes = plan.total_bytes(),
            outer_rank = plan.outer_rank(),
            "copy plan"
        );

        if src.location() == dst.location() {
            if let (Some(s), Some(d)) = (src.region().host_ptr(), dst.region().host_ptr()) {
                for (src_off, dst_off) in plan.runs() {
                    // SAFETY: both views were bounds checked against their regions
                    unsafe { std::ptr::copy(s.add(src_off), d.add(dst_off), run_bytes) };
                }
                return Ok(());
            }
        }

        for (src_off, dst_off) in plan.runs() {
            // SAFETY: every run lies inside its view's region and the copy blocks
            unsafe {
                self.interop.transfer(
                    src.region().at(src_off),
                    dst.region().at(dst_off),
                    src.location(),
                    dst.location(),
                    run_bytes,
                    TransferMode::Blocking,
                )?;
            }
        }
        Ok(())
    }

    /// Copies between views of different rank that are both dense and hold the
    /// same number of elements.
    pub fn copy_reshaped(&self, src: &View<'_>, dst: &View<'_>) -> Result<()> {
        if !dst.is_contiguous() {
            return Err(RuntimeError::NotContiguous(format!(
                "destination extent {:?} with stride {:?}",
                dst.extent(),
                dst.stride()
            )));
        }
        let src = src.reshape(dst.extent())?;
        self.copy(&CopyDescriptor::new(&src, dst)?)
    }

    /// Runs `f` with a scope for asynchronous copies and waits for all of them
    /// before returning, also when `f` panics.
    ///
    /// Views handed to the scope must outlive it, so no buffer can be freed
    /// while its bytes are in flight. The first transfer failure is returned.
    pub fn scope<'env, F, R>(&'env self, f: F) -> Result<R>
    where
        F: for<'scope> FnOnce(&'scope TransferScope<'scope, 'env>) -> R,
    {
        let scope = TransferScope {
            engine: self,
            pending: Mutex::new(Vec::new()),
            scope: PhantomData,
            env: PhantomData,
        };

        let result = panic::catch_unwind(AssertUnwindSafe(|| f(&scope)));
        let waited = scope.wait_pending();
        match result {
            Ok(value) => waited.map(|()| value),
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Combines source elements into the destination with `op`.
    ///
    /// Both views must be host addressable and hold elements of type `T`.
    #[tracing::instrument(level = "debug", skip_all, fields(?op, elements = desc.src().len()))]
    pub fn copy_accumulate<T: Reducible>(
        &self,
        desc: &CopyDescriptor<'_>,
        op: ReductionType,
    ) -> Result<()> {
        let (src, dst) = (desc.src(), desc.dst());
        let size = std::mem::size_of::<T>();
        if src.elem_size() != size {
            return Err(RuntimeError::ElementSizeMismatch {
                src: src.elem_size(),
                dst: size,
            });
        }

        let unsupported = || RuntimeError::UnsupportedReduction {
            op,
            type_name: std::any::type_name::<T>(),
        };
        if !T::supports(op) {
            return Err(unsupported());
        }

        let src_base = host_base(src, "accumulating copy")?;
        let dst_base = host_base(dst, "accumulating copy")?;

        for (s, d) in src.offsets().zip(dst.offsets()) {
            unsafe {
                let value = (src_base.add(s * size) as *const T).read_unaligned();
                let target = dst_base.add(d * size) as *mut T;
                let combined = T::combine(op, target.read_unaligned(), value).ok_or_else(unsupported)?;
                target.write_unaligned(combined);
            }
        }
        Ok(())
    }

    /// Writes `f(index)` at every index of `dst`.
    ///
    /// Device destinations are produced in host memory first and copied over.
    pub fn materialize<T, F>(&self, dst: &View<'_>, mut f: F) -> Result<()>
    where
        T: Pod,
        F: FnMut(&[usize]) -> T,
    {
        let size = std::mem::size_of::<T>();
        if dst.elem_size() != size {
            return Err(RuntimeError::ElementSizeMismatch {
                src: size,
                dst: dst.elem_size(),
            });
        }

        match dst.region().host_ptr() {
            Some(base) => {
                for index in IndexSpace::new(dst.extent()) {
                    let offset = dst.offset_unchecked(&index);
                    unsafe { (base.add(offset * size) as *mut T).write_unaligned(f(&index)) };
                }
                Ok(())
            }
            None => {
                let mut staging: Vec<T> = IndexSpace::new(dst.extent()).map(|i| f(&i)).collect();
                let host = View::from_slice_mut(&mut staging, dst.extent())?;
                self.copy(&CopyDescriptor::new(&host, dst)?)
            }
        }
    }

    pub fn fill<T: Pod>(&self, dst: &View<'_>, value: T) -> Result<()> {
        self.materialize(dst, |_| value)
    }
}

impl std::fmt::Debug for CopyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CopyEngine")
            .field("interop", &self.interop)
            .finish()
    }
}

fn host_base(view: &View<'_>, operation: &'static str) -> Result<*mut u8> {
    view.region()
        .host_ptr()
        .ok_or(RuntimeError::UnsupportedLocation {
            location: view.location(),
            operation,
        })
}

/// Handle for issuing asynchronous copies, see [`CopyEngine::scope`].
pub struct TransferScope<'scope, 'env: 'scope> {
    engine: &'env CopyEngine,
    pending: Mutex<Vec<CompletionToken>>,
    scope: PhantomData<&'scope mut &'scope ()>,
    env: PhantomData<&'env mut &'env ()>,
}

impl<'scope, 'env> TransferScope<'scope, 'env> {
    /// Starts a copy and returns a token for it.
    ///
    /// Pairs the policy marks `Blocking` finish before this returns and hand
    /// back a ready token. `Deferred` pairs are split into at most one chunk of
    /// runs per transfer worker and return immediately.
    pub fn copy_async(&self, desc: &CopyDescriptor<'scope>) -> Result<CompletionToken> {
        let engine = self.engine;
        let (src, dst) = (desc.src(), desc.dst());
        let (src_location, dst_location) = (src.location(), dst.location());

        if engine.policy.mode(src_location.kind(), dst_location.kind()) == TransferMode::Blocking {
            engine.copy(desc)?;
            return Ok(CompletionToken::ready());
        }

        let plan = CopyPlan::new(src, dst);
        let run_bytes = plan.run_bytes();
        let runs: Vec<_> = plan
            .runs()
            .map(|(s, d)| (src.region().at(s), dst.region().at(d)))
            .collect();
        if runs.is_empty() {
            return Ok(CompletionToken::ready());
        }

        let chunk_len = ceil_div(runs.len(), engine.interop.workers());
        let chunks: Vec<Vec<_>> = runs.chunks(chunk_len).map(<[_]>::to_vec).collect();

        tracing::debug!(
            %src_location,
            %dst_location,
            runs = runs.len(),
            chunks = chunks.len(),
            run_bytes,
            "deferred copy"
        );

        let latch = Arc::new(Latch::new(chunks.len()));
        let jobs = chunks.into_iter().map(|chunk| {
            let arrival = Arrival {
                latch: latch.clone(),
                outcome: None,
            };
            move |backends: &Backends| {
                let outcome = chunk.iter().try_for_each(|&(s, d)| {
                    backends.transfer(s, d, src_location, dst_location, run_bytes)
                });
                arrival.finish(outcome.clone());
                outcome
            }
        });
        let tokens = engine.interop.submit_all(jobs);
        self.pending.lock().extend(tokens);

        Ok(latch.done.clone())
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    fn wait_pending(&self) -> Result<()> {
        let tokens = std::mem::take(&mut *self.pending.lock());
        wait_all(&tokens)
    }
}

// Completes `done` once every chunk of a deferred copy has reported in.
struct Latch {
    remaining: AtomicUsize,
    first_error: Mutex<Option<RuntimeError>>,
    done: CompletionToken,
}

impl Latch {
    fn new(parts: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(parts),
            first_error: Mutex::new(None),
            done: CompletionToken::new(),
        }
    }

    fn arrive(&self, outcome: Result<()>) {
        if let Err(e) = outcome {
            self.first_error.lock().get_or_insert(e);
        }
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            let result = match self.first_error.lock().take() {
                Some(e) => Err(e),
                None => Ok(()),
            };
            self.done.complete(result);
        }
    }
}

// Reports a chunk to its latch even if the chunk unwinds.
struct Arrival {
    latch: Arc<Latch>,
    outcome: Option<Result<()>>,
}

impl Arrival {
    fn finish(mut self, outcome: Result<()>) {
        self.outcome = Some(outcome);
    }
}

impl Drop for Arrival {
    fn drop(&mut self) {
        let outcome = self.outcome.take().unwrap_or_else(|| {
            Err(RuntimeError::WorkerPanic(
                "transfer chunk did not finish".to_string(),
            ))
        });
        self.latch.arrive(outcome);
    }
}
