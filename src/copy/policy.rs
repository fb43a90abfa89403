use std::collections::HashMap;

use crate::interop::TransferMode;
use crate::storage::LocationKind;

/// How asynchronous copies behave for each (source, destination) location pair.
///
/// Plain `copy` always blocks. `copy_async` looks its pair up here, so the
/// behaviour for a given pair never changes from call to call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferPolicy {
    modes: HashMap<(LocationKind, LocationKind), TransferMode>,
}

impl Default for TransferPolicy {
    /// Host-to-host pairs block, any pair with a device side is deferred.
    fn default() -> Self {
        let mut modes = HashMap::new();
        for src in LocationKind::all() {
            for dst in LocationKind::all() {
                let mode = if src.is_host_accessible() && dst.is_host_accessible() {
                    TransferMode::Blocking
                } else {
                    TransferMode::Deferred
                };
                modes.insert((src, dst), mode);
            }
        }
        Self { modes }
    }
}

impl TransferPolicy {
    pub fn uniform(mode: TransferMode) -> Self {
        let mut policy = Self::default();
        for m in policy.modes.values_mut() {
            *m = mode;
        }
        policy
    }

    pub fn mode(&self, src: LocationKind, dst: LocationKind) -> TransferMode {
        self.modes
            .get(&(src, dst))
            .copied()
            .unwrap_or(TransferMode::Blocking)
    }

    pub fn set(&mut self, src: LocationKind, dst: LocationKind, mode: TransferMode) {
        self.modes.insert((src, dst), mode);
    }

    pub fn with(mut self, src: LocationKind, dst: LocationKind, mode: TransferMode) -> Self {
        self.set(src, dst, mode);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_defers_device_pairs() {
        let p = TransferPolicy::default();
        assert_eq!(p.mode(LocationKind::Host, LocationKind::Pinned), TransferMode::Blocking);
        assert_eq!(p.mode(LocationKind::Host, LocationKind::Gpu), TransferMode::Deferred);
        assert_eq!(p.mode(LocationKind::Virtual, LocationKind::Host), TransferMode::Deferred);
    }

    #[test]
    fn overrides_are_per_pair() {
        let p = TransferPolicy::default().with(
            LocationKind::Host,
            LocationKind::Host,
            TransferMode::Deferred,
        );
        assert_eq!(p.mode(LocationKind::Host, LocationKind::Host), TransferMode::Deferred);
        assert_eq!(p.mode(LocationKind::Pinned, LocationKind::Host), TransferMode::Blocking);

        let all = TransferPolicy::uniform(TransferMode::Blocking);
        assert_eq!(all.mode(LocationKind::Gpu, LocationKind::Gpu), TransferMode::Blocking);
    }
}
