//! Interned host names for every method-table entry
//!
//! Built once at registration so per-call dispatch never interns a string.

use gdjvm_sdk::{BridgeError, BridgeResult, HostApi};
use rustc_hash::FxHashMap;

use crate::method_table::VirtualMethod;

/// Method-table index → interned host name
pub struct SymbolCache<N> {
    /// One name per entry, in index order. Empty once released.
    entries: Vec<N>,
    /// Host name key → entry, for hosts that expose stable keys
    keys: FxHashMap<u64, VirtualMethod>,
}

impl<N> SymbolCache<N> {
    /// Intern every method name. On failure, names interned so far are
    /// released and nothing is returned.
    pub fn build<H: HostApi<Name = N>>(host: &H) -> BridgeResult<Self> {
        let mut entries = Vec::with_capacity(VirtualMethod::COUNT);
        for method in VirtualMethod::ALL {
            match host.intern(method.name()) {
                Some(name) => entries.push(name),
                None => {
                    for name in entries.drain(..) {
                        host.release_name(name);
                    }
                    return Err(BridgeError::InternFailed(method.name().to_string()));
                }
            }
        }

        let keys = entries
            .iter()
            .zip(VirtualMethod::ALL)
            .filter_map(|(name, method)| host.name_key(name).map(|key| (key, method)))
            .collect();

        Ok(Self { entries, keys })
    }

    /// Find the entry `name` denotes
    pub fn lookup<H: HostApi<Name = N>>(&self, host: &H, name: &N) -> Option<VirtualMethod> {
        if let Some(method) = host
            .name_key(name)
            .and_then(|key| self.keys.get(&key).copied())
        {
            if let Some(cached) = self.entries.get(method.index()) {
                if host.names_equal(cached, name) {
                    return Some(method);
                }
            }
        }

        self.entries
            .iter()
            .position(|cached| host.names_equal(cached, name))
            .and_then(VirtualMethod::from_index)
    }

    /// Interned name of an entry
    pub fn get(&self, method: VirtualMethod) -> Option<&N> {
        self.entries.get(method.index())
    }

    /// Number of names held
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache has been released
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Release every name. Calling again is a no-op.
    pub fn release<H: HostApi<Name = N>>(&mut self, host: &H) {
        self.keys.clear();
        for name in self.entries.drain(..) {
            host.release_name(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdjvm_sdk::mock::MockHost;

    #[test]
    fn test_build_and_release_balance() {
        let host = MockHost::new();
        let mut cache = SymbolCache::build(&host).unwrap();
        assert_eq!(cache.len(), VirtualMethod::COUNT);
        assert_eq!(host.outstanding_names(), VirtualMethod::COUNT as i64);

        cache.release(&host);
        assert!(cache.is_empty());
        assert_eq!(host.outstanding_names(), 0);

        cache.release(&host);
        assert_eq!(host.outstanding_names(), 0, "second release must be a no-op");
    }

    #[test]
    fn test_failed_intern_releases_partial_build() {
        let host = MockHost::new();
        host.refuse_intern("_process");
        let err = SymbolCache::build(&host).err().unwrap();
        assert_eq!(err, BridgeError::InternFailed("_process".to_string()));
        assert_eq!(host.outstanding_names(), 0);
    }

    #[test]
    fn test_lookup_by_value() {
        for host in [MockHost::new(), MockHost::new().with_name_keys()] {
            let mut cache = SymbolCache::build(&host).unwrap();
            for method in VirtualMethod::ALL {
                let probe = host.intern(method.name()).unwrap();
                assert_eq!(cache.lookup(&host, &probe), Some(method));
                host.release_name(probe);
            }
            let probe = host.intern("_draw").unwrap();
            assert_eq!(cache.lookup(&host, &probe), None);
            host.release_name(probe);
            cache.release(&host);
        }
    }
}
