//! Registry of live tracked allocations.
//!
//! One [`AllocationRecord`] per live block, keyed by address. Presence in the
//! map is liveness: releasing a block removes its record, so at termination
//! the remaining records are exactly the leaks.
//!
//! The registry itself is not synchronised; the runtime holds it behind a
//! single `parking_lot::Mutex` so insert/remove/update/snapshot form one unit
//! of consistency.

use std::collections::HashMap;
use std::collections::hash_map::Values;

use thiserror::Error;

use crate::site::Site;

/// Metadata for a single live tracked block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationRecord {
    /// Address of the block as handed out to the caller.
    pub address: usize,
    /// Bytes requested by the most recent allocation or reallocation.
    pub size: usize,
    /// Site of the most recent allocation or reallocation.
    pub site: Site,
    /// Monotonic order in which the block was (re)allocated.
    pub serial: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("address {0:#x} already has a live record")]
    AlreadyLive(usize),
    #[error("address {0:#x} has no live record")]
    NotLive(usize),
}

/// Aggregate counters maintained alongside the records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub live_blocks: usize,
    pub live_bytes: usize,
    pub peak_bytes: usize,
    pub total_allocations: u64,
    pub total_releases: u64,
}

/// Address-keyed store of live allocation records.
#[derive(Debug, Default)]
pub struct Registry {
    live: HashMap<usize, AllocationRecord>,
    next_serial: u64,
    live_bytes: usize,
    peak_bytes: usize,
    total_allocations: u64,
    total_releases: u64,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_serial(&mut self) -> u64 {
        let serial = self.next_serial;
        self.next_serial = self.next_serial.wrapping_add(1);
        serial
    }

    fn grow(&mut self, bytes: usize) {
        self.live_bytes = self.live_bytes.saturating_add(bytes);
        self.peak_bytes = self.peak_bytes.max(self.live_bytes);
    }

    /// Record a freshly allocated block.
    pub fn insert(
        &mut self,
        address: usize,
        size: usize,
        site: Site,
    ) -> Result<AllocationRecord, RegistryError> {
        if self.live.contains_key(&address) {
            return Err(RegistryError::AlreadyLive(address));
        }
        let record = AllocationRecord {
            address,
            size,
            site,
            serial: self.next_serial(),
        };
        self.live.insert(address, record);
        self.grow(size);
        self.total_allocations += 1;
        Ok(record)
    }

    /// Drop the record for `address`, returning it.
    pub fn remove(&mut self, address: usize) -> Result<AllocationRecord, RegistryError> {
        let record = self
            .live
            .remove(&address)
            .ok_or(RegistryError::NotLive(address))?;
        self.live_bytes = self.live_bytes.saturating_sub(record.size);
        self.total_releases += 1;
        Ok(record)
    }

    /// Replace the record of a reallocated block.
    ///
    /// Either both the removal of `old_address` and the insertion of
    /// `new_address` happen, or neither does. `old_address == new_address`
    /// is the in-place case and only refreshes size and site.
    pub fn update(
        &mut self,
        old_address: usize,
        new_address: usize,
        new_size: usize,
        new_site: Site,
    ) -> Result<AllocationRecord, RegistryError> {
        let Some(old) = self.live.get(&old_address).copied() else {
            return Err(RegistryError::NotLive(old_address));
        };
        if new_address != old_address && self.live.contains_key(&new_address) {
            return Err(RegistryError::AlreadyLive(new_address));
        }
        self.live.remove(&old_address);
        self.live_bytes = self.live_bytes.saturating_sub(old.size);
        let record = AllocationRecord {
            address: new_address,
            size: new_size,
            site: new_site,
            serial: self.next_serial(),
        };
        self.live.insert(new_address, record);
        self.grow(new_size);
        Ok(record)
    }

    #[must_use]
    pub fn get(&self, address: usize) -> Option<AllocationRecord> {
        self.live.get(&address).copied()
    }

    #[must_use]
    pub fn contains(&self, address: usize) -> bool {
        self.live.contains_key(&address)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            live_blocks: self.live.len(),
            live_bytes: self.live_bytes,
            peak_bytes: self.peak_bytes,
            total_allocations: self.total_allocations,
            total_releases: self.total_releases,
        }
    }

    /// Read-only view of all current records.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot { registry: self }
    }
}

/// Borrowed, restartable view over the live records.
///
/// Each call to [`Snapshot::iter`] walks the records from the start; the view
/// cannot mutate the registry.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    registry: &'a Registry,
}

impl<'a> Snapshot<'a> {
    #[must_use]
    pub fn iter(&self) -> Values<'a, usize, AllocationRecord> {
        self.registry.live.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.live.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.live.is_empty()
    }

    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.registry.live_bytes
    }

    /// Records ordered by allocation serial.
    #[must_use]
    pub fn in_allocation_order(&self) -> Vec<AllocationRecord> {
        let mut records: Vec<_> = self.iter().copied().collect();
        records.sort_by_key(|record| record.serial);
        records
    }
}

impl<'a> IntoIterator for Snapshot<'a> {
    type Item = &'a AllocationRecord;
    type IntoIter = Values<'a, usize, AllocationRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAIN: Site = Site::new("main.c", "main", 10);
    const GROW: Site = Site::new("main.c", "grow", 42);

    #[test]
    fn insert_then_remove_leaves_registry_empty() {
        let mut registry = Registry::new();
        registry.insert(0x1000, 10, MAIN).expect("first insert");
        registry.insert(0x2000, 20, MAIN).expect("second insert");
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.stats().live_bytes, 30);

        let removed = registry.remove(0x1000).expect("tracked");
        assert_eq!(removed.size, 10);
        registry.remove(0x2000).expect("tracked");

        assert!(registry.is_empty());
        let stats = registry.stats();
        assert_eq!(stats.live_bytes, 0);
        assert_eq!(stats.peak_bytes, 30);
        assert_eq!(stats.total_allocations, 2);
        assert_eq!(stats.total_releases, 2);
    }

    #[test]
    fn duplicate_insert_is_rejected_without_touching_the_record() {
        let mut registry = Registry::new();
        registry.insert(0x1000, 10, MAIN).expect("first insert");
        assert_eq!(
            registry.insert(0x1000, 99, GROW),
            Err(RegistryError::AlreadyLive(0x1000))
        );
        let record = registry.get(0x1000).expect("still live");
        assert_eq!(record.size, 10);
        assert_eq!(record.site, MAIN);
    }

    #[test]
    fn remove_unknown_address_reports_not_live() {
        let mut registry = Registry::new();
        assert_eq!(registry.remove(0xdead), Err(RegistryError::NotLive(0xdead)));
        registry.insert(0x1000, 1, MAIN).expect("insert");
        registry.remove(0x1000).expect("first remove");
        assert_eq!(registry.remove(0x1000), Err(RegistryError::NotLive(0x1000)));
    }

    #[test]
    fn update_moves_record_and_adopts_site() {
        let mut registry = Registry::new();
        registry.insert(0x1000, 10, MAIN).expect("insert");

        let moved = registry.update(0x1000, 0x3000, 64, GROW).expect("update");
        assert_eq!(moved.address, 0x3000);
        assert_eq!(moved.size, 64);
        assert_eq!(moved.site, GROW);
        assert!(!registry.contains(0x1000));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.stats().live_bytes, 64);
    }

    #[test]
    fn update_in_place_refreshes_size() {
        let mut registry = Registry::new();
        let first = registry.insert(0x1000, 10, MAIN).expect("insert");
        let updated = registry.update(0x1000, 0x1000, 4, GROW).expect("update");
        assert_eq!(registry.len(), 1);
        assert_eq!(updated.size, 4);
        assert!(updated.serial > first.serial);
        assert_eq!(registry.stats().live_bytes, 4);
        assert_eq!(registry.stats().peak_bytes, 10);
    }

    #[test]
    fn update_onto_live_address_is_atomic_failure() {
        let mut registry = Registry::new();
        registry.insert(0x1000, 10, MAIN).expect("insert a");
        registry.insert(0x2000, 20, MAIN).expect("insert b");

        assert_eq!(
            registry.update(0x1000, 0x2000, 30, GROW),
            Err(RegistryError::AlreadyLive(0x2000))
        );
        assert_eq!(registry.get(0x1000).map(|r| r.size), Some(10));
        assert_eq!(registry.get(0x2000).map(|r| r.size), Some(20));
        assert_eq!(registry.stats().live_bytes, 30);

        assert_eq!(
            registry.update(0x9000, 0x9100, 1, GROW),
            Err(RegistryError::NotLive(0x9000))
        );
    }

    #[test]
    fn snapshot_is_restartable_and_ordered_by_serial() {
        let mut registry = Registry::new();
        for (i, addr) in [0x5000_usize, 0x1000, 0x3000].into_iter().enumerate() {
            registry.insert(addr, i + 1, MAIN).expect("insert");
        }
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.iter().count(), 3);
        assert_eq!(snapshot.iter().count(), 3, "second pass sees the same records");
        assert_eq!(snapshot.total_bytes(), 6);

        let ordered: Vec<usize> = snapshot
            .in_allocation_order()
            .iter()
            .map(|r| r.address)
            .collect();
        assert_eq!(ordered, vec![0x5000, 0x1000, 0x3000]);
    }
}
