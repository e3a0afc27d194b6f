#![no_main]
use std::collections::HashMap;

use libfuzzer_sys::fuzz_target;
use prog1lib_runtime::Site;
use prog1lib_runtime::registry::{Registry, RegistryError};

const SITE: Site = Site::new("fuzz.c", "fuzz", 1);

fuzz_target!(|data: &[u8]| {
    // Each 4-byte chunk: op, address slot, size (u16 le).
    let mut registry = Registry::new();
    let mut model: HashMap<usize, usize> = HashMap::new();

    for chunk in data.chunks_exact(4) {
        let address = 0x1000 + usize::from(chunk[1] % 64) * 16;
        let size = usize::from(u16::from_le_bytes([chunk[2], chunk[3]]));

        match chunk[0] % 3 {
            0 => {
                let result = registry.insert(address, size, SITE);
                if model.contains_key(&address) {
                    assert_eq!(result, Err(RegistryError::AlreadyLive(address)));
                } else {
                    assert!(result.is_ok());
                    model.insert(address, size);
                }
            }
            1 => {
                let result = registry.remove(address);
                match model.remove(&address) {
                    Some(expected) => assert_eq!(result.map(|r| r.size), Ok(expected)),
                    None => assert_eq!(result, Err(RegistryError::NotLive(address))),
                }
            }
            _ => {
                let target = 0x1000 + usize::from(chunk[2] % 64) * 16;
                let result = registry.update(address, target, size, SITE);
                let valid = model.contains_key(&address)
                    && (target == address || !model.contains_key(&target));
                assert_eq!(result.is_ok(), valid);
                if valid {
                    model.remove(&address);
                    model.insert(target, size);
                }
            }
        }

        assert_eq!(registry.len(), model.len());
        assert_eq!(registry.stats().live_bytes, model.values().sum::<usize>());
    }

    let snapshot = registry.snapshot();
    assert_eq!(snapshot.total_bytes(), model.values().sum::<usize>());
    let serials: Vec<u64> = snapshot
        .in_allocation_order()
        .iter()
        .map(|r| r.serial)
        .collect();
    assert!(serials.windows(2).all(|w| w[0] < w[1]));
});
