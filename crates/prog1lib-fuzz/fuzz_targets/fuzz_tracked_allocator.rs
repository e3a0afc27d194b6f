#![no_main]
use libfuzzer_sys::fuzz_target;
use prog1lib_runtime::{BudgetBacking, Config, MemoryError, Runtime, Site};

const SITE: Site = Site::new("fuzz.c", "fuzz", 1);

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    let runtime = Runtime::new(Config {
        leak_check: false,
        ..Config::default()
    })
    .with_backing(BudgetBacking::new(1 << 20));
    let mut blocks: Vec<*mut u8> = Vec::new();

    for chunk in data.chunks_exact(4) {
        let size = usize::from(u16::from_le_bytes([chunk[1], chunk[2]]));
        let slot = usize::from(chunk[3]);

        match chunk[0] % 5 {
            0 => {
                if let Ok(block) = runtime.try_allocate(size, SITE) {
                    blocks.push(block.as_ptr());
                }
            }
            1 => {
                let count = usize::from(chunk[3]);
                if let Ok(block) = runtime.try_allocate_zeroed(count, size, SITE) {
                    blocks.push(block.as_ptr());
                }
            }
            2 if !blocks.is_empty() => {
                let idx = slot % blocks.len();
                match runtime.try_reallocate(blocks[idx], size, SITE) {
                    Ok(moved) => blocks[idx] = moved,
                    Err(MemoryError::AllocationFailure { .. }) => {}
                    Err(other) => panic!("tracked block rejected: {other}"),
                }
            }
            3 if !blocks.is_empty() => {
                let block = blocks.swap_remove(slot % blocks.len());
                runtime.try_release(block).expect("tracked block releases");
            }
            _ => {
                // Every handle still held is tracked.
                if let Some(&block) = blocks.last() {
                    assert!(runtime.lookup(block as usize).is_some());
                }
            }
        }
        assert_eq!(runtime.stats().live_blocks, blocks.len());
    }

    for block in blocks {
        runtime.try_release(block).expect("tracked block releases");
    }
    assert!(runtime.leak_report().is_empty());
});
