//! Process-scoped runtime context.
//!
//! [`Runtime`] owns everything the allocator, the termination controller and
//! the contract checks share: the registry, the leak-check switch, the
//! diagnostic sink, the terminator, the lifecycle log and the test tally.
//!
//! The process-wide instance is reached through [`runtime()`] only. It is
//! created on first use from [`Config::from_env`], unless a host installed a
//! differently wired instance beforehand with [`install`]. Independent
//! instances can be built with [`Runtime::new`]; tests do that to observe
//! termination in isolation.

use std::fmt;
use std::sync::OnceLock;
use std::sync::atomic::AtomicBool;

use parking_lot::Mutex;

use crate::backing::{BackingAllocator, LibcBacking};
use crate::config::Config;
use crate::diagnostic::{DiagnosticSink, StderrSink};
use crate::lifecycle::{LifecycleLog, LifecycleRecord};
use crate::registry::{AllocationRecord, Registry, RegistryStats};
use crate::tally::TestTally;
use crate::termination::{ProcessExit, Terminator};

pub struct Runtime {
    pub(crate) config: Config,
    pub(crate) registry: Mutex<Registry>,
    pub(crate) backing: Box<dyn BackingAllocator>,
    pub(crate) leak_checking: AtomicBool,
    pub(crate) sink: Box<dyn DiagnosticSink>,
    pub(crate) terminator: Box<dyn Terminator>,
    pub(crate) lifecycle: Mutex<LifecycleLog>,
    pub(crate) tally: TestTally,
    pub(crate) terminating: AtomicBool,
}

impl Runtime {
    /// Runtime on the C heap, reporting to standard error and exiting the process.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let mut lifecycle = LifecycleLog::default();
        if let Some(path) = config.log_path.as_deref() {
            if let Err(err) = lifecycle.mirror_to(path) {
                StderrSink.emit(&format!(
                    "prog1lib: cannot open lifecycle log {}: {err}",
                    path.display()
                ));
            }
        }
        Self {
            leak_checking: AtomicBool::new(config.leak_check),
            config,
            registry: Mutex::new(Registry::new()),
            backing: Box::new(LibcBacking),
            sink: Box::new(StderrSink),
            terminator: Box::new(ProcessExit),
            lifecycle: Mutex::new(lifecycle),
            tally: TestTally::new(),
            terminating: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_backing(mut self, backing: impl BackingAllocator + 'static) -> Self {
        self.backing = Box::new(backing);
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: impl DiagnosticSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    #[must_use]
    pub fn with_terminator(mut self, terminator: impl Terminator + 'static) -> Self {
        self.terminator = Box::new(terminator);
        self
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        self.registry.lock().stats()
    }

    /// Record of a live block, if `address` is tracked.
    #[must_use]
    pub fn lookup(&self, address: usize) -> Option<AllocationRecord> {
        self.registry.lock().get(address)
    }

    /// All live records in allocation order.
    #[must_use]
    pub fn live_records(&self) -> Vec<AllocationRecord> {
        self.registry.lock().snapshot().in_allocation_order()
    }

    #[must_use]
    pub fn tally(&self) -> &TestTally {
        &self.tally
    }

    /// Most recent lifecycle records, oldest first.
    #[must_use]
    pub fn lifecycle_records(&self) -> Vec<LifecycleRecord> {
        self.lifecycle.lock().records()
    }

    /// Write one line to the diagnostic stream.
    pub fn diagnostic(&self, line: &str) {
        self.sink.emit(line);
    }

    /// Append a lifecycle record. Never call with the registry lock held.
    pub fn log(&self, record: LifecycleRecord) {
        self.lifecycle.lock().append(record);
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .field("leak_checking", &self.leak_checking())
            .finish_non_exhaustive()
    }
}

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// The process-wide runtime, created from the environment on first use.
pub fn runtime() -> &'static Runtime {
    RUNTIME.get_or_init(|| Runtime::new(Config::from_env()))
}

/// Install `runtime` as the process-wide instance.
///
/// Fails, handing the runtime back, once the process-wide instance exists.
pub fn install(runtime: Runtime) -> Result<&'static Runtime, Runtime> {
    RUNTIME.set(runtime)?;
    Ok(self::runtime())
}
