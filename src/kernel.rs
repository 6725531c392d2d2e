//! The kernel context tying the allocator and scheduler together.

use crate::{
    alloc::{BuddyAllocator, PageHandle},
    config::BootConfig,
    error::Result,
    sched::{Scheduler, TaskArg, TaskEntry, TaskId},
};

/// The core services of a booted kernel.
///
/// This owns the page allocator and the task table. Task bodies are handed the allocator on every
/// run, so the scheduler never looks at allocator state itself.
///
/// ```
/// use globalos_core::{Kernel, alloc::BuddyAllocator, config::BootConfig};
///
/// fn heartbeat(allocator: &mut BuddyAllocator, _arg: usize) {
///     let page = allocator.allocate_page().expect("Pool has free pages");
///     allocator.free_page(page).expect("Page was just allocated");
/// }
///
/// let mut kernel = Kernel::boot(&BootConfig::default()).expect("64 MiB is enough to boot");
/// let id = kernel.create_task(heartbeat, 0).expect("Table is empty");
/// assert_eq!(kernel.tick(), Some(id));
/// assert_eq!(kernel.allocator().free_pages(), 2048);
/// ```
pub struct Kernel {
    allocator: BuddyAllocator,
    scheduler: Scheduler<BuddyAllocator>,
}

impl Kernel {
    /// Bring up the allocator and then the scheduler.
    ///
    /// Both are ready by the time this returns, so tasks may be created and may allocate.
    pub fn boot(config: &BootConfig) -> Result<Self> {
        log::set_max_level(config.log_level);

        let allocator = BuddyAllocator::new(config.total_memory, config.reserved_end)?;
        log::info!(
            "Allocator online: {} pages, kernel image ends at {:#x}",
            allocator.total_pages(),
            config.reserved_end,
        );

        let scheduler = Scheduler::new();
        log::info!("Scheduler online");

        Ok(Self {
            allocator,
            scheduler,
        })
    }

    /// Boot, treating failure as fatal.
    ///
    /// # Panics
    /// Panics if the configured memory doesn't hold a single page, since nothing can run without
    /// a pool.
    #[must_use]
    pub fn boot_or_halt(config: &BootConfig) -> Self {
        match Self::boot(config) {
            Ok(kernel) => kernel,
            Err(e) => panic!("Kernel boot failed with {config:?}: {e}"),
        }
    }

    /// The page allocator.
    #[must_use]
    pub const fn allocator(&self) -> &BuddyAllocator {
        &self.allocator
    }

    /// The page allocator, for making changes.
    pub const fn allocator_mut(&mut self) -> &mut BuddyAllocator {
        &mut self.allocator
    }

    /// The task table.
    #[must_use]
    pub const fn scheduler(&self) -> &Scheduler<BuddyAllocator> {
        &self.scheduler
    }

    /// Allocate a single page.
    pub fn alloc_page(&mut self) -> Result<PageHandle> {
        self.allocator.allocate_page()
    }

    /// Free a page.
    pub fn free_page(&mut self, handle: PageHandle) -> Result<()> {
        self.allocator.free_page(handle)
    }

    /// Allocate a block of at least `size` bytes.
    pub fn alloc_block(&mut self, size: usize) -> Result<PageHandle> {
        self.allocator.allocate_block(size)
    }

    /// Free a block.
    pub fn free_block(&mut self, handle: PageHandle) -> Result<()> {
        self.allocator.free_block(handle)
    }

    /// Add a task to the table.
    pub fn create_task(
        &mut self,
        entry: TaskEntry<BuddyAllocator>,
        arg: TaskArg,
    ) -> Result<TaskId> {
        self.scheduler.create_task(entry, arg)
    }

    /// Run the next ready task once, returning which task ran.
    pub fn tick(&mut self) -> Option<TaskId> {
        self.scheduler.tick(&mut self.allocator)
    }

    /// Run tasks forever.
    pub fn run(&mut self) -> ! {
        log::info!("Entering scheduler loop with {} tasks", self.scheduler.task_count());
        self.scheduler.run(&mut self.allocator)
    }
}

impl core::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Kernel")
            .field("allocator", &self.allocator)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}
