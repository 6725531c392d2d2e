//! Test coverage of the buddy allocator.

use globalos_core::{
    ErrorKind,
    alloc::{BuddyAllocator, PageHandle, order_for_size},
    config::{MAX_BLOCK_SIZE, MAX_ORDER, PAGE_SIZE, POOL_CAPACITY},
};

const MIB: u64 = 1024 * 1024;

/// Build an allocator over exactly `num_pages` pages.
fn pool_of(num_pages: u64) -> BuddyAllocator {
    BuddyAllocator::new(num_pages * PAGE_SIZE as u64, 0).expect("Pool should have pages")
}

/// Order computed the slow way, straight from the definition.
fn reference_order(size: usize) -> usize {
    let num_pages = size.div_ceil(PAGE_SIZE);
    let mut order = 0;
    while (1 << order) < num_pages {
        order += 1;
    }
    order
}

/// Sizes on either side of every order boundary.
fn boundary_sizes() -> Vec<usize> {
    let mut sizes = vec![1, 2, PAGE_SIZE / 2];
    for order in 0..=MAX_ORDER {
        let block = (1 << order) * PAGE_SIZE;
        sizes.extend([block - 1, block]);
        if block < MAX_BLOCK_SIZE {
            sizes.push(block + 1);
        }
    }
    sizes
}

#[test]
fn test_order_for_size() {
    for size in boundary_sizes() {
        assert_eq!(
            order_for_size(size).expect("Size is in range"),
            reference_order(size),
            "Wrong order for {size} bytes",
        );
    }
    for size in (1..=MAX_BLOCK_SIZE).step_by(997) {
        assert_eq!(order_for_size(size).expect("Size is in range"), reference_order(size));
    }
    assert_eq!(order_for_size(0).expect("Zero takes a page"), 0);
    assert_eq!(order_for_size(MAX_BLOCK_SIZE).expect("Largest block"), MAX_ORDER);
    assert_eq!(
        order_for_size(MAX_BLOCK_SIZE + 1).map_err(|e| e.kind),
        Err(ErrorKind::InvalidSize),
    );
}

#[test]
fn test_block_sizes_match_order() {
    let mut allocator = BuddyAllocator::new(64 * MIB, 0).expect("64 MiB holds pages");
    for size in boundary_sizes() {
        let block = allocator.allocate_block(size).expect("Fresh pool has room");
        let order = allocator.block_order(block).expect("Block is allocated");
        assert_eq!(order, reference_order(size), "Wrong block for {size} bytes");
        assert_eq!(block.index() % (1 << order), 0, "Block isn't aligned to its order");
        allocator.free_block(block).expect("Block is allocated");
        assert_eq!(allocator.free_pages(), POOL_CAPACITY);
    }
}

#[test]
fn test_oversized_block() {
    let mut allocator = pool_of(4);
    assert_eq!(
        allocator.allocate_block(MAX_BLOCK_SIZE + 1).map_err(|e| e.kind),
        Err(ErrorKind::InvalidSize),
    );
    assert_eq!(
        allocator.allocate_order(MAX_ORDER + 1).map_err(|e| e.kind),
        Err(ErrorKind::InvalidSize),
    );
    assert_eq!(allocator.free_pages(), 4);
}

#[test]
fn test_init_sizes_pool() {
    let allocator = BuddyAllocator::new(64 * MIB, 0x20_0000).expect("64 MiB holds pages");
    assert_eq!(allocator.total_pages(), 2048);
    assert_eq!(allocator.free_pages(), 2048);
    // Every page gets merged into the two largest blocks.
    assert_eq!(allocator.free_blocks(MAX_ORDER), 2);
    assert!((0..MAX_ORDER).all(|order| allocator.free_blocks(order) == 0));
    assert_eq!(allocator.reserved_end(), 0x20_0000);

    // Memory past the pool capacity is ignored.
    let allocator = BuddyAllocator::new(1024 * MIB, 0).expect("1 GiB holds pages");
    assert_eq!(allocator.total_pages(), POOL_CAPACITY);

    // Partial pages are ignored.
    let allocator = BuddyAllocator::new(10 * PAGE_SIZE as u64 + 100, 0).expect("Holds pages");
    assert_eq!(allocator.total_pages(), 10);
    assert_eq!(allocator.free_blocks(3), 1);
    assert_eq!(allocator.free_blocks(1), 1);
    assert_eq!(allocator.free_blocks(0), 0);
}

#[test]
fn test_init_without_pages() {
    for total_memory in [0, PAGE_SIZE as u64 - 1] {
        assert_eq!(
            BuddyAllocator::new(total_memory, 0).map(|_| ()).map_err(|e| e.kind),
            Err(ErrorKind::OutOfMemory),
        );
    }
}

#[test]
fn test_exhaust_pages() {
    let mut allocator = BuddyAllocator::new(64 * MIB, 0).expect("64 MiB holds pages");
    let mut seen = vec![false; POOL_CAPACITY];
    for _ in 0..2048 {
        let page = allocator.allocate_page().expect("Pool still has pages");
        assert!(!seen[page.index()], "{page} handed out twice");
        seen[page.index()] = true;
    }
    assert_eq!(allocator.free_pages(), 0);
    assert_eq!(
        allocator.allocate_page().map_err(|e| e.kind),
        Err(ErrorKind::OutOfMemory),
    );
    assert_eq!(
        allocator.allocate_block(1).map_err(|e| e.kind),
        Err(ErrorKind::OutOfMemory),
    );
}

#[test]
fn test_two_page_block_from_fresh_pool() {
    let mut allocator = BuddyAllocator::new(64 * MIB, 0).expect("64 MiB holds pages");
    let block = allocator.allocate_block(5000).expect("Fresh pool has room");
    assert_eq!(allocator.block_order(block).expect("Block is allocated"), 1);
    assert_eq!(allocator.free_pages(), 2046);
    // Splitting one largest block leaves one free block at each order below it.
    assert_eq!(allocator.free_blocks(MAX_ORDER), 1);
    assert!((1..MAX_ORDER).all(|order| allocator.free_blocks(order) == 1));
    assert_eq!(allocator.free_blocks(0), 0);
}

#[test]
fn test_page_round_trip() {
    let mut allocator = pool_of(16);
    let held = allocator.allocate_block(3 * PAGE_SIZE).expect("Pool has room");
    let before = allocator.free_pages();
    let page = allocator.allocate_page().expect("Pool has room");
    assert_eq!(allocator.free_pages(), before - 1);
    allocator.free_page(page).expect("Page is allocated");
    assert_eq!(allocator.free_pages(), before);
    allocator.free_block(held).expect("Block is allocated");
    assert_eq!(allocator.free_pages(), 16);
    assert_eq!(allocator.free_blocks(4), 1);
}

#[test]
fn test_split_then_merge() {
    let mut allocator = pool_of(2);
    let low = allocator.allocate_page().expect("Pool has room");
    let high = allocator.allocate_page().expect("Pool has room");
    assert_eq!(low.index() ^ high.index(), 1, "Pages should be buddies");
    assert_eq!(
        allocator.allocate_order(1).map_err(|e| e.kind),
        Err(ErrorKind::OutOfMemory),
    );

    allocator.free_page(high).expect("Page is allocated");
    allocator.free_page(low).expect("Page is allocated");
    assert_eq!(allocator.free_blocks(1), 1);
    let block = allocator.allocate_order(1).expect("Buddies should have merged");
    assert_eq!(block.index(), 0);
}

#[test]
fn test_merge_stops_at_allocated_buddy() {
    let mut allocator = pool_of(4);
    let pages: Vec<_> = (0..4)
        .map(|_| allocator.allocate_page().expect("Pool has room"))
        .collect();
    let at = |index: usize| *pages.iter().find(|page| page.index() == index).expect("Every page");

    allocator.free_page(at(0)).expect("Page is allocated");
    allocator.free_page(at(1)).expect("Page is allocated");
    allocator.free_page(at(3)).expect("Page is allocated");
    // Pages 0 and 1 merge, but page 3's buddy is still out.
    assert_eq!(allocator.free_blocks(1), 1);
    assert_eq!(allocator.free_blocks(0), 1);
    assert_eq!(
        allocator.allocate_order(2).map_err(|e| e.kind),
        Err(ErrorKind::OutOfMemory),
    );

    allocator.free_page(at(2)).expect("Page is allocated");
    assert_eq!(allocator.free_blocks(2), 1);
    assert_eq!(allocator.free_blocks(1), 0);
    assert_eq!(allocator.free_blocks(0), 0);
}

#[test]
fn test_failed_allocation_changes_nothing() {
    let mut allocator = pool_of(4);
    let block = allocator.allocate_order(1).expect("Pool has room");
    let counts: Vec<_> = (0..=MAX_ORDER).map(|o| allocator.free_blocks(o)).collect();

    assert_eq!(
        allocator.allocate_order(2).map_err(|e| e.kind),
        Err(ErrorKind::OutOfMemory),
    );
    assert_eq!(allocator.free_pages(), 2);
    let after: Vec<_> = (0..=MAX_ORDER).map(|o| allocator.free_blocks(o)).collect();
    assert_eq!(counts, after);
    assert!(allocator.is_allocated(block));
}

#[test]
fn test_invalid_frees() {
    let mut allocator = pool_of(8);
    let block = allocator.allocate_order(2).expect("Pool has room");
    let counts: Vec<_> = (0..=MAX_ORDER).map(|o| allocator.free_blocks(o)).collect();

    let bad_handles = [
        // Inside the block, but not its first page.
        PageHandle::from_index(block.index() + 1),
        // Free, never allocated.
        PageHandle::from_index(block.index() ^ 4),
        // Past the pool.
        PageHandle::from_index(8),
        PageHandle::from_index(usize::MAX),
    ];
    for handle in bad_handles {
        assert_eq!(
            allocator.free_block(handle).map_err(|e| e.kind),
            Err(ErrorKind::InvalidHandle),
            "Freeing {handle} should fail",
        );
    }
    assert_eq!(allocator.free_pages(), 4);
    let after: Vec<_> = (0..=MAX_ORDER).map(|o| allocator.free_blocks(o)).collect();
    assert_eq!(counts, after);

    allocator.free_block(block).expect("Block is allocated");
    assert_eq!(
        allocator.free_block(block).map_err(|e| e.kind),
        Err(ErrorKind::InvalidHandle),
        "Double free should fail",
    );
    assert_eq!(allocator.free_pages(), 8);
    assert_eq!(allocator.free_blocks(3), 1);
}

#[test]
fn test_odd_sized_pool() {
    let mut allocator = pool_of(3);
    assert_eq!(allocator.free_blocks(1), 1);
    assert_eq!(allocator.free_blocks(0), 1);
    let block = allocator.allocate_order(1).expect("Pool has a two-page block");
    assert_eq!(block.index(), 0);
    assert_eq!(
        allocator.allocate_order(1).map_err(|e| e.kind),
        Err(ErrorKind::OutOfMemory),
    );
    let page = allocator.allocate_page().expect("Pool has one page left");
    assert_eq!(page.index(), 2);
    allocator.free_page(page).expect("Page is allocated");
    allocator.free_block(block).expect("Block is allocated");
    // Page 2's buddy (page 3) is outside the pool, so it can never merge.
    assert_eq!(allocator.free_blocks(1), 1);
    assert_eq!(allocator.free_blocks(0), 1);
}

#[test]
fn test_largest_blocks() {
    let mut allocator = BuddyAllocator::new(64 * MIB, 0).expect("64 MiB holds pages");
    let first = allocator.allocate_block(MAX_BLOCK_SIZE).expect("Pool has room");
    let second = allocator.allocate_block(MAX_BLOCK_SIZE).expect("Pool has room");
    assert_eq!(
        allocator.allocate_block(MAX_BLOCK_SIZE).map_err(|e| e.kind),
        Err(ErrorKind::OutOfMemory),
    );
    assert_eq!(first.index() ^ second.index(), 1 << MAX_ORDER);
    allocator.free_block(first).expect("Block is allocated");
    allocator.free_block(second).expect("Block is allocated");
    // Two largest blocks never merge further.
    assert_eq!(allocator.free_blocks(MAX_ORDER), 2);
}

#[test]
fn test_handle_offsets() {
    let handle = PageHandle::from_byte_offset(3 * PAGE_SIZE).expect("Offset is aligned");
    assert_eq!(handle.index(), 3);
    assert_eq!(handle.byte_offset(), 3 * PAGE_SIZE);
    assert_eq!(PageHandle::from_byte_offset(PAGE_SIZE + 1), None);
    assert_eq!(PageHandle::from_index(7).to_string(), "page#7");
}

/// A small deterministic generator so failures reproduce.
struct Lcg(u64);
impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.0 >> 33
    }
}

#[test]
fn test_no_overlapping_handles() {
    let mut allocator = pool_of(256);
    let mut rng = Lcg(0x5eed);
    let mut live: Vec<(PageHandle, usize)> = Vec::new();

    for step in 0..4000 {
        if live.is_empty() || rng.next() % 3 != 0 {
            let size = (rng.next() as usize % (16 * PAGE_SIZE)) + 1;
            let Ok(handle) = allocator.allocate_block(size) else {
                continue;
            };
            let pages = 1_usize << allocator.block_order(handle).expect("Block is allocated");
            let range = handle.index()..handle.index() + pages;
            assert!(range.end <= allocator.total_pages(), "Step {step}: block past pool");
            for &(other, other_pages) in &live {
                let other_range = other.index()..other.index() + other_pages;
                assert!(
                    range.end <= other_range.start || other_range.end <= range.start,
                    "Step {step}: {range:?} overlaps {other_range:?}",
                );
            }
            live.push((handle, pages));
        } else {
            let (handle, _) = live.swap_remove(rng.next() as usize % live.len());
            allocator.free_block(handle).expect("Handle is live");
        }
        let used: usize = live.iter().map(|&(_, pages)| pages).sum();
        assert_eq!(allocator.free_pages() + used, 256, "Step {step}: pages leaked");
    }

    for (handle, _) in live {
        allocator.free_block(handle).expect("Handle is live");
    }
    assert_eq!(allocator.free_pages(), 256);
    assert_eq!(allocator.free_blocks(8), 1, "Everything should merge back");
}
