//! Runtime lock dependency tracking (lockdep).
//!
//! Records "class A was held when class B was acquired" as a directed edge
//! in a dependency graph. On each new edge, runs DFS cycle detection. A cycle
//! indicates a potential deadlock even if it hasn't manifested yet.
//!
//! Gated behind the `lockdep` feature. Only locks constructed with `named`
//! are tracked. A class is keyed by the lock's address, so tracking is meant
//! for locks that live as long as the program (statics, leaked or long-lived
//! `Arc`s); a lock whose address is reused by a later lock shares its class.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::fmt::Write as _;
use std::sync::OnceLock;

use crate::atomic::AtomicCell;
use crate::lock::LockKind;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum distinct lock classes.
const MAX_CLASSES: usize = 64;

/// Maximum nesting depth per thread (held-lock stack).
const MAX_HELD: usize = 16;

// ---------------------------------------------------------------------------
// Lock class identification
// ---------------------------------------------------------------------------

/// Identifies a lock class. Classes are assigned by [`get_or_register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockClassId(u16);

impl LockClassId {
    /// Sentinel value meaning "no class".
    pub const NONE: Self = Self(u16::MAX);

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Metadata for a registered lock class.
struct LockClassEntry {
    addr: usize,
    name: &'static str,
    kind: LockKind,
}

// ---------------------------------------------------------------------------
// Global state
// ---------------------------------------------------------------------------

/// Class table. Slots below `CLASS_COUNT` are always initialized.
static CLASSES: [OnceLock<LockClassEntry>; MAX_CLASSES] = [const { OnceLock::new() }; MAX_CLASSES];

static CLASS_COUNT: AtomicU16 = AtomicU16::new(0);

/// Adjacency bitmap: `GRAPH[a * MAX_CLASSES + b]` is true when lock class `a`
/// was held while class `b` was acquired.
static GRAPH: [AtomicBool; MAX_CLASSES * MAX_CLASSES] =
    [const { AtomicBool::new(false) }; MAX_CLASSES * MAX_CLASSES];

/// Raw spin protecting graph mutation (not a `Spinlock`, to avoid
/// self-tracking).
static GRAPH_LOCK: AtomicCell = AtomicCell::unlocked();

fn graph_lock() {
    while GRAPH_LOCK.test_and_set() != crate::atomic::UNLOCKED {
        while GRAPH_LOCK.is_set() {
            core::hint::spin_loop();
        }
    }
}

fn graph_unlock() {
    GRAPH_LOCK.clear();
}

// ---------------------------------------------------------------------------
// Per-thread held-lock stack
// ---------------------------------------------------------------------------

/// Stack of currently held lock classes on one thread.
struct HeldLocks {
    stack: [LockClassId; MAX_HELD],
    depth: usize,
}

impl HeldLocks {
    const fn new() -> Self {
        Self {
            stack: [LockClassId::NONE; MAX_HELD],
            depth: 0,
        }
    }

    fn push(&mut self, id: LockClassId) {
        // Past MAX_HELD tracking silently stops.
        if self.depth < MAX_HELD {
            self.stack[self.depth] = id;
            self.depth += 1;
        }
    }

    fn pop(&mut self, id: LockClassId) {
        // Usually LIFO; search down for out-of-order releases.
        if let Some(i) = self.stack[..self.depth].iter().rposition(|&h| h == id) {
            self.stack.copy_within(i + 1..self.depth, i);
            self.depth -= 1;
        }
    }

    fn held(&self) -> &[LockClassId] {
        &self.stack[..self.depth]
    }
}

std::thread_local! {
    // A failed borrow means a hook re-entered itself; the inner call is
    // dropped.
    static HELD: RefCell<HeldLocks> = const { RefCell::new(HeldLocks::new()) };
}

/// Number of tracked locks the calling thread currently holds.
pub fn held_count() -> usize {
    HELD.try_with(|held| held.try_borrow().map_or(0, |h| h.depth))
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Class registration
// ---------------------------------------------------------------------------

fn find(addr: usize) -> Option<LockClassId> {
    let count = CLASS_COUNT.load(Ordering::Acquire) as usize;
    CLASSES[..count]
        .iter()
        .position(|slot| slot.get().is_some_and(|e| e.addr == addr))
        .map(|i| LockClassId(i as u16))
}

/// Returns the class registered for `addr`, or [`LockClassId::NONE`].
pub fn lookup(addr: usize) -> LockClassId {
    find(addr).unwrap_or(LockClassId::NONE)
}

/// Registers a lock class by address. Returns the class ID. Idempotent.
pub fn get_or_register(addr: usize, name: &'static str, kind: LockKind) -> LockClassId {
    if let Some(id) = find(addr) {
        return id;
    }

    graph_lock();

    // Another thread may have registered it meanwhile.
    if let Some(id) = find(addr) {
        graph_unlock();
        return id;
    }

    let count = CLASS_COUNT.load(Ordering::Acquire) as usize;
    if count >= MAX_CLASSES {
        graph_unlock();
        crate::sw_warn!("lockdep: class table full, not tracking \"{}\"", name);
        return LockClassId::NONE;
    }

    let _ = CLASSES[count].set(LockClassEntry { addr, name, kind });
    // Publish the new class.
    CLASS_COUNT.store((count + 1) as u16, Ordering::Release);

    graph_unlock();
    crate::sw_trace!("lockdep: class {} = \"{}\" ({})", count, name, kind);
    LockClassId(count as u16)
}

// ---------------------------------------------------------------------------
// Acquire / release hooks
// ---------------------------------------------------------------------------

/// Called after a lock acquisition succeeds.
///
/// `undo` gives the just-acquired lock back. It runs only when the
/// acquisition closes a cycle, before the panic, so the lock is not left
/// held with no guard to release it.
///
/// # Panics
///
/// Panics if the acquisition closes a cycle in the dependency graph.
pub fn lock_acquired(class: LockClassId, undo: impl FnOnce()) {
    if class == LockClassId::NONE {
        return;
    }

    let cycle = HELD
        .try_with(|held| {
            let Ok(mut held) = held.try_borrow_mut() else {
                return None;
            };
            let cycle = record_edges(held.held(), class);
            if cycle.is_none() {
                held.push(class);
            }
            cycle
        })
        .ok()
        .flatten();

    if let Some(from) = cycle {
        undo();
        report_cycle(from, class);
    }
}

/// Adds an edge from every held class to `class`. Returns the first held
/// class whose new edge closed a cycle.
fn record_edges(held: &[LockClassId], class: LockClassId) -> Option<LockClassId> {
    for &h in held {
        if h == LockClassId::NONE || h == class {
            continue;
        }

        let idx = h.index() * MAX_CLASSES + class.index();
        if GRAPH[idx].load(Ordering::Relaxed) {
            continue;
        }

        graph_lock();
        if !GRAPH[idx].load(Ordering::Relaxed) {
            GRAPH[idx].store(true, Ordering::Relaxed);
            // A path from `class` back to `h` plus the new edge is a cycle.
            if has_path(class, h) {
                graph_unlock();
                return Some(h);
            }
        }
        graph_unlock();
    }
    None
}

/// Called before a lock release.
pub fn lock_released(class: LockClassId) {
    if class == LockClassId::NONE {
        return;
    }

    let _ = HELD.try_with(|held| {
        if let Ok(mut held) = held.try_borrow_mut() {
            held.pop(class);
        }
    });
}

// ---------------------------------------------------------------------------
// Cycle detection (DFS)
// ---------------------------------------------------------------------------

fn has_edge(from: usize, to: usize) -> bool {
    GRAPH[from * MAX_CLASSES + to].load(Ordering::Relaxed)
}

/// Returns `true` if there is a path from `src` to `dst` in the dependency graph.
///
/// Bounded by `MAX_CLASSES` nodes. Only called when a new edge is discovered.
fn has_path(src: LockClassId, dst: LockClassId) -> bool {
    let count = CLASS_COUNT.load(Ordering::Acquire) as usize;
    let mut visited = [false; MAX_CLASSES];
    let mut stack = Vec::with_capacity(MAX_CLASSES);
    stack.push(src.index());

    while let Some(node) = stack.pop() {
        if node == dst.index() {
            return true;
        }
        if visited[node] {
            continue;
        }
        visited[node] = true;

        stack.extend((0..count).filter(|&n| !visited[n] && has_edge(node, n)));
    }

    false
}

/// Shortest path from `src` to `dst` (BFS), excluding `src`.
fn shortest_path(src: LockClassId, dst: LockClassId) -> Vec<usize> {
    let count = CLASS_COUNT.load(Ordering::Acquire) as usize;
    let mut parent = [usize::MAX; MAX_CLASSES];
    let mut visited = [false; MAX_CLASSES];
    let mut queue = std::collections::VecDeque::from([src.index()]);
    visited[src.index()] = true;

    while let Some(node) = queue.pop_front() {
        if node == dst.index() {
            break;
        }
        for n in 0..count {
            if !visited[n] && has_edge(node, n) {
                visited[n] = true;
                parent[n] = node;
                queue.push_back(n);
            }
        }
    }

    let mut path = Vec::new();
    let mut cur = dst.index();
    while cur != src.index() && cur != usize::MAX {
        path.push(cur);
        cur = parent[cur];
    }
    path.reverse();
    path
}

// ---------------------------------------------------------------------------
// Violation reporting
// ---------------------------------------------------------------------------

fn report_cycle(held: LockClassId, acquiring: LockClassId) -> ! {
    let acq_name = class_name(acquiring.index());

    let mut cycle = format!("\"{acq_name}\"");
    for node in shortest_path(acquiring, held) {
        let _ = write!(cycle, " -> \"{}\"", class_name(node));
    }
    let _ = write!(cycle, " -> \"{acq_name}\"");

    crate::sw_fatal!("lockdep: potential deadlock detected");
    crate::sw_fatal!("  holding:   \"{}\" ({})", class_name(held.index()), class_kind(held.index()));
    crate::sw_fatal!("  acquiring: \"{}\" ({})", acq_name, class_kind(acquiring.index()));
    crate::sw_fatal!("  cycle:     {}", cycle);

    panic!(
        "lockdep: potential deadlock: held \"{}\" while acquiring \"{}\"",
        class_name(held.index()),
        acq_name,
    );
}

fn class_name(idx: usize) -> &'static str {
    CLASSES
        .get(idx)
        .and_then(OnceLock::get)
        .map_or("<unknown>", |e| e.name)
}

fn class_kind(idx: usize) -> &'static str {
    CLASSES
        .get(idx)
        .and_then(OnceLock::get)
        .map_or("?", |e| e.kind.name())
}
