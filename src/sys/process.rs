//! Process ancestry queries used by the swallow logic.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::collections::HashMap;
use crate::sys::bridge::pid_t;

/// Resolves a process's parent pid. The production implementation asks
/// the kernel; tests register parent links explicitly.
pub trait ProcessQuery: Send + Sync {
    fn parent_pid(&self, pid: pid_t) -> Option<pid_t>;
}

/// How many parent links the swallow search will follow. A terminal
/// often spawns the GUI app through a shell and a launcher wrapper.
pub const MAX_PARENT_HOPS: usize = 5;

/// Walk the parent chain of `pid`, yielding up to [`MAX_PARENT_HOPS`]
/// ancestors, nearest first.
pub fn ancestors(query: &dyn ProcessQuery, pid: pid_t) -> Vec<pid_t> {
    let mut out = Vec::new();
    let mut current = pid;
    for _ in 0..MAX_PARENT_HOPS {
        match query.parent_pid(current) {
            Some(parent) if parent > 0 && parent != current => {
                out.push(parent);
                current = parent;
            }
            _ => break,
        }
    }
    out
}

/// Parent table kept in memory; used by tests and the headless CLI.
#[derive(Clone, Default)]
pub struct StaticProcessTable {
    parents: Arc<Mutex<HashMap<pid_t, pid_t>>>,
}

impl StaticProcessTable {
    pub fn new() -> Self { Self::default() }

    pub fn set_parent(&self, child: pid_t, parent: pid_t) {
        self.parents.lock().insert(child, parent);
    }
}

impl ProcessQuery for StaticProcessTable {
    fn parent_pid(&self, pid: pid_t) -> Option<pid_t> {
        self.parents.lock().get(&pid).copied()
    }
}
