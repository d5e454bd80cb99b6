use std::hash::BuildHasher;
use std::time::{Duration, Instant};

use hashbrown::HashSet;

use crate::config::GcConfig;
use crate::node::{Node, NodeId, NodeRef};
use crate::table::NodeTable;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GcStats {
    pub before: usize,
    pub after: usize,
    pub marked: usize,
    pub elapsed: Duration,
}

impl GcStats {
    #[inline]
    pub fn reclaimed(&self) -> usize {
        self.before - self.after
    }
}

/// Mark and sweep over the table.
///
/// Marks every node reachable from `roots` through children and memoized
/// step results, then drops all other table entries. Memo slots of retained
/// nodes therefore never point at a node the table has forgotten.
pub fn collect<'a, S: BuildHasher>(
    table: &mut NodeTable<S>,
    roots: impl IntoIterator<Item = &'a NodeRef>,
) -> GcStats {
    let start = Instant::now();
    let before = table.len();
    let mut marked: HashSet<NodeId> = HashSet::with_capacity(before);
    let mut stack: Vec<&Node> = roots.into_iter().map(|r| r.as_ref()).collect();
    while let Some(node) = stack.pop() {
        if !marked.insert(node.id()) {
            continue;
        }
        if let Some(children) = node.children() {
            stack.extend(children.iter().map(|c| c.as_ref()));
        }
        if let Some(memo) = node.memo() {
            stack.push(memo.node.as_ref());
        }
    }
    table.retain(|n| marked.contains(&n.id()));
    let stats = GcStats {
        before,
        after: table.len(),
        marked: marked.len(),
        elapsed: start.elapsed(),
    };
    log::debug!(
        target: "gc",
        "ms={} gc before={} after={} marked={}",
        stats.elapsed.as_millis(),
        stats.before,
        stats.after,
        stats.marked
    );
    stats
}

/// Collects once the table outgrows both a floor and a multiple of what
/// survived the previous pass.
#[derive(Clone, Debug)]
pub struct GcPolicy {
    min_nodes: usize,
    growth_factor: f64,
    live_after_last: usize,
}

impl GcPolicy {
    pub fn new(cfg: &GcConfig) -> Self {
        GcPolicy {
            min_nodes: cfg.min_nodes,
            growth_factor: cfg.growth_factor,
            live_after_last: 0,
        }
    }

    #[inline]
    pub fn threshold(&self) -> usize {
        let grown = (self.live_after_last as f64 * self.growth_factor) as usize;
        self.min_nodes.max(grown)
    }

    #[inline]
    pub fn should_collect(&self, table_len: usize) -> bool {
        table_len > self.threshold()
    }

    pub fn record(&mut self, stats: &GcStats) {
        self.live_after_last = stats.after;
    }
}
