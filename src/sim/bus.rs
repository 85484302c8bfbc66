//! Shared state of the simulated line and the lookahead rules.
//!
//! Every node keeps its own virtual clock. A node only learns what its
//! input looks like up to the driver's *commit* time: the point before
//! which the driver can no longer add edges. Running nodes commit their
//! current time. Blocked nodes commit up to the earliest moment they could
//! possibly wake: their own timer or timeout, or the closing edge of the
//! pulse they are measuring once their upstream has written it. Only
//! two-node topologies (a pair, or one node reading a script) are
//! modelled.

use crate::hal::{Edge, EdgeHandler, Level, TimerCallback};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

pub(super) const NEVER: u64 = u64::MAX;

/// A pulse measurement a blocked node is waiting on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct Measurement {
    pub(super) level: Level,
    pub(super) start: u64,
    pub(super) deadline: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Status {
    Running,
    /// Waiting on the input; will act on its own no later than `wake_at`,
    /// or earlier once `measuring` completes
    Blocked {
        wake_at: u64,
        measuring: Option<Measurement>,
    },
    Finished,
}

/// Append a transition, ignoring writes that do not change the level.
pub(super) fn push_edge(edges: &mut Vec<(u64, Level)>, at: u64, level: Level) {
    let current = edges.last().map_or(Level::Low, |&(_, level)| level);
    if current != level {
        edges.push((at, level));
    }
}

pub(super) struct Wire {
    pub(super) edges: Vec<(u64, Level)>,
    pub(super) driver: Option<usize>,
}

impl Wire {
    pub(super) fn driven_by(node: usize) -> Self {
        Self {
            edges: Vec::new(),
            driver: Some(node),
        }
    }

    pub(super) fn scripted(edges: Vec<(u64, Level)>) -> Self {
        Self {
            edges,
            driver: None,
        }
    }

    /// Level in effect just before `at`.
    pub(super) fn level_before(&self, at: u64) -> Level {
        self.edges
            .iter()
            .take_while(|(t, _)| *t < at)
            .last()
            .map_or(Level::Low, |&(_, level)| level)
    }
}

pub(super) struct Timer {
    pub(super) deadline: Option<u64>,
    pub(super) callback: Arc<Mutex<TimerCallback>>,
}

pub(super) struct Interrupt {
    pub(super) pin: u8,
    pub(super) edge: Edge,
    pub(super) handler: EdgeHandler,
}

pub(super) struct Node {
    pub(super) now: u64,
    pub(super) status: Status,
    pub(super) input: usize,
    pub(super) output: usize,
    pub(super) action: Vec<(u64, Level)>,
    pub(super) timers: BTreeMap<u64, Timer>,
    pub(super) next_timer_id: u64,
    pub(super) in_isr: bool,
    pub(super) interrupt: Option<Interrupt>,
    /// Input edges before this time were already offered to the interrupt
    pub(super) delivered_until: u64,
    pub(super) attaches: HashMap<u8, u32>,
    pub(super) detaches: HashMap<u8, u32>,
}

impl Node {
    pub(super) fn new(input: usize, output: usize) -> Self {
        Self {
            now: 0,
            status: Status::Running,
            input,
            output,
            action: Vec::new(),
            timers: BTreeMap::new(),
            next_timer_id: 0,
            in_isr: false,
            interrupt: None,
            delivered_until: 0,
            attaches: HashMap::new(),
            detaches: HashMap::new(),
        }
    }

    /// Earliest armed timer as `(deadline, id)`.
    pub(super) fn next_timer(&self) -> Option<(u64, u64)> {
        self.timers
            .iter()
            .filter_map(|(id, timer)| timer.deadline.map(|deadline| (deadline, *id)))
            .min()
    }
}

pub(super) struct BusState {
    pub(super) wires: Vec<Wire>,
    pub(super) nodes: Vec<Node>,
}

impl BusState {
    /// Edges of `node`'s input before this time are final.
    pub(super) fn horizon(&self, node: usize) -> u64 {
        match self.wires[self.nodes[node].input].driver {
            Some(driver) => self.commit(driver, 1),
            None => NEVER,
        }
    }

    /// Earliest time `node` may write again.
    ///
    /// `depth` bounds how far the estimate follows the node's own upstream
    /// round the loop. At zero, the upstream is assumed silent until the
    /// node's own wake time.
    fn commit(&self, node: usize, depth: u8) -> u64 {
        let this = &self.nodes[node];
        let (wake_at, measuring) = match this.status {
            Status::Finished => return NEVER,
            Status::Running => return this.now,
            Status::Blocked { wake_at, measuring } => (wake_at, measuring),
        };
        let Some(m) = measuring else {
            return this.now.max(wake_at);
        };

        let upstream = match self.wires[this.input].driver {
            None => NEVER,
            Some(_) if depth == 0 => wake_at,
            Some(up) => self.commit(up, depth - 1),
        };
        // A measurement whose closing edge is already on the wire wakes the
        // node at that edge, however far its upstream has run since.
        let edges = &self.wires[this.input].edges;
        let settles_at = match capture(edges, m.level, m.start, m.deadline, upstream) {
            Capture::Pulse { fall, .. } => fall,
            Capture::Absent => m.deadline,
            Capture::Pending => upstream,
        };
        this.now.max(wake_at.min(settles_at))
    }
}

/// Result of looking for one complete pulse on an input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Capture {
    Pulse { rise: u64, fall: u64 },
    Absent,
    Pending,
}

/// Find the first complete pulse at `level` that starts at or after
/// `start` and ends before `deadline`.
///
/// Edges strictly alternate, so the edge after the rise is the fall.
pub(super) fn capture(
    edges: &[(u64, Level)],
    level: Level,
    start: u64,
    deadline: u64,
    horizon: u64,
) -> Capture {
    let mut after = edges.iter().skip_while(|(t, _)| *t < start);
    match after.find(|(_, l)| *l == level) {
        Some(&(rise, _)) if rise >= deadline => Capture::Absent,
        Some(&(rise, _)) => match after.next() {
            Some(&(fall, _)) if fall < deadline => Capture::Pulse { rise, fall },
            Some(_) => Capture::Absent,
            None if horizon >= deadline => Capture::Absent,
            None => Capture::Pending,
        },
        None if horizon >= deadline => Capture::Absent,
        None => Capture::Pending,
    }
}
