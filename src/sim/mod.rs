//! Host simulation of the pulse line in virtual microseconds.
//!
//! [`SimBus::pair`] connects two simulated devices: each one's transmit pin
//! drives the other's input. [`SimBus::scripted`] feeds a single device a
//! fixed [`Waveform`]. Every device keeps its own virtual clock, which only
//! moves when it busy-waits ([`Hardware::delay_us`], [`OutputPin::pulse`],
//! [`SimDevice::advance`]) or when a pulse measurement returns.
//!
//! Paired devices are meant to run on separate threads. A blocking read
//! waits until the peer has advanced far enough that the answer can no
//! longer change, so results are exact and do not depend on scheduling.
//! A device measuring a pulse counts as waking at the pulse's closing edge
//! as soon as that edge is on the wire, so a peer never reads past a point
//! where the measuring device may still write.
//!
//! Timer callbacks and edge interrupts run on the owning device's thread
//! whenever its clock passes their time.

mod bus;
mod waveform;

pub use waveform::Waveform;

use crate::hal::{Edge, EdgeHandler, Hardware, Level, OneShotTimer, OutputPin, TimerCallback};
use bus::{
    capture, push_edge, BusState, Capture, Interrupt, Measurement, Node, Status, Timer, Wire,
};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::trace;

/// Real time a blocked device waits for its peer before declaring a stall.
const STALL_TIMEOUT: Duration = Duration::from_secs(10);

struct Shared {
    state: Mutex<BusState>,
    changed: Condvar,
}

impl Shared {
    fn new(state: BusState) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
            changed: Condvar::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for another device to change the bus. Panics if nothing changes
    /// for two consecutive stall periods.
    fn wait<'a>(
        &'a self,
        guard: MutexGuard<'a, BusState>,
        stalled: &mut bool,
    ) -> MutexGuard<'a, BusState> {
        self.changed.notify_all();
        let (guard, result) = self
            .changed
            .wait_timeout(guard, STALL_TIMEOUT)
            .unwrap_or_else(PoisonError::into_inner);
        if result.timed_out() {
            if *stalled {
                panic!("simulated bus stalled: no device made progress");
            }
            *stalled = true;
        } else {
            *stalled = false;
        }
        guard
    }

    fn write(&self, node: usize, pin: PinRole, level: Level) {
        let mut state = self.lock();
        let now = state.nodes[node].now;
        match pin {
            PinRole::Tx => {
                let output = state.nodes[node].output;
                push_edge(&mut state.wires[output].edges, now, level);
            }
            PinRole::Action => push_edge(&mut state.nodes[node].action, now, level),
        }
        self.changed.notify_all();
    }

    /// Busy-wait `us` on `node`, running every timer that falls due.
    fn delay(&self, node: usize, us: u32) {
        let mut state = self.lock();
        let target = state.nodes[node].now.saturating_add(u64::from(us));

        // Inside a handler time still passes, but nothing else may run.
        if state.nodes[node].in_isr {
            state.nodes[node].now = target;
            self.changed.notify_all();
            return;
        }

        while let Some((deadline, id)) = state.nodes[node]
            .next_timer()
            .filter(|&(deadline, _)| deadline <= target)
        {
            state = self.fire(state, node, id, deadline);
        }
        let this = &mut state.nodes[node];
        this.now = this.now.max(target);
        self.changed.notify_all();
        drop(self.deliver_edges(state, node));
    }

    /// Run timer `id` as an interrupt at `deadline`.
    fn fire<'a>(
        &'a self,
        mut state: MutexGuard<'a, BusState>,
        node: usize,
        id: u64,
        deadline: u64,
    ) -> MutexGuard<'a, BusState> {
        let this = &mut state.nodes[node];
        this.now = this.now.max(deadline);
        let Some(timer) = this.timers.get_mut(&id) else {
            return state;
        };
        timer.deadline = None;
        let callback = Arc::clone(&timer.callback);
        this.in_isr = true;
        trace!(node, id, at = this.now, "timer fired");
        drop(state);

        {
            let mut run = callback.lock().unwrap_or_else(PoisonError::into_inner);
            (*run)();
        }

        let mut state = self.lock();
        state.nodes[node].in_isr = false;
        self.changed.notify_all();
        state
    }

    /// Offer input edges up to the current time to the attached interrupt.
    fn deliver_edges<'a>(
        &'a self,
        mut state: MutexGuard<'a, BusState>,
        node: usize,
    ) -> MutexGuard<'a, BusState> {
        let horizon = state.horizon(node);
        let input = state.nodes[node].input;
        let this = &state.nodes[node];
        let from = this.delivered_until;
        let until = this.now.saturating_add(1).min(horizon).max(from);
        let Some(interrupt) = &this.interrupt else {
            state.nodes[node].delivered_until = until;
            return state;
        };
        let (pin, edge, handler) = (interrupt.pin, interrupt.edge, interrupt.handler);
        let fired = state.wires[input]
            .edges
            .iter()
            .filter(|&&(t, level)| {
                (from..until).contains(&t)
                    && match edge {
                        Edge::Rising => level == Level::High,
                        Edge::Falling => level == Level::Low,
                        Edge::Change => true,
                    }
            })
            .count();
        state.nodes[node].delivered_until = until;
        if fired == 0 {
            return state;
        }

        state.nodes[node].in_isr = true;
        drop(state);
        for _ in 0..fired {
            handler(pin);
        }
        let mut state = self.lock();
        state.nodes[node].in_isr = false;
        state
    }

    fn pulse_in(&self, node: usize, level: Level, timeout_us: u32) -> Option<u32> {
        let mut state = self.lock();
        let start = state.nodes[node].now;
        let deadline = start.saturating_add(u64::from(timeout_us));
        let measuring = Some(Measurement {
            level,
            start,
            deadline,
        });
        let mut stalled = false;

        loop {
            let timer = state.nodes[node].next_timer();
            let wake_at = timer.map_or(deadline, |(due, _)| due.min(deadline));
            state.nodes[node].status = Status::Blocked { wake_at, measuring };

            let horizon = state.horizon(node);
            let input = state.nodes[node].input;
            let result = match capture(&state.wires[input].edges, level, start, deadline, horizon)
            {
                Capture::Pulse { rise, fall } => {
                    Some((fall, Some(u32::try_from(fall - rise).unwrap_or(u32::MAX))))
                }
                Capture::Absent => Some((deadline, None)),
                Capture::Pending => None,
            };

            // A timer due before the measurement settles runs first. While
            // it is pending, nothing can land on the input before the
            // horizon.
            if let Some((due, id)) = timer {
                let due_first = match result {
                    Some((at, _)) => due <= at,
                    None => due <= state.nodes[node].now || horizon >= due,
                };
                if due <= deadline && due_first {
                    state.nodes[node].status = Status::Running;
                    state = self.fire(state, node, id, due);
                    continue;
                }
            }

            if let Some((at, measured)) = result {
                let this = &mut state.nodes[node];
                this.now = this.now.max(at);
                this.status = Status::Running;
                self.changed.notify_all();
                drop(self.deliver_edges(state, node));
                return measured;
            }

            state = self.wait(state, &mut stalled);
        }
    }

    fn read(&self, node: usize) -> Level {
        let mut state = self.lock();
        let now = state.nodes[node].now;
        let mut stalled = false;

        loop {
            state.nodes[node].status = Status::Blocked {
                wake_at: now,
                measuring: None,
            };
            if state.horizon(node) >= now {
                state.nodes[node].status = Status::Running;
                let input = state.nodes[node].input;
                return state.wires[input].level_before(now);
            }
            state = self.wait(state, &mut stalled);
        }
    }
}

/// Constructors for simulated devices.
pub struct SimBus;

impl SimBus {
    /// Two devices whose transmit pins drive each other's input.
    pub fn pair() -> (SimDevice, SimDevice) {
        let shared = Shared::new(BusState {
            wires: vec![Wire::driven_by(0), Wire::driven_by(1)],
            nodes: vec![Node::new(1, 0), Node::new(0, 1)],
        });
        (
            SimDevice {
                shared: Arc::clone(&shared),
                node: 0,
            },
            SimDevice { shared, node: 1 },
        )
    }

    /// One device whose input replays `waveform`.
    pub fn scripted(waveform: Waveform) -> SimDevice {
        let shared = Shared::new(BusState {
            wires: vec![Wire::scripted(waveform.into_edges()), Wire::driven_by(0)],
            nodes: vec![Node::new(0, 1)],
        });
        SimDevice { shared, node: 0 }
    }
}

/// A simulated board.
///
/// # Panics
///
/// [`Hardware::read`] and [`Hardware::pulse_in`] block until the peer has
/// advanced far enough. If no device on the bus makes progress for two
/// consecutive stall periods (ten seconds of real time each), they panic
/// instead of hanging the test. A peer that is dropped counts as finished
/// and never stalls the bus.
pub struct SimDevice {
    shared: Arc<Shared>,
    node: usize,
}

impl SimDevice {
    /// Current virtual time of this device.
    pub fn now(&self) -> u64 {
        self.shared.lock().nodes[self.node].now
    }

    /// Let `us` of virtual time pass, as a main loop does between polls.
    pub fn advance(&mut self, us: u32) {
        self.shared.delay(self.node, us);
    }

    /// Transitions driven on this device's transmit pin.
    pub fn tx_edges(&self) -> Vec<(u64, Level)> {
        let state = self.shared.lock();
        state.wires[state.nodes[self.node].output].edges.clone()
    }

    /// Completed action pulses as `(rising edge, width)`.
    pub fn action_pulses(&self) -> Vec<(u64, u32)> {
        let state = self.shared.lock();
        state.nodes[self.node]
            .action
            .chunks_exact(2)
            .map(|pair| {
                let (rise, fall) = (pair[0].0, pair[1].0);
                (rise, u32::try_from(fall - rise).unwrap_or(u32::MAX))
            })
            .collect()
    }

    pub fn attach_count(&self, pin: u8) -> u32 {
        let state = self.shared.lock();
        state.nodes[self.node]
            .attaches
            .get(&pin)
            .copied()
            .unwrap_or(0)
    }

    pub fn detach_count(&self, pin: u8) -> u32 {
        let state = self.shared.lock();
        state.nodes[self.node]
            .detaches
            .get(&pin)
            .copied()
            .unwrap_or(0)
    }

    /// Timers currently armed on this device.
    pub fn armed_timers(&self) -> usize {
        let state = self.shared.lock();
        state.nodes[self.node]
            .timers
            .values()
            .filter(|timer| timer.deadline.is_some())
            .count()
    }
}

impl Drop for SimDevice {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        state.nodes[self.node].status = Status::Finished;
        self.shared.changed.notify_all();
    }
}

impl Hardware for SimDevice {
    type Pin = SimPin;
    type Timer = SimTimer;

    fn tx_pin(&self) -> SimPin {
        SimPin {
            shared: Arc::clone(&self.shared),
            node: self.node,
            role: PinRole::Tx,
        }
    }

    fn action_pin(&self) -> SimPin {
        SimPin {
            shared: Arc::clone(&self.shared),
            node: self.node,
            role: PinRole::Action,
        }
    }

    /// # Panics
    ///
    /// Panics if the bus stalls while waiting for the peer.
    fn read(&mut self) -> Level {
        self.shared.read(self.node)
    }

    /// # Panics
    ///
    /// Panics if the bus stalls while waiting for the peer.
    fn pulse_in(&mut self, level: Level, timeout_us: u32) -> Option<u32> {
        self.shared.pulse_in(self.node, level, timeout_us)
    }

    fn delay_us(&mut self, us: u32) {
        self.shared.delay(self.node, us);
    }

    fn now_us(&self) -> u64 {
        self.now()
    }

    fn one_shot(&mut self, callback: TimerCallback) -> SimTimer {
        let mut state = self.shared.lock();
        let this = &mut state.nodes[self.node];
        let id = this.next_timer_id;
        this.next_timer_id += 1;
        this.timers.insert(
            id,
            Timer {
                deadline: None,
                callback: Arc::new(Mutex::new(callback)),
            },
        );
        SimTimer {
            shared: Arc::clone(&self.shared),
            node: self.node,
            id,
        }
    }

    fn attach_edge_interrupt(&mut self, pin: u8, edge: Edge, handler: EdgeHandler) {
        let mut state = self.shared.lock();
        let this = &mut state.nodes[self.node];
        this.interrupt = Some(Interrupt { pin, edge, handler });
        this.delivered_until = this.delivered_until.max(this.now);
        *this.attaches.entry(pin).or_default() += 1;
    }

    fn detach_edge_interrupt(&mut self, pin: u8) {
        let mut state = self.shared.lock();
        let this = &mut state.nodes[self.node];
        if this.interrupt.as_ref().is_some_and(|i| i.pin == pin) {
            this.interrupt = None;
        }
        *this.detaches.entry(pin).or_default() += 1;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PinRole {
    Tx,
    Action,
}

/// Output pin of a [`SimDevice`].
#[derive(Clone)]
pub struct SimPin {
    shared: Arc<Shared>,
    node: usize,
    role: PinRole,
}

impl OutputPin for SimPin {
    fn set_level(&mut self, level: Level) {
        self.shared.write(self.node, self.role, level);
    }

    fn pulse(&mut self, width_us: u32) {
        self.set_level(Level::High);
        self.shared.delay(self.node, width_us);
        self.set_level(Level::Low);
    }
}

/// One-shot timer of a [`SimDevice`]; fires when the device's clock passes
/// its deadline.
pub struct SimTimer {
    shared: Arc<Shared>,
    node: usize,
    id: u64,
}

impl OneShotTimer for SimTimer {
    fn start(&mut self, delay_us: u32) {
        let mut state = self.shared.lock();
        let this = &mut state.nodes[self.node];
        let deadline = this.now.saturating_add(u64::from(delay_us));
        if let Some(timer) = this.timers.get_mut(&self.id) {
            timer.deadline = Some(deadline);
        }
    }

    fn stop(&mut self) {
        let mut state = self.shared.lock();
        if let Some(timer) = state.nodes[self.node].timers.get_mut(&self.id) {
            timer.deadline = None;
        }
    }
}

impl Drop for SimTimer {
    fn drop(&mut self) {
        self.shared.lock().nodes[self.node].timers.remove(&self.id);
    }
}
