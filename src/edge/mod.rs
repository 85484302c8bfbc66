//! Sticky edge flag fed by a GPIO interrupt.
//!
//! Interrupt callbacks cannot carry a `self` pointer, so detectors register
//! in a static table with one slot per pin. The interrupt entry point
//! [`on_edge`] only sets the slot's flag; the main loop reads and clears it
//! atomically with [`EdgeDetector::test_and_clear`].
//!
//! Only one detector may be armed per pin. Arming a second detector on the
//! same pin takes the slot over and the first one goes quiet.

use crate::hal::{Edge, Hardware};
use critical_section::Mutex;
use std::cell::RefCell;
use thiserror::Error;

/// Number of pins the registration table covers.
pub const MAX_PINS: usize = 64;

#[derive(Debug, Error, PartialEq)]
pub enum EdgeError {
    #[error("pin {pin} exceeds the highest supported pin {max}")]
    PinOutOfRange { pin: u8, max: u8 },
}

#[derive(Clone, Copy)]
struct Slot {
    generation: u32,
    armed: bool,
    flag: bool,
}

impl Slot {
    const VACANT: Slot = Slot {
        generation: 0,
        armed: false,
        flag: false,
    };
}

static SLOTS: Mutex<RefCell<[Slot; MAX_PINS]>> =
    Mutex::new(RefCell::new([Slot::VACANT; MAX_PINS]));

/// Interrupt entry point handed to the hardware for every armed pin.
pub fn on_edge(pin: u8) {
    critical_section::with(|cs| {
        if let Some(slot) = SLOTS.borrow_ref_mut(cs).get_mut(pin as usize) {
            if slot.armed {
                slot.flag = true;
            }
        }
    });
}

/// Rising-edge detector on one pin.
#[derive(Debug)]
pub struct EdgeDetector {
    pin: u8,
    registration: Option<u32>,
}

impl EdgeDetector {
    pub fn new(pin: u8) -> Result<Self, EdgeError> {
        if pin as usize >= MAX_PINS {
            return Err(EdgeError::PinOutOfRange {
                pin,
                max: (MAX_PINS - 1) as u8,
            });
        }
        Ok(Self {
            pin,
            registration: None,
        })
    }

    pub fn pin(&self) -> u8 {
        self.pin
    }

    /// Claim the pin's slot and attach the rising-edge interrupt.
    ///
    /// The flag starts cleared. Any detector previously armed on this pin is
    /// replaced.
    pub fn arm<H: Hardware>(&mut self, hw: &mut H) {
        let pin = self.pin as usize;
        let generation = critical_section::with(|cs| {
            let mut slots = SLOTS.borrow_ref_mut(cs);
            let slot = &mut slots[pin];
            slot.generation = slot.generation.wrapping_add(1);
            slot.armed = true;
            slot.flag = false;
            slot.generation
        });
        self.registration = Some(generation);
        hw.attach_edge_interrupt(self.pin, Edge::Rising, on_edge);
    }

    /// Detach the interrupt and clear the flag.
    ///
    /// A detector that was replaced leaves the pin to its replacement.
    pub fn disarm<H: Hardware>(&mut self, hw: &mut H) {
        let owned = self
            .with_own_slot(|slot| {
                slot.armed = false;
                slot.flag = false;
            })
            .is_some();
        if owned {
            hw.detach_edge_interrupt(self.pin);
        }
    }

    pub fn is_armed(&self) -> bool {
        self.with_own_slot(|slot| slot.armed).unwrap_or(false)
    }

    /// Read and clear the flag in one critical section.
    pub fn test_and_clear(&self) -> bool {
        self.with_own_slot(|slot| std::mem::replace(&mut slot.flag, false))
            .unwrap_or(false)
    }

    fn with_own_slot<R>(&self, f: impl FnOnce(&mut Slot) -> R) -> Option<R> {
        let generation = self.registration?;
        let pin = self.pin as usize;
        critical_section::with(|cs| {
            let mut slots = SLOTS.borrow_ref_mut(cs);
            let slot = &mut slots[pin];
            (slot.generation == generation).then(|| f(slot))
        })
    }
}

impl Drop for EdgeDetector {
    fn drop(&mut self) {
        self.with_own_slot(|slot| {
            slot.armed = false;
            slot.flag = false;
        });
    }
}
