//! Scripted input waveforms.

use crate::hal::Level;

/// A fixed input signal, built segment by segment from time zero.
///
/// The line starts low and holds the level of its last segment forever.
///
/// ```rust
/// use pulsesync::hal::Level;
/// use pulsesync::sim::Waveform;
///
/// let wave = Waveform::new().idle(100).pulse(50);
/// assert_eq!(wave.edges(), &[(100, Level::High), (150, Level::Low)]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Waveform {
    edges: Vec<(u64, Level)>,
    cursor: u64,
    level: Level,
}

impl Default for Waveform {
    fn default() -> Self {
        Self::new()
    }
}

impl Waveform {
    pub fn new() -> Self {
        Self {
            edges: Vec::new(),
            cursor: 0,
            level: Level::Low,
        }
    }

    /// Hold the line low for `us`.
    pub fn idle(self, us: u32) -> Self {
        self.hold(Level::Low, us)
    }

    /// Hold the line high for `us`.
    pub fn high(self, us: u32) -> Self {
        self.hold(Level::High, us)
    }

    /// A single high pulse of `high_us`, leaving the line low.
    pub fn pulse(self, high_us: u32) -> Self {
        self.high(high_us).hold(Level::Low, 0)
    }

    /// `count` periods of `high_us` high followed by `low_us` low.
    pub fn pulses(self, count: u32, high_us: u32, low_us: u32) -> Self {
        (0..count).fold(self, |wave, _| wave.high(high_us).idle(low_us))
    }

    /// Level transitions as `(time, new level)`, in time order.
    pub fn edges(&self) -> &[(u64, Level)] {
        &self.edges
    }

    /// End of the last segment.
    pub fn duration(&self) -> u64 {
        self.cursor
    }

    pub(crate) fn into_edges(self) -> Vec<(u64, Level)> {
        self.edges
    }

    fn hold(mut self, level: Level, us: u32) -> Self {
        if level != self.level {
            self.edges.push((self.cursor, level));
            self.level = level;
        }
        self.cursor += u64::from(us);
        self
    }
}
