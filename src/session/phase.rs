use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of an interview session
///
/// Idle -> Starting -> Active -> Ending -> Ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Phase {
    Idle = 0,
    Starting = 1,
    Active = 2,
    Ending = 3,
    Ended = 4,
}

impl Phase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Phase::Idle,
            1 => Phase::Starting,
            2 => Phase::Active,
            3 => Phase::Ending,
            _ => Phase::Ended,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Ending | Phase::Ended)
    }
}

/// Atomic phase holder
///
/// Every transition is a synchronous test-and-set, so when several triggers
/// race for the same transition exactly one of them wins.
pub struct PhaseCell {
    value: AtomicU8,
}

impl Default for PhaseCell {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseCell {
    pub fn new() -> Self {
        Self {
            value: AtomicU8::new(Phase::Idle as u8),
        }
    }

    pub fn get(&self) -> Phase {
        Phase::from_u8(self.value.load(Ordering::SeqCst))
    }

    /// Move forward to `to` if the current phase is one of `from`
    ///
    /// Returns the phase that was left, or the current phase on failure.
    /// Only forward moves are allowed.
    pub fn claim(&self, from: &[Phase], to: Phase) -> Result<Phase, Phase> {
        let mut current = self.get();
        loop {
            if !from.contains(&current) || current >= to {
                return Err(current);
            }
            match self.value.compare_exchange(
                current as u8,
                to as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Ok(current),
                Err(actual) => current = Phase::from_u8(actual),
            }
        }
    }

    /// Undo a failed start: Starting -> Idle. The only backward move.
    pub fn rollback_start(&self) -> bool {
        self.value
            .compare_exchange(
                Phase::Starting as u8,
                Phase::Idle as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }
}
