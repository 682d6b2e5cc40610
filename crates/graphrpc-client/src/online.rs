use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// What the client currently believes about its endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnlineState {
    Unknown,
    Online,
    Offline,
}

impl fmt::Display for OnlineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OnlineState::Unknown => write!(f, "unknown"),
            OnlineState::Online => write!(f, "online"),
            OnlineState::Offline => write!(f, "offline"),
        }
    }
}

/// Shared tri-state flag. Written by any in-flight call and read by all;
/// races are tolerated since it is only a hint.
#[derive(Debug, Default)]
pub struct OnlineFlag(AtomicU8);

const UNKNOWN: u8 = 0;
const ONLINE: u8 = 1;
const OFFLINE: u8 = 2;

impl OnlineFlag {
    /// Current state; `Unknown` until a call or ping completes.
    pub fn get(&self) -> OnlineState {
        match self.0.load(Ordering::Acquire) {
            ONLINE => OnlineState::Online,
            OFFLINE => OnlineState::Offline,
            _ => OnlineState::Unknown,
        }
    }

    /// Stores `state`, returning the previous one.
    pub fn set(&self, state: OnlineState) -> OnlineState {
        let raw = match state {
            OnlineState::Unknown => UNKNOWN,
            OnlineState::Online => ONLINE,
            OnlineState::Offline => OFFLINE,
        };
        match self.0.swap(raw, Ordering::AcqRel) {
            ONLINE => OnlineState::Online,
            OFFLINE => OnlineState::Offline,
            _ => OnlineState::Unknown,
        }
    }

    /// Records a successful exchange: `Unknown` becomes `Online`, a known
    /// `Offline` stays until explicitly re-evaluated.
    pub fn mark_success(&self) -> bool {
        self.0
            .compare_exchange(UNKNOWN, ONLINE, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_unknown() {
        assert_eq!(OnlineFlag::default().get(), OnlineState::Unknown);
    }

    #[test]
    fn test_success_does_not_clear_offline() {
        let flag = OnlineFlag::default();
        assert!(flag.mark_success());
        assert_eq!(flag.get(), OnlineState::Online);

        flag.set(OnlineState::Offline);
        assert!(!flag.mark_success());
        assert_eq!(flag.get(), OnlineState::Offline);
    }

    #[test]
    fn test_set_returns_previous() {
        let flag = OnlineFlag::default();
        assert_eq!(flag.set(OnlineState::Offline), OnlineState::Unknown);
        assert_eq!(flag.set(OnlineState::Online), OnlineState::Offline);
    }
}
