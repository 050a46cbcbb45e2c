//! Cooperative throttle signal.
//!
//! An optional resource monitor (outside this crate's scope) can raise the
//! signal to `Light` or `Heavy`; the vector store coordinator checks it at
//! batch and query boundaries and sleeps accordingly before proceeding.

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleLevel {
    None,
    Light,
    Heavy,
}

impl ThrottleLevel {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ThrottleLevel::Light,
            2 => ThrottleLevel::Heavy,
            _ => ThrottleLevel::None,
        }
    }

    fn delay(self) -> Duration {
        match self {
            ThrottleLevel::None => Duration::ZERO,
            ThrottleLevel::Light => Duration::from_secs(1),
            ThrottleLevel::Heavy => Duration::from_secs(3),
        }
    }
}

pub struct ThrottleSignal(AtomicU8);

impl ThrottleSignal {
    pub fn new() -> Self {
        Self(AtomicU8::new(0))
    }

    pub fn set(&self, level: ThrottleLevel) {
        let value = match level {
            ThrottleLevel::None => 0,
            ThrottleLevel::Light => 1,
            ThrottleLevel::Heavy => 2,
        };
        self.0.store(value, Ordering::SeqCst);
    }

    pub fn level(&self) -> ThrottleLevel {
        ThrottleLevel::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub async fn wait(&self) {
        let delay = self.level().delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for ThrottleSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_by_default() {
        let signal = ThrottleSignal::new();
        assert_eq!(signal.level(), ThrottleLevel::None);
    }

    #[test]
    fn levels_round_trip() {
        let signal = ThrottleSignal::new();
        signal.set(ThrottleLevel::Heavy);
        assert_eq!(signal.level(), ThrottleLevel::Heavy);
        signal.set(ThrottleLevel::Light);
        assert_eq!(signal.level(), ThrottleLevel::Light);
    }
}
