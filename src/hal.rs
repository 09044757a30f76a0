//! Hardware capability traits.
//!
//! The controller only talks to the bench through these three traits, so a
//! real board, the simulated bench and the test fakes are interchangeable.

use crate::types::LineId;

/// Single raw analog reading of a sense line
pub trait Sampler {
    /// Raw count in `0..=full_scale`. No filtering, no failure signaling.
    fn read(&mut self, line: LineId) -> u16;
}

/// Load relay output
pub trait RelayDriver {
    /// Close (`true`) or open (`false`) the relay on `line`. Idempotent.
    fn set_relay(&mut self, line: LineId, on: bool);
}

/// Monotonic time source with blocking waits
///
/// Only used for interval timing, never as wall-clock time.
pub trait Clock {
    fn now_ms(&self) -> u64;

    fn delay_ms(&mut self, ms: u64);

    fn delay_us(&mut self, us: u32);

    /// Block until `now_ms() >= deadline_ms`. Returns immediately if the
    /// deadline has already passed.
    fn sleep_until(&mut self, deadline_ms: u64) {
        let now = self.now_ms();
        if deadline_ms > now {
            self.delay_ms(deadline_ms - now);
        }
    }
}

impl<T: Sampler + ?Sized> Sampler for &mut T {
    fn read(&mut self, line: LineId) -> u16 {
        (**self).read(line)
    }
}

impl<T: RelayDriver + ?Sized> RelayDriver for &mut T {
    fn set_relay(&mut self, line: LineId, on: bool) {
        (**self).set_relay(line, on)
    }
}

impl<T: Clock + ?Sized> Clock for &mut T {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }

    fn delay_ms(&mut self, ms: u64) {
        (**self).delay_ms(ms)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }

    fn sleep_until(&mut self, deadline_ms: u64) {
        (**self).sleep_until(deadline_ms)
    }
}
