//! Credit-based rate limiting.
//!
//! A [`RateLimiter`] sits between a producer and a consumer and lets at most
//! `allow` events through before forcing `sleep` idle cycles. It never looks
//! at the payload, only at whether a transfer happened in the current cycle.
//!
//! The same limiter guards three boundaries in the receiver:
//! - network ingress into the frame store write port
//! - frame store read requests issued by the row filler
//! - row filler writes into the row buffers
//!
//! # Usage
//! Every cycle, ask [`RateLimiter::is_open`] before moving an item, then call
//! [`RateLimiter::clock`] exactly once with whether an item actually moved.
//!
//! ```rust
//! use hub75_receiver::limiter::RateLimiter;
//!
//! let mut limiter = RateLimiter::new(2, 3);
//! let mut passed = 0;
//! for _ in 0..10 {
//!     let moved = limiter.is_open();
//!     if moved {
//!         passed += 1;
//!     }
//!     limiter.clock(moved);
//! }
//! // two events, three idle cycles, two events, three idle cycles
//! assert_eq!(passed, 4);
//! ```

/// The two phases of a limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Events are forwarded.
    Active,
    /// Forwarding is blocked until the sleep count runs out.
    Sleeping,
}

/// Burst/idle pair for one limiter, as stored in the register table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Limits {
    /// Events forwarded per burst.
    pub allow: u16,
    /// Idle cycles forced after each burst. Zero disables limiting.
    pub sleep: u16,
}

impl Limits {
    /// Limits that never force an idle cycle.
    pub const UNLIMITED: Self = Self { allow: 1, sleep: 0 };

    /// Create a new burst/idle pair.
    #[must_use]
    pub const fn new(allow: u16, sleep: u16) -> Self {
        Self { allow, sleep }
    }
}

/// Credit gate: `allow` events, then `sleep` idle cycles, repeated forever.
///
/// The counter stays in `[1, allow]` while active and in `[1, sleep]` while
/// sleeping. A `sleep` of zero turns the limiter into a pass-through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RateLimiter {
    limits: Limits,
    counter: u16,
    phase: Phase,
}

impl RateLimiter {
    /// Create a limiter forwarding `allow` events before sleeping `sleep`
    /// cycles.
    #[must_use]
    pub const fn new(allow: u16, sleep: u16) -> Self {
        Self::with_limits(Limits::new(allow, sleep))
    }

    /// Create a limiter from a [`Limits`] pair.
    #[must_use]
    pub const fn with_limits(limits: Limits) -> Self {
        Self {
            limits,
            counter: 1,
            phase: Phase::Active,
        }
    }

    /// A limiter that never blocks.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self::with_limits(Limits::UNLIMITED)
    }

    /// Update the burst/idle pair. Takes effect at the next comparison; the
    /// current phase and counter are kept.
    pub fn set_limits(&mut self, limits: Limits) {
        self.limits = limits;
    }

    /// The configured burst/idle pair.
    #[must_use]
    pub const fn limits(&self) -> Limits {
        self.limits
    }

    /// Whether an event may be forwarded this cycle.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.phase == Phase::Active
    }

    /// The current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// The credit counter for the current phase.
    #[must_use]
    pub const fn counter(&self) -> u16 {
        self.counter
    }

    /// Advance one cycle. `transferred` says whether an event went through
    /// the gate during this cycle; it is ignored while sleeping.
    pub fn clock(&mut self, transferred: bool) {
        match self.phase {
            Phase::Sleeping => {
                if self.counter >= self.limits.sleep {
                    self.counter = 1;
                    self.phase = Phase::Active;
                } else {
                    self.counter += 1;
                }
            }
            Phase::Active if transferred => {
                if self.counter >= self.limits.allow {
                    self.counter = 1;
                    if self.limits.sleep > 0 {
                        self.phase = Phase::Sleeping;
                    }
                } else {
                    self.counter += 1;
                }
            }
            Phase::Active => {}
        }
    }

    /// Return to the start of an active burst.
    pub fn reset(&mut self) {
        self.counter = 1;
        self.phase = Phase::Active;
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::unlimited()
    }
}
