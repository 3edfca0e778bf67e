//! Time utilities and abstractions
//!
//! - **[`clock`]**: real and mock wall clocks

pub mod clock;

pub use clock::{Clock, MockClock, SystemClock};
