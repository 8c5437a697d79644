//! Bus abstractions
//!
//! This module defines the capability traits the session is built on and
//! the scratch-buffered [`Bus`] every protocol sequence runs against.

mod exchange;
mod traits;

pub use exchange::Bus;
pub use traits::*;
