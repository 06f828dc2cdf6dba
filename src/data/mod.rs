//! Data structures held by the two roles.
//!
//! The peripheral owns a [`MovingAverage`]; the central owns an
//! [`ExtremaTracker`]; both keep a [`Session`].

pub mod extrema;
pub mod filter;
pub mod session;

pub use extrema::{Extrema, ExtremaTracker};
pub use filter::{MovingAverage, DEFAULT_WINDOW_SIZE};
pub use session::{LinkEdge, Session};
