//! State module for tracking request progress
//!
//! # Components
//!
//! - `RequestState`: the states one fetch/extract call moves through
//! - `Lifecycle`: per-request tracker that rejects invalid transitions

mod request_state;

pub use request_state::{Lifecycle, RequestState};
