//! # Recruit Test Suite
//!
//! Cross-crate tests of the request/reply bridge running on the in-memory
//! broker, with scripted sibling services on the far side.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Harness: broker + bridge service + scripted siblings
//! └── integration/
//!     ├── scenarios.rs  # Reply, timeout, application error end to end
//!     ├── stress.rs     # Many concurrent callers, out-of-order replies
//!     ├── races.rs      # Reply vs timer under delay injection, late frames
//!     └── failures.rs   # Backpressure, broker failures, cancellation, shutdown
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p recruit-tests
//! cargo test -p recruit-tests integration::races::
//! cargo bench -p recruit-tests
//! ```

pub mod fixtures;
pub mod integration;
