//! Property-based tests for identity and round-trip guarantees

mod identity;
mod round_trip;
