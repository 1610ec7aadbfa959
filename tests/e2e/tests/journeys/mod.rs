//! Entry point for the `journey_tests` binary; individual scenarios also
//! compile as their own `[[test]]` targets so they can be run in isolation.

mod hypothesis_promotion;
mod round_trip;
mod scope_isolation;
mod shadow_graduation;
mod socratic_conflict;
mod terminal_noise_filter;
