//! Subcommand implementations wiring concrete payloads onto the
//! substrate's protocols.

pub mod fibonacci;
pub mod quadratic;
