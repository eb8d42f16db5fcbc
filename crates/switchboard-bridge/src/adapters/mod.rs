//! Concrete platform collaborators used by the `switchboard` binary.

pub mod gateway;
pub mod telegram;
