//! Event-sourced engine: the reducer, the state store, display-status
//! derivation, and the reconciler loop that feeds remote facts into the
//! event channel.

pub mod display;
pub mod events;
pub mod reconciler;
pub mod store;
