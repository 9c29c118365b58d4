//! The messaging entity models and their read-only accessor wrappers.

pub mod attachment;
pub mod composer;
pub mod message;
pub mod partner;
pub mod seen_info;
pub mod thread;
