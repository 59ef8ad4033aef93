//! Async driver for a [`branch_core::Workspace`].
//!
//! [`Session`] pairs the workspace with a [`branch_llm::BranchBackend`] and
//! publishes a [`SessionEvent`] after every applied step.

pub mod events;
pub mod session;

pub use events::SessionEvent;
pub use session::Session;
