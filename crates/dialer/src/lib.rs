//! Calling pipeline: lead selection, bounded dispatch, in-flight call
//! tracking and completion handling.

pub mod completion;
pub mod dispatcher;
pub mod manager;
pub mod registry;
pub mod selector;

#[cfg(test)]
pub(crate) mod test_support;

pub use completion::{CompletionError, CompletionHandler, CompletionReport};
pub use dispatcher::{BatchSummary, CallDispatcher, DispatchError, DispatchOutcome, DispatchPolicy};
pub use manager::{CallStats, LeadManager, RunSummary, StartError};
pub use registry::ActiveCallRegistry;
pub use selector::{select_leads, Selection};
