pub mod config;
pub mod domain;
pub mod errors;
pub mod outcome;
pub mod phone;

pub use domain::call::{ActiveCall, CallFacts, CallId, CallRecord};
pub use domain::lead::{CompletedCallUpdate, Lead, LeadId, LeadStatus, LeadUpdate, PropertyDetails};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use outcome::{classify, Classification, OutcomeRule};
pub use phone::PhoneFormatter;
