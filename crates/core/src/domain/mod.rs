pub mod call;
pub mod lead;
