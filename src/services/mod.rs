pub mod ai;
pub mod conversation;
pub mod extraction;
pub mod history;
pub mod normalizer;
pub mod recommendation;
pub mod retrieval;
pub mod scheduling;
pub mod session_store;
