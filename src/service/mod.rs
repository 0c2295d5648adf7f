//! The request pipeline: translation, filtering, ordering, paging, policy,
//! validation, transforms and the save orchestrator.

pub mod filter;
pub mod order;
pub mod page;
pub mod policy;
pub mod save;
pub mod structure;
pub mod transform;
pub mod translate;
pub mod validation;
