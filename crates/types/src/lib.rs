//! Core domain types for the shale storage harness: tenant and timeline
//! identifiers, log sequence numbers, and tenant tuning presets.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod id;
mod lsn;
mod tuning;

pub use id::{IdParseError, TenantId, TimelineId};
pub use lsn::{Lsn, LsnParseError};
pub use tuning::TenantTuning;
