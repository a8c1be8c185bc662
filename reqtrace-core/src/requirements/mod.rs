//! Specification-table requirements
//!
//! This module holds the requirement model shared by every analysis stage and
//! the loader that turns table files into a merged [`RequirementTable`].

pub mod model;
pub mod table;

pub use model::{
    Actor,
    RequirementId,
    RequirementRecord,
    RequirementTable,
    TableFormat,
    VerificationMethod,
};
pub use table::{
    RequirementRow,
    RequirementsFile,
    TableMetadata,
    load_tables,
};
