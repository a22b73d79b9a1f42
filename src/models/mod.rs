//! Domain models for crewledger.
//!
//! # Core Concepts
//!
//! - [`Employee`]: A person with course progress, badges, an accrued balance
//!   and the employee half of every project assignment.
//! - [`Project`]: An internal project with a lifecycle status and the project
//!   half of every assignment.
//! - [`Course`]: Read-only training catalog entry that pays a reward and
//!   badges on completion.
//!
//! Assignments are stored on both sides as id sets, with no join table.
//! The [`crate::engine`] keeps the two sides in agreement.

mod course;
mod employee;
mod project;

pub use course::*;
pub use employee::*;
pub use project::*;
