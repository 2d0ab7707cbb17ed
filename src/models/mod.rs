// SPDX-License-Identifier: MIT

//! Data models for the application.

pub mod entitlement;
pub mod progress;
pub mod token;

pub use entitlement::{Entitlement, MembershipStatus};
pub use progress::{LocalLessonEntry, LocalProgress, ProgressRecord};
pub use token::{AccessToken, Plan};
