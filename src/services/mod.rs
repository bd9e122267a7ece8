//! Business logic services.
//!
//! Services orchestrate storage backends and provide high-level operations.

mod roles;
mod search_query;
mod students;

pub use roles::{RoleResolver, StaticRoleResolver};
pub use search_query::{CommentSearchQueryBuilder, visibility_filter};
pub use students::StudentStore;
