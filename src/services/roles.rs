//! Instructor role resolution.

use crate::Result;
use crate::models::InstructorRole;
use std::collections::HashMap;
use std::sync::Arc;

/// Resolves the instructor roles a user holds.
///
/// Injected into [`CommentSearchQueryBuilder`](super::CommentSearchQueryBuilder)
/// rather than looked up globally, so callers decide where roles come from.
pub trait RoleResolver: Send + Sync {
    /// Returns every `(course, email)` pair for which `user_id` is an instructor.
    ///
    /// An unknown user has no roles; that is not an error.
    fn roles_for(&self, user_id: &str) -> Result<Vec<InstructorRole>>;
}

impl<T: RoleResolver + ?Sized> RoleResolver for Arc<T> {
    fn roles_for(&self, user_id: &str) -> Result<Vec<InstructorRole>> {
        (**self).roles_for(user_id)
    }
}

/// Fixed role table, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct StaticRoleResolver {
    roles: HashMap<String, Vec<InstructorRole>>,
}

impl StaticRoleResolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants `role` to `user_id`.
    #[must_use]
    pub fn with_role(mut self, user_id: impl Into<String>, role: InstructorRole) -> Self {
        self.add_role(user_id, role);
        self
    }

    /// Grants `role` to `user_id` in place. Duplicate grants are ignored.
    pub fn add_role(&mut self, user_id: impl Into<String>, role: InstructorRole) {
        let roles = self.roles.entry(user_id.into()).or_default();
        if !roles.contains(&role) {
            roles.push(role);
        }
    }
}

impl RoleResolver for StaticRoleResolver {
    fn roles_for(&self, user_id: &str) -> Result<Vec<InstructorRole>> {
        Ok(self.roles.get(user_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_resolver() {
        let resolver = StaticRoleResolver::new()
            .with_role("ada", InstructorRole::new("CS101", "ada@x.com"))
            .with_role("ada", InstructorRole::new("CS102", "ada@y.com"))
            .with_role("ada", InstructorRole::new("CS101", "ada@x.com"));

        let roles = resolver.roles_for("ada").unwrap();
        assert_eq!(roles.len(), 2);
        assert_eq!(roles[1].course_id, "CS102");
        assert!(resolver.roles_for("nobody").unwrap().is_empty());
    }

    #[test]
    fn test_arc_resolver() {
        let resolver: Arc<dyn RoleResolver> = Arc::new(
            StaticRoleResolver::new().with_role("ada", InstructorRole::new("CS101", "ada@x.com")),
        );
        assert_eq!(resolver.roles_for("ada").unwrap().len(), 1);
    }
}
