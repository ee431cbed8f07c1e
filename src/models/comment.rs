//! Comment model for MR discussions.

use crate::models::user::User;
use chrono::{DateTime, Utc};

/// A discussion comment on a merge request.
///
/// Comments are carried only for downstream display; the rotation decision
/// logic never reads them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    /// GitLab note ID.
    pub id: i64,

    /// Comment content (Markdown).
    pub body: String,

    /// Comment author.
    pub author: User,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}
