use serde::Serialize;

/// State of the caller's follow edge to a user after a toggle.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct FollowResponse {
    /// Whether the caller follows the target after the toggle.
    pub is_following: bool,
    /// Followers of the target.
    #[schema(example = 12)]
    pub follower_count: u64,
    /// Accounts the target follows.
    #[schema(example = 8)]
    pub following_count: u64,
}
