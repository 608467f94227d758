use sea_orm::sea_query::{Index, IndexCreateStatement, PostgresQueryBuilder, SqliteQueryBuilder};
use sea_orm::*;
use tracing::info;

use crate::entity::{comment, follow, post};

/// Ensure the composite indexes used by feed and listing queries exist.
///
/// Schema sync only creates the per-column constraints declared on the
/// entities, so composite non-unique indexes are created here on startup.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    // SELECT ... FROM post WHERE user_id = ? ORDER BY created_at DESC
    let post_by_user = Index::create()
        .if_not_exists()
        .name("idx_post_user_created")
        .table(post::Entity)
        .col(post::Column::UserId)
        .col(post::Column::CreatedAt)
        .to_owned();
    create_index(db, "idx_post_user_created", post_by_user).await;

    // SELECT ... FROM comment WHERE post_id = ? ORDER BY created_at
    let comment_by_post = Index::create()
        .if_not_exists()
        .name("idx_comment_post_created")
        .table(comment::Entity)
        .col(comment::Column::PostId)
        .col(comment::Column::CreatedAt)
        .to_owned();
    create_index(db, "idx_comment_post_created", comment_by_post).await;

    // Follower counts and listings filter on the followed side.
    let follow_by_following = Index::create()
        .if_not_exists()
        .name("idx_follow_following")
        .table(follow::Entity)
        .col(follow::Column::FollowingId)
        .to_owned();
    create_index(db, "idx_follow_following", follow_by_following).await;

    Ok(())
}

async fn create_index(db: &DatabaseConnection, name: &str, stmt: IndexCreateStatement) {
    let sql = match db.get_database_backend() {
        DbBackend::Sqlite => stmt.to_string(SqliteQueryBuilder),
        _ => stmt.to_string(PostgresQueryBuilder),
    };

    match db.execute_unprepared(&sql).await {
        Ok(_) => info!("Ensured index {} exists", name),
        Err(e) => tracing::warn!("Failed to create index {}: {}", name, e),
    }
}
