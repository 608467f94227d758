use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Ownership record for an uploaded profile image. Only the uploader may
/// point their profile at the file, and only they can cause its deletion.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "profile_image")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub filename: String,

    pub user_id: i32,
    #[sea_orm(belongs_to, from = "user_id", to = "id")]
    pub user: HasOne<super::user::Entity>,

    pub content_type: String,
    pub size: i64,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
