use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Where an account's credentials live.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthProvider {
    #[sea_orm(string_value = "LOCAL")]
    Local,
    #[sea_orm(string_value = "GOOGLE")]
    Google,
    #[sea_orm(string_value = "GITHUB")]
    Github,
}

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub username: String,
    #[sea_orm(unique)]
    pub email: String,

    /// Argon2 PHC string. Empty for accounts provisioned through OAuth2,
    /// which can never pass a local password check.
    #[serde(skip_serializing)]
    pub password: String,

    pub full_name: Option<String>,
    pub bio: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub profile_image_url: Option<String>,

    pub provider: AuthProvider,
    /// Subject id issued by the external provider.
    pub provider_id: Option<String>,

    pub enabled: bool,
    /// Bumped to revoke every token issued so far.
    pub token_version: i32,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
