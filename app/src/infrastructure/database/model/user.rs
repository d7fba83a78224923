use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub user_cn: String,
    pub first_name: String,
    pub last_name: String,
    pub last_login: Option<DateTimeUtc>,
    pub login_count: i32,
    pub files_submitted: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::file_submission::Entity")]
    FileSubmission,
}

impl Related<super::file_submission::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FileSubmission.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
