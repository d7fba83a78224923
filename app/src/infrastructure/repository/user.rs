use async_trait::async_trait;
use chrono::Utc;
use domain_submission::model::entity::User;
use domain_submission::repository::UserRepo;
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter};

use crate::infrastructure::database::model::prelude::*;
use crate::infrastructure::database::model::user;
use crate::infrastructure::repository::OrmRepo;

#[async_trait]
impl UserRepo for OrmRepo {
    async fn get_by_id(&self, id: i32) -> anyhow::Result<Option<User>> {
        let model = UserEntity::find_by_id(id).one(self.connection()).await?;
        Ok(model.map(into_user))
    }

    async fn get_by_api_key(&self, key: &str) -> anyhow::Result<Option<User>> {
        let Some(api_key) = ApiKeyEntity::find_by_id(key.to_owned()).one(self.connection()).await?
        else {
            return Ok(None);
        };
        if api_key.expiration < Utc::now() {
            tracing::debug!(user_cn = %api_key.user_cn, "rejected expired api key");
            return Ok(None);
        }
        let model = UserEntity::find()
            .filter(user::Column::UserCn.eq(api_key.user_cn))
            .one(self.connection())
            .await?;
        Ok(model.map(into_user))
    }

    async fn upsert_login(&self, user_cn: &str) -> anyhow::Result<User> {
        let existing = UserEntity::find()
            .filter(user::Column::UserCn.eq(user_cn))
            .one(self.connection())
            .await?;

        let model = match existing {
            Some(model) => {
                let mut active = model.into_active_model();
                let count = match &active.login_count {
                    Set(c) | sea_orm::ActiveValue::Unchanged(c) => *c,
                    NotSet => 0,
                };
                active.login_count = Set(count + 1);
                active.last_login = Set(Some(Utc::now()));
                active.update(self.connection()).await?
            }
            None => {
                let active = user::ActiveModel {
                    id: NotSet,
                    user_cn: Set(user_cn.to_owned()),
                    first_name: Set(String::new()),
                    last_name: Set(String::new()),
                    last_login: Set(Some(Utc::now())),
                    login_count: Set(1),
                    files_submitted: Set(0),
                };
                active.insert(self.connection()).await?
            }
        };
        Ok(into_user(model))
    }
}

fn into_user(model: user::Model) -> User {
    User {
        id: model.id,
        user_cn: model.user_cn,
        first_name: model.first_name,
        last_name: model.last_name,
        last_login: model.last_login,
        login_count: model.login_count,
        files_submitted: model.files_submitted,
    }
}
