use std::str::FromStr;

use domain_submission::model::entity::{Submission, SubmissionKind};
use sea_orm::entity::prelude::*;
use sea_orm::Set;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "file_submission")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub file_id: String,
    pub file_name: String,
    pub file_size: i64,
    /// Full enriched scan response, stored verbatim.
    pub raw_response: Json,
    pub mime_types: Vec<String>,
    pub yara_hits: Vec<String>,
    pub scanners_run: Vec<String>,
    pub hashes: Json,
    pub files_seen: i32,
    pub insights: Vec<String>,
    pub iocs: Vec<String>,
    pub highest_positives: i64,
    pub highest_positives_sha256: Option<String>,
    pub kind: String,
    pub submitted_from_ip: String,
    pub submitted_from_client: String,
    pub submitted_by_user_id: i32,
    pub submitted_description: String,
    pub submitted_at: DateTimeUtc,
    pub processed_at: Option<DateTimeUtc>,
    pub object_key: Option<String>,
    pub object_expires_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::SubmittedByUserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Submission {
    type Error = anyhow::Error;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Submission {
            id: model.id,
            file_id: model.file_id,
            file_name: model.file_name,
            file_size: model.file_size,
            raw_response: serde_json::from_value(model.raw_response)?,
            mime_types: model.mime_types,
            yara_hits: model.yara_hits,
            scanners_run: model.scanners_run,
            hashes: serde_json::from_value(model.hashes)?,
            files_seen: model.files_seen,
            insights: model.insights,
            iocs: model.iocs,
            highest_positives: model.highest_positives,
            highest_positives_sha256: model.highest_positives_sha256,
            kind: SubmissionKind::from_str(&model.kind)?,
            submitted_from_ip: model.submitted_from_ip,
            submitted_from_client: model.submitted_from_client,
            submitted_by_user_id: model.submitted_by_user_id,
            submitted_description: model.submitted_description,
            submitted_at: model.submitted_at,
            processed_at: model.processed_at,
            object_key: model.object_key,
            object_expires_at: model.object_expires_at,
        })
    }
}

pub fn to_active_model(submission: &Submission) -> anyhow::Result<ActiveModel> {
    Ok(ActiveModel {
        id: Set(submission.id),
        file_id: Set(submission.file_id.clone()),
        file_name: Set(submission.file_name.clone()),
        file_size: Set(submission.file_size),
        raw_response: Set(serde_json::to_value(&submission.raw_response)?),
        mime_types: Set(submission.mime_types.clone()),
        yara_hits: Set(submission.yara_hits.clone()),
        scanners_run: Set(submission.scanners_run.clone()),
        hashes: Set(serde_json::to_value(&submission.hashes)?),
        files_seen: Set(submission.files_seen),
        insights: Set(submission.insights.clone()),
        iocs: Set(submission.iocs.clone()),
        highest_positives: Set(submission.highest_positives),
        highest_positives_sha256: Set(submission.highest_positives_sha256.clone()),
        kind: Set(submission.kind.as_str().to_owned()),
        submitted_from_ip: Set(submission.submitted_from_ip.clone()),
        submitted_from_client: Set(submission.submitted_from_client.clone()),
        submitted_by_user_id: Set(submission.submitted_by_user_id),
        submitted_description: Set(submission.submitted_description.clone()),
        submitted_at: Set(submission.submitted_at),
        processed_at: Set(submission.processed_at),
        object_key: Set(submission.object_key.clone()),
        object_expires_at: Set(submission.object_expires_at),
    })
}
