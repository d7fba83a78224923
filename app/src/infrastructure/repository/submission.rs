use async_trait::async_trait;
use chrono::{DateTime, Months, Utc};
use domain_submission::exception::{SubmissionException, SubmissionResult};
use domain_submission::model::entity::Submission;
use domain_submission::model::vo::{
    MimeMonthlyStats, SortOrder, SubmissionHead, SubmissionPage, SubmissionQuery,
};
use domain_submission::repository::SubmissionRepo;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, Order, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, SelectTwo, SqlErr, TransactionTrait,
};
use std::str::FromStr;

use crate::infrastructure::database::model::prelude::*;
use crate::infrastructure::database::model::{file_submission, user};
use crate::infrastructure::repository::OrmRepo;

/// Where a listing sort lands: a literal column or a Postgres
/// `CARDINALITY()` over one of the aggregated array columns. Unknown
/// fields fall back to submission time.
#[derive(Debug)]
pub enum SortTarget {
    Column(file_submission::Column),
    Cardinality(&'static str),
}

pub fn sort_target(field: &str) -> SortTarget {
    match field {
        "file_name" => SortTarget::Column(file_submission::Column::FileName),
        "file_size" => SortTarget::Column(file_submission::Column::FileSize),
        "files_seen" => SortTarget::Column(file_submission::Column::FilesSeen),
        "highest_positives" => SortTarget::Column(file_submission::Column::HighestPositives),
        "submitted_at" => SortTarget::Column(file_submission::Column::SubmittedAt),
        "submitted_description" => {
            SortTarget::Column(file_submission::Column::SubmittedDescription)
        }
        "mime_types" => SortTarget::Cardinality("mime_types"),
        "yara_hits" => SortTarget::Cardinality("yara_hits"),
        "scanners_run" => SortTarget::Cardinality("scanners_run"),
        "insights" => SortTarget::Cardinality("insights"),
        "iocs" => SortTarget::Cardinality("iocs"),
        _ => SortTarget::Column(file_submission::Column::SubmittedAt),
    }
}

#[async_trait]
impl SubmissionRepo for OrmRepo {
    async fn create(&self, submission: &Submission) -> SubmissionResult<()> {
        let txn = self
            .connection()
            .begin()
            .await
            .map_err(|e| SubmissionException::Internal { source: e.into() })?;

        let row = file_submission::to_active_model(submission)?;
        if let Err(e) = FileSubmissionEntity::insert(row).exec(&txn).await {
            let _ = txn.rollback().await;
            return Err(match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => {
                    SubmissionException::DuplicateFileId {
                        file_id: submission.file_id.clone(),
                    }
                }
                _ => SubmissionException::Internal { source: e.into() },
            });
        }

        let counter = UserEntity::update_many()
            .col_expr(
                user::Column::FilesSubmitted,
                Expr::col(user::Column::FilesSubmitted).add(1),
            )
            .filter(user::Column::Id.eq(submission.submitted_by_user_id))
            .exec(&txn)
            .await;
        if let Err(e) = counter {
            let _ = txn.rollback().await;
            return Err(SubmissionException::Internal { source: e.into() });
        }

        txn.commit()
            .await
            .map_err(|e| SubmissionException::Internal { source: e.into() })?;
        Ok(())
    }

    async fn get_by_file_id(&self, file_id: &str) -> anyhow::Result<Option<Submission>> {
        let model = FileSubmissionEntity::find()
            .filter(file_submission::Column::FileId.eq(file_id))
            .one(self.connection())
            .await?;
        model.map(Submission::try_from).transpose()
    }

    async fn list(&self, query: &SubmissionQuery) -> anyhow::Result<SubmissionPage> {
        let per_page = query.per_page.max(1);
        let page = query.page.max(1);
        let paginator = listing_query(query).paginate(self.connection(), per_page);
        let totals = paginator.num_items_and_pages().await?;
        let rows = paginator.fetch_page(page - 1).await?;

        let items = rows
            .into_iter()
            .map(|(model, submitter)| head_from(model, submitter))
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(SubmissionPage {
            page,
            pages: totals.number_of_pages,
            total: totals.number_of_items,
            per_page,
            has_next: page < totals.number_of_pages,
            has_prev: page > 1,
            items,
        })
    }

    async fn count_since(&self, instant: Option<DateTime<Utc>>) -> anyhow::Result<u64> {
        let mut select = FileSubmissionEntity::find();
        if let Some(instant) = instant {
            select = select.filter(file_submission::Column::SubmittedAt.gte(instant));
        }
        Ok(select.count(self.connection()).await?)
    }

    async fn mime_type_counts_since(&self, months_back: u32) -> anyhow::Result<MimeMonthlyStats> {
        let cutoff = Utc::now()
            .checked_sub_months(Months::new(months_back))
            .ok_or_else(|| anyhow::anyhow!("mime stats window of {months_back} months underflows"))?;
        let rows: Vec<(DateTime<Utc>, Vec<String>)> = FileSubmissionEntity::find()
            .select_only()
            .column(file_submission::Column::SubmittedAt)
            .column(file_submission::Column::MimeTypes)
            .filter(file_submission::Column::SubmittedAt.gte(cutoff))
            .into_tuple()
            .all(self.connection())
            .await?;

        let mut stats = MimeMonthlyStats::new();
        for (submitted_at, mime_types) in rows {
            let bucket = stats.entry(submitted_at.format("%Y-%m").to_string()).or_default();
            for mime in mime_types {
                *bucket.entry(mime).or_default() += 1;
            }
        }
        Ok(stats)
    }
}

fn listing_query(query: &SubmissionQuery) -> SelectTwo<file_submission::Entity, user::Entity> {
    let mut select = FileSubmissionEntity::find().find_also_related(UserEntity);

    if let Some(user_id) = query.just_mine {
        select = select.filter(file_submission::Column::SubmittedByUserId.eq(user_id));
    }
    // Service accounts never show up, searched for or not.
    if !query.excluded_submitters.is_empty() {
        select = select.filter(user::Column::UserCn.is_not_in(query.excluded_submitters.clone()));
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search.to_lowercase());
        select = select.filter(
            Condition::any()
                .add(Expr::cust_with_values(
                    "LOWER(file_submission.file_name) LIKE ?",
                    [pattern.clone()],
                ))
                .add(Expr::cust_with_values(
                    "LOWER(file_submission.submitted_description) LIKE ?",
                    [pattern.clone()],
                ))
                .add(Expr::cust_with_values(
                    "LOWER(CAST(file_submission.yara_hits AS TEXT)) LIKE ?",
                    [pattern.clone()],
                ))
                .add(Expr::cust_with_values(
                    r#"LOWER("user".user_cn) LIKE ?"#,
                    [pattern],
                )),
        );
    }

    let order = match query.sort_order {
        SortOrder::Ascend => Order::Asc,
        SortOrder::Descend => Order::Desc,
    };
    match sort_target(&query.sort_field) {
        SortTarget::Column(column) => select.order_by(column, order),
        SortTarget::Cardinality(column) => {
            select.order_by(Expr::cust(format!("CARDINALITY({column})")), order)
        }
    }
}

fn head_from(
    model: file_submission::Model,
    submitter: Option<user::Model>,
) -> anyhow::Result<SubmissionHead> {
    Ok(SubmissionHead {
        file_id: model.file_id,
        file_name: model.file_name,
        file_size: model.file_size,
        kind: FromStr::from_str(&model.kind)?,
        mime_types: model.mime_types,
        yara_hits: model.yara_hits,
        scanners_run: model.scanners_run,
        files_seen: model.files_seen,
        insights: model.insights,
        iocs: model.iocs,
        highest_positives: model.highest_positives,
        submitted_by: submitter.map(|u| u.user_cn).unwrap_or_default(),
        submitted_description: model.submitted_description,
        submitted_at: model.submitted_at,
        object_key: model.object_key,
        object_expires_at: model.object_expires_at,
    })
}

#[cfg(test)]
mod tests {
    use sea_orm::{DbBackend, QueryTrait};

    use super::*;

    #[test]
    fn derived_counts_sort_by_cardinality() {
        assert!(matches!(sort_target("yara_hits"), SortTarget::Cardinality("yara_hits")));
        assert!(matches!(sort_target("insights"), SortTarget::Cardinality("insights")));
        assert!(matches!(sort_target("iocs"), SortTarget::Cardinality("iocs")));
    }

    #[test]
    fn excluded_submitters_apply_even_when_searching() {
        let query = SubmissionQuery {
            page: 1,
            per_page: 10,
            just_mine: None,
            search: Some("evil".to_owned()),
            sort_field: "submitted_at".to_owned(),
            sort_order: SortOrder::Descend,
            excluded_submitters: vec!["svc-scanner".to_owned()],
        };
        let sql = listing_query(&query).build(DbBackend::Postgres).to_string();
        assert!(sql.contains("NOT IN"));
        assert!(sql.contains("LIKE"));
    }

    #[test]
    fn unknown_sort_field_falls_back_to_submission_time() {
        assert!(matches!(
            sort_target("raw_response'); DROP TABLE file_submission;--"),
            SortTarget::Column(file_submission::Column::SubmittedAt)
        ));
        assert!(matches!(
            sort_target(""),
            SortTarget::Column(file_submission::Column::SubmittedAt)
        ));
    }
}
