//! Generic CRUD over the reference resources: normalize, validate, check uniqueness and references, persist.

use super::validation::RequestValidator;
use crate::error::AppError;
use crate::model::{from_row, to_row, ListQuery, Resource, Row};
use crate::store::Store;

pub struct ResourceService;

impl ResourceService {
    pub async fn list<R: Resource>(store: &dyn Store, query: &ListQuery) -> Result<Vec<R>, AppError> {
        let rows = store.list(R::entity(), query).await?;
        rows.into_iter().map(from_row).collect()
    }

    pub async fn get<R: Resource>(store: &dyn Store, id: i64) -> Result<R, AppError> {
        let row = store.get(R::entity(), id).await?.ok_or_else(|| not_found::<R>(id))?;
        from_row(row)
    }

    pub async fn create<R: Resource>(store: &dyn Store, input: R) -> Result<R, AppError> {
        let row = Self::prepare(store, input, None).await?;
        let created = store.insert(R::entity(), row).await?;
        tracing::info!(entity = R::entity().label, id = ?crate::model::row_id(&created), "created");
        from_row(created)
    }

    /// Replace every writable field of row `id`.
    pub async fn update<R: Resource>(store: &dyn Store, id: i64, input: R) -> Result<R, AppError> {
        if store.get(R::entity(), id).await?.is_none() {
            return Err(not_found::<R>(id));
        }
        let row = Self::prepare(store, input, Some(id)).await?;
        let updated = store
            .update(R::entity(), id, row)
            .await?
            .ok_or_else(|| not_found::<R>(id))?;
        tracing::info!(entity = R::entity().label, id, "updated");
        from_row(updated)
    }

    pub async fn delete<R: Resource>(store: &dyn Store, id: i64) -> Result<(), AppError> {
        if !store.delete(R::entity(), id).await? {
            return Err(not_found::<R>(id));
        }
        tracing::info!(entity = R::entity().label, id, "deleted");
        Ok(())
    }

    /// Normalized, validated row ready to write. `existing_id` is skipped by the duplicate probe.
    async fn prepare<R: Resource>(store: &dyn Store, mut input: R, existing_id: Option<i64>) -> Result<Row, AppError> {
        let entity = R::entity();
        input.normalize();
        let row = to_row(entity, &input)?;
        let mut errors = RequestValidator::validate(entity, &row);
        input.check(&mut errors);
        errors.into_result()?;
        input.check_references(store).await?;

        if let Some(unique) = entity.unique {
            if let Some(value) = row.get(unique.column).and_then(|v| v.as_str()) {
                if store.find_by_ci(entity, unique.column, value, existing_id).await?.is_some() {
                    return Err(AppError::Duplicate {
                        field: unique.field.to_string(),
                        message: format!("{} with {} '{}' already exists.", entity.label, unique.label, value),
                    });
                }
            }
        }
        Ok(row)
    }
}

fn not_found<R: Resource>(id: i64) -> AppError {
    AppError::NotFound(format!("{} with id {}", R::entity().label, id))
}
