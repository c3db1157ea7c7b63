use super::AppContext;
use crate::database::{Actor, MetaDiff, MetaKind, MetaValue};
use crate::error::AppError;

pub fn list_meta_values(ctx: &AppContext, kind: MetaKind) -> Result<Vec<MetaValue>, AppError> {
    ctx.db.get_meta_values(kind).map_err(AppError::from)
}

pub fn add_meta_value(ctx: &AppContext, kind: MetaKind, name: &str) -> Result<i64, AppError> {
    log::info!("add_meta_value {} '{}'", kind, name);
    ctx.db.add_meta_value(kind, name).map_err(AppError::from)
}

/// Remove a value and everything that references it.
pub fn remove_meta_value(ctx: &AppContext, kind: MetaKind, name: &str) -> Result<(), AppError> {
    if ctx.db.remove_meta_value(kind, name)? {
        Ok(())
    } else {
        Err(AppError::NotFound(format!("{} '{}'", kind, name)))
    }
}

/// Make the value table of `kind` hold exactly `names`.
pub fn sync_meta_values(ctx: &AppContext, kind: MetaKind, names: &[String]) -> Result<MetaDiff, AppError> {
    let diff = ctx.db.sync_meta_values(kind, names)?;
    log::info!("sync_meta_values {}: -{:?} +{:?}", kind, diff.to_remove, diff.to_add);
    Ok(diff)
}

pub fn list_actors(ctx: &AppContext) -> Result<Vec<Actor>, AppError> {
    ctx.db.get_actors().map_err(AppError::from)
}
