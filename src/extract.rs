use std::{ops::Deref, sync::Arc};

use axum::{extract::FromRequestParts, http::request::Parts};
use sea_orm::DatabaseTransaction;

use crate::{AppState, error::AppError};

/// `axum::extract::Query` that rejects with a 422 JSON body.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct Query<T>(pub T);

/// `axum::extract::Path` that rejects with a 422 JSON body.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct Path<T>(pub T);

/// Database session scoped to one request.
///
/// Opened when the handler's arguments are extracted and rolled back when the
/// handler returns, whichever way it returns.
pub struct DbSession(DatabaseTransaction);

impl FromRequestParts<Arc<AppState>> for DbSession {
    type Rejection = AppError;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(state.db.session().await?))
    }
}

impl Deref for DbSession {
    type Target = DatabaseTransaction;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
