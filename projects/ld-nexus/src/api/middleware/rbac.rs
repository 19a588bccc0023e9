use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::sync::Arc;

use super::auth::AuthUser;
use crate::api::AppState;
use crate::auth::jwt::Claims;
use crate::auth::rbac::{has_permission, Permission};
use crate::error::{AppError, AppResult};

/// Axum extractor that requires the caller's role to grant `ManageUsers`.
/// Returns 403 Forbidden if the authenticated user has an insufficient role.
pub struct AdminUser(pub Claims);

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        if has_permission(&claims.role, &Permission::ManageUsers) {
            Ok(AdminUser(claims))
        } else {
            Err(AppError::Forbidden("Admin role required".to_string()))
        }
    }
}

/// 403 unless the caller's role grants `permission`.
pub fn require(auth: &AuthUser, permission: Permission) -> AppResult<()> {
    if has_permission(auth.role(), &permission) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Role '{}' is not allowed to {:?}",
            auth.role(),
            permission
        )))
    }
}

/// 403 unless the caller owns the record or may moderate content.
pub fn require_owner(auth: &AuthUser, owner_id: &str) -> AppResult<()> {
    if auth.id() == owner_id || has_permission(auth.role(), &Permission::ModerateContent) {
        Ok(())
    } else {
        Err(AppError::Forbidden("Only the owner or an admin may do this".to_string()))
    }
}
