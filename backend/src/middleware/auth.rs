//! Authentication middleware
//!
//! Bearer-token authentication and the role and warehouse checks handlers
//! run before touching data.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::auth::decode_claims;
use crate::AppState;
use shared::UserRole;

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: UserRole,
    pub warehouse_id: Option<Uuid>,
}

impl AuthUser {
    pub fn require_user_admin(&self) -> AppResult<()> {
        if self.role.can_manage_users() {
            Ok(())
        } else {
            Err(AppError::InsufficientPermissions)
        }
    }

    /// Products, warehouses and locations
    pub fn require_catalog_manager(&self) -> AppResult<()> {
        if self.role.can_manage_catalog() {
            Ok(())
        } else {
            Err(AppError::InsufficientPermissions)
        }
    }

    pub fn require_alert_manager(&self) -> AppResult<()> {
        if self.role.can_manage_alerts() {
            Ok(())
        } else {
            Err(AppError::InsufficientPermissions)
        }
    }

    pub fn ensure_warehouse(&self, warehouse_id: Uuid) -> AppResult<()> {
        if self.role.permits_warehouse(self.warehouse_id, warehouse_id) {
            Ok(())
        } else {
            Err(AppError::WarehouseScope(format!(
                "You are not assigned to warehouse {}",
                warehouse_id
            )))
        }
    }

    /// Every warehouse must be permitted, e.g. both ends of a transfer
    pub fn ensure_warehouses(&self, warehouse_ids: &[Uuid]) -> AppResult<()> {
        if self.role.permits_all(self.warehouse_id, warehouse_ids) {
            Ok(())
        } else {
            Err(AppError::WarehouseScope(
                "Transfers by warehouse staff must stay within their warehouse".to_string(),
            ))
        }
    }

    /// Warehouse listings are restricted to this id, if any
    pub fn scoped_warehouse(&self) -> Option<Uuid> {
        match self.role {
            UserRole::Warehouse => self.warehouse_id,
            UserRole::Admin | UserRole::Manager => None,
        }
    }
}

/// Authentication middleware that validates bearer tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or_else(|| {
        AppError::Unauthorized("Missing or invalid Authorization header".to_string())
    })?;

    let claims = decode_claims(bearer.token(), &state.config.jwt.secret)?;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;

    if claims.role == UserRole::Warehouse && claims.warehouse_id.is_none() {
        return Err(AppError::Unauthorized(
            "Warehouse account has no assigned warehouse".to_string(),
        ));
    }

    request.extensions_mut().insert(AuthUser {
        user_id,
        role: claims.role,
        warehouse_id: claims.warehouse_id,
    });

    Ok(next.run(request).await)
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole, warehouse_id: Option<Uuid>) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            role,
            warehouse_id,
        }
    }

    #[test]
    fn test_warehouse_staff_scope() {
        let own = Uuid::new_v4();
        let staff = user(UserRole::Warehouse, Some(own));
        assert!(staff.ensure_warehouse(own).is_ok());
        assert!(matches!(
            staff.ensure_warehouse(Uuid::new_v4()),
            Err(AppError::WarehouseScope(_))
        ));
        assert_eq!(staff.scoped_warehouse(), Some(own));
    }

    #[test]
    fn test_manager_unscoped() {
        let manager = user(UserRole::Manager, None);
        assert!(manager
            .ensure_warehouses(&[Uuid::new_v4(), Uuid::new_v4()])
            .is_ok());
        assert_eq!(manager.scoped_warehouse(), None);
        assert!(manager.require_catalog_manager().is_ok());
        assert!(matches!(
            manager.require_user_admin(),
            Err(AppError::InsufficientPermissions)
        ));
    }

    #[test]
    fn test_staff_cannot_manage_alerts() {
        let staff = user(UserRole::Warehouse, Some(Uuid::new_v4()));
        assert!(staff.require_alert_manager().is_err());
        assert!(staff.require_catalog_manager().is_err());
    }
}
