//! Helpers shared by the four movement document services

use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use shared::{DocumentKind, DocumentStatus};

/// List filter for movement documents
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentFilter {
    pub status: Option<DocumentStatus>,
    pub warehouse_id: Option<Uuid>,
}

impl DocumentFilter {
    /// Warehouse to filter on after applying the caller's scope
    pub fn warehouse_for(&self, user: &AuthUser) -> AppResult<Option<Uuid>> {
        match (user.scoped_warehouse(), self.warehouse_id) {
            (Some(_), Some(requested)) => {
                user.ensure_warehouse(requested)?;
                Ok(Some(requested))
            }
            (Some(scoped), None) => Ok(Some(scoped)),
            (None, requested) => Ok(requested),
        }
    }

    pub fn status_str(&self) -> Option<&'static str> {
        self.status.as_ref().map(DocumentStatus::as_str)
    }
}

/// Parse a stored status, rejecting ones the kind never uses
pub fn parse_status(kind: DocumentKind, raw: &str) -> AppResult<DocumentStatus> {
    DocumentStatus::from_str(raw)
        .filter(|status| kind.statuses().contains(status))
        .ok_or_else(|| AppError::Internal(format!("{} has unknown status '{}'", kind, raw)))
}

/// Target of an explicit status change on update; terminal targets go
/// through validate and cancel instead
pub fn requested_status(
    kind: DocumentKind,
    current: DocumentStatus,
    requested: Option<DocumentStatus>,
) -> AppResult<DocumentStatus> {
    match requested {
        None => Ok(current),
        Some(to) if to == current => Ok(current),
        Some(to) if to.is_terminal() => Err(AppError::validation(
            "status",
            format!("Use the {} endpoint to move a {} to {}", terminal_action(kind, to), kind, to),
        )),
        Some(to) => Ok(kind.transition(current, to)?),
    }
}

fn terminal_action(kind: DocumentKind, to: DocumentStatus) -> &'static str {
    match (kind, to) {
        (_, DocumentStatus::Canceled) => "cancel",
        (DocumentKind::Transfer, _) => "execute",
        _ => "validate",
    }
}

/// Trim free text and drop it when empty
pub fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
