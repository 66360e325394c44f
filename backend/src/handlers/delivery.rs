//! HTTP handlers for outgoing deliveries

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::services::delivery::{CreateDeliveryInput, PackInput, PickInput, UpdateDeliveryInput};
use crate::services::document::DocumentFilter;
use crate::services::DeliveryService;
use crate::AppState;
use shared::Delivery;

pub async fn create_delivery(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateDeliveryInput>,
) -> AppResult<(StatusCode, Json<Delivery>)> {
    let delivery = DeliveryService::new(state.db)
        .create(&current_user.0, input)
        .await?;
    Ok((StatusCode::CREATED, Json(delivery)))
}

pub async fn list_deliveries(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<DocumentFilter>,
) -> AppResult<Json<Vec<Delivery>>> {
    let deliveries = DeliveryService::new(state.db)
        .list(&current_user.0, filter)
        .await?;
    Ok(Json(deliveries))
}

pub async fn get_delivery(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(delivery_id): Path<Uuid>,
) -> AppResult<Json<Delivery>> {
    let delivery = DeliveryService::new(state.db)
        .get(&current_user.0, delivery_id)
        .await?;
    Ok(Json(delivery))
}

pub async fn update_delivery(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(delivery_id): Path<Uuid>,
    Json(input): Json<UpdateDeliveryInput>,
) -> AppResult<Json<Delivery>> {
    let delivery = DeliveryService::new(state.db)
        .update(&current_user.0, delivery_id, input)
        .await?;
    Ok(Json(delivery))
}

pub async fn confirm_delivery(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(delivery_id): Path<Uuid>,
) -> AppResult<Json<Delivery>> {
    let delivery = DeliveryService::new(state.db)
        .confirm(&current_user.0, delivery_id)
        .await?;
    Ok(Json(delivery))
}

/// Parse a pick or pack body. Only a blank body means "every line"; anything
/// else must be a JSON array of line requests.
fn line_requests<T: DeserializeOwned>(body: &[u8]) -> AppResult<Vec<T>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::validation("items", format!("Invalid line requests: {}", e)))
}

/// Record picked quantities; an empty body or `[]` picks every line in full
pub async fn pick_delivery(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(delivery_id): Path<Uuid>,
    body: Bytes,
) -> AppResult<Json<Delivery>> {
    let picks: Vec<PickInput> = line_requests(&body)?;
    let delivery = DeliveryService::new(state.db)
        .pick(&current_user.0, delivery_id, picks)
        .await?;
    Ok(Json(delivery))
}

/// Record packed quantities; an empty body or `[]` packs every line at its picked quantity
pub async fn pack_delivery(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(delivery_id): Path<Uuid>,
    body: Bytes,
) -> AppResult<Json<Delivery>> {
    let packs: Vec<PackInput> = line_requests(&body)?;
    let delivery = DeliveryService::new(state.db)
        .pack(&current_user.0, delivery_id, packs)
        .await?;
    Ok(Json(delivery))
}

pub async fn validate_delivery(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(delivery_id): Path<Uuid>,
) -> AppResult<Json<Delivery>> {
    let delivery = DeliveryService::new(state.db)
        .validate(&current_user.0, delivery_id)
        .await?;
    Ok(Json(delivery))
}

pub async fn cancel_delivery(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(delivery_id): Path<Uuid>,
) -> AppResult<Json<Delivery>> {
    let delivery = DeliveryService::new(state.db)
        .cancel(&current_user.0, delivery_id)
        .await?;
    Ok(Json(delivery))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_body_means_every_line() {
        assert!(line_requests::<PickInput>(b"").unwrap().is_empty());
        assert!(line_requests::<PickInput>(b"  \n").unwrap().is_empty());
        assert!(line_requests::<PackInput>(b"[]").unwrap().is_empty());
    }

    #[test]
    fn test_camel_case_lines_accepted() {
        let id = Uuid::new_v4();
        let body = format!(r#"[{{"itemId":"{}","pickedQuantity":1}}]"#, id);
        let picks = line_requests::<PickInput>(body.as_bytes()).unwrap();
        assert_eq!(picks.len(), 1);
        assert_eq!(picks[0].item_id, id);
        assert_eq!(picks[0].picked_quantity, Some(1));

        let body = format!(r#"[{{"item_id":"{}","packed_quantity":3}}]"#, id);
        let packs = line_requests::<PackInput>(body.as_bytes()).unwrap();
        assert_eq!(packs[0].packed_quantity, Some(3));
    }

    #[test]
    fn test_malformed_body_rejected() {
        let bodies: [&[u8]; 3] = [b"{not json", br#"{"item_id":"x"}"#, br#"[{"item_id":"x"}]"#];
        for body in bodies {
            let err = line_requests::<PickInput>(body).unwrap_err();
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
            assert!(matches!(err, AppError::Validation { ref field, .. } if field == "items"));
        }
    }
}
