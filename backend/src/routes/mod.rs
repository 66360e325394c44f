//! Route definitions for the stock ledger API

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes; everything except health, register and login needs a bearer token
pub fn api_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/auth/me", get(handlers::me))
        .nest("/users", user_routes())
        .nest("/products", product_routes())
        .nest("/warehouses", warehouse_routes())
        .nest("/receipts", receipt_routes())
        .nest("/deliveries", delivery_routes())
        .nest("/transfers", transfer_routes())
        .nest("/adjustments", adjustment_routes())
        .nest("/ledger", ledger_routes())
        .nest("/alerts", alert_routes())
        .route("/dashboard", get(handlers::get_dashboard))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        // Public
        .route("/health", get(handlers::health_check))
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .merge(protected)
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_users).post(handlers::create_user))
        .route("/:id", get(handlers::get_user).put(handlers::update_user))
}

fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_products).post(handlers::create_product))
        .route(
            "/:id",
            get(handlers::get_product)
                .put(handlers::update_product)
                .delete(handlers::archive_product),
        )
        .route("/:id/archive", post(handlers::archive_product))
        .route("/:id/stock", get(handlers::get_product_stock))
}

fn warehouse_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_warehouses).post(handlers::create_warehouse))
        .route(
            "/:id",
            get(handlers::get_warehouse).put(handlers::update_warehouse),
        )
        .route("/:id/deactivate", post(handlers::deactivate_warehouse))
        .route(
            "/:id/locations",
            get(handlers::list_locations).post(handlers::create_location),
        )
        .route("/:id/locations/:location_id", put(handlers::update_location))
        .route(
            "/:id/locations/:location_id/deactivate",
            post(handlers::deactivate_location),
        )
}

fn receipt_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_receipts).post(handlers::create_receipt))
        .route("/:id", get(handlers::get_receipt).put(handlers::update_receipt))
        .route("/:id/validate", post(handlers::validate_receipt))
        .route("/:id/cancel", post(handlers::cancel_receipt))
}

fn delivery_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_deliveries).post(handlers::create_delivery))
        .route("/:id", get(handlers::get_delivery).put(handlers::update_delivery))
        .route("/:id/confirm", post(handlers::confirm_delivery))
        .route("/:id/pick", post(handlers::pick_delivery))
        .route("/:id/pack", post(handlers::pack_delivery))
        .route("/:id/validate", post(handlers::validate_delivery))
        .route("/:id/cancel", post(handlers::cancel_delivery))
}

fn transfer_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_transfers).post(handlers::create_transfer))
        .route("/:id", get(handlers::get_transfer).put(handlers::update_transfer))
        .route("/:id/execute", post(handlers::execute_transfer))
        .route("/:id/cancel", post(handlers::cancel_transfer))
}

fn adjustment_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_adjustments).post(handlers::create_adjustment))
        .route(
            "/:id",
            get(handlers::get_adjustment).put(handlers::update_adjustment),
        )
        .route("/:id/validate", post(handlers::validate_adjustment))
        .route("/:id/cancel", post(handlers::cancel_adjustment))
}

fn ledger_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_ledger))
        .route("/product/:id", get(handlers::product_ledger))
        .route("/warehouse/:id", get(handlers::warehouse_ledger))
}

fn alert_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_alerts))
        .route("/generate", post(handlers::generate_alerts))
        .route("/:id/acknowledge", post(handlers::acknowledge_alert))
        .route("/:id/resolve", post(handlers::resolve_alert))
}
