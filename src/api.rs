//! Operational HTTP surface: health probe and book inspection.
//!
//! Deployment probes hit `/health`; operators inspect the ladder through
//! `/books` and `/books/{symbol}`. Order entry stays on the FIX gateway.

use crate::engine::Engine;
use crate::order_book::OrderBook;
use crate::types::scale2;
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::{Arc, Mutex};

/// Shared state: the same engine executor the FIX gateway drives.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Mutex<Engine>>,
}

pub fn create_router(state: AppState) -> Router<()> {
    Router::new()
        .route("/health", get(health))
        .route("/books", get(list_books))
        .route("/books/{symbol}", get(show_book))
        .layer(Extension(state))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[derive(serde::Serialize)]
struct LevelView {
    price: String,
    leaves_qty: String,
    orders: usize,
}

#[derive(serde::Serialize)]
struct BookView {
    symbol: String,
    bids: Vec<LevelView>,
    asks: Vec<LevelView>,
}

fn level_views(levels: &[crate::order_book::BookLevel]) -> Vec<LevelView> {
    levels
        .iter()
        .map(|l| LevelView {
            price: scale2(l.price()),
            leaves_qty: scale2(l.total_leaves_qty()),
            orders: l.order_count(),
        })
        .collect()
}

fn book_view(book: &OrderBook) -> BookView {
    BookView {
        symbol: book.symbol().to_string(),
        bids: level_views(book.bid_levels()),
        asks: level_views(book.ask_levels()),
    }
}

async fn list_books(Extension(state): Extension<AppState>) -> Response {
    let guard = state.engine.lock().expect("engine lock");
    let symbols: Vec<String> = guard.symbols().iter().map(|s| s.to_string()).collect();
    (StatusCode::OK, Json(serde_json::json!({ "symbols": symbols }))).into_response()
}

async fn show_book(
    Extension(state): Extension<AppState>,
    Path(symbol): Path<String>,
) -> Response {
    let guard = state.engine.lock().expect("engine lock");
    match guard.book(&symbol) {
        Some(book) => (StatusCode::OK, Json(book_view(book))).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("no book for {symbol}") })),
        )
            .into_response(),
    }
}
