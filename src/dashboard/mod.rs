//! Dashboard: Axum web server for live opportunity monitoring.
//!
//! Serves a REST API over the opportunity store and a WebSocket feed of
//! refresh updates. CORS enabled for local development.

pub mod routes;
pub mod ws;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

pub use routes::{AppState, DashboardInfo, DashboardState};

/// Bind the dashboard port and serve in a background task.
///
/// Binding happens before returning so a port clash is reported to the
/// caller instead of dying inside the spawned task.
pub async fn spawn_dashboard(state: AppState, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind dashboard port {port}"))?;
    info!(port, "Dashboard server starting on http://localhost:{port}");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Dashboard server error");
        }
    });

    Ok(())
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/status", get(routes::get_status))
        .route("/api/opportunities", get(routes::get_opportunities))
        .route("/api/opportunities/top", get(routes::get_top_opportunities))
        .route("/api/history", get(routes::get_history))
        .route("/api/exchanges", get(routes::get_exchanges))
        .route("/api/pairs", get(routes::get_pairs))
        .route("/api/stats", get(routes::get_stats))
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchanges::ExchangeRegistry;
    use crate::storage::OpportunityStore;
    use crate::types::tests::sample_record;
    use crate::types::{ExchangeProfile, TradingPair, VenueKind};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use tokio::sync::broadcast;
    use tower::ServiceExt;

    fn test_state() -> (AppState, Arc<OpportunityStore>) {
        let registry = ExchangeRegistry::from_profiles(vec![
            ExchangeProfile {
                id: "binance".into(),
                name: "Binance".into(),
                venue: VenueKind::Custodial,
                fee_pct: dec!(0.1),
                network_fee: None,
                price_bias_pct: Decimal::ZERO,
            },
            ExchangeProfile {
                id: "uniswap".into(),
                name: "Uniswap".into(),
                venue: VenueKind::OnChain,
                fee_pct: dec!(0.3),
                network_fee: Some(dec!(15)),
                price_bias_pct: Decimal::ZERO,
            },
        ])
        .unwrap();
        let pairs = vec![TradingPair {
            symbol: "BTC/USDT".into(),
            base_asset: "BTC".into(),
            quote_asset: "USDT".into(),
            name: "Bitcoin".into(),
            coingecko_id: "bitcoin".into(),
        }];
        let store = Arc::new(OpportunityStore::new(50));
        let (tx, _) = broadcast::channel(4);
        let info = DashboardInfo {
            name: "ARBSCOPE-TEST".into(),
            capital_base: dec!(100),
            refresh_interval_secs: 30,
            broadcast_top_n: 20,
        };
        let state = Arc::new(DashboardState::new(store.clone(), Arc::new(registry), pairs, tx, info));
        (state, store)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null))
    }

    async fn seed(store: &OpportunityStore) {
        let mut dex = sample_record("ETH/USDT", "uniswap", "binance", dec!(0.8));
        dex.buy_venue = VenueKind::OnChain;
        store
            .replace_all(vec![
                sample_record("BTC/USDT", "binance", "kraken", dec!(1.5)),
                dex,
                sample_record("BTC/USDT", "kraken", "binance", dec!(-2)),
            ])
            .await;
        store.append_to_history(sample_record("BTC/USDT", "binance", "kraken", dec!(1.5))).await;
        store.record_cycle().await;
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (state, _) = test_state();
        let resp = build_router(state)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_status_endpoint() {
        let (state, store) = test_state();
        seed(&store).await;
        let (status, json) = get_json(build_router(state), "/api/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["name"], "ARBSCOPE-TEST");
        assert_eq!(json["cycles"], 1);
        assert_eq!(json["opportunity_count"], 3);
        assert_eq!(json["profitable_count"], 2);
        assert_eq!(json["exchanges"], 2);
        assert_eq!(json["capital_base"].as_f64().unwrap(), 100.0);
    }

    #[tokio::test]
    async fn test_opportunities_empty_is_array() {
        let (state, _) = test_state();
        let (status, json) = get_json(build_router(state), "/api/opportunities").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_opportunities_filtered() {
        let (state, store) = test_state();
        seed(&store).await;
        let app = build_router(state);

        let (_, all) = get_json(app.clone(), "/api/opportunities").await;
        assert_eq!(all.as_array().unwrap().len(), 3);

        let (_, profitable) = get_json(app.clone(), "/api/opportunities?min_profit_pct=0").await;
        assert_eq!(profitable.as_array().unwrap().len(), 2);

        let (_, dex) = get_json(app.clone(), "/api/opportunities?venue=on_chain").await;
        let dex = dex.as_array().unwrap();
        assert_eq!(dex.len(), 1);
        assert_eq!(dex[0]["buy_exchange"], "uniswap");

        let (_, kraken) = get_json(app.clone(), "/api/opportunities?exchanges=kraken&limit=1").await;
        let kraken = kraken.as_array().unwrap();
        assert_eq!(kraken.len(), 1);
        assert_eq!(kraken[0]["net_profit_pct"].as_f64().unwrap(), 1.5);

        let (_, eth) = get_json(app, "/api/opportunities?pairs=ETH/USDT").await;
        assert_eq!(eth.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_opportunities_bad_venue_is_400() {
        let (state, _) = test_state();
        let (status, json) = get_json(build_router(state), "/api/opportunities?venue=hybrid").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("hybrid"));
    }

    #[tokio::test]
    async fn test_top_endpoint_limit() {
        let (state, store) = test_state();
        seed(&store).await;
        let app = build_router(state);

        let (_, top) = get_json(app.clone(), "/api/opportunities/top?limit=2").await;
        assert_eq!(top.as_array().unwrap().len(), 2);

        let (_, default) = get_json(app, "/api/opportunities/top").await;
        assert_eq!(default.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_history_and_stats_endpoints() {
        let (state, store) = test_state();
        seed(&store).await;
        let app = build_router(state);

        let (status, history) = get_json(app.clone(), "/api/history").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history.as_array().unwrap().len(), 1);

        let (status, stats) = get_json(app, "/api/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["latest_count"], 3);
        assert_eq!(stats["by_pair"]["BTC/USDT"], 2);
        assert_eq!(stats["best"]["pair"], "BTC/USDT");
    }

    #[tokio::test]
    async fn test_exchanges_and_pairs_endpoints() {
        let (state, _) = test_state();
        let app = build_router(state);

        let (_, exchanges) = get_json(app.clone(), "/api/exchanges").await;
        let exchanges = exchanges.as_array().unwrap();
        assert_eq!(exchanges.len(), 2);
        assert_eq!(exchanges[1]["venue"], "on_chain");
        assert_eq!(exchanges[1]["network_fee"].as_f64().unwrap(), 15.0);

        let (_, pairs) = get_json(app, "/api/pairs").await;
        assert_eq!(pairs[0]["symbol"], "BTC/USDT");
    }

    #[tokio::test]
    async fn test_unknown_route_404() {
        let (state, _) = test_state();
        let resp = build_router(state)
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_ws_requires_upgrade() {
        let (state, _) = test_state();
        let resp = build_router(state)
            .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(resp.status().is_client_error());
    }

    #[tokio::test]
    async fn test_spawn_dashboard_binds() {
        let (state, _) = test_state();
        // Port 0 lets the OS pick a free port.
        assert!(spawn_dashboard(state, 0).await.is_ok());
    }
}
