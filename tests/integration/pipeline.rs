//! End-to-end refresh pipeline: source → engine → store → broadcast → API.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower::ServiceExt;

use arbscope::config::AppConfig;
use arbscope::dashboard::{build_router, DashboardInfo, DashboardState};
use arbscope::engine::slippage;
use arbscope::engine::{CostModel, OpportunityEngine, RefreshSettings, Refresher};
use arbscope::exchanges::ExchangeRegistry;
use arbscope::prices::coingecko::{synthesize_samples, SimplePriceResponse};
use arbscope::storage::{self, OpportunityStore};
use arbscope::types::{DashboardEvent, VenueKind};

use crate::mock_source::{snapshot, MockSource};

struct Harness {
    cfg: AppConfig,
    registry: Arc<ExchangeRegistry>,
    store: Arc<OpportunityStore>,
    events: broadcast::Sender<DashboardEvent>,
    refresher: Refresher,
}

fn harness(source: MockSource) -> Harness {
    let cfg = AppConfig::load("config.toml").unwrap();
    let registry = Arc::new(ExchangeRegistry::from_config(&cfg.exchanges).unwrap());
    let engine = Arc::new(OpportunityEngine::new(
        registry.clone(),
        CostModel::from_config(&cfg.costs).unwrap(),
        slippage::from_config(&cfg.costs).unwrap(),
    ));
    let store = Arc::new(OpportunityStore::new(cfg.storage.history_limit));
    let (events, _) = broadcast::channel(16);
    let settings = RefreshSettings::from_config(&cfg.refresh).unwrap();
    let refresher = Refresher::new(Arc::new(source), engine, store.clone(), events.clone(), settings);

    Harness {
        cfg,
        registry,
        store,
        events,
        refresher,
    }
}

fn btc_snapshot() -> arbscope::types::SamplesByPair {
    snapshot(&[
        (
            "BTC/USDT",
            vec![
                ("binance", dec!(50000)),
                ("coinbase", dec!(50600)),
                ("uniswap", dec!(50300)),
            ],
        ),
        ("ETH/USDT", vec![("kraken", dec!(3000)), ("bybit", dec!(3150))]),
    ])
}

#[tokio::test]
async fn test_cycle_produces_ranked_opportunities() {
    let h = harness(MockSource::new(vec![btc_snapshot()]));
    let mut rx = h.events.subscribe();

    let summary = h.refresher.run_cycle().await.unwrap();
    assert_eq!(summary.pairs, 2);
    assert_eq!(summary.samples, 5);
    // BTC: three ascending prices → 3 combinations; ETH: 1.
    assert_eq!(summary.records, 4);

    let latest = h.store.latest().await;
    assert!(latest.windows(2).all(|w| w[0].net_profit_pct >= w[1].net_profit_pct));

    // ETH kraken→bybit, 5% spread on $100: 5 − 0.36 − 2 − 0.2
    let best = &latest[0];
    assert_eq!(best.pair, "ETH/USDT");
    assert_eq!(best.net_profit, dec!(2.44));

    // BTC binance→uniswap: custodial→on-chain pays only uniswap's $15.
    let dex = latest
        .iter()
        .find(|r| r.buy_exchange == "binance" && r.sell_exchange == "uniswap")
        .unwrap();
    assert_eq!(dex.sell_venue, VenueKind::OnChain);
    assert_eq!(dex.network_fee_cost, dec!(15));
    assert_eq!(dex.trading_fee_cost, dec!(0.4));

    match rx.try_recv().unwrap() {
        DashboardEvent::OpportunitiesUpdate { count, profitable_count, .. } => {
            assert_eq!(count, 4);
            assert_eq!(profitable_count, 1);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn test_failed_fetch_keeps_previous_snapshot() {
    let source = MockSource::new(vec![btc_snapshot()]);
    let h = harness(source.clone());

    h.refresher.run_cycle().await.unwrap();
    let before = h.store.latest().await;

    source.set_error("CoinGecko unavailable");
    assert!(h.refresher.run_cycle().await.is_err());
    assert_eq!(h.store.latest().await, before);
    assert_eq!(h.store.cycles().await, 1);

    h.refresher.run_cycle().await.unwrap();
    assert_eq!(h.store.cycles().await, 2);
    assert_eq!(source.calls(), 3);
}

#[tokio::test]
async fn test_dashboard_serves_cycle_results() {
    let h = harness(MockSource::new(vec![btc_snapshot()]));
    h.refresher.run_cycle().await.unwrap();

    let info = DashboardInfo {
        name: h.cfg.app.name.clone(),
        capital_base: h.refresher.settings().capital_base,
        refresh_interval_secs: h.cfg.refresh.interval_secs,
        broadcast_top_n: h.refresher.settings().broadcast_top_n,
    };
    let state = Arc::new(DashboardState::new(
        h.store.clone(),
        h.registry.clone(),
        h.cfg.pairs.clone(),
        h.events.clone(),
        info,
    ));
    let app = build_router(state);

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/opportunities?min_profit_pct=0&venue=custodial")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap();
    let records: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["pair"], "ETH/USDT");
    assert_eq!(records[0]["execution_steps"].as_array().unwrap().len(), 4);

    let resp = app
        .oneshot(Request::builder().uri("/api/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = axum::body::to_bytes(resp.into_body(), 100_000).await.unwrap();
    let status: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(status["cycles"], 1);
    assert_eq!(status["exchanges"], 7);
    assert_eq!(status["pairs"], 10);
}

#[tokio::test]
async fn test_history_survives_restart() {
    let h = harness(MockSource::new(vec![btc_snapshot()]));
    h.refresher.run_cycle().await.unwrap();
    let history = h.store.history(100).await;
    assert_eq!(history.len(), 1);

    let mut path = std::env::temp_dir();
    path.push(format!("arbscope_it_history_{}.json", uuid::Uuid::new_v4()));
    let path = path.to_string_lossy().to_string();

    storage::save_history(&history, &path).unwrap();
    let restored = OpportunityStore::new(10);
    restored
        .restore_history(storage::load_history(&path).unwrap().unwrap())
        .await;
    assert_eq!(restored.history(100).await, history);

    storage::delete_history(&path).unwrap();
}

#[tokio::test]
async fn test_synthesized_quotes_flow_through_engine() {
    let cfg = AppConfig::load("config.toml").unwrap();
    let registry = ExchangeRegistry::from_config(&cfg.exchanges).unwrap();
    let quotes: SimplePriceResponse =
        serde_json::from_str(r#"{"bitcoin": {"usd": 65000.0, "usd_24h_vol": 3.5e10}}"#).unwrap();

    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let samples = synthesize_samples(&quotes, &cfg.pairs, &registry, 0.0, &mut rng, 0);
    assert_eq!(samples.len(), 1);
    assert_eq!(samples["BTC/USDT"].len(), 7);

    let engine = OpportunityEngine::with_defaults(Arc::new(registry));
    let records = engine.compute_opportunities_at(&samples, dec!(100), 0).unwrap();
    // Seven distinct biased quotes: one record per unordered pair, cheaper venue first.
    assert_eq!(records.len(), 21);
    assert!(records.iter().all(|r| r.spread_pct > Decimal::ZERO));
    assert!(records.iter().all(|r| r.net_profit == r.gross_profit - r.total_costs()));
}
