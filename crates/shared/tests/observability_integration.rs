//! 可观测性模块集成测试
//!
//! 测试指标记录、中间件和配置的核心功能。

// ============================================================================
// 指标记录测试
// ============================================================================

mod metrics_tests {
    use delivery_shared::observability::metrics::{
        CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL, DELIVERY_REQUEST_DURATION, record_cache_hit,
        record_cache_load, record_cache_miss, record_delivery_request, record_http_request,
    };
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn test_record_http_request() {
        record_http_request("GET", "/v1/delivery", 200, 0.05);
        record_http_request("GET", "/v1/campaigns", 200, 0.01);
        record_http_request("POST", "/v1/delivery", 405, 0.001);
        record_http_request("GET", "/v1/delivery", 400, 0.002);
        record_http_request("GET", "/health", 503, 0.001);
    }

    #[test]
    fn test_delivery_metrics_are_rendered() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            record_cache_hit();
            record_cache_hit();
            record_cache_miss();
            record_delivery_request("base", "hit", 0.001);
        });

        let rendered = handle.render();
        assert!(rendered.contains(&format!("{CACHE_HITS_TOTAL} 2")));
        assert!(rendered.contains(&format!("{CACHE_MISSES_TOTAL} 1")));
        assert!(rendered.contains(DELIVERY_REQUEST_DURATION));
    }

    #[test]
    fn test_cache_counters_stay_single_series() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        // 请求路径上无论收到多少种国家取值，命中/未命中计数都只有一条序列
        metrics::with_local_recorder(&recorder, || {
            for _ in 0..1000 {
                record_cache_hit();
                record_cache_miss();
            }
        });

        let rendered = handle.render();
        let series = |name: &str| {
            rendered
                .lines()
                .filter(|line| !line.starts_with('#') && line.starts_with(name))
                .count()
        };
        assert_eq!(series(CACHE_HITS_TOTAL), 1);
        assert_eq!(series(CACHE_MISSES_TOTAL), 1);
        assert!(rendered.contains(&format!("{CACHE_HITS_TOTAL} 1000")));
        assert!(!rendered.contains("country="));
    }

    #[test]
    fn test_cache_load_metrics() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            record_cache_load("startup", "success");
            record_cache_load("refresh", "failed");
        });

        let rendered = handle.render();
        assert!(rendered.contains(r#"trigger="refresh""#));
        assert!(rendered.contains(r#"status="failed""#));
    }

    #[test]
    fn test_metrics_with_edge_cases() {
        // 空字符串
        record_http_request("", "", 0, 0.0);
        record_cache_hit();

        // 超长路径
        let long_path = "/v1/".to_string() + &"x".repeat(1000);
        record_http_request("GET", &long_path, 200, 0.01);

        // 极端持续时间
        record_delivery_request("dimensions", "miss", 999.99);
        record_delivery_request("dimensions", "error", 0.000001);
    }
}

// ============================================================================
// 中间件测试
// ============================================================================

mod middleware_tests {
    use axum::{
        Extension, Router,
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::get,
    };
    use delivery_shared::observability::middleware::{
        REQUEST_ID_HEADER, RequestId, http_tracing, request_id,
    };
    use tower::ServiceExt;

    #[test]
    fn test_request_id_creation() {
        let id = RequestId("test-id-123".to_string());
        assert_eq!(id.as_str(), "test-id-123");
    }

    #[test]
    fn test_request_id_debug() {
        let id = RequestId("debug-test".to_string());
        let debug_str = format!("{:?}", id);
        assert!(debug_str.contains("debug-test"));
    }

    #[tokio::test]
    async fn test_request_id_visible_to_handler() {
        let app = Router::new()
            .route(
                "/echo",
                get(|Extension(id): Extension<RequestId>| async move { id.0 }),
            )
            .layer(middleware::from_fn(http_tracing))
            .layer(middleware::from_fn(request_id));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/echo")
                    .header(REQUEST_ID_HEADER, "abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"abc");
    }

    #[tokio::test]
    async fn test_tracing_preserves_status() {
        let app = Router::new()
            .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
            .layer(middleware::from_fn(http_tracing));

        let response = app
            .oneshot(Request::builder().uri("/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

// ============================================================================
// 配置测试
// ============================================================================

mod config_tests {
    use delivery_shared::config::{AppConfig, StoreBackend};
    use delivery_shared::observability::ObservabilityConfig;

    #[test]
    fn test_default_observability_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.service_name, "unknown-service");
        assert_eq!(config.metrics_port, 9090);
        assert_eq!(config.log_level, "info");
        assert!(!config.json_logs);
    }

    #[test]
    fn test_custom_config() {
        let config = ObservabilityConfig {
            service_name: "campaign-delivery".to_string(),
            metrics_port: 9091,
            metrics_enabled: false,
            log_level: "debug".to_string(),
            json_logs: true,
        };

        assert_eq!(config.metrics_port, 9091);
        assert!(!config.metrics_enabled);
        assert!(config.json_logs);
    }

    #[test]
    fn test_load_from_config_dir() {
        let dir = std::env::temp_dir().join(format!("delivery-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("default.toml"),
            r#"
[server]
port = 9100

[store]
backend = "memory"
seed_path = "fixtures/campaigns.json"

[delivery]
countries = ["us", "japan"]
query_timeout_ms = 500
"#,
        )
        .unwrap();

        // SAFETY: 集成测试二进制内只有本用例读写 CONFIG_DIR
        unsafe {
            std::env::set_var("CONFIG_DIR", &dir);
        }
        let config = AppConfig::load("config-load-test").unwrap();
        unsafe {
            std::env::remove_var("CONFIG_DIR");
        }
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(config.service_name, "config-load-test");
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.delivery.countries, vec!["us", "japan"]);
        assert_eq!(config.delivery.query_timeout_ms, 500);
        // 未覆盖的字段保留默认值
        assert_eq!(config.delivery.os, vec!["android", "ios"]);
        assert_eq!(config.delivery.campaigns_collection, "campaigns_details");
    }
}

// ============================================================================
// Guard 测试
// ============================================================================

mod guard_tests {
    use delivery_shared::observability::ObservabilityGuard;

    #[test]
    fn test_empty_guard() {
        let guard = ObservabilityGuard::empty();
        drop(guard);
    }
}
