#[cfg(test)]
mod voice_routes_tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use diesel::r2d2::{ConnectionManager, Pool};
    use diesel::PgConnection;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;
    use uuid::Uuid;
    use wecallsmart::core::config::AppConfig;
    use wecallsmart::core::shared::state::AppState;
    use wecallsmart::email::Notifier;
    use wecallsmart::main_module::create_router;
    use wecallsmart::voice::{
        sign_context, BusinessContext, BUSINESS_CONTEXT_HEADER, BUSINESS_CONTEXT_SIGNATURE_HEADER,
        VAPI_SECRET_HEADER,
    };

    // The pool points at a closed port; anything that needs a connection fails fast.
    fn state(extra: &[(&str, &str)]) -> Arc<AppState> {
        let mut vars: HashMap<String, String> = HashMap::from([
            (
                "DATABASE_URL".to_string(),
                "postgres://nobody@127.0.0.1:1/none".to_string(),
            ),
            ("ADMIN_API_TOKEN".to_string(), "admin-token".to_string()),
        ]);
        for (k, v) in extra {
            vars.insert(k.to_string(), v.to_string());
        }
        let config = AppConfig::from_lookup(|key| vars.get(key).cloned()).unwrap();
        let pool = Pool::builder()
            .max_size(1)
            .connection_timeout(Duration::from_millis(200))
            .build_unchecked(ConnectionManager::<PgConnection>::new(config.database.url.clone()));

        Arc::new(AppState {
            conn: pool,
            config: Arc::new(config),
            voice_platform: None,
            notifier: Arc::new(Notifier::disabled()),
        })
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str) -> axum::http::request::Builder {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let app = create_router(state(&[("ADMIN_API_TOKEN", "admin")]));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_dashboard_requires_admin_token() {
        let app = create_router(state(&[("ADMIN_API_TOKEN", "admin")]));
        let uri = format!("/api/businesses/{}/bookings", Uuid::new_v4());

        let response = app
            .clone()
            .oneshot(Request::builder().uri(&uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(
                Request::builder()
                    .uri(&uri)
                    .header(header::AUTHORIZATION, "Bearer wrong")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_webhook_rejects_bad_secret() {
        let app = create_router(state(&[("VAPI_WEBHOOK_SECRET", "hook-secret")]));
        let payload = json!({ "message": { "type": "status-update", "status": "in-progress" } });

        let response = app
            .clone()
            .oneshot(
                post_json("/api/vapi/webhook")
                    .header(VAPI_SECRET_HEADER, "nope")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(
                post_json("/api/vapi/webhook")
                    .header(VAPI_SECRET_HEADER, "hook-secret")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({}));
    }

    #[tokio::test]
    async fn test_webhook_acknowledges_unhandled_types() {
        let app = create_router(state(&[]));
        let payload = json!({ "message": { "type": "speech-update", "status": "started" } });
        let response = app
            .oneshot(
                post_json("/api/vapi/webhook")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({}));
    }

    #[tokio::test]
    async fn test_booker_requires_business_context() {
        let app = create_router(state(&[]));
        let response = app
            .oneshot(
                post_json("/api/booker/check-availability")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("X-Business-Context"));
    }

    #[tokio::test]
    async fn test_booker_unknown_tool_is_not_found() {
        let app = create_router(state(&[]));
        let ctx = BusinessContext::new(Uuid::new_v4()).encode().unwrap();
        let response = app
            .oneshot(
                post_json("/api/booker/order-pizza")
                    .header(BUSINESS_CONTEXT_HEADER, ctx)
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_booker_checks_context_signature() {
        let app = create_router(state(&[("CONTEXT_SIGNING_SECRET", "sign-me")]));
        let ctx = BusinessContext::new(Uuid::new_v4()).encode().unwrap();

        let unsigned = app
            .clone()
            .oneshot(
                post_json("/api/booker/order-pizza")
                    .header(BUSINESS_CONTEXT_HEADER, ctx.clone())
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(unsigned.status(), StatusCode::UNAUTHORIZED);

        let signature = sign_context("sign-me", &ctx).unwrap();
        let signed = app
            .oneshot(
                post_json("/api/booker/order-pizza")
                    .header(BUSINESS_CONTEXT_HEADER, ctx)
                    .header(BUSINESS_CONTEXT_SIGNATURE_HEADER, signature)
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        // Past authentication, the unknown tool is what fails.
        assert_eq!(signed.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_open_dashboard_needs_explicit_opt_out() {
        let vars = HashMap::from([("DATABASE_URL", "postgres://nobody@127.0.0.1:1/none")]);
        assert!(AppConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).is_err());

        let app = create_router(state(&[("ADMIN_API_TOKEN", ""), ("ALLOW_OPEN_DASHBOARD", "true")]));
        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/businesses/{}/bookings", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        // Past the guard; the unreachable database is what fails.
        assert_ne!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_webhook_tool_calls_answer_every_call() {
        let app = create_router(state(&[]));
        let payload = json!({
            "message": {
                "type": "tool-calls",
                "toolCallList": [
                    { "id": "call_1", "function": { "name": "get_business_info", "arguments": {} } },
                    { "id": "call_2", "function": { "name": "list_business_services", "arguments": "{}" } }
                ]
            }
        });
        let response = app
            .oneshot(
                post_json("/api/vapi/webhook")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["toolCallId"], "call_1");
        assert_eq!(results[1]["toolCallId"], "call_2");
        assert!(results.iter().all(|r| !r["result"].as_str().unwrap().is_empty()));
    }

    #[tokio::test]
    async fn test_webhook_function_call_returns_result() {
        let app = create_router(state(&[]));
        let payload = json!({
            "message": {
                "type": "function-call",
                "functionCall": { "name": "get_business_info", "parameters": {} }
            }
        });
        let response = app
            .oneshot(
                post_json("/api/vapi/webhook")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["result"].is_string());
        assert!(body.get("results").is_none());
    }

    #[tokio::test]
    async fn test_webhook_assistant_request_without_number() {
        let app = create_router(state(&[]));
        let payload = json!({ "message": { "type": "assistant-request", "call": { "id": "c-1" } } });
        let response = app
            .oneshot(
                post_json("/api/vapi/webhook")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["error"].is_string());
        assert!(body.get("assistantId").is_none());
    }

    #[test]
    fn test_state_clone_shares_config_and_notifier() {
        let state = state(&[]);
        let cloned: AppState = (*state).clone();
        assert!(Arc::ptr_eq(&cloned.config, &state.config));
        assert!(Arc::ptr_eq(&cloned.notifier, &state.notifier));
        assert!(cloned.voice_platform.is_none());
    }
}
