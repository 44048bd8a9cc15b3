// Public API overlays derived from private routes, loaded from a TOML file
#[cfg(test)]
mod test {
    use std::io::Write;

    use axum::{Router, body::Body, http::Request};
    use http::{Method, StatusCode, header};
    use http_body_util::BodyExt;
    use nado::{
        App, ServerConfig, build_app,
        config::loader::{STARTER_CONFIG, load_config},
        core::{RouteDeclaration, Visibility},
    };
    use serde_json::{Value, json};
    use tempfile::NamedTempFile;
    use tower::ServiceExt;

    const CONFIG: &str = r#"
listen_addr = "127.0.0.1:0"

[[accounts]]
id = "u1"
email = "pilot@example.com"
password = "hunter2"

[[api_keys]]
key = "live-key"
key_id = "k1"
owner_id = "u1"

[[api_keys]]
key = "dead-key"
key_id = "k0"
owner_id = "u1"
revoked = true

[[routes]]
pattern = "/signin"
handler = "signin"
authenticated = false

[[routes]]
pattern = '/api/v1/plan/(\w+)'
handler = "documents"
config = { collection = "plans" }

[[routes]]
pattern = '/api/v2/plan/(?P<id>\w+)'
handler = "documents"
config = { collection = "plans" }
public = ['/api/v2/plan/(?P<id>\w+)']

[[routes]]
pattern = '/api/v1/export/?(\w+)?'
handler = "documents"
config = { collection = "exports" }
public = ['/public/v1/export/?(?P<id>\w+)?']

[[routes]]
pattern = "/api/v1/apikey"
handler = "api_key"
"#;

    async fn load_config_from(content: &str) -> ServerConfig {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(file, "{content}").unwrap();
        load_config(file.path().to_str().unwrap()).await.unwrap()
    }

    async fn app() -> App {
        build_app(&load_config_from(CONFIG).await).unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn get(uri: &str) -> http::request::Builder {
        Request::builder().method(Method::GET).uri(uri)
    }

    async fn session_cookie(app: &Router) -> String {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/signin")
                    .body(Body::from(
                        r#"{"email":"pilot@example.com","password":"hunter2"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        let cookie = response.headers().get(header::SET_COOKIE).unwrap();
        cookie.to_str().unwrap().split(';').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_table_layout() {
        let app = app().await;
        let layout: Vec<_> = app
            .table
            .entries()
            .iter()
            .map(|e| (e.pattern.as_str().to_string(), e.visibility))
            .collect();

        assert_eq!(
            layout,
            vec![
                ("/signin".to_string(), Visibility::Private),
                (r"/api/v1/plan/(\w+)".to_string(), Visibility::Private),
                // Identical overlay replaces its source in place.
                (r"/api/v2/plan/(?P<id>\w+)".to_string(), Visibility::Public),
                (r"/api/v1/export/?(\w+)?".to_string(), Visibility::Private),
                (r"/public/v1/export/?(?P<id>\w+)?".to_string(), Visibility::Public),
                ("/api/v1/apikey".to_string(), Visibility::Private),
            ]
        );
        assert!(app.table.entries()[2].session_fallback);
        assert!(!app.table.entries()[4].session_fallback);
    }

    #[tokio::test]
    async fn test_same_pattern_overlay_accepts_key_or_session() {
        let app = app().await.router;

        let (status, _) = send(
            &app,
            get("/api/v2/plan/p1")
                .header("x-api-key", "live-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        // Authenticated; the plan simply does not exist.
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, get("/api/v2/plan/p1").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let preflight = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/v2/plan/p1")
                    .header(header::ORIGIN, "https://planner.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(preflight.status(), StatusCode::NO_CONTENT);

        let cookie = session_cookie(&app).await;
        let (status, _) = send(
            &app,
            get("/api/v2/plan/p1")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &app,
            get("/api/v1/plan/p1")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_private_and_public_entries_share_data() {
        let app = app().await.router;
        let cookie = session_cookie(&app).await;

        let (status, created) = send(
            &app,
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/export")
                .header(header::COOKIE, &cookie)
                .body(Body::from(r#"{"format":"geotiff"}"#))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap();

        // The public overlay reaches the same handler and owner's data with a key.
        let (status, fetched) = send(
            &app,
            get(&format!("/public/v1/export/{id}"))
                .header(header::AUTHORIZATION, "Bearer live-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["body"]["format"], "geotiff");

        let (status, listed) = send(
            &app,
            get("/public/v1/export?api_key=live-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed["documents"].as_array().unwrap().len(), 1);

        // A session is not accepted on a derived public entry.
        let (status, _) = send(
            &app,
            get("/public/v1/export")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_bad_keys() {
        let app = app().await.router;

        let (status, _) = send(
            &app,
            get("/public/v1/export")
                .header("x-api-key", "dead-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            &app,
            get("/public/v1/export")
                .header("x-api-key", "who-knows")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_issued_key_opens_public_routes() {
        let app = app().await.router;
        let cookie = session_cookie(&app).await;

        let (status, issued) = send(
            &app,
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/apikey")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let key = issued["key"].as_str().unwrap();

        let (status, _) = send(
            &app,
            get("/public/v1/export")
                .header("x-api-key", key)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_starter_config_serves_api_description_anonymously() {
        let app = build_app(&load_config_from(STARTER_CONFIG).await).unwrap();

        let entry = app
            .table
            .entries()
            .iter()
            .find(|e| e.pattern.as_str().starts_with("/public/api/"))
            .unwrap();
        assert_eq!(entry.visibility, Visibility::Private);
        assert!(!entry.authenticated);

        // No credentials: the file lookup runs (and finds nothing here).
        let (status, _) = send(
            &app.router,
            get("/public/api/public_apis.yaml").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_positional_public_overlay_refuses_to_start() {
        let mut config = load_config_from(CONFIG).await;
        config.routes.push(
            RouteDeclaration::new(r"/api/v1/layer/(\w+)", "documents")
                .with_config(json!({"collection": "layers"}))
                .publicize(r"/public/v1/layer/(\w+)"),
        );
        assert!(build_app(&config).is_err());
    }
}
