use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use bookshelf_app::App;
use bookshelf_db::Database;
use bookshelf_kernel::settings::Settings;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

const BOUNDARY: &str = "bookshelf-test-boundary";

struct TestApp {
    dir: tempfile::TempDir,
    router: Router,
}

impl TestApp {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.storage.web_root = dir.path().to_path_buf();
        settings.books.cover_image_base_url = "http://books.test/api/books/{id}/CoverImage".into();

        let app = App::with_database(settings, Database::open_memory().unwrap());
        app.prepare().await.unwrap();

        Self {
            router: app.router(),
            dir,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str) -> Response {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn delete(&self, uri: &str) -> Response {
        self.send(Request::delete(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn form(&self, method: Method, uri: &str, form: Form) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(form.finish()))
            .unwrap();
        self.send(request).await
    }

    async fn create(&self, title: &str) -> Value {
        let response = self
            .form(
                Method::POST,
                "/api/books",
                Form::new()
                    .text("title", title)
                    .text("author", "Roy Osherove")
                    .text("description", "Patterns and practices")
                    .text("price", "100"),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        json(response).await
    }

    fn stored_images(&self) -> usize {
        std::fs::read_dir(self.dir.path().join("Images"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

#[derive(Default)]
struct Form {
    body: Vec<u8>,
}

impl Form {
    fn new() -> Self {
        Self::default()
    }

    fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    fn file(mut self, name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}

async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

async fn json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn create_without_image_returns_created_with_location() {
    let app = TestApp::new().await;

    let response = app
        .form(
            Method::POST,
            "/api/books",
            Form::new()
                .text("title", "Art of Unit Testing")
                .text("author", "Roy Osherove")
                .text("price", "100"),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
    let book = json(response).await;

    assert_eq!(book["title"], "Art of Unit Testing");
    assert_eq!(book["price"], 100.0);
    assert!(book["coverImageURL"].is_null());
    assert_eq!(location, format!("/api/books/{}", book["id"].as_str().unwrap()));

    let fetched = json(app.get(&location).await).await;
    assert_eq!(fetched, book);
}

#[tokio::test]
async fn create_rejects_invalid_fields_with_details() {
    let app = TestApp::new().await;

    let response = app
        .form(
            Method::POST,
            "/api/books",
            Form::new()
                .text("title", "A")
                .text("price", "-5")
                .file("coverImage", "cover.png", "image/png", b"png"),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json(response).await;
    assert_eq!(body["statusCode"], 400);
    assert_eq!(body["code"], "validation_error");
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, ["author", "price", "title"]);
    assert_eq!(app.stored_images(), 0);
}

#[tokio::test]
async fn create_keeps_full_price_precision() {
    let app = TestApp::new().await;

    let response = app
        .form(
            Method::POST,
            "/api/books",
            Form::new()
                .text("title", "Expensive")
                .text("author", "Collector")
                .text("price", "12345678901234567.89"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();

    let created = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(created.contains(r#""price":12345678901234567.89"#), "{created}");

    let fetched = String::from_utf8(body_bytes(app.get(&location).await).await).unwrap();
    assert!(fetched.contains(r#""price":12345678901234567.89"#), "{fetched}");
}

#[tokio::test]
async fn create_trims_padded_text_before_validating() {
    let app = TestApp::new().await;

    let rejected = app
        .form(
            Method::POST,
            "/api/books",
            Form::new()
                .text("title", "  a ")
                .text("author", "Roy Osherove")
                .text("price", "1"),
        )
        .await;
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(rejected).await["details"][0]["field"], "title");

    let accepted = app
        .form(
            Method::POST,
            "/api/books",
            Form::new()
                .text("title", "  Dune ")
                .text("author", "Frank Herbert")
                .text("price", "1"),
        )
        .await;
    assert_eq!(accepted.status(), StatusCode::CREATED);
    assert_eq!(json(accepted).await["title"], "Dune");
}

#[tokio::test]
async fn create_rejects_non_multipart_body() {
    let app = TestApp::new().await;

    let response = app
        .send(
            Request::post("/api/books")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"title":"JSON"}"#))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["code"], "bad_request");
}

#[tokio::test]
async fn list_paginates_and_reports_total() {
    let app = TestApp::new().await;
    for i in 0..12 {
        app.create(&format!("Book {i}")).await;
    }

    let first = json(app.get("/api/books?pageSize=10&pageIndex=0").await).await;
    let second = json(app.get("/api/books?pageSize=10&pageIndex=1").await).await;
    let defaults = json(app.get("/api/books").await).await;

    assert_eq!(first["count"], 12);
    assert_eq!(first["pageSize"], 10);
    assert_eq!(first["data"].as_array().unwrap().len(), 10);
    assert_eq!(second["pageIndex"], 1);
    assert_eq!(second["data"].as_array().unwrap().len(), 2);
    assert_eq!(defaults["pageSize"], 10);
    assert_eq!(defaults["pageIndex"], 0);
}

#[tokio::test]
async fn list_rejects_malformed_query() {
    let app = TestApp::new().await;

    let response = app.get("/api/books?pageSize=lots").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_unknown_and_malformed_ids() {
    let app = TestApp::new().await;

    let missing = app
        .get("/api/books/0192f3a4-5b6c-7d8e-9f00-112233445566")
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    let body = json(missing).await;
    assert_eq!(body["statusCode"], 404);
    assert!(body["traceId"].is_string());

    let malformed = app.get("/api/books/not-a-uuid").await;
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_changes_only_supplied_fields() {
    let app = TestApp::new().await;
    let created = app.create("Original").await;
    let id = created["id"].as_str().unwrap();

    let response = app
        .form(
            Method::PUT,
            "/api/books",
            Form::new()
                .text("Id", id)
                .text("Title", "X")
                .text("Price", "999"),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        response.headers()[header::LOCATION],
        format!("/api/books/{id}").as_str()
    );

    let fetched = json(app.get(&format!("/api/books/{id}")).await).await;
    assert_eq!(fetched["title"], "X");
    assert_eq!(fetched["price"], 999.0);
    assert_eq!(fetched["author"], "Roy Osherove");
    assert_eq!(fetched["description"], "Patterns and practices");
}

#[tokio::test]
async fn update_unknown_book_is_not_found() {
    let app = TestApp::new().await;

    let response = app
        .form(
            Method::PUT,
            "/api/books",
            Form::new()
                .text("id", "0192f3a4-5b6c-7d8e-9f00-112233445566")
                .text("title", "Ghost"),
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cover_image_lifecycle() {
    let app = TestApp::new().await;
    let response = app
        .form(
            Method::POST,
            "/api/books",
            Form::new()
                .text("title", "Covered")
                .text("author", "Illustrator")
                .text("price", "12.5")
                .file("coverImage", "front.png", "image/png", b"first-image"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let book = json(response).await;
    let id = book["id"].as_str().unwrap().to_string();
    let cover_uri = format!("/api/books/{id}/CoverImage");

    assert_eq!(
        book["coverImageURL"],
        format!("http://books.test{cover_uri}").as_str()
    );
    assert_eq!(app.stored_images(), 1);

    let cover = app.get(&cover_uri).await;
    assert_eq!(cover.status(), StatusCode::OK);
    assert_eq!(cover.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(body_bytes(cover).await, b"first-image");

    let replaced = app
        .form(
            Method::POST,
            &cover_uri,
            Form::new().file("coverImage", "back.jpg", "image/jpeg", b"second-image"),
        )
        .await;
    assert_eq!(replaced.status(), StatusCode::OK);
    assert_eq!(app.stored_images(), 1);

    let cover = app.get(&cover_uri).await;
    assert_eq!(cover.headers()[header::CONTENT_TYPE], "image/jpeg");
    assert_eq!(body_bytes(cover).await, b"second-image");

    let deleted = app.delete(&format!("/api/books/{id}")).await;
    assert_eq!(deleted.status(), StatusCode::OK);
    assert_eq!(app.stored_images(), 0);
    assert_eq!(app.get(&cover_uri).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cover_upload_requires_image() {
    let app = TestApp::new().await;
    let book = app.create("Bare").await;
    let cover_uri = format!("/api/books/{}/CoverImage", book["id"].as_str().unwrap());

    assert_eq!(app.get(&cover_uri).await.status(), StatusCode::NOT_FOUND);

    let response = app
        .form(Method::POST, &cover_uri, Form::new().text("note", "no file"))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_reduces_count_by_one() {
    let app = TestApp::new().await;
    let doomed = app.create("Doomed").await;
    app.create("Survivor").await;

    let uri = format!("/api/books/{}", doomed["id"].as_str().unwrap());
    assert_eq!(app.delete(&uri).await.status(), StatusCode::OK);

    let page = json(app.get("/api/books").await).await;
    assert_eq!(page["count"], 1);
    assert_eq!(page["data"][0]["title"], "Survivor");
    assert_eq!(app.delete(&uri).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn every_response_reports_api_version_and_request_id() {
    let app = TestApp::new().await;

    let response = app.get("/api/books/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["api-supported-versions"], "1.0");
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn openapi_document_lists_book_routes() {
    let app = TestApp::new().await;

    let doc = json(app.get("/docs/openapi.json").await).await;

    assert!(doc["paths"]["/api/books"]["post"].is_object());
    assert!(doc["paths"]["/api/books/{id}/CoverImage"]["get"].is_object());
    assert!(doc["components"]["schemas"]["Book"].is_object());
}

#[tokio::test]
async fn openapi_document_is_accepted_by_swagger_ui() {
    let app = TestApp::new().await;

    let doc = json(app.get("/docs/openapi.json").await).await;
    let openapi: utoipa::openapi::OpenApi = serde_json::from_value(doc).unwrap();

    for path in ["/api/books", "/api/books/{id}", "/api/books/{id}/CoverImage"] {
        assert!(openapi.paths.paths.contains_key(path), "{path}");
    }
    assert_eq!(openapi.info.title, "Bookshelf API");
}
