use axum::{
    body::Body,
    http::{
        header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
        Method, Request, StatusCode,
    },
    Router,
};
use feedback_auth::Authenticator;
use feedback_backend_api::{build_router, AppState};
use feedback_config::{AuthConfig, DatabaseConfig};
use feedback_database::initialize_database;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::ServiceExt;

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

const COOKIE_NAME: &str = "feedback_session";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

struct TestApp {
    router: Router,
    pool: SqlitePool,
    _db_dir: TempDir,
}

struct TestResponse {
    status: StatusCode,
    location: Option<String>,
    set_cookies: Vec<String>,
    json: Value,
}

impl TestResponse {
    /// `name=value` pair of the session cookie, if one was set
    fn session_cookie(&self) -> Option<String> {
        self.set_cookies
            .iter()
            .find(|header| header.starts_with(&format!("{COOKIE_NAME}=")))
            .and_then(|header| header.split(';').next())
            .map(str::to_string)
    }
}

impl TestApp {
    async fn new() -> Self {
        let db_dir = TempDir::new().expect("create temp dir");
        let db_path = db_dir.path().join("feedback-test.db");
        let database = DatabaseConfig {
            url: format!("sqlite://{}", db_path.display()),
            max_connections: 5,
        };

        let pool = initialize_database(&database)
            .await
            .expect("initialise database");

        let auth = AuthConfig::default();
        let authenticator = Authenticator::new(pool.clone(), auth.clone());
        let state = AppState::new(pool.clone(), authenticator, &auth);

        Self {
            router: build_router(state),
            pool,
            _db_dir: db_dir,
        }
    }

    async fn request(
        &self,
        method: Method,
        uri: &str,
        form: Option<&str>,
        cookie: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }

        let body = match form {
            Some(form) => {
                builder = builder.header(CONTENT_TYPE, FORM_CONTENT_TYPE);
                Body::from(form.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).expect("build request"))
            .await
            .expect("dispatch request");

        let status = response.status();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let set_cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(str::to_string)
            .collect();

        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("collect response body")
            .to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            location,
            set_cookies,
            json,
        }
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, None, cookie).await
    }

    async fn post(&self, uri: &str, form: &str, cookie: Option<&str>) -> TestResponse {
        self.request(Method::POST, uri, Some(form), cookie).await
    }

    /// A POST with no body and no content type
    async fn bare_post(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        self.request(Method::POST, uri, None, cookie).await
    }

    /// Register a user and return their session cookie
    async fn register(&self, username: &str, password: &str) -> String {
        let form = format!(
            "username={username}&password={password}&first_name=Test&last_name=User&email={username}%40example.com"
        );
        let response = self.post("/register", &form, None).await;
        assert_eq!(response.status, StatusCode::SEE_OTHER);
        response.session_cookie().expect("registration sets a session")
    }

    async fn create_feedback(&self, username: &str, cookie: &str, title: &str) -> TestResult<i64> {
        let response = self
            .post(
                &format!("/users/{username}/feedback/new"),
                &format!("title={title}&content={title}+body"),
                Some(cookie),
            )
            .await;
        assert_eq!(response.status, StatusCode::SEE_OTHER);

        let id = sqlx::query_scalar("SELECT MAX(id) FROM feedback")
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }

    async fn count(&self, table: &str) -> TestResult<i64> {
        let count = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn feedback_row(&self, id: i64) -> TestResult<Option<(String, String, String)>> {
        let row = sqlx::query_as("SELECT title, content, username FROM feedback WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}

#[tokio::test]
async fn home_redirects_to_registration() {
    let app = TestApp::new().await;

    let response = app.get("/", None).await;

    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location.as_deref(), Some("/register"));
}

#[tokio::test]
async fn health_check_reports_ok() {
    let app = TestApp::new().await;

    let response = app.get("/health", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json["status"], "ok");
}

#[tokio::test]
async fn registration_form_describes_its_fields() {
    let app = TestApp::new().await;

    let response = app.get("/register", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json["form"], "register");
    assert_eq!(response.json["action"], "/register");
    assert_eq!(response.json["fields"].as_array().map(Vec::len), Some(5));
}

#[tokio::test]
async fn registration_logs_the_user_in() -> TestResult {
    let app = TestApp::new().await;

    let response = app
        .post(
            "/register",
            "username=bob&password=pw123&first_name=Bob&last_name=Lee&email=bob%40example.com",
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location.as_deref(), Some("/users/bob"));
    let header = response
        .set_cookies
        .iter()
        .find(|header| header.starts_with(COOKIE_NAME))
        .expect("session cookie header");
    assert!(header.contains("HttpOnly"));
    assert!(header.contains("SameSite=Lax"));

    let cookie = response.session_cookie().expect("session cookie");
    let page = app.get("/users/bob", Some(&cookie)).await;
    assert_eq!(page.status, StatusCode::OK);
    assert_eq!(page.json["user"]["username"], "bob");
    assert_eq!(page.json["user"]["full_name"], "Bob Lee");
    assert!(page.json["user"].get("password_hash").is_none());
    assert_eq!(app.count("sessions").await?, 1);
    Ok(())
}

#[tokio::test]
async fn duplicate_username_is_a_conflict_without_new_row() -> TestResult {
    let app = TestApp::new().await;
    app.register("bob", "pw123").await;

    let response = app
        .post(
            "/register",
            "username=bob&password=other&first_name=Robert&last_name=Lee&email=robert%40example.com",
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.json["errors"]["username"][0], "Username is already taken.");
    assert!(response.session_cookie().is_none());
    assert_eq!(app.count("users").await?, 1);
    Ok(())
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() -> TestResult {
    let app = TestApp::new().await;
    app.register("bob", "pw123").await;

    let response = app
        .post(
            "/register",
            "username=robert&password=pw&first_name=Robert&last_name=Lee&email=bob%40example.com",
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.json["errors"]["email"][0], "Email is already registered.");
    assert_eq!(app.count("users").await?, 1);
    Ok(())
}

#[tokio::test]
async fn invalid_registration_is_redisplayed_without_password() -> TestResult {
    let app = TestApp::new().await;

    let response = app
        .post(
            "/register",
            "username=bob&password=secret&first_name=Bob&last_name=Lee",
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json["errors"]["email"][0], "This field is required.");
    assert_eq!(response.json["fields"][0]["value"], "bob");
    assert_eq!(response.json["fields"][1]["value"], "");
    assert!(!response.json.to_string().contains("secret"));
    assert_eq!(app.count("users").await?, 0);
    Ok(())
}

#[tokio::test]
async fn registration_that_cannot_open_a_session_keeps_no_user() -> TestResult {
    let app = TestApp::new().await;
    sqlx::query("DROP TABLE sessions").execute(&app.pool).await?;

    let response = app
        .post(
            "/register",
            "username=bob&password=pw123&first_name=Bob&last_name=Lee&email=bob%40example.com",
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.session_cookie().is_none());
    assert_eq!(app.count("users").await?, 0);
    Ok(())
}

#[tokio::test]
async fn logged_in_posts_to_register_and_login_change_nothing() -> TestResult {
    let app = TestApp::new().await;
    let cookie = app.register("bob", "pw123").await;
    let users_before = app.count("users").await?;
    let sessions_before = app.count("sessions").await?;

    let register = app
        .post(
            "/register",
            "username=carol&password=pw456&first_name=Carol&last_name=Lee&email=carol%40example.com",
            Some(&cookie),
        )
        .await;
    assert_eq!(register.status, StatusCode::SEE_OTHER);
    assert_eq!(register.location.as_deref(), Some("/users/bob"));
    assert!(register.session_cookie().is_none());

    let login = app
        .post("/login", "username=bob&password=pw123", Some(&cookie))
        .await;
    assert_eq!(login.status, StatusCode::SEE_OTHER);
    assert_eq!(login.location.as_deref(), Some("/users/bob"));
    assert!(login.session_cookie().is_none());

    for path in ["/register", "/login"] {
        let bare = app.bare_post(path, Some(&cookie)).await;
        assert_eq!(bare.status, StatusCode::SEE_OTHER);
        assert_eq!(bare.location.as_deref(), Some("/users/bob"));
    }

    assert_eq!(app.count("users").await?, users_before);
    assert_eq!(app.count("sessions").await?, sessions_before);
    Ok(())
}

#[tokio::test]
async fn anonymous_bodyless_login_is_redisplayed() {
    let app = TestApp::new().await;

    let response = app.bare_post("/login", None).await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json["errors"]["username"][0], "This field is required.");
}

#[tokio::test]
async fn logged_in_visitors_skip_register_and_login() {
    let app = TestApp::new().await;
    let cookie = app.register("bob", "pw123").await;

    for path in ["/register", "/login"] {
        let response = app.get(path, Some(&cookie)).await;
        assert_eq!(response.status, StatusCode::SEE_OTHER);
        assert_eq!(response.location.as_deref(), Some("/users/bob"));
    }
}

#[tokio::test]
async fn login_with_wrong_password_sets_no_session() -> TestResult {
    let app = TestApp::new().await;
    app.register("bob", "pw123").await;
    let sessions_before = app.count("sessions").await?;

    let response = app.post("/login", "username=bob&password=nope", None).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.json["errors"]["username"][0],
        "Invalid username or password."
    );
    assert!(response.session_cookie().is_none());
    assert_eq!(app.count("sessions").await?, sessions_before);

    let unknown = app.post("/login", "username=nobody&password=pw123", None).await;
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.json["errors"], response.json["errors"]);
    Ok(())
}

#[tokio::test]
async fn login_with_right_password_starts_a_session() {
    let app = TestApp::new().await;
    app.register("bob", "pw123").await;

    let response = app.post("/login", "username=bob&password=pw123", None).await;

    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location.as_deref(), Some("/users/bob"));
    let cookie = response.session_cookie().expect("session cookie");
    assert_eq!(app.get("/users/bob", Some(&cookie)).await.status, StatusCode::OK);
}

#[tokio::test]
async fn logout_requires_logging_in_again() -> TestResult {
    let app = TestApp::new().await;
    let cookie = app.register("bob", "pw123").await;

    let response = app.get("/logout", Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location.as_deref(), Some("/login"));
    assert!(response
        .set_cookies
        .iter()
        .any(|header| header.starts_with(COOKIE_NAME) && header.contains("Max-Age=0")));
    assert_eq!(app.count("sessions").await?, 0);

    let retry = app
        .post("/users/bob/feedback/new", "title=Hi&content=Hello", Some(&cookie))
        .await;
    assert_eq!(retry.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.count("feedback").await?, 0);
    Ok(())
}

#[tokio::test]
async fn logout_without_session_just_redirects() {
    let app = TestApp::new().await;

    let response = app.get("/logout", None).await;

    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location.as_deref(), Some("/login"));
}

#[tokio::test]
async fn created_feedback_belongs_to_the_creator() -> TestResult {
    let app = TestApp::new().await;
    let cookie = app.register("alice", "pw123").await;

    let id = app.create_feedback("alice", &cookie, "Hi").await?;

    let (title, content, owner) = app.feedback_row(id).await?.expect("feedback row");
    assert_eq!(title, "Hi");
    assert_eq!(content, "Hi body");
    assert_eq!(owner, "alice");

    let page = app.get("/users/alice", Some(&cookie)).await;
    assert_eq!(page.json["feedback"][0]["id"], id);
    assert_eq!(page.json["feedback"][0]["title"], "Hi");
    Ok(())
}

#[tokio::test]
async fn feedback_cannot_be_created_for_someone_else() -> TestResult {
    let app = TestApp::new().await;
    app.register("alice", "pw123").await;
    let mallory = app.register("mallory", "pw123").await;

    let form = app.get("/users/alice/feedback/new", Some(&mallory)).await;
    assert_eq!(form.status, StatusCode::UNAUTHORIZED);

    let response = app
        .post("/users/alice/feedback/new", "title=Hi&content=Hello", Some(&mallory))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert!(response.json["error"].is_string());
    assert_eq!(app.count("feedback").await?, 0);

    let anonymous = app
        .post("/users/alice/feedback/new", "title=Hi&content=Hello", None)
        .await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn invalid_feedback_is_redisplayed() -> TestResult {
    let app = TestApp::new().await;
    let cookie = app.register("alice", "pw123").await;

    let form = app.get("/users/alice/feedback/new", Some(&cookie)).await;
    assert_eq!(form.status, StatusCode::OK);
    assert_eq!(form.json["action"], "/users/alice/feedback/new");

    let response = app
        .post("/users/alice/feedback/new", "title=&content=Hello", Some(&cookie))
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json["errors"]["title"][0], "This field is required.");
    assert_eq!(response.json["fields"][1]["value"], "Hello");
    assert_eq!(app.count("feedback").await?, 0);
    Ok(())
}

#[tokio::test]
async fn owner_can_edit_feedback() -> TestResult {
    let app = TestApp::new().await;
    let cookie = app.register("alice", "pw123").await;
    let id = app.create_feedback("alice", &cookie, "Hi").await?;

    let form = app.get(&format!("/feedback/{id}/update"), Some(&cookie)).await;
    assert_eq!(form.status, StatusCode::OK);
    assert_eq!(form.json["fields"][0]["value"], "Hi");
    assert_eq!(form.json["fields"][1]["value"], "Hi body");

    let response = app
        .post(
            &format!("/feedback/{id}/update"),
            "title=Edited&content=Changed",
            Some(&cookie),
        )
        .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location.as_deref(), Some("/users/alice"));

    let (title, content, owner) = app.feedback_row(id).await?.expect("feedback row");
    assert_eq!((title.as_str(), content.as_str()), ("Edited", "Changed"));
    assert_eq!(owner, "alice");
    Ok(())
}

#[tokio::test]
async fn non_owner_cannot_edit_feedback() -> TestResult {
    let app = TestApp::new().await;
    let alice = app.register("alice", "pw123").await;
    let mallory = app.register("mallory", "pw123").await;
    let id = app.create_feedback("alice", &alice, "Hi").await?;

    let form = app.get(&format!("/feedback/{id}/update"), Some(&mallory)).await;
    assert_eq!(form.status, StatusCode::UNAUTHORIZED);

    let response = app
        .post(
            &format!("/feedback/{id}/update"),
            "title=Hacked&content=Gotcha",
            Some(&mallory),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let (title, content, _) = app.feedback_row(id).await?.expect("feedback row");
    assert_eq!((title.as_str(), content.as_str()), ("Hi", "Hi body"));
    Ok(())
}

#[tokio::test]
async fn missing_feedback_needs_a_session_then_is_not_found() {
    let app = TestApp::new().await;
    let cookie = app.register("alice", "pw123").await;

    let anonymous = app.post("/feedback/999/update", "title=a&content=b", None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let logged_in = app
        .post("/feedback/999/update", "title=a&content=b", Some(&cookie))
        .await;
    assert_eq!(logged_in.status, StatusCode::NOT_FOUND);

    let delete = app.post("/feedback/999/delete", "", Some(&cookie)).await;
    assert_eq!(delete.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn only_the_owner_can_delete_feedback() -> TestResult {
    let app = TestApp::new().await;

    let bob = app.register("bob", "pw123").await;
    assert_eq!(app.get("/users/bob", Some(&bob)).await.status, StatusCode::OK);

    let response = app
        .post("/users/bob/feedback/new", "title=Hi&content=Hello", Some(&bob))
        .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    let id: i64 = sqlx::query_scalar("SELECT id FROM feedback WHERE title = 'Hi'")
        .fetch_one(&app.pool)
        .await?;
    let (_, _, owner) = app.feedback_row(id).await?.expect("feedback row");
    assert_eq!(owner, "bob");

    let carol = app.register("carol", "pw456").await;
    let denied = app
        .post(&format!("/feedback/{id}/delete"), "", Some(&carol))
        .await;
    assert_eq!(denied.status, StatusCode::UNAUTHORIZED);
    assert!(app.feedback_row(id).await?.is_some());

    let deleted = app.post(&format!("/feedback/{id}/delete"), "", Some(&bob)).await;
    assert_eq!(deleted.status, StatusCode::SEE_OTHER);
    assert_eq!(deleted.location.as_deref(), Some("/users/bob"));
    assert!(app.feedback_row(id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn bodyless_delete_is_authorized_before_it_is_read() -> TestResult {
    let app = TestApp::new().await;
    let bob = app.register("bob", "pw123").await;
    let carol = app.register("carol", "pw456").await;
    let id = app.create_feedback("bob", &bob, "Hi").await?;
    let uri = format!("/feedback/{id}/delete");

    assert_eq!(app.bare_post(&uri, None).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        app.bare_post(&uri, Some(&carol)).await.status,
        StatusCode::UNAUTHORIZED
    );
    assert!(app.feedback_row(id).await?.is_some());

    let deleted = app.bare_post(&uri, Some(&bob)).await;
    assert_eq!(deleted.status, StatusCode::SEE_OTHER);
    assert_eq!(deleted.location.as_deref(), Some("/users/bob"));
    assert!(app.feedback_row(id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn bodyless_feedback_posts_check_identity_first() -> TestResult {
    let app = TestApp::new().await;
    let alice = app.register("alice", "pw123").await;
    let mallory = app.register("mallory", "pw123").await;
    let id = app.create_feedback("alice", &alice, "Hi").await?;
    let update = format!("/feedback/{id}/update");

    for cookie in [None, Some(mallory.as_str())] {
        assert_eq!(
            app.bare_post("/users/alice/feedback/new", cookie).await.status,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(app.bare_post(&update, cookie).await.status, StatusCode::UNAUTHORIZED);
    }

    let create = app.bare_post("/users/alice/feedback/new", Some(&alice)).await;
    assert_eq!(create.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(create.json["errors"]["title"][0], "This field is required.");

    let edit = app.bare_post(&update, Some(&alice)).await;
    assert_eq!(edit.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(edit.json["errors"]["content"][0], "This field is required.");

    assert_eq!(app.count("feedback").await?, 1);
    let (title, _, _) = app.feedback_row(id).await?.expect("feedback row");
    assert_eq!(title, "Hi");
    Ok(())
}

#[tokio::test]
async fn user_page_is_private() {
    let app = TestApp::new().await;
    app.register("alice", "pw123").await;
    let mallory = app.register("mallory", "pw123").await;

    assert_eq!(
        app.get("/users/alice", Some(&mallory)).await.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(app.get("/users/alice", None).await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_session_cookie_is_ignored() -> TestResult {
    let app = TestApp::new().await;
    let cookie = app.register("bob", "pw123").await;

    sqlx::query("UPDATE sessions SET expires_at = '2000-01-01T00:00:00Z'")
        .execute(&app.pool)
        .await?;

    let response = app.get("/users/bob", Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.count("sessions").await?, 0);

    let form = app.get("/login", Some(&cookie)).await;
    assert_eq!(form.status, StatusCode::OK);
    Ok(())
}
