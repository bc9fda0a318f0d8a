use quillpost_backend::api::{self, AppState};
use quillpost_backend::cache::PageCache;
use quillpost_backend::config::{QuillpostConfig, QuillpostPaths};
use quillpost_backend::database::models::GroupRecord;
use quillpost_backend::database::repositories::{GroupRepository, PostRepository};
use quillpost_backend::database::Database;
use serde_json::{json, Value};
use std::time::Duration;
use tempfile::{tempdir, TempDir};
use tokio::time::sleep;

struct TestServer {
    _dir: TempDir,
    database: Database,
    cache: PageCache,
    base_url: String,
    server: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn shutdown(self) {
        self.server.abort();
        let _ = self.server.await;
    }
}

async fn spawn_server() -> TestServer {
    let dir = tempdir().expect("tempdir");
    let paths = QuillpostPaths::from_base_dir(dir.path()).expect("paths");
    let database = Database::connect(&paths).expect("open database");
    database.ensure_migrations().expect("migrations");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let port = listener.local_addr().expect("local addr").port();

    let cache = PageCache::new(Duration::from_secs(60));
    let state = AppState {
        config: QuillpostConfig::new(port, paths),
        database: database.clone(),
        cache: cache.clone(),
    };
    let router = api::router(state);
    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, router.into_make_service()).await;
    });

    let base_url = format!("http://127.0.0.1:{port}");
    wait_for_health(&base_url).await;

    TestServer {
        _dir: dir,
        database,
        cache,
        base_url,
        server,
    }
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("build client")
}

async fn wait_for_health(base_url: &str) {
    let probe = reqwest::Client::new();
    for _ in 0..50 {
        if let Ok(resp) = probe.get(format!("{base_url}/health")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        sleep(Duration::from_millis(100)).await;
    }
    panic!("server did not become healthy in time");
}

/// Registers the account and returns the session token from the login
/// Set-Cookie header.
async fn signup_and_login(client: &reqwest::Client, base_url: &str, username: &str) -> String {
    let resp = client
        .post(format!("{base_url}/auth/signup"))
        .json(&json!({ "username": username, "password": "long enough password" }))
        .send()
        .await
        .expect("signup response");
    assert_eq!(resp.status(), reqwest::StatusCode::CREATED);

    let resp = client
        .post(format!("{base_url}/auth/login"))
        .json(&json!({ "username": username, "password": "long enough password" }))
        .send()
        .await
        .expect("login response");
    assert_eq!(resp.status(), reqwest::StatusCode::SEE_OTHER);

    let set_cookie = resp
        .headers()
        .get("set-cookie")
        .expect("set-cookie header")
        .to_str()
        .expect("cookie as str");
    set_cookie
        .split(';')
        .next()
        .and_then(|pair| pair.strip_prefix("session="))
        .expect("session cookie")
        .to_string()
}

fn cookie(token: &str) -> String {
    format!("session={token}")
}

async fn create_post(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    body: &str,
    group: Option<&str>,
) {
    let resp = client
        .post(format!("{base_url}/create"))
        .header("Cookie", cookie(token))
        .json(&json!({ "body": body, "group": group }))
        .send()
        .await
        .expect("create post response");
    assert_eq!(resp.status(), reqwest::StatusCode::SEE_OTHER);
}

async fn fetch_json(client: &reqwest::Client, url: &str, token: Option<&str>) -> Value {
    let mut request = client.get(url);
    if let Some(token) = token {
        request = request.header("Cookie", cookie(token));
    }
    let resp = request.send().await.expect("response");
    assert!(
        resp.status().is_success(),
        "expected success from {url}, got {}",
        resp.status()
    );
    resp.json().await.expect("json body")
}

fn location(resp: &reqwest::Response) -> &str {
    resp.headers()
        .get("location")
        .expect("location header")
        .to_str()
        .expect("location as str")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn post_lifecycle_over_http() {
    let node = spawn_server().await;
    let client = client();

    // Unauthenticated writes bounce to the login page with a return path.
    let resp = client
        .post(format!("{}/create", node.base_url))
        .json(&json!({ "body": "nope" }))
        .send()
        .await
        .expect("unauthenticated create");
    assert_eq!(resp.status(), reqwest::StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/auth/login?next=/create");

    let ada = signup_and_login(&client, &node.base_url, "ada").await;
    create_post(&client, &node.base_url, &ada, "hello world", None).await;

    let index = fetch_json(&client, &node.base_url, None).await;
    let items = index["items"].as_array().expect("items");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["body"], "hello world");
    assert_eq!(items[0]["author"], "ada");
    let post_id = items[0]["id"].as_str().expect("post id").to_string();

    // Comment, then check the detail view.
    let resp = client
        .post(format!("{}/posts/{post_id}/comment", node.base_url))
        .header("Cookie", cookie(&ada))
        .json(&json!({ "body": "first!" }))
        .send()
        .await
        .expect("comment response");
    assert_eq!(resp.status(), reqwest::StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), format!("/posts/{post_id}"));

    let detail = fetch_json(&client, &format!("{}/posts/{post_id}", node.base_url), None).await;
    assert_eq!(detail["post"]["body"], "hello world");
    assert_eq!(detail["comments"][0]["body"], "first!");
    assert_eq!(detail["author_post_count"], 1);

    // The author edits their own post.
    let resp = client
        .post(format!("{}/posts/{post_id}/edit", node.base_url))
        .header("Cookie", cookie(&ada))
        .json(&json!({ "body": "hello, edited" }))
        .send()
        .await
        .expect("edit response");
    assert_eq!(resp.status(), reqwest::StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), format!("/posts/{post_id}"));

    // Somebody else's edit quietly lands on the detail page and writes
    // nothing.
    let eve = signup_and_login(&client, &node.base_url, "eve").await;
    let resp = client
        .post(format!("{}/posts/{post_id}/edit", node.base_url))
        .header("Cookie", cookie(&eve))
        .json(&json!({ "body": "hijacked" }))
        .send()
        .await
        .expect("foreign edit response");
    assert_eq!(resp.status(), reqwest::StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), format!("/posts/{post_id}"));

    let detail = fetch_json(&client, &format!("{}/posts/{post_id}", node.base_url), None).await;
    assert_eq!(detail["post"]["body"], "hello, edited");

    node.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn group_feed_paginates_over_http() {
    let node = spawn_server().await;
    let client = client();

    node.database
        .with_repositories(|repos| {
            repos.groups().create(&GroupRecord {
                id: "group-1".into(),
                title: "Test".into(),
                slug: "test-slug".into(),
                description: "integration".into(),
            })
        })
        .expect("create group");

    let x = signup_and_login(&client, &node.base_url, "x").await;
    for i in 0..13 {
        create_post(
            &client,
            &node.base_url,
            &x,
            &format!("post {i}"),
            Some("test-slug"),
        )
        .await;
    }

    let first = fetch_json(&client, &format!("{}/group/test-slug", node.base_url), None).await;
    assert_eq!(first["page"]["items"].as_array().expect("items").len(), 10);
    assert_eq!(first["page"]["total_pages"], 2);
    assert_eq!(first["group"]["slug"], "test-slug");

    let second = fetch_json(
        &client,
        &format!("{}/group/test-slug?page=2", node.base_url),
        None,
    )
    .await;
    assert_eq!(second["page"]["items"].as_array().expect("items").len(), 3);

    // Out-of-range page numbers clamp to the last page.
    let clamped = fetch_json(
        &client,
        &format!("{}/group/test-slug?page=99", node.base_url),
        None,
    )
    .await;
    assert_eq!(clamped["page"]["number"], 2);

    let resp = client
        .get(format!("{}/group/no-such-group", node.base_url))
        .send()
        .await
        .expect("unknown group response");
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

    node.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn follow_feed_over_http() {
    let node = spawn_server().await;
    let client = client();

    let resp = client
        .get(format!("{}/follow", node.base_url))
        .send()
        .await
        .expect("anonymous follow feed");
    assert_eq!(resp.status(), reqwest::StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/auth/login?next=/follow");

    let ada = signup_and_login(&client, &node.base_url, "ada").await;
    let fan = signup_and_login(&client, &node.base_url, "fan").await;
    create_post(&client, &node.base_url, &ada, "by ada", None).await;

    let resp = client
        .post(format!("{}/profile/ada/follow", node.base_url))
        .header("Cookie", cookie(&fan))
        .send()
        .await
        .expect("follow response");
    assert_eq!(resp.status(), reqwest::StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/profile/ada");

    let profile = fetch_json(
        &client,
        &format!("{}/profile/ada", node.base_url),
        Some(&fan),
    )
    .await;
    assert_eq!(profile["following"], true);
    assert_eq!(profile["author"]["follower_count"], 1);

    let feed = fetch_json(&client, &format!("{}/follow", node.base_url), Some(&fan)).await;
    assert_eq!(feed["items"].as_array().expect("items").len(), 1);
    assert_eq!(feed["items"][0]["body"], "by ada");

    // The fan's own post never shows up in their own follow feed.
    create_post(&client, &node.base_url, &fan, "by fan", None).await;
    let feed = fetch_json(&client, &format!("{}/follow", node.base_url), Some(&fan)).await;
    assert_eq!(feed["items"].as_array().expect("items").len(), 1);

    // Ada follows nobody.
    let feed = fetch_json(&client, &format!("{}/follow", node.base_url), Some(&ada)).await;
    assert!(feed["items"].as_array().expect("items").is_empty());

    // Unfollow, twice; both return normally.
    for _ in 0..2 {
        let resp = client
            .post(format!("{}/profile/ada/unfollow", node.base_url))
            .header("Cookie", cookie(&fan))
            .send()
            .await
            .expect("unfollow response");
        assert_eq!(resp.status(), reqwest::StatusCode::SEE_OTHER);
    }
    let profile = fetch_json(
        &client,
        &format!("{}/profile/ada", node.base_url),
        Some(&fan),
    )
    .await;
    assert_eq!(profile["following"], false);

    let resp = client
        .post(format!("{}/profile/ghost/follow", node.base_url))
        .header("Cookie", cookie(&fan))
        .send()
        .await
        .expect("follow unknown author");
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

    node.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn landing_page_cache_window_and_clear() {
    let node = spawn_server().await;
    let client = client();

    let ada = signup_and_login(&client, &node.base_url, "ada").await;
    create_post(&client, &node.base_url, &ada, "short lived", None).await;

    // First unpaginated render fills the cache.
    let index = fetch_json(&client, &node.base_url, None).await;
    assert_eq!(index["items"].as_array().expect("items").len(), 1);
    let post_id = index["items"][0]["id"].as_str().expect("post id").to_string();

    // The post disappears underneath, but the cached render survives.
    node.database
        .with_repositories(|repos| repos.posts().delete(&post_id))
        .expect("delete post");
    let cached = fetch_json(&client, &node.base_url, None).await;
    assert_eq!(cached["items"].as_array().expect("items").len(), 1);

    // After an explicit clear the next render reflects the deletion.
    node.cache.clear();
    let fresh = fetch_json(&client, &node.base_url, None).await;
    assert!(fresh["items"].as_array().expect("items").is_empty());

    node.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn validation_and_not_found_responses() {
    let node = spawn_server().await;
    let client = client();

    let ada = signup_and_login(&client, &node.base_url, "ada").await;

    // Blank body and unknown group both come back as field errors.
    let resp = client
        .post(format!("{}/create", node.base_url))
        .header("Cookie", cookie(&ada))
        .json(&json!({ "body": "   ", "group": "nowhere" }))
        .send()
        .await
        .expect("invalid create");
    assert_eq!(resp.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = resp.json().await.expect("error json");
    assert!(body["errors"]["body"].is_string());
    assert!(body["errors"]["group"].is_string());

    // No partial write happened.
    let index = fetch_json(&client, &format!("{}/?page=1", node.base_url), None).await;
    assert!(index["items"].as_array().expect("items").is_empty());

    // Duplicate account.
    let resp = client
        .post(format!("{}/auth/signup", node.base_url))
        .json(&json!({ "username": "ada", "password": "long enough password" }))
        .send()
        .await
        .expect("duplicate signup");
    assert_eq!(resp.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);

    // Wrong password.
    let resp = client
        .post(format!("{}/auth/login", node.base_url))
        .json(&json!({ "username": "ada", "password": "not the password" }))
        .send()
        .await
        .expect("bad login");
    assert_eq!(resp.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);

    let resp = client
        .get(format!("{}/posts/no-such-post", node.base_url))
        .send()
        .await
        .expect("unknown post");
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

    let resp = client
        .get(format!("{}/profile/nobody", node.base_url))
        .send()
        .await
        .expect("unknown profile");
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

    node.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn login_redirects_to_requested_path() {
    let node = spawn_server().await;
    let client = client();

    let resp = client
        .post(format!("{}/auth/signup", node.base_url))
        .json(&json!({ "username": "ada", "password": "long enough password" }))
        .send()
        .await
        .expect("signup");
    assert_eq!(resp.status(), reqwest::StatusCode::CREATED);

    let resp = client
        .post(format!("{}/auth/login", node.base_url))
        .json(&json!({
            "username": "ada",
            "password": "long enough password",
            "next": "/create"
        }))
        .send()
        .await
        .expect("login with next");
    assert_eq!(resp.status(), reqwest::StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/create");

    // Off-site destinations are ignored.
    let resp = client
        .post(format!("{}/auth/login", node.base_url))
        .json(&json!({
            "username": "ada",
            "password": "long enough password",
            "next": "https://example.com/elsewhere"
        }))
        .send()
        .await
        .expect("login with off-site next");
    assert_eq!(resp.status(), reqwest::StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/");

    node.shutdown().await;
}
