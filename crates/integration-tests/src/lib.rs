//! Integration tests for Numisma.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p numisma-integration-tests
//! ```
//!
//! Each test starts the storefront and admin apps on ephemeral loopback
//! ports over one shared in-memory backend and talks to them with a
//! cookie-holding HTTP client, the same way a browser would. Nothing
//! outside the process is needed.

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::Router;
use numisma_admin::config::AdminConfig;
use numisma_backend::models::{CoinListing, NewCoinListing, ProfileUpdate};
use numisma_backend::{InMemoryBackend, Repositories};
use numisma_core::{Email, Price, ProfileId, Rarity, Role};
use numisma_storefront::config::StorefrontConfig;
use numisma_storefront::content::CourseCatalog;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// Password used for every test account.
pub const PASSWORD: &str = "correct horse battery";

/// Both apps running over one backend.
pub struct TestContext {
    pub backend: InMemoryBackend,
    pub repos: Repositories,
    pub storefront_url: String,
    pub admin_url: String,
}

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Listener has no address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Test server failed");
    });
    addr
}

fn content_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../storefront/content")
}

impl TestContext {
    /// Start the storefront and the admin API.
    pub async fn start() -> Self {
        let backend = InMemoryBackend::new();
        let repos = backend.repositories();

        let courses = CourseCatalog::load(&content_dir()).expect("Failed to load courses");
        let storefront_config = StorefrontConfig::for_memory("http://127.0.0.1", content_dir());
        let storefront = numisma_storefront::state::AppState::new(
            storefront_config,
            repos.clone(),
            courses,
            None,
        );
        let storefront_addr = serve(numisma_storefront::app(storefront, None)).await;

        let admin = numisma_admin::state::AppState::new(
            AdminConfig::for_memory("http://127.0.0.1"),
            repos.clone(),
            None,
        );
        let admin_addr = serve(numisma_admin::app(admin)).await;

        Self {
            backend,
            repos,
            storefront_url: format!("http://{storefront_addr}"),
            admin_url: format!("http://{admin_addr}"),
        }
    }

    /// Storefront URL for `path`.
    #[must_use]
    pub fn store(&self, path: &str) -> String {
        format!("{}{path}", self.storefront_url)
    }

    /// Admin URL for `path`.
    #[must_use]
    pub fn admin(&self, path: &str) -> String {
        format!("{}{path}", self.admin_url)
    }

    /// Sign up on the storefront with a fresh cookie jar.
    ///
    /// Returns the signed-in client and the new profile id.
    pub async fn sign_up(&self, email: &str) -> (Client, ProfileId) {
        let client = client();
        let resp = client
            .post(self.store("/api/auth/signup"))
            .json(&json!({
                "email": email,
                "password": PASSWORD,
                "confirm_password": PASSWORD,
                "full_name": "Test Collector",
            }))
            .send()
            .await
            .expect("Signup request failed");
        assert_eq!(resp.status(), StatusCode::CREATED);

        let body: Value = resp.json().await.expect("Signup body is not JSON");
        let id = body["user"]["id"]
            .as_str()
            .and_then(|id| id.parse().ok())
            .expect("Signup response has no user id");
        (client, id)
    }

    /// Sign up, grant the admin role, and sign in to the admin API.
    pub async fn admin_client(&self, email: &str) -> (Client, ProfileId) {
        let (_, id) = self.sign_up(email).await;
        self.set_role(id, Role::Admin).await;

        let client = client();
        let resp = client
            .post(self.admin("/api/auth/login"))
            .json(&json!({ "email": email, "password": PASSWORD }))
            .send()
            .await
            .expect("Admin login request failed");
        assert_eq!(resp.status(), StatusCode::OK);
        (client, id)
    }

    pub async fn set_role(&self, id: ProfileId, role: Role) {
        let update = ProfileUpdate {
            role: Some(role),
            ..ProfileUpdate::default()
        };
        self.repos
            .profiles
            .update(id, &update)
            .await
            .expect("Failed to set role");
    }

    /// Insert a listing straight into the backend.
    pub async fn listing(&self, title: &str, value: u64, stock: u32) -> CoinListing {
        self.repos
            .listings
            .create(&NewCoinListing {
                title: title.to_string(),
                description: None,
                mint_date: None,
                region: Some("India".to_string()),
                value: Price::new(value),
                rarity: Rarity::Rare,
                metal: Some("Silver".to_string()),
                dynasty: None,
                ruler: None,
                condition: None,
                images: Vec::new(),
                stock_quantity: stock,
                seller_id: None,
            })
            .await
            .expect("Failed to create listing")
    }

    /// Profile email lookup, for assertions.
    pub async fn role_of(&self, email: &str) -> Role {
        let email = Email::parse(email).expect("Invalid email");
        self.repos
            .profiles
            .get_by_email(&email)
            .await
            .expect("Profile lookup failed")
            .expect("No such profile")
            .role
    }
}

/// A client that keeps cookies between requests.
#[must_use]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// A shipping address the checkout accepts.
#[must_use]
pub fn shipping_address() -> Value {
    json!({
        "shipping_address": {
            "full_name": "Test Collector",
            "line1": "12 MG Road",
            "city": "Bengaluru",
            "state": "Karnataka",
            "postal_code": "560001",
            "phone": "9876543210",
        }
    })
}
