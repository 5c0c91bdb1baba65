#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::constants::DEFAULT_PAGE_SIZE;

/// Canvas credentials and tuning parameters sourced from the environment.
///
/// Token acquisition and refresh are the caller's problem; this bundle only
/// carries whatever token the environment currently holds.
#[derive(Clone, Debug)]
pub struct CanvasEnv {
    /// Fully qualified Canvas REST endpoint, e.g. `https://canvas.example.edu/api/v1`.
    base_url:     String,
    /// Bearer token sent with every Canvas request.
    access_token: String,
    /// Page size for paginated list endpoints.
    page_size:    usize,
}

impl CanvasEnv {
    /// Builds a credential bundle from explicit values. The base URL may be
    /// given with or without the `/api/v1` suffix and with or without a
    /// trailing slash.
    pub fn new(base_url: &str, access_token: &str) -> Self {
        let trimmed = base_url.trim().trim_end_matches('/');
        let base_url = if trimmed.ends_with("/api/v1") {
            trimmed.to_owned()
        } else {
            format!("{trimmed}/api/v1")
        };
        Self {
            base_url,
            access_token: access_token.trim().to_owned(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Construct a `CanvasEnv` from `CANVAS_BASE_URL` and
    /// `CANVAS_ACCESS_TOKEN`; returns `None` if either is missing or empty.
    ///
    /// `CANVAS_PAGE_SIZE` optionally overrides the list-endpoint page size;
    /// unparsable or zero values fall back to the default.
    pub fn from_env() -> Option<Self> {
        dotenvy::dotenv().ok();

        let base_url = std::env::var("CANVAS_BASE_URL").ok()?.trim().to_owned();
        let access_token = std::env::var("CANVAS_ACCESS_TOKEN").ok()?.trim().to_owned();

        if base_url.is_empty() || access_token.is_empty() {
            return None;
        }

        let page_size = std::env::var("CANVAS_PAGE_SIZE")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE);

        let mut env = Self::new(&base_url, &access_token);
        env.page_size = page_size;
        Some(env)
    }

    /// Returns the Canvas REST base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the bearer token used for Canvas requests.
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Returns the page size for paginated list endpoints.
    pub fn page_size(&self) -> usize {
        self.page_size
    }
}

/// Installs a global fmt subscriber honouring `RUST_LOG`, defaulting to
/// `info`. Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rubrix=info"));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init();
}
