//! Client configuration

use std::time::Duration;

/// Default RPC used to draw the next fiscal invoice number
pub const DEFAULT_INVOICE_RPC: &str = "get_next_invoice_number";

/// Configuration for connecting to the remote store
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server base URL (e.g., "https://xyz.example.co")
    pub base_url: String,

    /// API key, sent both as `apikey` and as bearer token
    pub api_key: Option<String>,

    /// Request timeout in seconds
    pub timeout: u64,

    /// How often the change watcher polls each collection
    pub poll_interval: Duration,

    /// RPC function name for invoice numbering
    pub invoice_rpc: String,
}

impl ClientConfig {
    /// Create a new client configuration
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            timeout: 30,
            poll_interval: Duration::from_millis(2000),
            invoice_rpc: DEFAULT_INVOICE_RPC.to_string(),
        }
    }

    /// Set the API key
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }

    /// Set the change watcher poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_invoice_rpc(mut self, name: impl Into<String>) -> Self {
        self.invoice_rpc = name.into();
        self
    }

    /// Create an HTTP store from this configuration
    pub fn build_http_store(&self) -> super::ClientResult<super::HttpStore> {
        super::HttpStore::new(self)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("http://localhost:54321")
    }
}
