//! Global configuration supplied by the host application at construction
//! time (persistence and configuration loading are out of scope for the
//! engine itself).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderCredentials {
    pub enabled: bool,
    pub has_credentials: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub providers: HashMap<String, ProviderCredentials>,
}

impl GlobalConfig {
    pub fn provider_available(&self, provider: &str) -> bool {
        self.providers
            .get(provider)
            .map(|p| p.enabled && p.has_credentials)
            .unwrap_or(false)
    }
}
