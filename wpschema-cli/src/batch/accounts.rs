//! Account registry: maps a normalized site key to its API credentials
//!
//! Built once per run from the accounts sheet and immutable afterwards.
//! The normalized site key is the sole join key between account rows and
//! data rows.

use std::collections::HashMap;

use log::warn;

/// Credentials and endpoint for one WordPress site
#[derive(Debug, Clone)]
pub struct Account {
    /// Normalized site key (trimmed, lowercased)
    pub site: String,
    /// Base URL of the site, without the /wp-json suffix
    pub api_url: String,
    pub user: String,
    pub app_pass: String,
}

/// Normalize a site key cell: trim whitespace, lowercase
pub fn normalize_site_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Immutable site-key → account mapping for one run
#[derive(Debug, Default)]
pub struct AccountRegistry {
    accounts: HashMap<String, Account>,
}

impl AccountRegistry {
    /// Build the registry from account rows. Duplicate site keys keep the
    /// last row and log a warning (the input format does not forbid them).
    pub fn build(rows: Vec<Account>) -> Self {
        let mut accounts = HashMap::new();
        for account in rows {
            let key = normalize_site_key(&account.site);
            if accounts.contains_key(&key) {
                warn!("duplicate account for site '{}', keeping the later row", key);
            }
            accounts.insert(key, account);
        }
        Self { accounts }
    }

    /// Look up an account by (already normalized or raw) site key
    pub fn get(&self, site: &str) -> Option<&Account> {
        self.accounts.get(&normalize_site_key(site))
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
