//! In-process gateway with the same observable behaviour as the web app.

use super::{
    HistoryItem, LoginOutcome, LoginStatus, PersistenceGateway, RunRecord, PLACEHOLDER,
    RESULT_SLOTS,
};
use crate::error::GatewayError;
use crate::types::{RecordHandle, UserRole};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

/// Row 1 of the log sheet is the header, so data rows start here.
const FIRST_DATA_ROW: u64 = 2;

/// The one account whose history spans every user.
pub const HISTORY_ADMIN: &str = "admin";

struct Account {
    username: String,
    password: String,
    role: UserRole,
    approved: bool,
}

struct LogRow {
    time: String,
    username: String,
    sku: String,
    title: String,
    listing_description: String,
    tags: String,
    materials: String,
    original_image: String,
    results: [String; RESULT_SLOTS],
}

#[derive(Default)]
struct State {
    accounts: Vec<Account>,
    rows: Vec<LogRow>,
    capability_keys: Vec<String>,
    next_key: usize,
    offline: bool,
}

#[derive(Default)]
pub struct InMemoryGateway {
    state: Mutex<State>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an approved administrator account.
    pub fn with_admin(self, username: &str, password: &str) -> Self {
        self.state.lock().accounts.push(Account {
            username: username.to_string(),
            password: password.to_string(),
            role: UserRole::Admin,
            approved: true,
        });
        self
    }

    /// Keys handed out on login, rotated round-robin.
    pub fn with_capability_keys<I, S>(self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.lock().capability_keys = keys
            .into_iter()
            .map(|key| {
                let key: String = key.into();
                key.trim().to_string()
            })
            .filter(|k| !k.is_empty())
            .collect();
        self
    }

    /// Approve a pending account. Returns false for unknown users.
    pub fn approve_user(&self, username: &str) -> bool {
        let mut state = self.state.lock();
        match state.accounts.iter_mut().find(|a| a.username == username) {
            Some(account) => {
                account.approved = true;
                true
            }
            None => false,
        }
    }

    /// While offline every call fails as a network error.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    pub fn stored_rows(&self) -> usize {
        self.state.lock().rows.len()
    }

    fn check_online(state: &State) -> Result<(), GatewayError> {
        if state.offline {
            Err(GatewayError::RequestFailed("gateway unreachable".to_string()))
        } else {
            Ok(())
        }
    }
}

fn rejected(message: &str) -> GatewayError {
    GatewayError::Rejected {
        message: message.to_string(),
    }
}

fn or_placeholder(value: &str) -> String {
    if value.trim().is_empty() {
        PLACEHOLDER.to_string()
    } else {
        value.to_string()
    }
}

/// Only data URLs are storable images; anything else is a placeholder.
fn stored_image(url: &str) -> String {
    if url.starts_with("data:") && url.contains(',') {
        url.to_string()
    } else {
        PLACEHOLDER.to_string()
    }
}

#[async_trait]
impl PersistenceGateway for InMemoryGateway {
    async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, GatewayError> {
        let mut state = self.state.lock();
        Self::check_online(&state)?;

        let Some(account) = state
            .accounts
            .iter()
            .find(|a| a.username == username && a.password == password)
        else {
            return Ok(LoginOutcome {
                status: LoginStatus::Rejected,
                role: None,
                capability_key: None,
                message: Some("Wrong credentials".to_string()),
            });
        };

        if account.role != UserRole::Admin && !account.approved {
            return Ok(LoginOutcome {
                status: LoginStatus::Pending,
                role: None,
                capability_key: None,
                message: Some("Pending approval.".to_string()),
            });
        }

        let role = account.role;
        let capability_key = if state.capability_keys.is_empty() {
            None
        } else {
            let index = state.next_key % state.capability_keys.len();
            state.next_key = state.next_key.wrapping_add(1);
            state.capability_keys.get(index).cloned()
        };
        Ok(LoginOutcome {
            status: LoginStatus::Success,
            role: Some(role),
            capability_key,
            message: None,
        })
    }

    async fn register(&self, username: &str, password: &str) -> Result<String, GatewayError> {
        let mut state = self.state.lock();
        Self::check_online(&state)?;
        if state.accounts.iter().any(|a| a.username == username) {
            return Err(rejected("User exists"));
        }
        state.accounts.push(Account {
            username: username.to_string(),
            password: password.to_string(),
            role: UserRole::User,
            approved: false,
        });
        Ok("Success! Wait for approval.".to_string())
    }

    async fn save_run(&self, record: &RunRecord) -> Result<Option<RecordHandle>, GatewayError> {
        let mut state = self.state.lock();
        Self::check_online(&state)?;

        let results: [String; RESULT_SLOTS] = std::array::from_fn(|slot| {
            record
                .results
                .get(slot)
                .map(|url| stored_image(url))
                .unwrap_or_else(|| PLACEHOLDER.to_string())
        });
        state.rows.push(LogRow {
            time: Utc::now().to_rfc3339(),
            username: record.username.clone(),
            sku: or_placeholder(&record.sku),
            title: or_placeholder(&record.title),
            listing_description: or_placeholder(&record.listing_description),
            tags: or_placeholder(&record.tags),
            materials: or_placeholder(&record.materials),
            original_image: stored_image(&record.original_image),
            results,
        });
        let row_index = state.rows.len() as u64 + FIRST_DATA_ROW - 1;
        Ok(Some(RecordHandle(row_index)))
    }

    async fn update_sku(&self, handle: RecordHandle, sku: &str) -> Result<(), GatewayError> {
        let mut state = self.state.lock();
        Self::check_online(&state)?;
        if handle.0 < FIRST_DATA_ROW {
            return Err(rejected("Invalid row"));
        }
        let position = (handle.0 - FIRST_DATA_ROW) as usize;
        let row = state
            .rows
            .get_mut(position)
            .ok_or_else(|| rejected("Invalid row"))?;
        row.sku = sku.to_string();
        Ok(())
    }

    async fn fetch_history(&self, username: &str) -> Result<Vec<HistoryItem>, GatewayError> {
        let state = self.state.lock();
        Self::check_online(&state)?;

        // The web app keys the all-rows view on the account name, not the role
        let sees_all = username == HISTORY_ADMIN;

        let items = state
            .rows
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, row)| sees_all || row.username == username)
            .map(|(position, row)| HistoryItem {
                handle: RecordHandle(position as u64 + FIRST_DATA_ROW),
                time: row.time.clone(),
                username: row.username.clone(),
                sku: row.sku.clone(),
                title: row.title.clone(),
                listing_description: row.listing_description.clone(),
                tags: row.tags.clone(),
                materials: row.materials.clone(),
                original_image: if row.original_image == PLACEHOLDER {
                    String::new()
                } else {
                    row.original_image.clone()
                },
                results: row
                    .results
                    .iter()
                    .filter(|link| link.as_str() != PLACEHOLDER)
                    .cloned()
                    .collect(),
            })
            .collect();
        Ok(items)
    }

    fn gateway_name(&self) -> &str {
        "in-memory"
    }
}
