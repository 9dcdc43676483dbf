//! Storage and identity collaborators.
//!
//! The engine never talks to a database itself. Existence rules and policy
//! checks consume these read-only ports, and the host application supplies
//! the adapters. [`MemoryStore`] and [`MemoryUsers`] are in-memory adapters
//! for tests and demos.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored post-like record with the attributes `post_exists` can constrain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    /// Record identifier.
    pub id: u64,
    /// Record type, such as `campaign` or `reward`.
    pub post_type: String,
    /// Publication status, such as `publish` or `draft`.
    pub status: String,
    /// Parent record identifier, 0 when none.
    #[serde(default)]
    pub parent: u64,
    /// Author's user identifier.
    pub author: u64,
}

/// A user known to the identity directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// User identifier.
    pub id: u64,
    /// Login email, compared case-insensitively.
    pub email: String,
    /// Role names.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Capability names granted to the user.
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl UserRecord {
    /// Returns true when the user holds the capability.
    pub fn can(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }

    /// Returns true when the user has the role.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Read-only row lookups.
///
/// Lookups are short and idempotent. An adapter that cannot reach its
/// backend answers "not found"; the engine reports that as a validation
/// failure rather than retrying.
pub trait RecordStore: Send + Sync {
    /// Returns true when `table` has a row whose `column` equals `value`.
    fn exists(&self, table: &str, column: &str, value: &Value) -> bool;

    /// Loads a post-like record by id.
    fn find_post(&self, id: u64) -> Option<PostRecord>;
}

/// Read-only user lookups.
pub trait UserDirectory: Send + Sync {
    /// Loads a user by id.
    fn find(&self, id: u64) -> Option<UserRecord>;

    /// Loads a user by email, case-insensitively.
    fn find_by_email(&self, email: &str) -> Option<UserRecord>;
}

/// In-memory [`RecordStore`].
///
/// # Examples
///
/// ```
/// use payload_policy::{MemoryStore, PostRecord, RecordStore};
/// use serde_json::json;
///
/// let store = MemoryStore::new();
/// store.insert_row("currencies", "code", json!("EUR"));
/// store.insert_post(PostRecord {
///     id: 7,
///     post_type: "campaign".into(),
///     status: "publish".into(),
///     parent: 0,
///     author: 1,
/// });
///
/// assert!(store.exists("currencies", "code", &json!("EUR")));
/// assert_eq!(store.find_post(7).unwrap().post_type, "campaign");
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<HashMap<(String, String), HashSet<String>>>,
    posts: RwLock<HashMap<u64, PostRecord>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `table.column` holds `value`.
    pub fn insert_row(&self, table: &str, column: &str, value: Value) {
        if let Ok(mut rows) = self.rows.write() {
            rows.entry((table.to_string(), column.to_string()))
                .or_default()
                .insert(row_key(&value));
        }
    }

    /// Stores a post-like record; it also becomes visible to
    /// `exists("posts", "id", id)`.
    pub fn insert_post(&self, post: PostRecord) {
        self.insert_row("posts", "id", Value::from(post.id));
        if let Ok(mut posts) = self.posts.write() {
            posts.insert(post.id, post);
        }
    }
}

// Numbers and numeric strings collapse to the same key, the way a SQL
// comparison against an integer column would.
fn row_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl RecordStore for MemoryStore {
    fn exists(&self, table: &str, column: &str, value: &Value) -> bool {
        self.rows
            .read()
            .map(|rows| {
                rows.get(&(table.to_string(), column.to_string()))
                    .is_some_and(|values| values.contains(&row_key(value)))
            })
            .unwrap_or(false)
    }

    fn find_post(&self, id: u64) -> Option<PostRecord> {
        self.posts.read().ok()?.get(&id).cloned()
    }
}

/// In-memory [`UserDirectory`].
#[derive(Debug, Default)]
pub struct MemoryUsers {
    users: RwLock<HashMap<u64, UserRecord>>,
}

impl MemoryUsers {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a user.
    pub fn insert(&self, user: UserRecord) {
        if let Ok(mut users) = self.users.write() {
            users.insert(user.id, user);
        }
    }
}

impl UserDirectory for MemoryUsers {
    fn find(&self, id: u64) -> Option<UserRecord> {
        self.users.read().ok()?.get(&id).cloned()
    }

    fn find_by_email(&self, email: &str) -> Option<UserRecord> {
        let users = self.users.read().ok()?;
        users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email.trim()))
            .cloned()
    }
}
