//! Fixtures shared by unit tests

use serde_json::{json, Value};

use crate::documents::DocumentsApi;
use crate::services::DocumentService;
use crate::user_management::AccountsApi;

/// Valid account attributes for `email`
pub fn account_attrs(email: &str) -> Value {
    let name = email.split('@').next().unwrap_or(email);
    json!({
        "email": email,
        "first_name": name,
        "last_name": "Tester",
        "role": "guest",
    })
}

/// Service over fresh in-memory accounts and documents
pub fn service() -> DocumentService {
    DocumentService::new(AccountsApi::in_memory(), DocumentsApi::in_memory())
}
