use serde::{Deserialize, Serialize};

use super::repo_types::{DeletedUser, User};

/// Request body for `POST /users`. Every field is optional at the wire level
/// so presence is checked by the handler, not by the JSON extractor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub country: Option<String>,
}

/// Request body for `PUT /users/:id`. Absent or null fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub country: Option<String>,
}

/// Raw `?page=&limit=` values; parsed leniently in `services::PageRequest`.
#[derive(Debug, Default)]
pub struct ListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl ListQuery {
    /// Picks `page` and `limit` out of decoded query pairs. The first
    /// occurrence of a repeated key wins.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut q = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "page" => &mut q.page,
                "limit" => &mut q.limit,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        q
    }
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total_users: i64,
    pub total_pages: i64,
    pub current_page: i64,
    pub page_size: i64,
    pub next_page: Option<i64>,
    pub prev_page: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserPage {
    pub data: Vec<User>,
    pub pagination: PageMeta,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteUserResponse {
    pub message: String,
    pub deleted_user: DeletedUser,
}
