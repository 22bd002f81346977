//! The authenticated user.

use serde::Deserialize;

use super::ApiRequest;
use crate::context::ConnectionContext;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

pub struct UsersApi<'a> {
    ctx: &'a ConnectionContext,
}

impl<'a> UsersApi<'a> {
    pub fn new(ctx: &'a ConnectionContext) -> Self {
        Self { ctx }
    }

    /// The user owning the configured token.
    pub async fn me(&self) -> Result<User> {
        self.ctx.request(ApiRequest::get("/api/v2/me")).await
    }
}
