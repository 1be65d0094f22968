use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::auth::repo_types::User;
use crate::oauth::providers::ProviderKind;

const USER_KEY: &str = "user";

/// Snapshot of the logged-in user kept in the session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub email: Option<String>,
    pub full_name: String,
    pub nickname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderKind>,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            email: Some(user.email.clone()),
            full_name: user.full_name.clone(),
            nickname: user.nickname.clone(),
            provider: None,
        }
    }
}

/// Starts an authenticated session. The id is cycled first so a session id
/// issued before login cannot be reused afterwards.
pub async fn establish(
    session: &Session,
    user: &SessionUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(USER_KEY, user).await
}

pub async fn current_user(
    session: &Session,
) -> Result<Option<SessionUser>, tower_sessions::session::Error> {
    session.get::<SessionUser>(USER_KEY).await
}

pub async fn destroy(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}
