use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::SocialSnapshot;

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid },

    /// The full current social state of the connected user
    Snapshot(SocialSnapshot),
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Ask for a fresh snapshot without waiting for a change
    Refresh,
}

/// Published by the write path after a transaction commits. Connections whose
/// user is touched re-run their live query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "collection", rename_all = "snake_case")]
pub enum ChangeNotice {
    Relationships { users: [Uuid; 2] },
    ChallengeInvites { users: [Uuid; 2] },
    /// `user`'s name, avatar or streak changed. `audience` is everyone whose
    /// snapshot embeds that profile.
    Profiles { user: Uuid, audience: Vec<Uuid> },
}

impl ChangeNotice {
    pub fn touches(&self, user_id: Uuid) -> bool {
        match self {
            Self::Relationships { users } | Self::ChallengeInvites { users } => {
                users.contains(&user_id)
            }
            Self::Profiles { user, audience } => *user == user_id || audience.contains(&user_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notice_touches_only_named_users() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();

        let notice = ChangeNotice::Relationships { users: [a, b] };
        assert!(notice.touches(a));
        assert!(notice.touches(b));
        assert!(!notice.touches(c));

        let notice = ChangeNotice::Profiles { user: c, audience: vec![b] };
        assert!(notice.touches(c));
        assert!(notice.touches(b));
        assert!(!notice.touches(a));
    }

    #[test]
    fn commands_use_tagged_json() {
        let cmd: GatewayCommand =
            serde_json::from_str(r#"{"type":"Identify","data":{"token":"abc"}}"#).unwrap();
        assert!(matches!(cmd, GatewayCommand::Identify { token } if token == "abc"));

        let cmd: GatewayCommand = serde_json::from_str(r#"{"type":"Refresh"}"#).unwrap();
        assert!(matches!(cmd, GatewayCommand::Refresh));
    }
}
