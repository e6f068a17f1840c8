use std::sync::Arc;

use mc_proxy_api::{ClientSession, SessionLoginInterceptor};
use mc_proxy_net::SendDecision;
use mc_proxy_proto::packets::LoginSuccess;
use tracing::{debug, info, warn};

use crate::store::AllowList;

/// Refuses the login of players missing from the allow-list.
///
/// The login success packet is cancelled and the client is disconnected with
/// the reason, which the channel delivers as a login disconnect.
#[derive(Debug, Clone)]
pub struct AllowListLoginInterceptor {
    list: Arc<AllowList>,
}

impl AllowListLoginInterceptor {
    pub fn new(list: Arc<AllowList>) -> Self {
        Self { list }
    }

    pub fn list(&self) -> &Arc<AllowList> {
        &self.list
    }
}

pub fn rejection_reason(player_name: &str) -> String {
    format!("Player is not on the server allow list: player-name={player_name}")
}

impl SessionLoginInterceptor for AllowListLoginInterceptor {
    fn on_player_login_success_sending(
        &self,
        session: &ClientSession,
        login: &LoginSuccess,
    ) -> SendDecision {
        let player_name = &login.profile.name;
        if !self.list.is_enabled() {
            info!("Allow-list disabled, letting {player_name} in");
            return SendDecision::Proceed;
        }

        let allowed = match self.list.contains(player_name) {
            Ok(allowed) => allowed,
            Err(e) => {
                warn!("Cannot check allow-list for {player_name}: {e}");
                false
            }
        };
        if allowed {
            return SendDecision::Proceed;
        }

        info!("Rejected login of {player_name} from {}", session.remote_addr());
        if let Ok(entries) = self.list.entries() {
            debug!("Allow-list: {entries:?}");
        }
        session.disconnect(rejection_reason(player_name));
        SendDecision::Cancel
    }
}
