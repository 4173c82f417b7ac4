use std::sync::RwLock;

use tracing::info;

use crate::application::repos::IdentityProvider;
use crate::cache::{rw_read, rw_write};

const SOURCE: &str = "infra::identity";

/// Identity provider backed by a locally held session.
#[derive(Debug, Default)]
pub struct StaticIdentity {
    user_id: RwLock<Option<String>>,
}

impl StaticIdentity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self {
            user_id: RwLock::new(Some(user_id.into())),
        }
    }

    pub fn sign_in(&self, user_id: impl Into<String>) {
        let user_id = user_id.into();
        info!(user_id = %user_id, "Signed in");
        *rw_write(&self.user_id, SOURCE, "sign_in") = Some(user_id);
    }

    pub fn sign_out(&self) {
        *rw_write(&self.user_id, SOURCE, "sign_out") = None;
        info!("Signed out");
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user_id(&self) -> Option<String> {
        rw_read(&self.user_id, SOURCE, "current_user_id").clone()
    }
}
