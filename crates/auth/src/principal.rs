use serde::{Deserialize, Serialize};
use uuid::Uuid;

use peoplehub_core::{TenantId, UserId};

use crate::Permission;

/// Account status as reported by the user directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum UserStatus {
    #[default]
    Active,
    /// Suspended accounts keep their records but cannot log in or refresh.
    Suspended,
}

/// The slice of a user account that credential flows need.
///
/// Produced by the user directory / password verification collaborators;
/// this crate never loads or verifies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub username: String,
    pub status: UserStatus,
    pub permissions: Vec<Permission>,
    pub employee_id: Option<Uuid>,
}

impl UserAccount {
    pub fn can_authenticate(&self) -> bool {
        self.status == UserStatus::Active
    }
}

/// Output of the (external) credential verification step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedLogin {
    pub account: UserAccount,
    /// A second factor is still outstanding; no tokens may be minted yet.
    pub requires_mfa: bool,
}
