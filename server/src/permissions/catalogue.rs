//! Economy permission catalogue.
//!
//! Every grant names exactly one [`Permission`] by its stable numeric id. The
//! ids are persisted, so variants are append-only.
//!
//! [`PermissionSet`] packs several permissions into a bitfield for the
//! set-membership checks (`has_any` / `has_all`).

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// A single economy permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Permission {
    /// Open a personal account.
    OpenAccount = 0,
    /// View an account's balance.
    ViewBalance = 1,
    /// Close an account.
    CloseAccount = 2,
    /// Send funds out of an account.
    TransferFunds = 3,
    /// Set up recurring transfers.
    CreateRecurringTransfer = 4,
    /// Create or destroy money.
    ManageFunds = 5,
    /// Edit tax brackets.
    ManageTaxBrackets = 6,
    /// Grant and revoke permissions.
    ManagePermissions = 7,
    /// Create, delete and (un)register economies.
    ManageEconomies = 8,
    /// Open government, corporation or charity accounts.
    OpenSpecialAccount = 9,
    /// Act as an account one does not own.
    LoginAsAccount = 10,
    /// Install economy plugins.
    InstallPlugins = 11,
}

impl Permission {
    /// Every permission, ordered by id.
    pub const ALL: [Self; 12] = [
        Self::OpenAccount,
        Self::ViewBalance,
        Self::CloseAccount,
        Self::TransferFunds,
        Self::CreateRecurringTransfer,
        Self::ManageFunds,
        Self::ManageTaxBrackets,
        Self::ManagePermissions,
        Self::ManageEconomies,
        Self::OpenSpecialAccount,
        Self::LoginAsAccount,
        Self::InstallPlugins,
    ];

    /// Stable numeric id, as stored in the `grants` table.
    #[must_use]
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Look a permission up by id.
    #[must_use]
    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|p| i64::from(p.id()) == id)
    }

    /// Human-readable name used in command choices and replies.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::OpenAccount => "Open account",
            Self::ViewBalance => "View balance",
            Self::CloseAccount => "Close account",
            Self::TransferFunds => "Transfer funds",
            Self::CreateRecurringTransfer => "Create recurring transfer",
            Self::ManageFunds => "Manage funds",
            Self::ManageTaxBrackets => "Manage tax brackets",
            Self::ManagePermissions => "Manage permissions",
            Self::ManageEconomies => "Manage economies",
            Self::OpenSpecialAccount => "Open special account",
            Self::LoginAsAccount => "Login as account",
            Self::InstallPlugins => "Install plugins",
        }
    }

    /// The single-bit set for this permission.
    #[must_use]
    pub const fn flag(self) -> PermissionSet {
        PermissionSet::from_bits_retain(1 << self.id())
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

bitflags! {
    /// Set of economy permissions, bit `n` standing for permission id `n`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct PermissionSet: u16 {
        const OPEN_ACCOUNT              = 1 << 0;
        const VIEW_BALANCE              = 1 << 1;
        const CLOSE_ACCOUNT             = 1 << 2;
        const TRANSFER_FUNDS            = 1 << 3;
        const CREATE_RECURRING_TRANSFER = 1 << 4;
        const MANAGE_FUNDS              = 1 << 5;
        const MANAGE_TAX_BRACKETS       = 1 << 6;
        const MANAGE_PERMISSIONS        = 1 << 7;
        const MANAGE_ECONOMIES          = 1 << 8;
        const OPEN_SPECIAL_ACCOUNT      = 1 << 9;
        const LOGIN_AS_ACCOUNT          = 1 << 10;
        const INSTALL_PLUGINS           = 1 << 11;
    }
}

impl PermissionSet {
    /// Iterate the permissions contained in this set, ordered by id.
    pub fn permissions(self) -> impl Iterator<Item = Permission> {
        Permission::ALL
            .into_iter()
            .filter(move |p| self.contains(p.flag()))
    }

    /// Numeric ids of the contained permissions, for binding into queries.
    #[must_use]
    pub fn ids(self) -> Vec<i16> {
        self.permissions().map(|p| i16::from(p.id())).collect()
    }
}

impl From<Permission> for PermissionSet {
    fn from(permission: Permission) -> Self {
        permission.flag()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::empty(), |set, p| set | p.flag())
    }
}
