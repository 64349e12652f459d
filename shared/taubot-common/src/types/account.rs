//! Account Types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Kind of account held inside an economy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Personal account, one per user per economy.
    #[default]
    User,
    /// Government treasury.
    Government,
    /// Company account.
    Corporation,
    /// Charity account.
    Charity,
}

impl AccountType {
    /// Every account type, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::User,
        Self::Government,
        Self::Corporation,
        Self::Charity,
    ];

    /// Lowercase name used in storage and command choices.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Government => "government",
            Self::Corporation => "corporation",
            Self::Charity => "charity",
        }
    }

    /// Non-personal accounts need the special-account permission to open.
    #[must_use]
    pub const fn is_special(self) -> bool {
        !matches!(self, Self::User)
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnknownAccountType(s.to_string()))
    }
}

impl TryFrom<String> for AccountType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
