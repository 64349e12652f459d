//! Interaction wire types.
//!
//! Field names and numeric codes follow the chat platform's interaction
//! payloads. Only the fields the dispatcher needs are modelled.

use serde::{Deserialize, Serialize};
use taubot_common::{PlatformId, Principal};

use super::error::InteractionError;
use crate::commands::{
    AutocompleteResult, CommandSchema, EntryKind, Invocation, InvocationOption, OptionChoice,
    OptionKind, OptionValue, Reply,
};

/// Interaction type codes.
pub mod interaction_type {
    pub const PING: u8 = 1;
    pub const APPLICATION_COMMAND: u8 = 2;
    pub const AUTOCOMPLETE: u8 = 4;
}

/// Response type codes.
pub mod response_type {
    pub const PONG: u8 = 1;
    pub const CHANNEL_MESSAGE: u8 = 4;
    pub const AUTOCOMPLETE_RESULT: u8 = 8;
}

/// Option type codes for the two selector kinds.
const SUBCOMMAND: u8 = 1;
const SUBCOMMAND_GROUP: u8 = 2;

/// Message flag that hides a reply from everyone but the invoker.
pub const EPHEMERAL_FLAG: u32 = 1 << 6;

/// Most suggestions the platform accepts in one autocomplete response.
pub const MAX_CHOICES: usize = 25;

#[derive(Debug, Clone, Deserialize)]
pub struct Interaction {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub guild_id: Option<PlatformId>,
    #[serde(default)]
    pub channel_id: Option<PlatformId>,
    /// Present for guild invocations.
    #[serde(default)]
    pub member: Option<Member>,
    /// Present for direct-message invocations.
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub data: Option<CommandData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Member {
    pub user: User,
    #[serde(default)]
    pub roles: Vec<PlatformId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: PlatformId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandData {
    pub name: String,
    #[serde(default)]
    pub options: Vec<WireOption>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireOption {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub value: Option<OptionValue>,
    #[serde(default)]
    pub focused: bool,
    #[serde(default)]
    pub options: Vec<WireOption>,
}

impl TryFrom<WireOption> for InvocationOption {
    type Error = InteractionError;

    fn try_from(wire: WireOption) -> Result<Self, Self::Error> {
        let kind = match wire.kind {
            SUBCOMMAND => EntryKind::Subcommand,
            SUBCOMMAND_GROUP => EntryKind::SubcommandGroup,
            code => EntryKind::Value(OptionKind::from_wire(code).ok_or_else(|| {
                InteractionError::InvalidPayload(format!(
                    "option `{}` has unsupported type {code}",
                    wire.name
                ))
            })?),
        };

        // Focused values are partial user input and may not parse as their kind yet.
        if let (EntryKind::Value(option_kind), Some(value), false) =
            (kind, wire.value.as_ref(), wire.focused)
        {
            if !option_kind.accepts(value) {
                return Err(InteractionError::InvalidPayload(format!(
                    "option `{}` does not carry a {option_kind:?} value",
                    wire.name
                )));
            }
        }

        Ok(Self {
            name: wire.name,
            kind,
            value: wire.value,
            focused: wire.focused,
            options: wire
                .options
                .into_iter()
                .map(Self::try_from)
                .collect::<Result<_, _>>()?,
        })
    }
}

impl Interaction {
    /// Principal for the invoking user, with roles and guild when in a guild.
    pub fn principal(&self) -> Result<Principal, InteractionError> {
        let (user, roles) = match (&self.member, &self.user) {
            (Some(member), _) => (&member.user, member.roles.clone()),
            (None, Some(user)) => (user, Vec::new()),
            (None, None) => {
                return Err(InteractionError::InvalidPayload(
                    "interaction has no invoking user".into(),
                ))
            }
        };

        let principal = Principal::new(user.id.clone()).with_roles(roles);
        Ok(match &self.guild_id {
            Some(guild) => principal.in_guild(guild.clone()),
            None => principal,
        })
    }

    /// Convert a command or autocomplete interaction into an invocation.
    pub fn into_invocation(self) -> Result<Invocation, InteractionError> {
        let principal = self.principal()?;
        let data = self
            .data
            .ok_or_else(|| InteractionError::InvalidPayload("interaction has no data".into()))?;

        Ok(Invocation {
            command: data.name,
            options: data
                .options
                .into_iter()
                .map(InvocationOption::try_from)
                .collect::<Result<_, _>>()?,
            principal,
            channel_id: self.channel_id,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseData {
    Message {
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        flags: Option<u32>,
    },
    Choices {
        choices: Vec<OptionChoice>,
    },
}

impl InteractionResponse {
    #[must_use]
    pub const fn pong() -> Self {
        Self {
            kind: response_type::PONG,
            data: None,
        }
    }

    #[must_use]
    pub fn message(reply: Reply) -> Self {
        Self {
            kind: response_type::CHANNEL_MESSAGE,
            data: Some(ResponseData::Message {
                content: reply.content,
                flags: reply.ephemeral.then_some(EPHEMERAL_FLAG),
            }),
        }
    }

    /// Merge the suggestions of every focused option, capped at [`MAX_CHOICES`].
    #[must_use]
    pub fn choices(results: Vec<AutocompleteResult>) -> Self {
        let choices = results
            .into_iter()
            .flat_map(|r| r.choices)
            .take(MAX_CHOICES)
            .collect();
        Self {
            kind: response_type::AUTOCOMPLETE_RESULT,
            data: Some(ResponseData::Choices { choices }),
        }
    }
}

/// Body of `PUT /api/guilds/{guild_id}/roles`.
#[derive(Debug, Clone, Deserialize)]
pub struct RolePositions {
    pub roles: Vec<RolePosition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RolePosition {
    pub id: PlatformId,
    pub position: i64,
}

/// Body of `GET /api/commands`.
#[derive(Debug, Clone, Serialize)]
pub struct CommandsResponse {
    /// Guild the registrar should scope registration to; global when absent.
    pub guild_id: Option<PlatformId>,
    pub commands: Vec<CommandSchema>,
}
