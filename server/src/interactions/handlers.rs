//! Interaction, registrar and role-feed handlers.

use axum::extract::{Path, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use subtle::ConstantTimeEq;
use taubot_common::PlatformId;

use super::error::InteractionError;
use super::types::{
    interaction_type, CommandsResponse, Interaction, InteractionResponse, RolePositions,
};
use crate::api::AppState;

/// Compare a presented token against the configured one in constant time.
fn token_matches(expected: &str, presented: &str) -> bool {
    expected.as_bytes().ct_eq(presented.as_bytes()).into()
}

/// Reject requests that do not carry `Authorization: Bot <token>` when a
/// gateway token is configured.
pub async fn require_gateway_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, InteractionError> {
    if let Some(expected) = state.config.interactions_token.as_deref() {
        let presented = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bot "))
            .ok_or(InteractionError::Unauthorized)?;

        if !token_matches(expected, presented) {
            return Err(InteractionError::Unauthorized);
        }
    }

    Ok(next.run(request).await)
}

/// POST /interactions
#[tracing::instrument(skip(state, interaction), fields(kind = interaction.kind))]
pub async fn receive(
    State(state): State<AppState>,
    Json(interaction): Json<Interaction>,
) -> Result<Response, InteractionError> {
    match interaction.kind {
        interaction_type::PING => Ok(Json(InteractionResponse::pong()).into_response()),
        interaction_type::APPLICATION_COMMAND => {
            let invocation = interaction.into_invocation()?;
            let dispatcher = state.dispatcher.clone();
            match dispatcher.dispatch(state, invocation).await? {
                Some(reply) => Ok(Json(InteractionResponse::message(reply)).into_response()),
                None => Ok(StatusCode::NO_CONTENT.into_response()),
            }
        }
        interaction_type::AUTOCOMPLETE => {
            let invocation = interaction.into_invocation()?;
            let dispatcher = state.dispatcher.clone();
            match dispatcher.autocomplete(state, invocation).await? {
                Some(results) => Ok(Json(InteractionResponse::choices(results)).into_response()),
                None => Ok(StatusCode::NO_CONTENT.into_response()),
            }
        }
        other => Err(InteractionError::UnsupportedType(other)),
    }
}

/// GET /api/commands
///
/// Registrable projection of the command tree.
pub async fn list_commands(State(state): State<AppState>) -> Json<CommandsResponse> {
    Json(CommandsResponse {
        guild_id: state.config.command_guild_id.clone(),
        commands: state.dispatcher.tree().schema(),
    })
}

/// PUT /api/guilds/{guild_id}/roles
///
/// Replace the cached role positions of a guild.
#[tracing::instrument(skip(state, body), fields(roles = body.roles.len()))]
pub async fn update_role_positions(
    State(state): State<AppState>,
    Path(guild_id): Path<String>,
    Json(body): Json<RolePositions>,
) -> Result<StatusCode, InteractionError> {
    let guild_id = PlatformId::parse(guild_id)
        .map_err(|e| InteractionError::InvalidPayload(e.to_string()))?;

    state
        .roles
        .replace_guild(guild_id, body.roles.into_iter().map(|r| (r.id, r.position)));

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::token_matches;

    #[test]
    fn test_token_matches() {
        assert!(token_matches("secret", "secret"));
        assert!(!token_matches("secret", "secreT"));
        assert!(!token_matches("secret", "secret2"));
        assert!(!token_matches("secret", ""));
    }
}
