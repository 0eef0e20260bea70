use diesel::prelude::*;
use diesel::SqliteConnection;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;
use warp::Filter;

use crate::error::{self, WebError};
use crate::voting;
use super::db::{models, schema};
use super::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

/// Resolves the requesting user from a bearer token or the `session` cookie.
/// Anything that fails to verify is treated as an anonymous request.
pub fn current_user(
    state: AppState,
) -> impl Filter<Extract = (Option<voting::User>,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(warp::cookie::optional::<String>("session"))
        .and_then(move |authorization: Option<String>, session: Option<String>| {
            let state = state.clone();
            async move {
                if authorization.is_none() && session.is_none() {
                    return Ok(None);
                }
                tokio::task::spawn_blocking(move || {
                    identify(&state, authorization.as_deref(), session.as_deref())
                })
                .await
                .unwrap_or_else(|e| Err(WebError::internal(format!("Session lookup failed: {e}"))))
                .map_err(warp::reject::custom)
            }
        })
}

fn identify(
    state: &AppState,
    authorization: Option<&str>,
    session: Option<&str>,
) -> Result<Option<voting::User>, WebError> {
    let token = match authorization.and_then(|h| h.strip_prefix("Bearer ")).or(session) {
        Some(token) => token.trim(),
        None => return Ok(None),
    };

    let claims = match verify(&state.config.jwt_secret, token) {
        Some(claims) => claims,
        None => return Ok(None),
    };

    let mut conn = state.db.connection()?;
    resolve_user(&mut conn, &claims).map(Some)
}

fn verify(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| debug!("Ignoring session token: {e}"))
        .ok()
}

/// Finds the local user for the token subject, creating it on first sight and
/// keeping the display name in step with the token.
fn resolve_user(conn: &mut SqliteConnection, claims: &Claims) -> Result<voting::User, WebError> {
    let federated_id = claims.sub.hyphenated().to_string();

    let existing = schema::users::table
        .filter(schema::users::federated_id.eq(&federated_id))
        .select(models::User::as_select())
        .first(conn)
        .optional()
        .map_err(|e| error::db_get(e, "user", None))?;

    let user = match existing {
        Some(user) if user.display_name == claims.username => user,
        _ => {
            diesel::insert_into(schema::users::table)
                .values(&models::NewUser {
                    federated_id: federated_id.clone(),
                    display_name: &claims.username,
                })
                .on_conflict(schema::users::federated_id)
                .do_update()
                .set(schema::users::display_name.eq(&claims.username))
                .execute(conn)
                .map_err(|e| error::db_write(e, "user"))?;
            debug!(user = %claims.sub, "Registered session user");

            schema::users::table
                .filter(schema::users::federated_id.eq(&federated_id))
                .select(models::User::as_select())
                .first(conn)
                .map_err(|e| error::db_get(e, "user", None))?
        }
    };

    voting::User::try_from(user)
        .map_err(|e| WebError::internal(format!("Stored user has a malformed id: {e}")))
}

#[cfg(test)]
pub fn issue_token(secret: &str, sub: Uuid, username: &str) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let claims = Claims {
        sub,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(1)).timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .expect("token encodes")
}
