use crate::utilities::errors::AppError;
use axum::{
    RequestPartsExt,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utilities::config::Config;

#[derive(Serialize, Deserialize, Debug)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condominium_id: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

/// Identity of the signed-in user as far as the explore filters care.
#[derive(Clone, PartialEq, Debug)]
pub struct CurrentUser {
    pub id: Uuid,
    pub condominium_id: Option<String>,
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            condominium_id: claims.condominium_id,
        }
    }
}

pub fn create_token(
    config: &Config,
    user_id: Uuid,
    condominium_id: Option<String>,
    expires_in: Duration,
) -> Result<String, AppError> {
    let now = Utc::now();
    let exp = now + expires_in;

    let claims = Claims {
        sub: user_id,
        condominium_id,
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };

    let encoding_key = EncodingKey::from_secret(config.jwt_secret_key.as_bytes());
    let encoded_token = encode(&Header::new(Algorithm::HS256), &claims, &encoding_key)?;
    Ok(encoded_token)
}

pub fn verify_token(config: &Config, token: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret_key.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Anonymous browsing is allowed, so a missing bearer token yields `None`.
/// A token that is present but invalid is still rejected.
pub struct OptionalCurrentUser(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalCurrentUser
where
    Config: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;
    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if !parts.headers.contains_key(AUTHORIZATION) {
            return Ok(Self(None));
        }

        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AppError::InvalidAuthorizationTokenError)?;

        let config = Config::from_ref(state);

        let claims = verify_token(&config, bearer.token())?;

        Ok(Self(Some(claims.into())))
    }
}
