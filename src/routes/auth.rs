use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest};
use futures::future::{ready, Ready};

use crate::error::GameError;
use crate::models::Player;

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USER_NAME_HEADER: &str = "X-User-Name";
pub const CREDIT_SECRET_HEADER: &str = "X-Credit-Secret";

fn header<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Identity asserted by the authenticating proxy in front of the server
impl FromRequest for Player {
    type Error = GameError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let player = header(req, USER_ID_HEADER).map(|id| {
            let name = header(req, USER_NAME_HEADER).unwrap_or(id);
            Player::new(id, name)
        });
        ready(player.ok_or(GameError::Unauthenticated))
    }
}

/// Whether the request may credit tokens; open when no secret is configured
pub fn has_credit_secret(req: &HttpRequest, expected: Option<&str>) -> bool {
    match (expected, header(req, CREDIT_SECRET_HEADER)) {
        (None, _) => true,
        (Some(expected), Some(given)) => expected == given,
        (Some(_), None) => false,
    }
}
