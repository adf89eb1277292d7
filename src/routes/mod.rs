use actix_web::{web, HttpRequest, HttpResponse};
use log::debug;
use serde_json::json;
use std::future::Future;

use crate::error::{GameError, GameResult};
use crate::models::{AppState, CreditRequest, LegalQuery, LimitQuery, MoveRequest, PageQuery, Player};

pub mod auth;

const DEFAULT_ARCHIVE_LIMIT: usize = 20;

/// Re-run `op` while it loses transaction races, up to `attempts` tries in total
async fn with_retries<T, F, Fut>(attempts: u32, mut op: F) -> GameResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = GameResult<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(GameError::TransactionConflict) if attempt < attempts => {
                debug!("Transaction conflict on attempt {}, retrying", attempt);
                attempt += 1;
            }
            other => return other,
        }
    }
}

pub async fn get_game(state: web::Data<AppState>) -> GameResult<HttpResponse> {
    let view = state.service.game_view().await?;
    Ok(HttpResponse::Ok().json(view))
}

pub async fn acquire_lock(state: web::Data<AppState>, player: Player) -> GameResult<HttpResponse> {
    let grant = with_retries(state.max_attempts, || state.service.acquire_lock(&player)).await?;
    Ok(HttpResponse::Ok().json(grant))
}

pub async fn release_lock(state: web::Data<AppState>, player: Player) -> GameResult<HttpResponse> {
    let released = with_retries(state.max_attempts, || state.service.release_lock(&player)).await?;
    Ok(HttpResponse::Ok().json(json!({ "released": released })))
}

pub async fn preview_move(
    state: web::Data<AppState>,
    body: web::Json<MoveRequest>,
) -> GameResult<HttpResponse> {
    let candidate = state.service.propose_move(&body).await?;
    Ok(HttpResponse::Ok().json(candidate))
}

pub async fn commit_move(
    state: web::Data<AppState>,
    player: Player,
    body: web::Json<MoveRequest>,
) -> GameResult<HttpResponse> {
    let committed =
        with_retries(state.max_attempts, || state.service.commit_move(&player, &body)).await?;
    Ok(HttpResponse::Ok().json(committed))
}

pub async fn list_moves(
    state: web::Data<AppState>,
    query: web::Query<PageQuery>,
) -> GameResult<HttpResponse> {
    let page = state.service.move_page(query.page.unwrap_or(1)).await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn legal_moves(
    state: web::Data<AppState>,
    query: web::Query<LegalQuery>,
) -> GameResult<HttpResponse> {
    let destinations = state.service.legal_destinations(&query.from).await?;
    Ok(HttpResponse::Ok().json(json!({ "from": query.from, "destinations": destinations })))
}

pub async fn my_account(state: web::Data<AppState>, player: Player) -> GameResult<HttpResponse> {
    let account = state.service.account(&player.id).await?;
    Ok(HttpResponse::Ok().json(account))
}

pub async fn credit_tokens(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<CreditRequest>,
) -> GameResult<HttpResponse> {
    if !auth::has_credit_secret(&req, state.credit_secret.as_deref()) {
        return Err(GameError::Unauthenticated);
    }
    let balance = with_retries(state.max_attempts, || {
        state.service.credit_tokens(&body.user_id, body.amount)
    })
    .await?;
    Ok(HttpResponse::Ok().json(json!({ "userId": body.user_id, "balance": balance })))
}

pub async fn list_games(
    state: web::Data<AppState>,
    query: web::Query<LimitQuery>,
) -> GameResult<HttpResponse> {
    let limit = query.limit.unwrap_or(DEFAULT_ARCHIVE_LIMIT);
    let games = state.service.finished_games(limit).await?;
    Ok(HttpResponse::Ok().json(games))
}

pub async fn get_finished_game(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> GameResult<HttpResponse> {
    let game = state.service.finished_game(&id).await?;
    Ok(HttpResponse::Ok().json(game))
}

/// Configure the HTTP routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/ws").route(web::get().to(crate::websocket::ws_index)))
        .service(
            web::scope("/api")
                .service(web::resource("/game").route(web::get().to(get_game)))
                .service(
                    web::resource("/lock")
                        .route(web::post().to(acquire_lock))
                        .route(web::delete().to(release_lock)),
                )
                .service(web::resource("/moves/preview").route(web::post().to(preview_move)))
                .service(web::resource("/moves/legal").route(web::get().to(legal_moves)))
                .service(
                    web::resource("/moves")
                        .route(web::get().to(list_moves))
                        .route(web::post().to(commit_move)),
                )
                .service(web::resource("/users/me").route(web::get().to(my_account)))
                .service(web::resource("/tokens/credit").route(web::post().to(credit_tokens)))
                .service(web::resource("/games").route(web::get().to(list_games)))
                .service(web::resource("/games/{id}").route(web::get().to(get_finished_game))),
        );
}
