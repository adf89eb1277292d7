use actix::prelude::*;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use log::{info, warn};
use std::sync::Arc;
use uuid::Uuid;

use super::hub::Hub;
use crate::error::GameError;
use crate::models::{AppState, ClientMessage, LiveMessage, MoveRequest, ServerMessage};
use crate::services::GameService;

/// Read-only live view of the shared board; commits go through the HTTP API
pub struct LiveSession {
    pub id: String,
    pub hub: Arc<Hub>,
    pub service: GameService,
}

impl Actor for LiveSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.hub.join(&self.id, ctx.address());
        self.handle_sync(ctx);
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        self.hub.leave(&self.id);
        Running::Stop
    }
}

impl Handler<LiveMessage> for LiveSession {
    type Result = ();

    fn handle(&mut self, msg: LiveMessage, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for LiveSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => ctx.pong(&msg),
            Ok(ws::Message::Pong(_)) => {}
            Ok(ws::Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => self.handle_message(client_msg, ctx),
                Err(e) => {
                    warn!("Error parsing client message: {}", e);
                    send(ctx, &bad_request(format!("Invalid message format: {}", e)));
                }
            },
            Ok(ws::Message::Binary(_)) => {
                warn!("Binary messages are not supported");
                send(ctx, &bad_request("Binary messages are not supported"));
            }
            Ok(ws::Message::Close(reason)) => {
                info!("Connection {} closed: {:?}", self.id, reason);
                ctx.close(reason);
                ctx.stop();
            }
            _ => ctx.stop(),
        }
    }
}

impl LiveSession {
    pub fn handle_message(&mut self, msg: ClientMessage, ctx: &mut ws::WebsocketContext<Self>) {
        match msg.message_type.as_str() {
            "sync" => self.handle_sync(ctx),
            "preview" => self.handle_preview(msg, ctx),
            other => {
                warn!("Unknown message type: {}", other);
                send(ctx, &bad_request(format!("Unknown message type: {}", other)));
            }
        }
    }

    fn handle_sync(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        let service = self.service.clone();
        let fut = async move { service.game_view().await };
        ctx.spawn(fut.into_actor(self).map(|result, _act, ctx| match result {
            Ok(view) => send(ctx, &ServerMessage::game_state(view.game)),
            Err(err) => send(ctx, &ServerMessage::error(&err)),
        }));
    }

    fn handle_preview(&mut self, msg: ClientMessage, ctx: &mut ws::WebsocketContext<Self>) {
        let (Some(from), Some(to)) = (msg.from, msg.to) else {
            send(ctx, &bad_request("Preview needs from and to squares"));
            return;
        };
        let request = MoveRequest {
            from,
            to,
            promotion: msg.promotion,
        };
        let service = self.service.clone();
        let fut = async move { service.propose_move(&request).await };
        ctx.spawn(fut.into_actor(self).map(|result, _act, ctx| match result {
            Ok(candidate) => send(ctx, &ServerMessage::candidate(candidate)),
            Err(err) => send(ctx, &ServerMessage::error(&err)),
        }));
    }
}

fn bad_request(reason: impl Into<String>) -> ServerMessage {
    ServerMessage::error(&GameError::BadRequest(reason.into()))
}

fn send(ctx: &mut ws::WebsocketContext<LiveSession>, message: &ServerMessage) {
    match serde_json::to_string(message) {
        Ok(text) => ctx.text(text),
        Err(e) => warn!("Error serializing {} message: {}", message.message_type, e),
    }
}

/// Upgrade a request to a live session
pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session = LiveSession {
        id: Uuid::new_v4().to_string(),
        hub: app_state.hub.clone(),
        service: app_state.service.clone(),
    };
    info!("New live session {}", session.id);
    ws::start(session, &req, stream)
}
