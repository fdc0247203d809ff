use actix_web::HttpRequest;
use actix_web::HttpResponse;
use actix_web::web;
use futures::StreamExt;
use slap_engine::ErrorCode;
use slap_engine::UserId;
use slap_room::ClientCommand;
use slap_room::Hub;
use slap_room::ServerEvent;
use slap_room::SocketId;
use slap_room::now_ms;
use std::sync::Arc;
use tokio::sync::mpsc::unbounded_channel;

/// Performs the websocket upgrade and detaches the session pump.
pub async fn connect(
    hub: web::Data<Hub>,
    req: HttpRequest,
    body: web::Payload,
) -> actix_web::Result<HttpResponse> {
    let (response, session, stream) = actix_ws::handle(&req, body)?;
    actix_web::rt::spawn(run(hub.into_inner(), session, stream));
    Ok(response)
}

/// One task per socket: pumps outbound JSON from the registry channel and
/// decodes inbound frames. The socket starts under a provisional user id;
/// a join carrying a recognized userId re-keys it.
async fn run(hub: Arc<Hub>, mut session: actix_ws::Session, mut stream: actix_ws::MessageStream) {
    let socket = SocketId::default();
    let (tx, mut rx) = unbounded_channel::<String>();
    hub.registry().register(socket, UserId::default(), tx).await;
    log::debug!("[session {}] connected", socket);
    'sesh: loop {
        tokio::select! {
            biased;
            outbound = rx.recv() => match outbound {
                Some(json) => if session.text(json).await.is_err() { break 'sesh },
                None => break 'sesh,
            },
            inbound = stream.next() => match inbound {
                Some(Ok(actix_ws::Message::Text(text))) => {
                    receive(&hub, socket, &text).await
                }
                Some(Ok(actix_ws::Message::Ping(bytes))) => {
                    if session.pong(&bytes).await.is_err() { break 'sesh }
                }
                Some(Ok(actix_ws::Message::Close(_))) => break 'sesh,
                Some(Err(_)) => break 'sesh,
                None => break 'sesh,
                _ => continue 'sesh,
            },
        }
    }
    hub.disconnect(socket).await;
    log::debug!("[session {}] disconnected", socket);
}

/// Decodes one inbound frame. Pings turn around here without touching any
/// room queue; everything else routes through the hub.
async fn receive(hub: &Arc<Hub>, socket: SocketId, text: &str) {
    match serde_json::from_str::<ClientCommand>(text) {
        Ok(ClientCommand::Ping { client_time }) => {
            let pong = ServerEvent::Pong {
                server_time: now_ms(),
                client_time_echo: client_time,
            };
            hub.registry().emit_to_socket(socket, &pong.to_json()).await;
        }
        Ok(command) => hub.dispatch(socket, command).await,
        Err(e) => {
            log::debug!("[session {}] malformed command: {}", socket, e);
            let error = ServerEvent::error(ErrorCode::InternalError, "unrecognized command");
            hub.registry().emit_to_socket(socket, &error.to_json()).await;
        }
    }
}
