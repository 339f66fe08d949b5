//! Subscriber session: one WebSocket viewer bound to one multiplexer
//! subscription.

use std::sync::Arc;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};

use crate::mux::PlaneUpdates;
use crate::web::AppState;

/// `GET /events`
pub async fn events(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let mux = Arc::clone(&state.mux);
    ws.on_upgrade(move |socket| run_session(socket, mux))
}

/// Stream snapshots to `socket` as JSON text frames until the viewer goes
/// away or the subscription is stopped. Always unsubscribes on exit.
pub async fn run_session(socket: WebSocket, mux: Arc<PlaneUpdates>) {
    let mut subscription = mux.subscribe();
    let id = subscription.id();
    let (mut sink, mut incoming) = socket.split();

    loop {
        tokio::select! {
            update = subscription.next() => {
                let Some(snapshot) = update else {
                    let _ = sink
                        .send(Message::Close(Some(CloseFrame {
                            code: close_code::AWAY,
                            reason: "server shutting down".into(),
                        })))
                        .await;
                    break;
                };
                let text = match serde_json::to_string(snapshot.as_ref()) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(subscriber = id, error = %e, "snapshot not serializable");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text)).await {
                    tracing::debug!(subscriber = id, error = %e, "viewer send failed");
                    break;
                }
            }
            msg = incoming.next() => match msg {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::debug!(subscriber = id, error = %e, "viewer connection error");
                    break;
                }
                // Viewers have nothing to say; pings are answered by axum
                Some(Ok(_)) => {}
            },
        }
    }

    mux.unsubscribe(id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::time::Duration;

    use futures_util::StreamExt as _;
    use modes_core::{AdsbLevel, IcaoAddress, Plane};
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    use crate::mux::UpdateMultiplexer;
    use crate::web::build_router;

    async fn start_server() -> (SocketAddr, Arc<PlaneUpdates>) {
        let mux: Arc<PlaneUpdates> = Arc::new(UpdateMultiplexer::new(16));
        let app = build_router(
            Arc::new(AppState {
                mux: Arc::clone(&mux),
            }),
            None,
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, mux)
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_session_streams_json_snapshots() {
        let (addr, mux) = start_server().await;
        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/events"))
            .await
            .unwrap();
        wait_for(|| mux.subscriber_count() == 1).await;

        let mut plane = Plane::new(IcaoAddress::new(0x4840D6), AdsbLevel::Level2, 1.0);
        plane.set_identification("KLM1023");
        plane.altitude_ft = 38000;
        mux.publisher()
            .publish(Arc::new(plane.snapshot()))
            .await
            .unwrap();

        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let WsMessage::Text(text) = msg else {
            panic!("expected text frame, got {msg:?}");
        };
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["address"], "4840D6");
        assert_eq!(json["identification"], "KLM1023");
        assert_eq!(json["altitude"], 38000);
        assert_eq!(json["adsb_level"], "level 2");

        ws.close(None).await.unwrap();
        wait_for(|| mux.subscriber_count() == 0).await;
    }

    #[tokio::test]
    async fn test_dropped_connection_unsubscribes() {
        let (addr, mux) = start_server().await;
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/events"))
            .await
            .unwrap();
        wait_for(|| mux.subscriber_count() == 1).await;

        drop(ws);
        wait_for(|| mux.subscriber_count() == 0).await;
    }

    #[tokio::test]
    async fn test_shutdown_closes_viewer() {
        let (addr, mux) = start_server().await;
        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/events"))
            .await
            .unwrap();
        wait_for(|| mux.subscriber_count() == 1).await;

        mux.shutdown().await;

        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(matches!(msg, WsMessage::Close(_)));
    }
}
