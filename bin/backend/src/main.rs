//! SlapHard Backend Binary
//!
//! Hosts realtime game rooms over WebSocket on PORT (default 8080).

#[tokio::main]
async fn main() {
    slap_core::log();
    slap_core::kys();
    slap_server::run().await.unwrap();
}
