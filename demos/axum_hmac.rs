use std::net::SocketAddr;

use axum::{Router, routing::get};
use time::Duration;
use tower_sessions_jwt_cookie_store::{JwtSessionConfig, JwtSessionManagerLayer, SameSite, Session};

async fn index(session: Session) -> String {
    let n: usize = session
        .get("n")
        .await
        .expect("session get succeeds")
        .unwrap_or(0);
    session
        .insert("n", n + 1)
        .await
        .expect("session insert succeeds");
    format!("n={n}")
}

#[tokio::main]
async fn main() {
    let session_config = JwtSessionConfig::default()
        // Default: "jwt_session"
        .with_prefix("jwt_session")
        // Default: 4000
        .with_chunk_size(4000)
        // Default: 100
        .with_max_chunk_index(100)
        // Default: 24 minutes
        .with_max_lifetime(Duration::hours(1))
        // Default: true
        .with_http_only(true)
        // Default: SameSite::Strict
        .with_same_site(SameSite::Strict)
        // Default: true (set to false for local HTTP development)
        .with_secure(false)
        // Default: "/"
        .with_path("/")
        // Default: None
        .without_domain()
        // Default: true
        .with_refresh_on_activity(true);
    let session_layer =
        JwtSessionManagerLayer::hmac(b"change me: demo signing secret").with_config(session_config);

    let app = Router::new().route("/", get(index)).layer(session_layer);

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("tcp listener binds successfully");
    let local_addr = listener.local_addr().expect("local address is available");
    println!("listening at http://{local_addr}");

    axum::serve(listener, app)
        .await
        .expect("server runs successfully");
}
