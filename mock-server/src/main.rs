use mock_server::{MockState, DEFAULT_PASSWORD, DEFAULT_USERNAME};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let username = std::env::var("MOCK_USERNAME").unwrap_or_else(|_| DEFAULT_USERNAME.to_string());
    let password = std::env::var("MOCK_PASSWORD").unwrap_or_else(|_| DEFAULT_PASSWORD.to_string());

    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, %username, "mock TaguchiMail API listening");
    mock_server::run_with_state(listener, MockState::new(&username, &password)).await
}
