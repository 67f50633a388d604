//! Connections to the PostgreSQL curated store.

use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use std::time::Duration;
use thiserror::Error;
use tokio_postgres::{
    Client, Config, NoTls, Socket,
    config::SslMode,
    tls::{MakeTlsConnect, TlsConnect},
};
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("Invalid connection URL: {0}")]
    InvalidUrl(String),

    #[error("TLS setup failed: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("Postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),
}

const APPLICATION_NAME: &str = "c360";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connects honouring the `sslmode` of the URL; `prefer` falls back to a
/// plain connection when the TLS handshake fails.
pub async fn connect_client(url: &str) -> Result<Client, ConnectError> {
    let mut config = url
        .parse::<Config>()
        .map_err(|e| ConnectError::InvalidUrl(e.to_string()))?;
    if config.get_application_name().is_none() {
        config.application_name(APPLICATION_NAME);
    }
    if config.get_connect_timeout().is_none() {
        config.connect_timeout(CONNECT_TIMEOUT);
    }

    match config.get_ssl_mode() {
        SslMode::Disable => open(&config, NoTls).await,
        SslMode::Prefer => match open(&config, tls()?).await {
            Ok(client) => Ok(client),
            Err(error) => {
                warn!(%error, "Postgres TLS handshake failed, retrying without TLS");
                open(&config, NoTls).await
            }
        },
        _ => open(&config, tls()?).await,
    }
}

fn tls() -> Result<MakeTlsConnector, ConnectError> {
    Ok(MakeTlsConnector::new(TlsConnector::builder().build()?))
}

/// Opens the session and drives its connection future on a background task.
async fn open<T>(config: &Config, tls: T) -> Result<Client, ConnectError>
where
    T: MakeTlsConnect<Socket> + Send,
    T::Stream: Send + 'static,
    T::TlsConnect: Send,
    <T::TlsConnect as TlsConnect<Socket>>::Future: Send,
{
    let (client, connection) = config.connect(tls).await?;
    tokio::spawn(async move {
        if let Err(err) = connection.await {
            error!(%err, "Postgres connection closed with an error");
        }
    });
    Ok(client)
}
