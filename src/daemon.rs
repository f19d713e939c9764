//! Client for the daemon-control socket: a line-based text protocol over
//! plain TCP. The client sends `USERPASS <user> <pass>\n<command>\n` and the
//! server replies with free text until it closes the connection.

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config::DaemonConfig;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("connection to {0} timed out")]
    ConnectTimeout(String),
}

#[derive(Debug, Clone)]
pub struct DaemonClient {
    addr: String,
    user: String,
    pass: String,
    connect_timeout: Duration,
}

impl DaemonClient {
    pub fn new(config: &DaemonConfig) -> Self {
        Self {
            addr: config.addr.clone(),
            user: config.user.clone(),
            pass: config.pass.clone(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
        }
    }

    /// Send one command and relay the raw text response. Failures are
    /// reported inline as `Error: <reason>` text, the same way the status
    /// is shown to admin-panel users.
    pub async fn send(&self, command: &str) -> String {
        match self.round_trip(command).await {
            Ok(response) => response,
            Err(e) => format!("Error: {e}"),
        }
    }

    pub async fn status(&self, project: &str) -> String {
        self.send(&format!("STATUS {project}")).await
    }

    pub async fn start(&self, project: &str) -> String {
        self.send(&format!("START {project}")).await
    }

    pub async fn stop(&self, project: &str) -> String {
        self.send(&format!("STOP {project}")).await
    }

    pub async fn add(&self, project: &str) -> String {
        self.send(&format!("ADD {project}")).await
    }

    async fn round_trip(&self, command: &str) -> Result<String, DaemonError> {
        let mut stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| DaemonError::ConnectTimeout(self.addr.clone()))??;

        let request = format!("USERPASS {} {}\n{}\n", self.user, self.pass, command);
        stream.write_all(request.as_bytes()).await?;

        // The server signals the end of its reply by closing the connection.
        let mut response = String::new();
        stream.read_to_string(&mut response).await?;
        Ok(response)
    }
}
