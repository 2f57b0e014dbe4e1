//! Test helpers for integration tests
//!
//! Provides utilities for spawning test servers and driving gateway
//! connections over a real WebSocket.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures_util::{SinkExt, StreamExt};
use relay_common::{AppConfig, JwtService};
use relay_core::Snowflake;
use relay_gateway::protocol::CloseCode;
use relay_gateway::{create_app, create_gateway_state};
use reqwest::{Client, Response};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::fixtures::{command_frame, heartbeat_frame, identify_frame, TEST_SECRET};

/// How long a test waits for a single frame
const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Counter for unique test ports
static PORT_COUNTER: AtomicU16 = AtomicU16::new(19000);

/// Get a unique port for testing
pub fn get_test_port() -> u16 {
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Test server instance that manages lifecycle
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    jwt: JwtService,
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a new test server on the in-memory store
    pub async fn start() -> Result<Self> {
        let port = get_test_port();
        Self::start_with_config(AppConfig::local(port, TEST_SECRET)).await
    }

    /// Start a test server with custom config
    pub async fn start_with_config(config: AppConfig) -> Result<Self> {
        let addr: SocketAddr = config.gateway.address().parse()?;
        let jwt = JwtService::new(&config.jwt.secret, config.jwt.access_token_expiry);

        // Create gateway state
        let state = create_gateway_state(config).await?;

        // Build application
        let app = create_app(state);

        // Bind to port
        let listener = TcpListener::bind(addr).await?;
        let actual_addr = listener.local_addr()?;

        // Spawn server task
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        // Create HTTP client
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            addr: actual_addr,
            client,
            jwt,
            _handle: handle,
        })
    }

    /// Get base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the gateway URL
    pub fn gateway_url(&self) -> String {
        format!("ws://{}/gateway", self.addr)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.client.get(&url).send().await?)
    }

    /// Issue an access token for a user
    pub fn token_for(&self, user_id: Snowflake) -> Result<String> {
        Ok(self.jwt.issue_access_token(user_id)?)
    }

    /// Open a socket without identifying
    pub async fn open(&self) -> Result<GatewayClient> {
        GatewayClient::connect(&self.gateway_url()).await
    }

    /// Open a socket and identify as `user_id`, returning the READY payload
    pub async fn connect_as(&self, user_id: Snowflake) -> Result<(GatewayClient, Value)> {
        let mut client = self.open().await?;
        client.send(identify_frame(&self.token_for(user_id)?)).await?;
        let ready = client.expect_event("READY").await?;
        Ok((client, ready))
    }
}

/// A client side of one gateway socket
pub struct GatewayClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    /// Heartbeat interval announced in Hello
    pub heartbeat_interval: u64,
}

impl GatewayClient {
    /// Connect and consume the Hello frame
    pub async fn connect(url: &str) -> Result<Self> {
        let (stream, _) = connect_async(url).await?;
        let mut client = Self {
            stream,
            heartbeat_interval: 0,
        };

        let hello = client.recv().await?;
        if hello["op"] != 10 {
            bail!("Expected Hello, got {hello}");
        }
        client.heartbeat_interval = hello["d"]["heartbeat_interval"]
            .as_u64()
            .context("Hello without heartbeat_interval")?;

        Ok(client)
    }

    /// Send a raw frame
    pub async fn send(&mut self, frame: Value) -> Result<()> {
        self.stream.send(Message::Text(frame.to_string())).await?;
        Ok(())
    }

    /// Send a command frame
    pub async fn command(&mut self, name: &str, data: Value) -> Result<()> {
        self.send(command_frame(name, data)).await
    }

    /// Send a heartbeat frame
    pub async fn heartbeat(&mut self) -> Result<()> {
        self.send(heartbeat_frame()).await
    }

    /// Receive the next JSON frame
    pub async fn recv(&mut self) -> Result<Value> {
        loop {
            let message = tokio::time::timeout(FRAME_TIMEOUT, self.stream.next())
                .await
                .context("Timed out waiting for a frame")?
                .context("Socket ended")??;

            match message {
                Message::Text(text) => return Ok(serde_json::from_str(&text)?),
                Message::Close(frame) => bail!("Socket closed: {frame:?}"),
                _ => {}
            }
        }
    }

    /// Skip frames until a dispatch named `event`, returning its payload
    pub async fn expect_event(&mut self, event: &str) -> Result<Value> {
        loop {
            let frame = self.recv().await?;
            if frame["op"] == 0 && frame["t"] == event {
                return Ok(frame["d"].clone());
            }
        }
    }

    /// Skip frames until one with op code `op`
    pub async fn expect_op(&mut self, op: u8) -> Result<Value> {
        loop {
            let frame = self.recv().await?;
            if frame["op"] == op {
                return Ok(frame);
            }
        }
    }

    /// Wait for the server to close the socket, returning the close code
    pub async fn expect_close(&mut self) -> Result<CloseCode> {
        loop {
            let message = tokio::time::timeout(FRAME_TIMEOUT, self.stream.next())
                .await
                .context("Timed out waiting for close")?
                .context("Socket ended without a close frame")??;

            if let Message::Close(frame) = message {
                let frame = frame.context("Close frame without a code")?;
                let code = u16::from(frame.code);
                return CloseCode::from_u16(code)
                    .with_context(|| format!("Not a gateway close code: {code}"));
            }
        }
    }

    /// Fail if a dispatch named `event` arrives within `window`
    pub async fn assert_no_event(&mut self, event: &str, window: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + window;
        loop {
            let Ok(next) = tokio::time::timeout_at(deadline, self.stream.next()).await else {
                return Ok(());
            };
            let Some(message) = next else {
                return Ok(());
            };
            if let Message::Text(text) = message? {
                let frame: Value = serde_json::from_str(&text)?;
                if frame["op"] == 0 && frame["t"] == event {
                    bail!("Unexpected {event}: {frame}");
                }
            }
        }
    }

    /// Close the socket from the client side
    pub async fn close(mut self) -> Result<()> {
        self.stream.close(None).await?;
        Ok(())
    }
}
