//! TCP connection to the race server and the bot's racing loop

use crate::race_view::RaceView;
use log::{debug, info, warn};
use rand::Rng;
use shared::{ClientMessage, ProtocolError, ServerMessage};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::{sleep_until, Instant};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("server closed the connection")]
    Closed,
    #[error("expected an id from the server, got {0:?}")]
    Handshake(String),
}

/// How a finished race looked from this client
#[derive(Debug, Clone)]
pub struct RaceOutcome {
    pub id: u32,
    pub winner: String,
    pub clicks_sent: u32,
    pub countdown: Vec<u8>,
    pub own_progress: u8,
}

/// Timing of the bot's clicks
#[derive(Debug, Clone, Copy)]
pub struct ClickPace {
    pub interval: Duration,
    /// Upper bound of the random delay added to every interval
    pub jitter: Duration,
}

impl ClickPace {
    fn next_delay(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let extra = if jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=jitter_ms)
        } else {
            0
        };
        self.interval + Duration::from_millis(extra)
    }
}

enum Event {
    Line(std::io::Result<Option<String>>),
    ClickDue,
}

#[derive(Debug)]
pub struct RaceClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
    id: u32,
    clicks_sent: u32,
    pub view: RaceView,
}

impl RaceClient {
    /// Connects, waits for the assigned id and sends the display name
    pub async fn connect(server_addr: &str, name: &str) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(server_addr).await?;
        let (reader, writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        let first = lines.next_line().await?.ok_or(ClientError::Closed)?;
        let id = match first.parse::<ServerMessage>() {
            Ok(ServerMessage::Assigned { id }) => id,
            _ => return Err(ClientError::Handshake(first)),
        };

        let mut view = RaceView::new();
        view.id = Some(id);

        let mut client = Self {
            lines,
            writer,
            id,
            clicks_sent: 0,
            view,
        };
        client.send_line(name).await?;
        info!("Connected as horse {} ({})", id, name);

        Ok(client)
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub async fn send(&mut self, message: &ClientMessage) -> Result<(), ClientError> {
        self.send_line(&message.to_string()).await
    }

    async fn send_line(&mut self, line: &str) -> Result<(), ClientError> {
        self.writer
            .write_all(format!("{}\n", line).as_bytes())
            .await?;
        Ok(())
    }

    /// Reads the next server line and folds it into the view
    pub async fn next_message(&mut self) -> Result<ServerMessage, ClientError> {
        let line = self.lines.next_line().await?.ok_or(ClientError::Closed)?;
        self.accept_line(&line)
    }

    fn accept_line(&mut self, line: &str) -> Result<ServerMessage, ClientError> {
        let message: ServerMessage = line.parse()?;
        self.view.apply(message.clone());
        Ok(message)
    }

    /// Signals readiness, clicks from `go` until someone wins, then reports
    /// the number of clicks sent
    pub async fn race(&mut self, pace: ClickPace) -> Result<RaceOutcome, ClientError> {
        self.send(&ClientMessage::Ready).await?;
        info!("Horse {} is ready", self.id);

        let mut next_click = Instant::now();

        let winner = loop {
            let running = self.view.is_running();
            let event = tokio::select! {
                line = self.lines.next_line() => Event::Line(line),
                _ = sleep_until(next_click), if running => Event::ClickDue,
            };

            match event {
                Event::Line(line) => {
                    let line = line?.ok_or(ClientError::Closed)?;
                    match self.accept_line(&line) {
                        Ok(ServerMessage::Go) => {
                            info!("Go!");
                            next_click = Instant::now();
                        }
                        Ok(ServerMessage::Win { name }) => break name,
                        Ok(_) => {}
                        Err(e) => warn!("Ignoring server line {:?}: {}", line, e),
                    }
                }
                Event::ClickDue => {
                    self.send(&ClientMessage::Click).await?;
                    self.clicks_sent += 1;
                    debug!("Click {}", self.clicks_sent);
                    next_click = Instant::now() + pace.next_delay();
                }
            }
        };

        self.send(&ClientMessage::ClicksSent(self.clicks_sent))
            .await?;
        info!("{} won, horse {} sent {} clicks", winner, self.id, self.clicks_sent);

        Ok(RaceOutcome {
            id: self.id,
            winner,
            clicks_sent: self.clicks_sent,
            countdown: self.view.countdown_seen.clone(),
            own_progress: self.view.own_progress(),
        })
    }
}
