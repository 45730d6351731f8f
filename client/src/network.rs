use log::{debug, info};
use shared::codec::{read_frame, write_frame};
use shared::{
    ClientPacket, Color, CreateGameRequest, Envelope, GameError, GameId, GameSettings, GameState,
    PlayerHandle, Rank, Role, ServerPacket,
};
use std::io;
use thiserror::Error;
use tokio::net::TcpStream;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection error: {0}")]
    Io(#[from] io::Error),
    #[error("server closed the connection")]
    Closed,
    #[error("server rejected the request: {0}")]
    Rejected(#[from] GameError),
    #[error("unexpected reply: {0}")]
    Unexpected(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// A request connection to a game server.
pub struct GameClient {
    stream: TcpStream,
}

impl GameClient {
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        info!("Connected to {}", addr);
        Ok(GameClient { stream })
    }

    /// Sends one request and waits for its reply. A server-side rejection
    /// comes back as [`ClientError::Rejected`].
    async fn request(&mut self, packet: ClientPacket) -> Result<ServerPacket> {
        write_frame(&mut self.stream, &packet).await?;
        match read_frame(&mut self.stream).await? {
            Some(ServerPacket::Error(e)) => Err(ClientError::Rejected(e)),
            Some(reply) => Ok(reply),
            None => Err(ClientError::Closed),
        }
    }

    /// Creates a game. The returned handle is the creator's, to be used
    /// with [`GameClient::join`].
    pub async fn create_game(
        &mut self,
        settings: GameSettings,
        creator_rank: Option<Rank>,
    ) -> Result<(GameId, PlayerHandle)> {
        let request = CreateGameRequest {
            settings,
            creator: None,
            creator_rank,
        };
        match self.request(ClientPacket::CreateGame(request)).await? {
            ServerPacket::GameCreated { game_id, handle } => Ok((game_id, handle)),
            other => Err(unexpected(other)),
        }
    }

    pub async fn join(
        &mut self,
        game_id: &GameId,
        handle: Option<PlayerHandle>,
        rank: Option<Rank>,
    ) -> Result<(PlayerHandle, Color)> {
        let packet = ClientPacket::JoinGame {
            game_id: game_id.clone(),
            handle,
            rank,
        };
        match self.request(packet).await? {
            ServerPacket::Joined { handle, color } => Ok((handle, color)),
            other => Err(unexpected(other)),
        }
    }

    /// Plays a point index, `-1` to pass or `-2` to resign. Returns the
    /// number of stones captured.
    pub async fn make_move(
        &mut self,
        game_id: &GameId,
        handle: &PlayerHandle,
        index: i64,
    ) -> Result<usize> {
        let packet = ClientPacket::MakeMove {
            game_id: game_id.clone(),
            handle: handle.clone(),
            index,
        };
        match self.request(packet).await? {
            ServerPacket::MoveAccepted { captured } => Ok(captured),
            other => Err(unexpected(other)),
        }
    }

    pub async fn get_state(&mut self, game_id: &GameId) -> Result<GameState> {
        let packet = ClientPacket::GetState {
            game_id: game_id.clone(),
        };
        match self.request(packet).await? {
            ServerPacket::State(game) => Ok(*game),
            other => Err(unexpected(other)),
        }
    }

    /// Turns this connection into a stream of updates for one game.
    pub async fn attach(
        mut self,
        game_id: &GameId,
        handle: PlayerHandle,
        role: Role,
    ) -> Result<GameStream> {
        let packet = ClientPacket::Attach {
            game_id: game_id.clone(),
            handle: handle.clone(),
            role,
        };
        match self.request(packet).await? {
            ServerPacket::Attached { source, .. } => {
                debug!("Attached to game {} as {:?}", game_id, role);
                Ok(GameStream {
                    stream: self.stream,
                    game_id: game_id.clone(),
                    handle,
                    source,
                })
            }
            other => Err(unexpected(other)),
        }
    }
}

/// Something the server pushed on a game stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Update(Envelope),
    /// A stream message of ours was refused.
    Rejected(GameError),
}

pub struct GameStream {
    stream: TcpStream,
    game_id: GameId,
    handle: PlayerHandle,
    source: String,
}

impl GameStream {
    pub fn game_id(&self) -> &GameId {
        &self.game_id
    }

    pub fn handle(&self) -> &PlayerHandle {
        &self.handle
    }

    /// Tag the server puts on chat sent from this stream.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Waits for the next pushed event. Returns `None` once the server
    /// closed the stream.
    pub async fn next_event(&mut self) -> Result<Option<StreamEvent>> {
        match read_frame(&mut self.stream).await? {
            Some(ServerPacket::Update(text)) => {
                let envelope =
                    Envelope::from_json(&text).map_err(|e| ClientError::Unexpected(e.to_string()))?;
                Ok(Some(StreamEvent::Update(envelope)))
            }
            Some(ServerPacket::Error(e)) => Ok(Some(StreamEvent::Rejected(e))),
            Some(other) => Err(unexpected(other)),
            None => Ok(None),
        }
    }

    pub async fn toggle_dead_stone(&mut self, index: usize) -> Result<()> {
        self.send(ClientPacket::ToggleDeadStone { index }).await
    }

    pub async fn finalize_score(&mut self) -> Result<()> {
        self.send(ClientPacket::FinalizeScore).await
    }

    pub async fn chat(&mut self, text: &str) -> Result<()> {
        self.send(ClientPacket::Chat {
            text: text.to_string(),
        })
        .await
    }

    async fn send(&mut self, packet: ClientPacket) -> Result<()> {
        write_frame(&mut self.stream, &packet).await?;
        Ok(())
    }
}

fn unexpected(packet: ServerPacket) -> ClientError {
    ClientError::Unexpected(format!("{:?}", packet))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Serves a single connection, answering each request from `replies`.
    async fn fake_server(replies: Vec<ServerPacket>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            for reply in replies {
                let _: Option<ClientPacket> = read_frame(&mut stream).await.unwrap();
                write_frame(&mut stream, &reply).await.unwrap();
            }
        });
        addr
    }

    #[tokio::test]
    async fn test_rejection_is_typed() {
        let addr = fake_server(vec![ServerPacket::Error(GameError::NotFound)]).await;
        let mut client = GameClient::connect(&addr).await.unwrap();

        let result = client.get_state(&"missing".into()).await;
        assert!(matches!(
            result,
            Err(ClientError::Rejected(GameError::NotFound))
        ));
    }

    #[tokio::test]
    async fn test_unexpected_reply() {
        let addr = fake_server(vec![ServerPacket::MoveAccepted { captured: 0 }]).await;
        let mut client = GameClient::connect(&addr).await.unwrap();

        let result = client.join(&"g1".into(), None, None).await;
        assert!(matches!(result, Err(ClientError::Unexpected(_))));
    }

    #[tokio::test]
    async fn test_closed_connection() {
        let addr = fake_server(Vec::new()).await;
        let mut client = GameClient::connect(&addr).await.unwrap();

        // Give the fake server time to drop its side
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let result = client.get_state(&"g1".into()).await;
        assert!(matches!(
            result,
            Err(ClientError::Closed) | Err(ClientError::Io(_))
        ));
    }
}
