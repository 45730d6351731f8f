//! TCP front end: accepts connections and routes their frames
//!
//! Every connection starts as a request connection: each `ClientPacket`
//! request gets exactly one `ServerPacket` reply. Sending `Attach` turns
//! the connection into a game stream, after which the server pushes
//! updates and inbound frames are treated as stream messages.

use crate::chat::WordListFilter;
use crate::config::ServerConfig;
use crate::lifecycle::{LifecycleConfig, LifecycleSupervisor};
use crate::orchestrator::GameService;
use crate::router::{Session, SessionRouter};
use crate::store::GameStore;
use crate::sweep::run_sweeper;
use log::{debug, error, info, warn};
use shared::codec::{read_frame, write_frame};
use shared::{ClientPacket, GameError, ServerPacket};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};

/// Outbound packets buffered per connection before updates are dropped
const OUTBOUND_QUEUE: usize = 64;

/// Stops a running [`Server`] from another task.
#[derive(Clone)]
pub struct ShutdownHandle(Arc<watch::Sender<bool>>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        let _ = self.0.send(true);
    }
}

pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    store: Arc<GameStore>,
    lifecycle: Arc<LifecycleSupervisor>,
    service: Arc<GameService>,
    router: Arc<SessionRouter>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Binds the listener and wires up the store, lifecycle supervisor,
    /// game service and session router.
    pub async fn new(config: ServerConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(&config.addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let store = Arc::new(GameStore::new());
        let lifecycle = Arc::new(LifecycleSupervisor::new(
            Arc::clone(&store),
            LifecycleConfig::from(&config),
        ));
        let service = Arc::new(GameService::new(Arc::clone(&store), Arc::clone(&lifecycle)));
        let router = Arc::new(SessionRouter::new(
            Arc::clone(&service),
            Arc::clone(&lifecycle),
            Arc::new(WordListFilter::default()),
            config.max_connections,
            config.disconnect_grace,
        ));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Server {
            listener,
            config,
            store,
            lifecycle,
            service,
            router,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn service(&self) -> Arc<GameService> {
        Arc::clone(&self.service)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.shutdown_tx))
    }

    /// Accepts connections until shut down, then stops every background
    /// task.
    pub async fn run(self) -> io::Result<()> {
        let Server {
            listener,
            config,
            store,
            lifecycle,
            service,
            router,
            shutdown_tx: _shutdown_tx,
            mut shutdown_rx,
        } = self;

        let sweeper = tokio::spawn(run_sweeper(
            Arc::clone(&store),
            Arc::clone(&lifecycle),
            config.sweep_interval,
            config.stale_after,
            shutdown_rx.clone(),
        ));

        info!("Server started successfully");

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    info!("Server shutting down");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            debug!("Accepted connection from {}", addr);
                            let service = Arc::clone(&service);
                            let router = Arc::clone(&router);
                            let shutdown = shutdown_rx.clone();
                            tokio::spawn(handle_connection(stream, addr, service, router, shutdown));
                        }
                        Err(e) => error!("Failed to accept connection: {}", e),
                    }
                }
            }
        }

        let _ = sweeper.await;
        router.shutdown().await;
        lifecycle.shutdown().await;
        Ok(())
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    service: Arc<GameService>,
    router: Arc<SessionRouter>,
    mut shutdown: watch::Receiver<bool>,
) {
    let (mut reader, mut writer) = stream.into_split();
    let (tx, mut rx) = mpsc::channel::<ServerPacket>(OUTBOUND_QUEUE);

    let writer_task = tokio::spawn(async move {
        while let Some(packet) = rx.recv().await {
            if let Err(e) = write_frame(&mut writer, &packet).await {
                debug!("Write to {} failed: {}", addr, e);
                break;
            }
        }
    });

    let mut session: Option<Session> = None;

    loop {
        let frame = tokio::select! {
            _ = shutdown.changed() => {
                debug!("Closing connection from {} for shutdown", addr);
                break;
            }
            frame = read_frame::<_, ClientPacket>(&mut reader) => frame,
        };
        let packet = match frame {
            Ok(Some(packet)) => packet,
            Ok(None) => break,
            Err(e) => {
                warn!("Dropping connection from {}: {}", addr, e);
                break;
            }
        };

        let reply = if let Some(session) = &session {
            match router.handle_message(session, packet).await {
                Ok(()) => None,
                Err(e) => {
                    warn!("Rejected stream message from {}: {}", session.handle, e);
                    Some(ServerPacket::Error(e))
                }
            }
        } else if let ClientPacket::Attach {
            game_id,
            handle,
            role,
        } = packet
        {
            match router.attach(game_id, handle, role, tx.clone()).await {
                Ok(attached) => {
                    session = Some(attached);
                    None
                }
                Err(e) => {
                    warn!("Rejected attach from {}: {}", addr, e);
                    Some(ServerPacket::Error(e))
                }
            }
        } else {
            Some(dispatch(&service, packet).await)
        };

        if let Some(reply) = reply {
            if tx.send(reply).await.is_err() {
                break;
            }
        }
    }

    if let Some(session) = &session {
        router.detach(session).await;
    }
    drop(tx);
    let _ = writer_task.await;
    debug!("Connection from {} closed", addr);
}

/// Answers a single request made outside a game stream.
async fn dispatch(service: &GameService, packet: ClientPacket) -> ServerPacket {
    let result = match packet {
        ClientPacket::CreateGame(request) => service
            .create(request)
            .await
            .map(|(game_id, handle)| ServerPacket::GameCreated { game_id, handle }),
        ClientPacket::JoinGame {
            game_id,
            handle,
            rank,
        } => service
            .join(&game_id, handle, rank)
            .await
            .map(|(handle, color)| ServerPacket::Joined { handle, color }),
        ClientPacket::MakeMove {
            game_id,
            handle,
            index,
        } => service
            .make_move(&game_id, &handle, index)
            .await
            .map(|captured| ServerPacket::MoveAccepted { captured }),
        ClientPacket::GetState { game_id } => service
            .get_state(&game_id)
            .await
            .map(|game| ServerPacket::State(Box::new(game))),
        other => Err(GameError::InvalidRequest(format!(
            "{:?} is only valid on an attached game stream",
            other
        ))),
    };

    result.unwrap_or_else(|e| {
        warn!("Request rejected: {}", e);
        ServerPacket::Error(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{ColorPreference, CreateGameRequest, GameSettings, Role};
    use std::time::Duration;

    async fn start() -> (SocketAddr, ShutdownHandle, tokio::task::JoinHandle<io::Result<()>>) {
        let config = ServerConfig {
            addr: "127.0.0.1:0".to_string(),
            ..ServerConfig::default()
        };
        let server = Server::new(config).await.unwrap();
        let addr = server.local_addr().unwrap();
        let handle = server.shutdown_handle();
        (addr, handle, tokio::spawn(server.run()))
    }

    async fn request(stream: &mut TcpStream, packet: ClientPacket) -> ServerPacket {
        write_frame(stream, &packet).await.unwrap();
        read_frame(stream).await.unwrap().unwrap()
    }

    fn create_request() -> ClientPacket {
        ClientPacket::CreateGame(CreateGameRequest {
            settings: GameSettings {
                board_size: 9,
                color_preference: ColorPreference::Black,
                ..GameSettings::default()
            },
            creator: None,
            creator_rank: None,
        })
    }

    #[tokio::test]
    async fn test_request_connection() {
        let (addr, shutdown, server) = start().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let game_id = match request(&mut stream, create_request()).await {
            ServerPacket::GameCreated { game_id, .. } => game_id,
            other => panic!("Unexpected reply: {:?}", other),
        };

        match request(&mut stream, ClientPacket::GetState { game_id }).await {
            ServerPacket::State(game) => assert_eq!(game.board_size, 9),
            other => panic!("Unexpected reply: {:?}", other),
        }

        shutdown.shutdown();
        tokio::time::timeout(Duration::from_secs(2), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_errors_are_replies() {
        let (addr, _shutdown, _server) = start().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let reply = request(
            &mut stream,
            ClientPacket::GetState {
                game_id: "missing".into(),
            },
        )
        .await;
        assert_eq!(reply, ServerPacket::Error(GameError::NotFound));

        let reply = request(&mut stream, ClientPacket::FinalizeScore).await;
        assert!(matches!(
            reply,
            ServerPacket::Error(GameError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_attach_turns_connection_into_stream() {
        let (addr, _shutdown, _server) = start().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let game_id = match request(&mut stream, create_request()).await {
            ServerPacket::GameCreated { game_id, .. } => game_id,
            other => panic!("Unexpected reply: {:?}", other),
        };

        let attach = ClientPacket::Attach {
            game_id: game_id.clone(),
            handle: "watcher".into(),
            role: Role::Spectator,
        };
        match request(&mut stream, attach).await {
            ServerPacket::Attached { game_id: id, .. } => assert_eq!(id, game_id),
            other => panic!("Unexpected reply: {:?}", other),
        }
        let snapshot: ServerPacket = read_frame(&mut stream).await.unwrap().unwrap();
        assert!(matches!(snapshot, ServerPacket::Update(_)));
    }

    #[tokio::test]
    async fn test_shutdown_closes_attached_streams() {
        let (addr, shutdown, server) = start().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let game_id = match request(&mut stream, create_request()).await {
            ServerPacket::GameCreated { game_id, .. } => game_id,
            other => panic!("Unexpected reply: {:?}", other),
        };
        let attach = ClientPacket::Attach {
            game_id,
            handle: "watcher".into(),
            role: Role::Spectator,
        };
        write_frame(&mut stream, &attach).await.unwrap();

        shutdown.shutdown();
        tokio::time::timeout(Duration::from_secs(2), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        // Whatever was queued drains, then the server closes the socket
        let closed = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match read_frame::<_, ServerPacket>(&mut stream).await {
                    Ok(Some(_)) => continue,
                    Ok(None) | Err(_) => break,
                }
            }
        })
        .await;
        assert!(closed.is_ok());
    }
}
