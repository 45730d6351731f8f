use clap::{Parser, Subcommand};
use client::network::{GameClient, StreamEvent};
use log::info;
use shared::{
    ColorPreference, Envelope, GameId, GameSettings, Move, PlayerHandle, Rank, Role,
    RuleSet, TimeControl,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new game and print its id and the creator's handle
    Create {
        #[arg(long, default_value = "19")]
        size: usize,
        /// Main time in seconds, or "none"
        #[arg(short = 't', long, default_value = "none")]
        time_control: TimeControl,
        #[arg(short = 'k', long, default_value = "6.5")]
        komi: f64,
        /// japanese or chinese
        #[arg(short = 'r', long, default_value = "japanese")]
        rules: RuleSet,
        /// black, white or random
        #[arg(short = 'c', long, default_value = "random")]
        color: ColorPreference,
        #[arg(long)]
        handicaps: bool,
        /// Byo-yomi periods once main time runs out
        #[arg(long, default_value = "0")]
        periods: u32,
        /// Seconds per byo-yomi period
        #[arg(long, default_value = "0")]
        byo_yomi: u32,
        /// Creator's rank, e.g. 5k or 2d
        #[arg(long)]
        rank: Option<Rank>,
    },
    /// Join a game, optionally reusing a handle
    Join {
        game_id: String,
        #[arg(long)]
        handle: Option<String>,
        #[arg(long)]
        rank: Option<Rank>,
    },
    /// Play a point index, "pass" or "resign"
    Move {
        game_id: String,
        handle: String,
        point: String,
    },
    /// Print the full game state as JSON
    State { game_id: String },
    /// Print every update pushed for a game
    Watch {
        game_id: String,
        /// Attach as this seated player instead of as a spectator
        #[arg(long)]
        player: Option<String>,
    },
}

fn parse_point(point: &str) -> Result<i64, Box<dyn std::error::Error>> {
    match point {
        "pass" => Ok(Move::PASS_INDEX),
        "resign" => Ok(Move::RESIGN_INDEX),
        index => Ok(index.parse::<u32>()?.into()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    info!("Connecting to: {}", args.server);
    let mut client = GameClient::connect(&args.server).await?;

    match args.command {
        Command::Create {
            size,
            time_control,
            komi,
            rules,
            color,
            handicaps,
            periods,
            byo_yomi,
            rank,
        } => {
            let settings = GameSettings {
                board_size: size,
                time_control,
                komi,
                rule_set: rules,
                color_preference: color,
                allow_handicaps: handicaps,
                byo_yomi_periods: periods,
                byo_yomi_time: byo_yomi,
            };
            let (game_id, handle) = client.create_game(settings, rank).await?;
            println!("game {}", game_id);
            println!("handle {}", handle);
        }
        Command::Join {
            game_id,
            handle,
            rank,
        } => {
            let game_id = GameId::new(game_id);
            let (handle, color) = client
                .join(&game_id, handle.map(PlayerHandle::new), rank)
                .await?;
            println!("joined {} as {} ({})", game_id, handle, color);
        }
        Command::Move {
            game_id,
            handle,
            point,
        } => {
            let index = parse_point(&point)?;
            let captured = client
                .make_move(&GameId::new(game_id), &PlayerHandle::new(handle), index)
                .await?;
            println!("captured {}", captured);
        }
        Command::State { game_id } => {
            let game = client.get_state(&GameId::new(game_id)).await?;
            println!("{}", serde_json::to_string_pretty(&game)?);
        }
        Command::Watch { game_id, player } => {
            let (handle, role) = match player {
                Some(handle) => (PlayerHandle::new(handle), Role::Player),
                None => (PlayerHandle::new("spectator"), Role::Spectator),
            };
            let mut stream = client.attach(&GameId::new(game_id), handle, role).await?;
            while let Some(event) = stream.next_event().await? {
                match event {
                    StreamEvent::Update(envelope) => print_envelope(&envelope)?,
                    StreamEvent::Rejected(e) => eprintln!("rejected: {}", e),
                }
            }
            info!("Stream closed by server");
        }
    }

    Ok(())
}

fn print_envelope(envelope: &Envelope) -> Result<(), Box<dyn std::error::Error>> {
    match envelope {
        Envelope::Chat { sender, text, .. } => println!("[{}] {}", sender, text),
        other => println!("{}", other.to_json()?),
    }
    Ok(())
}
