use rand::distributions::Alphanumeric;
use rand::Rng;
use shared::{Color, GameId, PlayerHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

// Get current timestamp in milliseconds
pub fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

// Get current timestamp in seconds
pub fn get_unix_seconds() -> u64 {
    get_timestamp() / 1000
}

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub fn generate_game_id() -> GameId {
    GameId::new(random_token(10))
}

pub fn generate_handle() -> PlayerHandle {
    PlayerHandle::new(random_token(16))
}

pub fn generate_source_id() -> String {
    random_token(8)
}

pub fn random_color() -> Color {
    if rand::random::<bool>() {
        Color::Black
    } else {
        Color::White
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_units() {
        let millis = get_timestamp();
        let seconds = get_unix_seconds();
        assert!(millis > 1_600_000_000_000);
        assert!(seconds.abs_diff(millis / 1000) <= 1);
    }

    #[test]
    fn test_generated_ids() {
        let a = generate_handle();
        let b = generate_handle();
        assert_eq!(a.as_str().len(), 16);
        assert_ne!(a, b);
        assert!(generate_game_id()
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric()));
    }
}
