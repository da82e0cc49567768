//! The live-session registry: short join codes mapped to game sessions.
//!
//! Sessions are addressed by a six character join code that players share
//! out of band. The registry owns every live session behind a read-write
//! lock; each session sits in its own async mutex so independent games never
//! contend with each other.

use crate::config::GameConfig;
use crate::error::ServerError;
use crate::game::{GameSession, PlayerId};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

const SESSION_CODE_LENGTH: usize = 6;
const SESSION_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// The shareable join code identifying one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a random six character uppercase alphanumeric code.
    ///
    /// Uniqueness against live sessions is the registry's job, not this
    /// constructor's.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let code: String = (0..SESSION_CODE_LENGTH)
            .map(|_| {
                let idx = rng.gen_range(0..SESSION_CODE_ALPHABET.len());
                SESSION_CODE_ALPHABET[idx] as char
            })
            .collect();
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(code: &str) -> Self {
        Self(code.to_uppercase())
    }
}

/// Handle to one live session, shareable across connection tasks.
pub type SharedSession = Arc<Mutex<GameSession>>;

/// All live sessions on this server.
///
/// The outer map is only touched on create, lookup, and destroy; gameplay
/// happens under the per-session mutex, so the read-write lock is held
/// briefly.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SharedSession>>,
    config: GameConfig,
}

impl SessionRegistry {
    pub fn new(config: GameConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Creates a fresh session and registers it under a new unique code.
    ///
    /// `board_size` of `None` takes the configured default. Sizes outside
    /// the configured bounds are rejected rather than clamped.
    pub async fn create_session(
        &self,
        board_size: Option<usize>,
    ) -> Result<(SessionId, SharedSession), ServerError> {
        let size = board_size.unwrap_or(self.config.default_board_size);
        if size < 2 || size > self.config.max_board_size {
            return Err(ServerError::Internal(format!(
                "Board size {} is out of range (2-{})",
                size, self.config.max_board_size
            )));
        }

        let mut sessions = self.sessions.write().await;
        let id = loop {
            let candidate = SessionId::generate();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };

        let session = Arc::new(Mutex::new(GameSession::new(id.clone(), size)));
        sessions.insert(id.clone(), Arc::clone(&session));
        info!("🎮 Session {} created ({}x{} board)", id, size, size);

        Ok((id, session))
    }

    /// Looks up a live session by its join code.
    pub async fn get(&self, id: &SessionId) -> Option<SharedSession> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Destroys a session, dropping it once the last task releases it.
    pub async fn remove(&self, id: &SessionId) {
        if self.sessions.write().await.remove(id).is_some() {
            debug!("🗑️ Session {} destroyed", id);
        }
    }

    /// Finds the session a player currently belongs to.
    ///
    /// Linear scan over live sessions; used on disconnect when the
    /// connection carries no session association.
    pub async fn find_session_of(&self, player: PlayerId) -> Option<(SessionId, SharedSession)> {
        let sessions = self.sessions.read().await;
        for (id, session) in sessions.iter() {
            if session.lock().await.has_player(player) {
                return Some((id.clone(), Arc::clone(session)));
            }
        }
        None
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_six_uppercase_alphanumerics() {
        for _ in 0..50 {
            let id = SessionId::generate();
            assert_eq!(id.as_str().len(), 6);
            assert!(id
                .as_str()
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn lookup_codes_are_case_insensitive() {
        let id = SessionId::from("abc123");
        assert_eq!(id.as_str(), "ABC123");
    }

    #[tokio::test]
    async fn sessions_are_created_and_looked_up_by_code() {
        let registry = SessionRegistry::new(GameConfig::default());
        let (id, session) = registry.create_session(None).await.unwrap();

        assert_eq!(session.lock().await.board().size(), 10);
        assert!(registry.get(&id).await.is_some());
        assert_eq!(registry.session_count().await, 1);

        registry.remove(&id).await;
        assert!(registry.get(&id).await.is_none());
        assert_eq!(registry.session_count().await, 0);
    }

    #[tokio::test]
    async fn out_of_range_board_sizes_are_rejected() {
        let registry = SessionRegistry::new(GameConfig::default());
        assert!(registry.create_session(Some(1)).await.is_err());
        assert!(registry.create_session(Some(33)).await.is_err());
        assert!(registry.create_session(Some(2)).await.is_ok());
        assert!(registry.create_session(Some(32)).await.is_ok());
    }

    #[tokio::test]
    async fn players_are_found_across_sessions() {
        let registry = SessionRegistry::new(GameConfig::default());
        let (id, session) = registry.create_session(None).await.unwrap();
        registry.create_session(None).await.unwrap();

        let player = PlayerId::new();
        {
            let mut game = session.lock().await;
            let color = game.next_free_color().unwrap();
            game.add_player(player, "alice", color);
        }

        let (found_id, _) = registry.find_session_of(player).await.unwrap();
        assert_eq!(found_id, id);
        assert!(registry.find_session_of(PlayerId::new()).await.is_none());
    }
}
