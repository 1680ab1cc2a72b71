//! Opaque reconnect and map-save tokens.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rand::distributions::Alphanumeric;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const TOKEN_LEN: usize = 32;
/// Lifetime of a reconnect token
pub const PLAYER_TOKEN_TTL: Duration = Duration::from_secs(3 * 60 * 60);
/// Lifetime of a map-save token
pub const SAVE_TOKEN_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    InvalidToken,
    Expired,
    WrongGame,
    WrongMap,
    Unavailable,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidToken => write!(f, "invalid token"),
            AuthError::Expired => write!(f, "token expired"),
            AuthError::WrongGame => write!(f, "token belongs to another game"),
            AuthError::WrongMap => write!(f, "token belongs to another map"),
            AuthError::Unavailable => write!(f, "credential store unavailable"),
        }
    }
}

impl std::error::Error for AuthError {}

pub trait Credentials: Send + Sync {
    fn issue_player_token(&self, player_id: u32, game_id: &str) -> Result<String, AuthError>;
    /// Player id the token was issued for, if it is valid for `game_id`.
    fn validate_player_token(&self, token: &str, game_id: &str) -> Result<u32, AuthError>;
    fn issue_save_token(&self, map_hash: &str) -> Result<String, AuthError>;
    fn validate_save_token(&self, token: &str, map_hash: &str) -> Result<(), AuthError>;
}

#[derive(Debug, Clone)]
enum Grant {
    Player { player_id: u32, game_id: String },
    SaveMap { map_hash: String },
}

#[derive(Debug, Clone)]
struct Entry {
    grant: Grant,
    expires_at: Instant,
}

struct Inner {
    rng: ChaCha8Rng,
    tokens: HashMap<String, Entry>,
}

/// In-memory token issuer.
pub struct TokenStore {
    inner: Mutex<Inner>,
}

impl TokenStore {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            inner: Mutex::new(Inner {
                rng,
                tokens: HashMap::new(),
            }),
        }
    }

    fn issue(&self, grant: Grant, ttl: Duration) -> Result<String, AuthError> {
        let mut inner = self.inner.lock().map_err(|_| AuthError::Unavailable)?;
        let now = Instant::now();
        inner.tokens.retain(|_, e| e.expires_at > now);
        let token: String = (&mut inner.rng)
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();
        inner.tokens.insert(
            token.clone(),
            Entry {
                grant,
                expires_at: now + ttl,
            },
        );
        Ok(token)
    }

    fn lookup(&self, token: &str) -> Result<Grant, AuthError> {
        let inner = self.inner.lock().map_err(|_| AuthError::Unavailable)?;
        let entry = inner.tokens.get(token).ok_or(AuthError::InvalidToken)?;
        if entry.expires_at <= Instant::now() {
            return Err(AuthError::Expired);
        }
        Ok(entry.grant.clone())
    }
}

impl Credentials for TokenStore {
    fn issue_player_token(&self, player_id: u32, game_id: &str) -> Result<String, AuthError> {
        self.issue(
            Grant::Player {
                player_id,
                game_id: game_id.to_string(),
            },
            PLAYER_TOKEN_TTL,
        )
    }

    fn validate_player_token(&self, token: &str, game_id: &str) -> Result<u32, AuthError> {
        match self.lookup(token)? {
            Grant::Player {
                player_id,
                game_id: issued_for,
            } if issued_for == game_id => Ok(player_id),
            Grant::Player { .. } => Err(AuthError::WrongGame),
            Grant::SaveMap { .. } => Err(AuthError::InvalidToken),
        }
    }

    fn issue_save_token(&self, map_hash: &str) -> Result<String, AuthError> {
        self.issue(
            Grant::SaveMap {
                map_hash: map_hash.to_string(),
            },
            SAVE_TOKEN_TTL,
        )
    }

    fn validate_save_token(&self, token: &str, map_hash: &str) -> Result<(), AuthError> {
        match self.lookup(token)? {
            Grant::SaveMap { map_hash: issued_for } if issued_for == map_hash => Ok(()),
            Grant::SaveMap { .. } => Err(AuthError::WrongMap),
            Grant::Player { .. } => Err(AuthError::InvalidToken),
        }
    }
}
