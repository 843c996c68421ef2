// powerplay-api: OAuth2 PKCE session and music service Web API client

pub mod auth;
pub mod error;
pub mod music;
pub mod pkce;
pub mod session;
pub mod token;
pub mod transport;

pub use auth::{DEFAULT_SCOPES, OAuthConfig};
pub use error::Error;
pub use music::{MusicClient, PlaybackState, Playlist, playlist_context_uri};
pub use session::{ApiRequest, AuthSession, MAX_AUTH_RETRIES};
pub use token::AuthTokenSet;
pub use transport::TransportConfig;
