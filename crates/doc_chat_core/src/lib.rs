pub mod conversation;
pub mod credentials;
pub mod domain;
pub mod gateway;
pub mod ports;
pub mod session;

pub use conversation::ConversationLog;
pub use domain::{
    Answer, BearerToken, Citation, Credentials, DocumentFile, Identity, Phase, SessionId,
    StatusLevel, StatusMessage, Turn, TurnKind,
};
pub use gateway::{Rejection, RequestFailure, RequestGateway, RequestOutcome};
pub use ports::{DocumentBackend, IdentityProvider, IdentityStream, PortError, PortResult};
pub use session::{Session, SessionConfig, SessionEvent, SessionState};
