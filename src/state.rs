use crate::crypto::NoteCipher;
use crate::db::PgStore;
use crate::domain::intensity::SessionClassifier;
use crate::middleware::RateLimiter;
use crate::services::program_generator::ProgramSource;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: PgStore,
    pub cipher: NoteCipher,
    pub generator: Arc<dyn ProgramSource>,
    pub classifier: Arc<dyn SessionClassifier>,
    pub generate_limiter: RateLimiter,
    pub session_key: Vec<u8>,
}

pub type SharedState = Arc<AppState>;
