use std::sync::Arc;

use crate::session::SessionContext;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionContext>,
}
