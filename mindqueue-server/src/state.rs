use mindqueue::Assistant;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub assistant: Arc<Assistant>,
}
