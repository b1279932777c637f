use std::sync::Arc;

use crate::{config::Config, mail::Mailer};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(config: Config, mailer: Arc<dyn Mailer>) -> Self {
        AppState {
            config: Arc::new(config),
            mailer,
        }
    }
}
