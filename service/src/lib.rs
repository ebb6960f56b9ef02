use config::Config;
use log::info;
use presence::Manager;
use std::sync::Arc;
use tower_cookies::Key;

pub mod config;
pub mod logging;

// Service-level state shared by every request handler.
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub presence: Arc<Manager>,
    pub cookie_key: Key,
}

impl AppState {
    pub fn new(app_config: Config) -> Self {
        info!(
            "Presence config: keep_alive_interval={}s",
            app_config.keep_alive_interval_secs
        );
        let presence = Arc::new(Manager::with_keep_alive_interval(
            app_config.keep_alive_interval(),
        ));

        let cookie_key = app_config.cookie_key();

        Self {
            config: app_config,
            presence,
            cookie_key,
        }
    }

    pub fn presence_ref(&self) -> &Manager {
        self.presence.as_ref()
    }
}
