use std::path::PathBuf;

use serde::Deserialize;

use crate::infra::config::{
    ApiConfig, AppConfig, LogConfig, NotificationsConfig, RealtimeConfig,
};

#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    pub logging: Option<FileLogConfig>,
    pub api: Option<FileApiConfig>,
    pub realtime: Option<FileRealtimeConfig>,
    pub notifications: Option<FileNotificationsConfig>,
}

impl FileConfig {
    pub fn merge_into(self, config: &mut AppConfig) {
        if let Some(logging) = self.logging {
            logging.merge_into(&mut config.logging);
        }

        if let Some(api) = self.api {
            api.merge_into(&mut config.api);
        }

        if let Some(realtime) = self.realtime {
            realtime.merge_into(&mut config.realtime);
        }

        if let Some(notifications) = self.notifications {
            notifications.merge_into(&mut config.notifications);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileLogConfig {
    pub level: Option<String>,
    pub file: Option<PathBuf>,
}

impl FileLogConfig {
    fn merge_into(self, config: &mut LogConfig) {
        if let Some(level) = self.level {
            config.level = level;
        }

        if let Some(file) = self.file {
            config.file = Some(file);
        }
    }
}

#[derive(Deserialize, Default)]
pub struct FileApiConfig {
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub request_timeout_ms: Option<u64>,
}

impl FileApiConfig {
    fn merge_into(self, config: &mut ApiConfig) {
        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }

        if let Some(token) = self.token {
            config.token = token;
        }

        if let Some(timeout_ms) = self.request_timeout_ms {
            config.request_timeout_ms = timeout_ms;
        }
    }
}

impl std::fmt::Debug for FileApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileApiConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileRealtimeConfig {
    pub max_reconnect_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub conversation_id: Option<i64>,
}

impl FileRealtimeConfig {
    fn merge_into(self, config: &mut RealtimeConfig) {
        if let Some(attempts) = self.max_reconnect_attempts {
            config.max_reconnect_attempts = attempts;
        }

        if let Some(base_delay_ms) = self.base_delay_ms {
            config.base_delay_ms = base_delay_ms;
        }

        if let Some(max_delay_ms) = self.max_delay_ms {
            config.max_delay_ms = max_delay_ms;
        }

        if let Some(conversation_id) = self.conversation_id {
            config.conversation_id = Some(conversation_id);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileNotificationsConfig {
    pub enabled: Option<bool>,
    pub native: Option<bool>,
}

impl FileNotificationsConfig {
    fn merge_into(self, config: &mut NotificationsConfig) {
        if let Some(enabled) = self.enabled {
            config.enabled = enabled;
        }

        if let Some(native) = self.native {
            config.native = native;
        }
    }
}
