// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Layered configuration.
//!
//! Files are read from `/etc/tbot/tbot.conf`, `~/.tbot.conf`, and
//! `./tbot.conf` in that order, later files overriding earlier ones;
//! missing files are skipped. The format is TOML with the classic
//! sectioned layout: `[server]`, `[mail]`, plus one table per exchange
//! id carrying its credentials.

use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

/// Default control port; the stream channel listens on port + 1.
pub const DEFAULT_PORT: u16 = 2268;

const DEFAULT_DATAFILE: &str = "tbot-savegame.data";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid bind address '{0}'")]
    Bind(String),
}

/// `[server]` section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerSection {
    pub logfile: Option<PathBuf>,
    pub default_exchange: Option<String>,
}

/// `[mail]` section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MailSection {
    pub server: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub sender: Option<String>,
    pub recipient: Option<String>,
    pub subject_desc: Option<String>,
}

/// One `[<exchange-id>]` section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeSection {
    pub key: Option<String>,
    pub secret: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub port: u16,
    /// Savegame path. `None` (or an empty `--datafile`) disables
    /// persistence entirely.
    pub datafile: Option<PathBuf>,
    pub foreground: bool,
    pub pidfile: Option<PathBuf>,
    pub user: Option<String>,
    pub verbosity: u8,
    pub server: ServerSection,
    pub mail: MailSection,
    pub exchanges: BTreeMap<String, ExchangeSection>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "localhost".into(),
            port: DEFAULT_PORT,
            datafile: Some(PathBuf::from(DEFAULT_DATAFILE)),
            foreground: false,
            pidfile: None,
            user: None,
            verbosity: 1,
            server: ServerSection::default(),
            mail: MailSection::default(),
            exchanges: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load the layered config files. Unreadable or malformed files are
    /// logged and skipped; the daemon still starts.
    pub fn load() -> Self {
        let mut config = Config::default();
        for path in Self::config_paths() {
            let Ok(text) = std::fs::read_to_string(&path) else {
                continue;
            };
            if let Err(e) = config.merge_str(&text) {
                warn!("skipping config {}: {}", path.display(), e);
            }
        }
        config
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/tbot/tbot.conf")];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".tbot.conf"));
        }
        paths.push(PathBuf::from("./tbot.conf"));
        paths
    }

    /// Merge one config file over the current values.
    pub fn merge_str(&mut self, text: &str) -> Result<(), ConfigError> {
        let value: toml::Table = text.parse()?;

        for (section, entries) in value {
            let Some(table) = entries.as_table() else {
                continue;
            };
            match section.as_str() {
                "server" => {
                    if let Some(logfile) = str_key(table, "logfile") {
                        self.server.logfile = Some(PathBuf::from(logfile));
                    }
                    if let Some(exchange) = str_key(table, "default_exchange") {
                        self.server.default_exchange = Some(exchange);
                    }
                }
                "mail" => {
                    merge_mail(&mut self.mail, table);
                }
                id => {
                    let entry = self.exchanges.entry(id.to_string()).or_default();
                    if let Some(key) = str_key(table, "key") {
                        entry.key = Some(key);
                    }
                    if let Some(secret) = str_key(table, "secret") {
                        entry.secret = Some(secret);
                    }
                    if let Some(password) = str_key(table, "password") {
                        entry.password = Some(password);
                    }
                }
            }
        }
        Ok(())
    }

    /// Apply a `--bind addr[:port]` override.
    pub fn set_bind(&mut self, bind: &str) -> Result<(), ConfigError> {
        match bind.rsplit_once(':') {
            Some((addr, port)) => {
                let port: u16 = port.parse().map_err(|_| ConfigError::Bind(bind.into()))?;
                if addr.is_empty() {
                    return Err(ConfigError::Bind(bind.into()));
                }
                self.bind_addr = addr.to_string();
                self.port = port;
            }
            None => self.bind_addr = bind.to_string(),
        }
        Ok(())
    }

    /// Apply a `--datafile` override; an empty path disables savegames.
    pub fn set_datafile(&mut self, datafile: &str) {
        self.datafile = if datafile.is_empty() {
            None
        } else {
            Some(PathBuf::from(datafile))
        };
    }

    /// Address for the unary control listener.
    pub fn control_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// Address for the streaming listener (control port + 1).
    pub fn stream_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port + 1)
    }
}

fn str_key(table: &toml::Table, key: &str) -> Option<String> {
    table.get(key).and_then(|v| v.as_str()).map(String::from)
}

fn merge_mail(mail: &mut MailSection, table: &toml::Table) {
    if let Some(server) = str_key(table, "server") {
        mail.server = Some(server);
    }
    if let Some(port) = table.get("port") {
        mail.port = port
            .as_integer()
            .and_then(|p| u16::try_from(p).ok())
            .or(mail.port);
    }
    if let Some(user) = str_key(table, "user") {
        mail.user = Some(user);
    }
    if let Some(pass) = str_key(table, "pass") {
        mail.pass = Some(pass);
    }
    if let Some(sender) = str_key(table, "sender") {
        mail.sender = Some(sender);
    }
    if let Some(recipient) = str_key(table, "recipient") {
        mail.recipient = Some(recipient);
    }
    if let Some(subject_desc) = str_key(table, "subject_desc") {
        mail.subject_desc = Some(subject_desc);
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
