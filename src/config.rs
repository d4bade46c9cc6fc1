//! Gateway configuration: the session settings file.
//!
//! The file uses the classic acceptor layout: a `[DEFAULT]` section with
//! shared keys and one `[SESSION]` section per counterparty, each section a
//! list of `Key=Value` lines. Recognized keys: `BeginString`, `SenderCompID`
//! (the gateway's identity), `TargetCompID` (the counterparty),
//! `SocketAcceptPort`. Lines starting with `#` are comments.

use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/ordermatch.cfg";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: expected Key=Value, got {text:?}")]
    Malformed { line: usize, text: String },
    #[error("session {index}: missing key {key}")]
    MissingKey { index: usize, key: &'static str },
    #[error("invalid SocketAcceptPort: {0}")]
    InvalidPort(String),
    #[error("unsupported BeginString {0} (only FIX.4.4)")]
    UnsupportedBeginString(String),
    #[error("no [SESSION] sections configured")]
    NoSessions,
}

/// One configured counterparty session, from the gateway's perspective.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    pub begin_string: String,
    /// The gateway's CompID on this session.
    pub sender_comp_id: String,
    /// The counterparty's CompID.
    pub target_comp_id: String,
}

/// Parsed gateway configuration.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub accept_port: u16,
    pub sessions: Vec<SessionConfig>,
}

impl GatewayConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut default: HashMap<String, String> = HashMap::new();
        let mut sections: Vec<HashMap<String, String>> = Vec::new();
        let mut in_session = false;

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line {
                "[DEFAULT]" => {
                    in_session = false;
                }
                "[SESSION]" => {
                    sections.push(HashMap::new());
                    in_session = true;
                }
                _ => {
                    let (key, value) = line.split_once('=').ok_or(ConfigError::Malformed {
                        line: idx + 1,
                        text: line.to_string(),
                    })?;
                    let target = if in_session {
                        sections.last_mut().expect("in_session implies a section")
                    } else {
                        &mut default
                    };
                    target.insert(key.trim().to_string(), value.trim().to_string());
                }
            }
        }

        if sections.is_empty() {
            return Err(ConfigError::NoSessions);
        }

        let lookup = |section: &HashMap<String, String>, key: &str| {
            section.get(key).or_else(|| default.get(key)).cloned()
        };

        let port_text = default
            .get("SocketAcceptPort")
            .cloned()
            .unwrap_or_default();
        let accept_port: u16 = port_text
            .parse()
            .map_err(|_| ConfigError::InvalidPort(port_text.clone()))?;

        let mut sessions = Vec::with_capacity(sections.len());
        for (index, section) in sections.iter().enumerate() {
            let begin_string = lookup(section, "BeginString").ok_or(ConfigError::MissingKey {
                index,
                key: "BeginString",
            })?;
            if begin_string != "FIX.4.4" {
                return Err(ConfigError::UnsupportedBeginString(begin_string));
            }
            let sender_comp_id = lookup(section, "SenderCompID").ok_or(ConfigError::MissingKey {
                index,
                key: "SenderCompID",
            })?;
            let target_comp_id = lookup(section, "TargetCompID").ok_or(ConfigError::MissingKey {
                index,
                key: "TargetCompID",
            })?;
            sessions.push(SessionConfig {
                begin_string,
                sender_comp_id,
                target_comp_id,
            });
        }

        Ok(Self {
            accept_port,
            sessions,
        })
    }

    /// Looks up the configured session whose gateway/counterparty identities
    /// match, for logon validation.
    pub fn session_for(&self, sender_comp_id: &str, target_comp_id: &str) -> Option<&SessionConfig> {
        self.sessions
            .iter()
            .find(|s| s.sender_comp_id == sender_comp_id && s.target_comp_id == target_comp_id)
    }
}
