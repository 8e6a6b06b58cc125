//! Automation host bridge
//!
//! Spawns the configured host command once and exchanges newline-delimited
//! JSON with it over stdin/stdout:
//!
//! ```text
//! -> {"op":"search_emails","text":"budget","max":10,"days_back":30}
//! <- {"ok":true,"result":[{...email...}]}
//! <- {"ok":false,"error":"item not found"}
//! ```

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::backends::LocalMailClient;
use crate::models::{CalendarEvent, Email, ItemId};

/// Failures talking to the automation host
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("automation host is not connected")]
    NotConnected,
    #[error("automation host closed the connection")]
    Closed,
    #[error("automation host error: {0}")]
    Host(String),
    #[error("automation host I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed automation host message: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Request<'a> {
    Ping,
    SearchEmails {
        text: &'a str,
        max: usize,
        days_back: u32,
    },
    SearchEvents {
        text: &'a str,
        max: usize,
        days_back: u32,
        days_forward: u32,
    },
    Open {
        id: &'a str,
    },
    Reply {
        id: &'a str,
    },
    ReplyAll {
        id: &'a str,
    },
    Forward {
        id: &'a str,
    },
}

#[derive(Debug, Deserialize)]
struct Response {
    ok: bool,
    #[serde(default)]
    result: serde_json::Value,
    error: Option<String>,
}

struct HostProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl Drop for HostProcess {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            debug!("Automation host already exited: {}", e);
        }
        self.child.wait().ok();
    }
}

/// [`LocalMailClient`] backed by an automation host process
pub struct BridgeClient {
    command: Vec<String>,
    process: Mutex<Option<HostProcess>>,
}

impl BridgeClient {
    /// `command` is the host's argv; nothing is spawned until `try_connect`
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            process: Mutex::new(None),
        }
    }

    fn process(&self) -> MutexGuard<'_, Option<HostProcess>> {
        self.process.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn(&self) -> Result<HostProcess, BridgeError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| BridgeError::Host("empty host command".to_string()))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            child.kill().ok();
            return Err(BridgeError::Closed);
        };

        Ok(HostProcess {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    /// Send one request and wait for its response line
    fn call<T: DeserializeOwned>(&self, request: &Request<'_>) -> Result<T, BridgeError> {
        let mut guard = self.process();
        let process = guard.as_mut().ok_or(BridgeError::NotConnected)?;

        let mut exchange = || -> Result<Response, BridgeError> {
            let mut line = serde_json::to_string(request)?;
            line.push('\n');
            process.stdin.write_all(line.as_bytes())?;
            process.stdin.flush()?;

            let mut reply = String::new();
            if process.stdout.read_line(&mut reply)? == 0 {
                return Err(BridgeError::Closed);
            }
            Ok(serde_json::from_str(&reply)?)
        };

        let response = match exchange() {
            Ok(response) => response,
            Err(e @ (BridgeError::Closed | BridgeError::Io(_))) => {
                warn!("Lost automation host: {}", e);
                *guard = None;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        if !response.ok {
            return Err(BridgeError::Host(
                response.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        Ok(serde_json::from_value(response.result)?)
    }

    fn acknowledge(&self, request: &Request<'_>) -> Result<bool> {
        match self.call::<Option<bool>>(request) {
            Ok(done) => Ok(done.unwrap_or(true)),
            Err(BridgeError::Host(message)) => {
                debug!("Automation host refused {:?}: {}", request, message);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl LocalMailClient for BridgeClient {
    fn try_connect(&self) -> bool {
        if self.is_connected() {
            return true;
        }

        let process = match self.spawn() {
            Ok(process) => process,
            Err(e) => {
                info!("Automation host unavailable: {}", e);
                return false;
            }
        };
        *self.process() = Some(process);

        match self.call::<serde_json::Value>(&Request::Ping) {
            Ok(_) => true,
            Err(e) => {
                info!("Automation host did not answer ping: {}", e);
                *self.process() = None;
                false
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.process().is_some()
    }

    fn search_emails(&self, text: &str, max: usize, days_back: u32) -> Result<Vec<Email>> {
        Ok(self.call(&Request::SearchEmails {
            text,
            max,
            days_back,
        })?)
    }

    fn search_events(
        &self,
        text: &str,
        max: usize,
        days_back: u32,
        days_forward: u32,
    ) -> Result<Vec<CalendarEvent>> {
        Ok(self.call(&Request::SearchEvents {
            text,
            max,
            days_back,
            days_forward,
        })?)
    }

    fn open_item(&self, id: &ItemId) -> Result<()> {
        self.call::<serde_json::Value>(&Request::Open { id: id.as_str() })?;
        Ok(())
    }

    fn reply(&self, id: &ItemId) -> Result<bool> {
        self.acknowledge(&Request::Reply { id: id.as_str() })
    }

    fn reply_all(&self, id: &ItemId) -> Result<bool> {
        self.acknowledge(&Request::ReplyAll { id: id.as_str() })
    }

    fn forward(&self, id: &ItemId) -> Result<bool> {
        self.acknowledge(&Request::Forward { id: id.as_str() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A host that answers every request with the same line
    fn scripted_host(reply: &str) -> BridgeClient {
        BridgeClient::new(vec![
            "sh".to_string(),
            "-c".to_string(),
            format!("while read line; do echo '{}'; done", reply),
        ])
    }

    #[test]
    fn test_request_encoding() {
        let json = serde_json::to_string(&Request::SearchEvents {
            text: "sync",
            max: 5,
            days_back: 0,
            days_forward: 7,
        })
        .unwrap();
        assert_eq!(
            json,
            r#"{"op":"search_events","text":"sync","max":5,"days_back":0,"days_forward":7}"#
        );
        assert_eq!(
            serde_json::to_string(&Request::ReplyAll { id: "a" }).unwrap(),
            r#"{"op":"reply_all","id":"a"}"#
        );
    }

    #[test]
    fn test_missing_host_is_unavailable() {
        let client = BridgeClient::new(vec!["/nonexistent/automation-host".to_string()]);
        assert!(!client.try_connect());
        assert!(!client.is_connected());
        assert!(client.search_emails("x", 5, 30).is_err());
    }

    #[test]
    fn test_empty_command_is_unavailable() {
        assert!(!BridgeClient::new(Vec::new()).try_connect());
    }

    #[cfg(unix)]
    #[test]
    fn test_search_through_host() {
        let client = scripted_host(
            r#"{"ok":true,"result":[{"local_id":"00AB","subject":"Budget","from":{"name":null,"email":"jane@example.com"},"received_at":"2024-05-02T14:30:00Z"}]}"#,
        );
        assert!(client.try_connect());

        let emails = client.search_emails("budget", 5, 30).unwrap();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].local_id, Some(ItemId::new("00AB")));
        assert_eq!(emails[0].subject, "Budget");
    }

    #[cfg(unix)]
    #[test]
    fn test_host_refusal_is_false_not_error() {
        let client = scripted_host(r#"{"ok":false,"error":"no such item"}"#);
        // Ping also gets the refusal, so connect fails cleanly
        assert!(!client.try_connect());

        let client = scripted_host(r#"{"ok":true,"result":null}"#);
        assert!(client.try_connect());
        assert!(client.reply(&ItemId::new("00AB")).unwrap());
    }
}
