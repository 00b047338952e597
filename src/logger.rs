use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;

use chrono::Utc;
use serde_json::{Map, Value, json};
use tracing::warn;

use crate::endpoint::Operation;
use crate::protocol::HEADER_TOKEN;
use crate::transport::Request;

const REDACTED: &str = "<redacted>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLogMode {
    /// Every response body is written in full.
    Full,
    /// The first response per operation in full, then only changed paths.
    Diffed,
}

/// NDJSON log of every exchange with the cloud.
pub(crate) struct MessageLogger {
    mode: MessageLogMode,
    file: File,
    previous: HashMap<Operation, Value>,
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            mode,
            file,
            previous: HashMap::new(),
        })
    }

    pub fn log_request(&mut self, operation: Operation, request: &Request, secrets: &[&str]) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "req",
            "op": operation.as_str(),
            "method": request.method.as_str(),
            "url": redact(&request.url, secrets),
            "body": request.body,
        });
        self.write_line(&entry);
    }

    pub fn log_response(&mut self, operation: Operation, status: u16, body: &Value) {
        let ts = Utc::now().to_rfc3339();
        let entry = match (&self.mode, self.previous.get(&operation)) {
            (MessageLogMode::Diffed, Some(prev)) => {
                let mut changes = Vec::new();
                diff_json(prev, body, "", &mut changes);
                let changes: Vec<Value> = changes
                    .into_iter()
                    .map(|(path, old, new)| json!({ "path": path, "old": old, "new": new }))
                    .collect();
                json!({
                    "ts": ts,
                    "dir": "resp",
                    "op": operation.as_str(),
                    "status": status,
                    "changes": changes,
                })
            }
            (MessageLogMode::Diffed, None) => json!({
                "ts": ts,
                "dir": "resp",
                "op": operation.as_str(),
                "status": status,
                "full": true,
                "body": body,
            }),
            (MessageLogMode::Full, _) => json!({
                "ts": ts,
                "dir": "resp",
                "op": operation.as_str(),
                "status": status,
                "body": body,
            }),
        };
        self.write_line(&entry);
        if let MessageLogMode::Diffed = self.mode {
            self.previous.insert(operation, body.clone());
        }
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write exchange log entry: {e}");
        }
    }
}

/// Collects `(path, old, new)` for every leaf that differs between two
/// documents. Removed keys are reported with a `null` new value.
pub(crate) fn diff_json(
    previous: &Value,
    current: &Value,
    path: &str,
    changes: &mut Vec<(String, Value, Value)>,
) {
    match (previous, current) {
        (Value::Object(prev), Value::Object(curr)) => {
            let empty = Value::Object(Map::new());
            for (key, curr_val) in curr {
                let child = join_path(path, key);
                match prev.get(key) {
                    Some(prev_val) => diff_json(prev_val, curr_val, &child, changes),
                    None if curr_val.is_object() => diff_json(&empty, curr_val, &child, changes),
                    None => changes.push((child, Value::Null, curr_val.clone())),
                }
            }
            for (key, prev_val) in prev {
                if !curr.contains_key(key) {
                    changes.push((join_path(path, key), prev_val.clone(), Value::Null));
                }
            }
        }
        (Value::Array(prev), Value::Array(curr)) if prev.len() == curr.len() => {
            for (i, (p, c)) in prev.iter().zip(curr).enumerate() {
                diff_json(p, c, &join_path(path, &i.to_string()), changes);
            }
        }
        (prev, curr) if prev != curr => {
            changes.push((path.to_string(), prev.clone(), curr.clone()));
        }
        _ => {}
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Shell-ready rendering of a request for debug logs. The session token and
/// any `secrets` occurring in the URL are masked.
pub(crate) fn curl_command(request: &Request, secrets: &[&str]) -> String {
    let mut parts = vec![
        "curl".to_string(),
        "-i".to_string(),
        "-X".to_string(),
        request.method.as_str().to_string(),
    ];
    for (name, value) in &request.headers {
        let value = if name.eq_ignore_ascii_case(HEADER_TOKEN) {
            REDACTED
        } else {
            value.as_str()
        };
        parts.push("-H".to_string());
        parts.push(shell_quote(&format!("{name}: {value}")));
    }
    if let Some(body) = &request.body {
        parts.push("--data".to_string());
        parts.push(shell_quote(&body.to_string()));
    }
    parts.push(shell_quote(&redact(&request.url, secrets)));
    parts.join(" ")
}

fn redact(text: &str, secrets: &[&str]) -> String {
    secrets
        .iter()
        .filter(|s| !s.is_empty())
        .fold(text.to_string(), |acc, secret| acc.replace(secret, REDACTED))
}

fn shell_quote(s: &str) -> String {
    if !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@,%+".contains(c))
    {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Method;
    use std::io::Read;
    use tempfile::NamedTempFile;

    fn read_lines(path: &str) -> Vec<Value> {
        let mut contents = String::new();
        std::fs::File::open(path)
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    fn login_request() -> Request {
        Request {
            method: Method::Post,
            url: "https://app.intelliclima.com/user/login/me/deadbeef".to_string(),
            headers: vec![
                ("Accept".to_string(), "application/json".to_string()),
                ("Token".to_string(), "tok-secret".to_string()),
            ],
            body: Some(json!({"language": "english"})),
        }
    }

    #[test]
    fn log_request_redacts_secrets() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Full, path).unwrap();
        logger.log_request(Operation::Login, &login_request(), &["deadbeef"]);

        let lines = read_lines(path);
        assert_eq!(lines[0]["dir"], "req");
        assert_eq!(lines[0]["op"], "login");
        assert_eq!(lines[0]["method"], "POST");
        assert!(!lines[0]["url"].as_str().unwrap().contains("deadbeef"));
        assert!(lines[0]["ts"].as_str().is_some());
    }

    #[test]
    fn diffed_mode_logs_full_first_then_changes() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Diffed, path).unwrap();

        logger.log_response(Operation::QueryThermostat, 200, &json!({"data": [{"id": 1, "t_amb": "20.5"}]}));
        logger.log_response(Operation::QueryThermostat, 200, &json!({"data": [{"id": 1, "t_amb": "21.0"}]}));
        logger.log_response(Operation::QueryVentilation, 200, &json!({"data": []}));

        let lines = read_lines(path);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["full"], true);
        let changes = lines[1]["changes"].as_array().unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0]["path"], "data.0.t_amb");
        assert_eq!(changes[0]["new"], "21.0");
        assert_eq!(lines[2]["full"], true);
    }

    #[test]
    fn full_mode_always_writes_body() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Full, path).unwrap();
        let body = json!({"status": "OK"});
        logger.log_response(Operation::ListHouses, 200, &body);
        logger.log_response(Operation::ListHouses, 200, &body);

        let lines = read_lines(path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["body"]["status"], "OK");
        assert!(lines[1].get("changes").is_none());
    }

    #[test]
    fn diff_reports_removed_keys() {
        let mut changes = Vec::new();
        diff_json(&json!({"a": 1, "b": 2}), &json!({"a": 1}), "", &mut changes);
        assert_eq!(changes, vec![("b".to_string(), json!(2), Value::Null)]);
    }

    #[test]
    fn curl_masks_token_and_hash() {
        let cmd = curl_command(&login_request(), &["deadbeef"]);
        assert!(cmd.starts_with("curl -i -X POST"));
        assert!(cmd.contains("'Token: <redacted>'"));
        assert!(!cmd.contains("tok-secret"));
        assert!(!cmd.contains("deadbeef"));
        assert!(cmd.contains(r#"--data '{"language":"english"}'"#));
    }

    #[test]
    fn shell_quoting() {
        assert_eq!(shell_quote("plain"), "plain");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }
}
