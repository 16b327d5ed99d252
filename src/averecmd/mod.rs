// averecmd.rs
//
// The vFXT cluster management CLI, `averecmd`.
//
// Tests run it on the controller over SSH; here we only build the command
// line and turn what it prints back into data.

pub mod pyliteral;

use serde_json::Value;

pub const DEFAULT_USER: &str = "admin";

#[derive(Debug, Clone)]
pub struct AverecmdCall {
    pub user: String,
    pub password: String,
    pub server: String,
    pub method: String,
    pub args: String,
}

impl AverecmdCall {
    pub fn new(server: &str, password: &str, method: &str) -> Self {
        AverecmdCall {
            user: DEFAULT_USER.to_string(),
            password: password.to_string(),
            server: server.to_string(),
            method: method.to_string(),
            args: String::new(),
        }
    }

    pub fn with_args(mut self, args: &str) -> Self {
        self.args = args.to_string();
        self
    }

    pub fn command_line(&self) -> String {
        let mut ret = format!(
            "averecmd --raw --no-check-certificate --user {} --password {} --server {} {}",
            self.user, self.password, self.server, self.method
        );
        if !self.args.is_empty() {
            ret.push(' ');
            ret.push_str(&self.args);
        }
        ret
    }
}

/// Evaluates averecmd output as a Python literal. Output that is not a
/// literal (plain messages, errors) comes back as a trimmed JSON string.
pub fn parse_output(stdout: &str) -> Value {
    let trimmed = stdout.trim();
    match pyliteral::parse(trimmed) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!("averecmd output is not a literal ({}), keeping it as text", e);
            Value::String(trimmed.to_string())
        }
    }
}
