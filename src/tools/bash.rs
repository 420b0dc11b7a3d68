//! Bash/PowerShell command execution tool.
//!
//! Spawns a
//! platform shell, pipes stdout/stderr, and enforces a wall-clock timeout
//! with a best-effort kill on expiry. Adapted here to the [`ToolProvider`]
//! contract instead of the old bespoke `Tool`/`execute` pair.

use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::provider::{BoxFuture, ParamType, ToolCall, ToolParameter};

use super::ToolProvider;

#[derive(Clone)]
pub struct BashTool {
    timeout_secs: u64,
    working_dir: Option<std::path::PathBuf>,
}

impl BashTool {
    pub fn new() -> Self {
        Self { timeout_secs: 30, working_dir: None }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_working_dir(mut self, dir: std::path::PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }

    fn error_context(&self, command: &str) -> String {
        let shell = if cfg!(target_os = "windows") { "powershell" } else { "sh" };
        let cwd = if let Some(dir) = &self.working_dir {
            dir.display().to_string()
        } else {
            std::env::current_dir().map(|d| d.display().to_string()).unwrap_or_else(|_| "(unknown)".to_string())
        };
        format!("shell={shell}\ncwd={cwd}\ncommand={command}")
    }

    fn combine_output(stdout: &str, stderr: &str) -> String {
        let mut result = String::new();
        if !stdout.is_empty() {
            result.push_str(stdout);
        }
        if !stderr.is_empty() {
            if !result.is_empty() {
                result.push_str("\n---STDERR---\n");
            }
            result.push_str(stderr);
        }
        result
    }

    pub async fn execute_command(&self, command: &str) -> Result<String, String> {
        if command.trim().is_empty() {
            return Err(format!("Command cannot be empty\n{}", self.error_context(command)));
        }

        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("powershell");
            c.args(["-NoProfile", "-ExecutionPolicy", "Bypass", "-Command", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| format!("Failed to spawn command: {e}\n{}", self.error_context(command)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| format!("Failed to capture stdout\n{}", self.error_context(command)))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| format!("Failed to capture stderr\n{}", self.error_context(command)))?;

        let stdout_handle = tokio::spawn(async move {
            let mut buf = Vec::new();
            tokio::io::BufReader::new(stdout).read_to_end(&mut buf).await.map(|_| buf).map_err(|e| e.to_string())
        });
        let stderr_handle = tokio::spawn(async move {
            let mut buf = Vec::new();
            tokio::io::BufReader::new(stderr).read_to_end(&mut buf).await.map(|_| buf).map_err(|e| e.to_string())
        });

        let timeout = Duration::from_secs(self.timeout_secs);
        let status = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(result) => {
                result.map_err(|e| format!("Command execution failed: {e}\n{}", self.error_context(command)))?
            }
            Err(_) => {
                let kill_result = match child.kill().await {
                    Ok(_) => "killed".to_string(),
                    Err(e) => format!("kill failed: {e}"),
                };
                let _ = tokio::time::timeout(Duration::from_secs(2), child.wait()).await;
                let stdout_text = match stdout_handle.await {
                    Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).to_string(),
                    Ok(Err(e)) => format!("(failed to read stdout: {e})"),
                    Err(e) => format!("(failed to join stdout reader: {e})"),
                };
                let stderr_text = match stderr_handle.await {
                    Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).to_string(),
                    Ok(Err(e)) => format!("(failed to read stderr: {e})"),
                    Err(e) => format!("(failed to join stderr reader: {e})"),
                };
                let output = Self::combine_output(&stdout_text, &stderr_text);
                return Err(format!(
                    "Command timed out after {} seconds (kill: {kill_result})\n{}\n{}",
                    self.timeout_secs,
                    if output.is_empty() { "(no output)".to_string() } else { output },
                    self.error_context(command)
                ));
            }
        };

        let stdout_bytes = stdout_handle
            .await
            .map_err(|e| format!("Failed to join stdout reader: {e}"))?
            .map_err(|e| format!("Failed to read stdout: {e}"))?;
        let stderr_bytes = stderr_handle
            .await
            .map_err(|e| format!("Failed to join stderr reader: {e}"))?
            .map_err(|e| format!("Failed to read stderr: {e}"))?;

        let stdout = String::from_utf8_lossy(&stdout_bytes);
        let stderr = String::from_utf8_lossy(&stderr_bytes);
        let result = Self::combine_output(&stdout, &stderr);

        if status.success() {
            Ok(if result.is_empty() { "(Command completed successfully with no output)".to_string() } else { result })
        } else {
            let exit_code = status.code().unwrap_or(-1);
            Err(format!(
                "Command failed with exit code {exit_code}\n{}\n{}",
                if result.is_empty() { "(no output)".to_string() } else { result },
                self.error_context(command)
            ))
        }
    }
}

impl Default for BashTool {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolProvider for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn brief(&self) -> &str {
        "Execute a shell command and return its combined stdout/stderr."
    }

    fn full_description(&self) -> String {
        let os = std::env::consts::OS;
        let (shell_name, rules, examples) = if cfg!(target_os = "windows") {
            (
                "PowerShell",
                "On Windows, generate PowerShell commands. Do not use bash syntax or Unix utilities.",
                "Examples:\n    - List files: Get-ChildItem\n    - Read file: Get-Content file.txt",
            )
        } else {
            (
                "bash",
                "On Linux/macOS, generate bash-compatible shell commands.",
                "Examples:\n    - List files: ls\n    - Read file: cat file.txt\n    - Search text: grep foo file.txt",
            )
        };
        format!("Execute a shell command and return the output.\n{rules}\nCurrent OS: {os}\nShell: {shell_name}\n{examples}")
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![ToolParameter {
            name: "command".to_string(),
            param_type: ParamType::String,
            description: "The shell command to execute.".to_string(),
            required: true,
            default: None,
            enum_values: None,
        }]
    }

    fn category(&self) -> &str {
        "shell"
    }

    fn dangerous(&self) -> bool {
        true
    }

    fn execute<'a>(&'a self, call: &'a ToolCall) -> BoxFuture<'a, Result<String, String>> {
        Box::pin(async move {
            let command = call
                .arguments
                .get("command")
                .and_then(|v| v.as_str())
                .ok_or_else(|| format!("Missing 'command' argument\n{}", self.error_context("<missing>")))?;
            self.execute_command(command).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_a_simple_command() {
        let tool = BashTool::new();
        let result = tool.execute_command("echo hello").await;
        assert!(result.unwrap().contains("hello"));
    }

    #[tokio::test]
    async fn surfaces_nonzero_exit() {
        let tool = BashTool::new();
        assert!(tool.execute_command("exit 1").await.is_err());
    }

    #[tokio::test]
    async fn kills_on_timeout() {
        let tool = BashTool::new().with_timeout(1);
        let result = if cfg!(target_os = "windows") {
            tool.execute_command("timeout /t 5").await
        } else {
            tool.execute_command("sleep 5").await
        };
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn execute_rejects_missing_command_argument() {
        let tool = BashTool::new();
        let call = ToolCall { id: "1".into(), name: "bash".into(), arguments: serde_json::json!({}) };
        assert!(tool.execute(&call).await.is_err());
    }
}
