//! Script Executor
//!
//! Runs a generated build script in an isolated scratch directory and, when it
//! produces `{app_name}/`, moves the result into the output root.
//!
//! Every outcome is reported as an [`ExecutionReport`]; nothing here returns
//! an error. The scratch directory lives inside the output root so the final
//! move is a rename on one filesystem, and it is removed on every path when
//! its guard drops.
//!
//! On unix the script leads its own process group. Whatever is left of that
//! group is killed once the script exits or times out.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::config::ExecutorConfig;

const SCRIPT_FILE: &str = "build.sh";
const SCRATCH_PREFIX: &str = ".railyard-";
/// How long to keep reading output after the script exits
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// How an execution ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Succeeded,
    /// The app already exists in the output root; nothing was run
    Conflict,
    TimedOut,
    ExitFailure,
    /// The script exited cleanly but did not create the app directory
    MissingArtifact,
    Internal,
}

/// Outcome of one script run
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub log: String,
    #[serde(skip)]
    pub status: ExecutionStatus,
}

impl ExecutionReport {
    pub fn succeeded(path: PathBuf, log: Vec<String>) -> Self {
        Self {
            success: true,
            path: Some(path),
            error: None,
            log: log.join("\n"),
            status: ExecutionStatus::Succeeded,
        }
    }

    pub fn failed(status: ExecutionStatus, error: impl Into<String>, log: Vec<String>) -> Self {
        Self {
            success: false,
            path: None,
            error: Some(error.into()),
            log: log.join("\n"),
            status,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.status == ExecutionStatus::Conflict
    }
}

/// Something that can turn a script into an app on disk
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    async fn run(&self, script: &str, app_name: &str) -> ExecutionReport;
}

/// Runs scripts with a shell child process
#[derive(Debug, Clone)]
pub struct ScriptExecutor {
    output_dir: PathBuf,
    timeout: Duration,
    shell: String,
}

impl ScriptExecutor {
    pub fn new(config: &ExecutorConfig) -> Self {
        Self {
            output_dir: config.output_path(),
            timeout: config.timeout(),
            shell: config.shell.clone(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Run `script` and move `{app_name}/` into the output root
    pub async fn execute(&self, script: &str, app_name: &str) -> ExecutionReport {
        if app_name.is_empty() || app_name.contains(['/', '\\']) || app_name.starts_with('.') {
            return ExecutionReport::failed(
                ExecutionStatus::Internal,
                format!("Execution failed: invalid app name '{}'", app_name),
                Vec::new(),
            );
        }

        if let Err(e) = tokio::fs::create_dir_all(&self.output_dir).await {
            error!("Cannot create output directory {}: {}", self.output_dir.display(), e);
            return ExecutionReport::failed(ExecutionStatus::Internal, format!("Execution failed: {}", e), Vec::new());
        }

        // Best-effort: a concurrent run for the same name can still pass here
        let final_path = self.output_dir.join(app_name);
        if final_path.exists() {
            info!("Refusing to overwrite existing app {}", final_path.display());
            return ExecutionReport::failed(
                ExecutionStatus::Conflict,
                format!(
                    "App '{}' already exists in output directory. Please choose a different name or delete the existing app.",
                    app_name
                ),
                Vec::new(),
            );
        }

        let scratch = match tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(&self.output_dir)
        {
            Ok(dir) => dir,
            Err(e) => {
                error!("Cannot create scratch directory: {}", e);
                return ExecutionReport::failed(ExecutionStatus::Internal, format!("Execution failed: {}", e), Vec::new());
            }
        };

        let mut log = Vec::new();
        match self.run_in(scratch.path(), script, app_name, &final_path, &mut log).await {
            Ok(report) => report,
            Err(e) => {
                error!("Execution of {} failed: {}", app_name, e);
                ExecutionReport::failed(ExecutionStatus::Internal, format!("Execution failed: {}", e), log)
            }
        }
    }

    async fn run_in(
        &self,
        scratch: &Path,
        script: &str,
        app_name: &str,
        final_path: &Path,
        log: &mut Vec<String>,
    ) -> std::io::Result<ExecutionReport> {
        let script_path = scratch.join(SCRIPT_FILE);
        tokio::fs::write(&script_path, script).await?;

        log.push("=== RailYard Build Script ===".to_string());
        log.push(format!("App Name: {}", app_name));
        log.push(format!("Temp Directory: {}", scratch.display()));
        log.push(format!("Started: {}", chrono::Utc::now().to_rfc3339()));
        log.push("=== Executing Script ===".to_string());
        log.push(String::new());

        let mut command = Command::new(&self.shell);
        command
            .arg(&script_path)
            .current_dir(scratch)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so the script and everything it starts die together
        #[cfg(unix)]
        command.process_group(0);
        let mut child = command.spawn()?;

        let pid = child.id();
        info!("Running build script for {} (pid {})", app_name, pid.unwrap_or(0));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward_lines(stdout, "", tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward_lines(stderr, "[ERROR] ", tx.clone()));
        }
        drop(tx);

        let deadline = Instant::now() + self.timeout;
        let outcome = drain_and_wait(&mut child, &mut rx, log, deadline).await;

        // Stragglers left in the group would outlive the scratch directory
        kill_process_group(pid);
        for reader in readers {
            reader.abort();
        }

        let status = match outcome {
            Some(status) => status?,
            None => {
                warn!("Build script for {} timed out after {:?}", app_name, self.timeout);
                if let Err(e) = child.kill().await {
                    debug!("Kill after timeout failed: {}", e);
                }
                let secs = self.timeout.as_secs();
                log.push(String::new());
                log.push(format!("=== ERROR: Script execution timed out after {} seconds ===", secs));
                return Ok(ExecutionReport::failed(
                    ExecutionStatus::TimedOut,
                    format!("Script execution timed out after {} seconds", secs),
                    std::mem::take(log),
                ));
            }
        };

        if !status.success() {
            let code = status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            log.push(String::new());
            log.push(format!("=== ERROR: Script failed with exit code {} ===", code));
            return Ok(ExecutionReport::failed(
                ExecutionStatus::ExitFailure,
                format!("Script failed with exit code {}", code),
                std::mem::take(log),
            ));
        }

        let built = scratch.join(app_name);
        if !built.is_dir() {
            log.push(String::new());
            log.push(format!("=== ERROR: Generated app not found at {} ===", built.display()));
            return Ok(ExecutionReport::failed(
                ExecutionStatus::MissingArtifact,
                "Generated app directory not found",
                std::mem::take(log),
            ));
        }

        tokio::fs::rename(&built, final_path).await?;

        log.push(String::new());
        log.push("=== SUCCESS ===".to_string());
        log.push(format!("App generated at: {}", final_path.display()));
        info!("Generated {} at {}", app_name, final_path.display());

        Ok(ExecutionReport::succeeded(final_path.to_path_buf(), std::mem::take(log)))
    }
}

#[async_trait]
impl ScriptRunner for ScriptExecutor {
    async fn run(&self, script: &str, app_name: &str) -> ExecutionReport {
        self.execute(script, app_name).await
    }
}

/// Forward each line of a child stream into the shared log channel
fn forward_lines<R>(stream: R, prefix: &'static str, tx: mpsc::UnboundedSender<String>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(format!("{}{}", prefix, line)).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    debug!("Stopped reading child output: {}", e);
                    break;
                }
            }
        }
    })
}

/// Collect output while waiting for the child, then keep reading for
/// [`DRAIN_GRACE`] or until both streams close. `None` means the deadline
/// passed before the child exited.
async fn drain_and_wait(
    child: &mut Child,
    rx: &mut mpsc::UnboundedReceiver<String>,
    log: &mut Vec<String>,
    deadline: Instant,
) -> Option<std::io::Result<ExitStatus>> {
    let expired = tokio::time::sleep_until(deadline);
    tokio::pin!(expired);

    let mut streams_open = true;
    let status = loop {
        tokio::select! {
            line = rx.recv(), if streams_open => match line {
                Some(line) => log.push(line),
                None => streams_open = false,
            },
            status = child.wait() => break status,
            _ = &mut expired => return None,
        }
    };

    // A background process may hold the pipes open after the script is gone
    let grace = Instant::now() + DRAIN_GRACE;
    while let Ok(Some(line)) = tokio::time::timeout_at(grace, rx.recv()).await {
        log.push(line);
    }
    Some(status)
}

/// SIGKILL every process left in the group led by `pid`
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    let Some(pid) = pid.and_then(|p| libc::pid_t::try_from(p).ok()) else {
        return;
    };
    // SAFETY: killpg takes plain integers and touches no memory of ours
    if unsafe { libc::killpg(pid, libc::SIGKILL) } != 0 {
        debug!("No process group left for {}: {}", pid, std::io::Error::last_os_error());
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

/// Names of generated apps: non-hidden directories directly under `dir`,
/// sorted. A missing directory yields an empty list.
pub fn list_apps(dir: &Path) -> Vec<String> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| !name.starts_with('.'))
        .collect()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn executor(root: &Path) -> ScriptExecutor {
        let config = ExecutorConfig {
            output_dir: root.to_path_buf(),
            ..Default::default()
        };
        ScriptExecutor::new(&config)
    }

    fn leftovers(root: &Path) -> Vec<String> {
        std::fs::read_dir(root)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(SCRATCH_PREFIX))
            .collect()
    }

    #[tokio::test]
    async fn test_success_moves_app_and_captures_both_streams() {
        let root = tempfile::tempdir().unwrap();
        let script = "set -e\nmkdir blog\necho building\necho careful >&2\ntouch blog/Gemfile\n";

        let report = executor(root.path()).execute(script, "blog").await;

        assert!(report.success, "{:?}", report);
        assert_eq!(report.status, ExecutionStatus::Succeeded);
        assert_eq!(report.path.as_deref(), Some(root.path().join("blog").as_path()));
        assert!(root.path().join("blog/Gemfile").exists());
        assert!(report.log.starts_with("=== RailYard Build Script ===\nApp Name: blog"));
        assert!(report.log.contains("\nbuilding\n"));
        assert!(report.log.contains("[ERROR] careful"));
        assert!(report.log.ends_with(&format!("App generated at: {}", root.path().join("blog").display())));
        assert!(leftovers(root.path()).is_empty());
    }

    #[tokio::test]
    async fn test_existing_app_is_a_conflict_and_nothing_runs() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("blog")).unwrap();

        let report = executor(root.path()).execute("touch ../ran\nmkdir blog\n", "blog").await;

        assert!(!report.success);
        assert!(report.is_conflict());
        assert_eq!(
            report.error.as_deref(),
            Some("App 'blog' already exists in output directory. Please choose a different name or delete the existing app.")
        );
        assert!(!root.path().join("ran").exists());
    }

    #[tokio::test]
    async fn test_non_zero_exit() {
        let root = tempfile::tempdir().unwrap();
        let report = executor(root.path()).execute("echo trying\nexit 3\n", "blog").await;

        assert_eq!(report.status, ExecutionStatus::ExitFailure);
        assert_eq!(report.error.as_deref(), Some("Script failed with exit code 3"));
        assert!(report.log.contains("trying"));
        assert!(report.log.ends_with("=== ERROR: Script failed with exit code 3 ==="));
        assert!(!root.path().join("blog").exists());
        assert!(leftovers(root.path()).is_empty());
    }

    #[tokio::test]
    async fn test_missing_app_directory() {
        let root = tempfile::tempdir().unwrap();
        let report = executor(root.path()).execute("echo done\n", "blog").await;

        assert_eq!(report.status, ExecutionStatus::MissingArtifact);
        assert_eq!(report.error.as_deref(), Some("Generated app directory not found"));
    }

    #[tokio::test]
    async fn test_timeout_kills_script() {
        let root = tempfile::tempdir().unwrap();
        let runner = executor(root.path()).with_timeout(Duration::from_millis(300));

        let started = std::time::Instant::now();
        let report = runner.execute("echo waiting\nsleep 10\nmkdir blog\n", "blog").await;

        assert_eq!(report.status, ExecutionStatus::TimedOut);
        assert!(report.error.as_deref().unwrap().starts_with("Script execution timed out after"));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!root.path().join("blog").exists());
    }

    #[tokio::test]
    async fn test_timeout_kills_background_processes() {
        let root = tempfile::tempdir().unwrap();
        let marker = root.path().join("grandchild-ran");
        let script = format!("(sleep 1 && touch '{}') &\nsleep 10\n", marker.display());
        let runner = executor(root.path()).with_timeout(Duration::from_millis(300));

        let report = runner.execute(&script, "blog").await;
        assert_eq!(report.status, ExecutionStatus::TimedOut);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!marker.exists(), "background process survived the timeout");
    }

    #[tokio::test]
    async fn test_lingering_background_output_does_not_block_success() {
        let root = tempfile::tempdir().unwrap();
        let script = "mkdir blog\nsleep 30 &\necho done\n";
        let runner = executor(root.path()).with_timeout(Duration::from_secs(20));

        let started = std::time::Instant::now();
        let report = runner.execute(script, "blog").await;

        assert!(report.success, "{:?}", report);
        assert!(report.log.contains("\ndone\n"));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(root.path().join("blog").is_dir());
    }

    #[tokio::test]
    async fn test_rejects_path_like_app_names() {
        let root = tempfile::tempdir().unwrap();
        let report = executor(root.path()).execute("true\n", "../escape").await;
        assert_eq!(report.status, ExecutionStatus::Internal);
    }

    #[test]
    fn test_report_wire_shape() {
        let report = ExecutionReport::failed(ExecutionStatus::ExitFailure, "boom", vec!["a".into(), "b".into()]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json, serde_json::json!({"success": false, "error": "boom", "log": "a\nb"}));
    }

    #[test]
    fn test_list_apps_skips_hidden_and_files() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("shop")).unwrap();
        std::fs::create_dir(root.path().join("blog")).unwrap();
        std::fs::create_dir(root.path().join(".railyard-abc")).unwrap();
        std::fs::write(root.path().join("notes.txt"), "x").unwrap();

        assert_eq!(list_apps(root.path()), vec!["blog", "shop"]);
        assert!(list_apps(&root.path().join("missing")).is_empty());
    }
}
