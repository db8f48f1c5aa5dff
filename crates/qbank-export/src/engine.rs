//! External typesetting engine.
//!
//! The render step only talks to the [`Engine`] trait, so it can be driven
//! by a fake in tests. [`LatexEngine`] runs a TeX binary as a subprocess.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use qbank_core::models::render::FailureReason;
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Cooperative cancellation for a running compile. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Capabilities granted to the engine for one compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityFlags {
    /// Allow `\write18`. The render pipeline never sets this.
    pub shell_escape: bool,
    /// Keep engine file writes inside the working directory.
    pub restrict_writes: bool,
    /// Refuse engine reads of absolute paths and parent directories, so
    /// only the working directory and the TeX tree are readable.
    pub restrict_reads: bool,
}

impl SecurityFlags {
    pub const LOCKED_DOWN: Self = Self {
        shell_escape: false,
        restrict_writes: true,
        restrict_reads: true,
    };
}

/// Inputs for one compile.
#[derive(Debug)]
pub struct CompileJob<'a> {
    pub source_path: &'a Path,
    pub working_dir: &'a Path,
    pub security: SecurityFlags,
    pub timeout: Option<Duration>,
    pub cancel: &'a CancelToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    Succeeded {
        output_path: PathBuf,
        diagnostics: String,
    },
    Failed {
        reason: FailureReason,
        diagnostics: String,
    },
}

pub trait Engine: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Extension of the artifact this engine produces.
    fn output_extension(&self) -> &str {
        "pdf"
    }

    /// Compile `job.source_path`, writing all outputs into `job.working_dir`.
    /// Blocks until the engine finishes, times out or is cancelled.
    fn compile(&self, job: &CompileJob<'_>) -> CompileOutcome;
}

/// A TeX engine driven through its command line (`pdflatex`, `xelatex`,
/// `lualatex`, or a wrapper accepting the same flags).
#[derive(Debug, Clone)]
pub struct LatexEngine {
    command: Vec<String>,
    passes: u32,
}

impl LatexEngine {
    /// `command` is argv: program followed by any leading arguments.
    pub fn new(command: Vec<String>, passes: u32) -> Self {
        Self {
            command,
            passes: passes.max(1),
        }
    }

    /// `pdflatex`, two passes so references and layout settle.
    pub fn pdflatex() -> Self {
        Self::new(vec!["pdflatex".to_string()], 2)
    }

    fn build_command(&self, job: &CompileJob<'_>, stdout: File, stderr: File) -> Option<Command> {
        let (program, leading) = self.command.split_first()?;

        let mut cmd = Command::new(program);
        cmd.args(leading);
        if job.security.shell_escape {
            cmd.arg("-shell-restricted");
        } else {
            cmd.arg("-no-shell-escape");
        }
        // Relative to the cwd, so `openin_any=p` still admits it.
        let source = job
            .source_path
            .strip_prefix(job.working_dir)
            .unwrap_or(job.source_path);
        cmd.arg("-interaction=nonstopmode")
            .arg("-halt-on-error")
            .arg(format!("-output-directory={}", job.working_dir.display()))
            .arg(source);
        if job.security.restrict_writes {
            cmd.env("openout_any", "p");
        }
        if job.security.restrict_reads {
            cmd.env("openin_any", "p");
        }
        if job.security.restrict_writes || job.security.restrict_reads {
            cmd.env("TEXMFOUTPUT", job.working_dir);
        }
        cmd.current_dir(job.working_dir)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr);
        Some(cmd)
    }

    /// One engine run. Output goes to files in the working directory so a
    /// chatty engine never stalls on a full pipe.
    fn run_pass(
        &self,
        job: &CompileJob<'_>,
        pass: u32,
        deadline: Option<Instant>,
    ) -> Result<String, (FailureReason, String)> {
        let stdout_path = job.working_dir.join(format!("engine-{pass}.stdout"));
        let stderr_path = job.working_dir.join(format!("engine-{pass}.stderr"));
        let (stdout, stderr) = match (File::create(&stdout_path), File::create(&stderr_path)) {
            (Ok(out), Ok(err)) => (out, err),
            (Err(e), _) | (_, Err(e)) => {
                return Err((
                    FailureReason::EngineUnavailable,
                    format!("could not create engine log files: {e}"),
                ));
            }
        };

        let Some(mut cmd) = self.build_command(job, stdout, stderr) else {
            return Err((
                FailureReason::EngineUnavailable,
                "engine command is empty".to_string(),
            ));
        };

        let program = self.command.first().map(String::as_str).unwrap_or_default();
        debug!(program, pass, source = %job.source_path.display(), "starting engine");

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err((
                    FailureReason::EngineUnavailable,
                    format!(
                        "engine program `{program}` not found. Install a TeX distribution \
                         (TeX Live or MiKTeX) and make sure it is on PATH."
                    ),
                ));
            }
            Err(e) => {
                return Err((
                    FailureReason::EngineUnavailable,
                    format!("failed to start `{program}`: {e}"),
                ));
            }
        };

        let status: ExitStatus = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err((
                        FailureReason::ExitCode { code: None },
                        format!("lost track of engine process: {e}"),
                    ));
                }
            }

            let stop = if job.cancel.is_cancelled() {
                Some(FailureReason::Cancelled)
            } else if deadline.is_some_and(|d| Instant::now() >= d) {
                Some(FailureReason::TimedOut {
                    after_secs: job.timeout.map(|t| t.as_secs()).unwrap_or_default(),
                })
            } else {
                None
            };

            if let Some(reason) = stop {
                warn!(program, pass, ?reason, "stopping engine");
                let _ = child.kill();
                let _ = child.wait();
                let diagnostics = read_diagnostics(&stdout_path, &stderr_path);
                return Err((reason, diagnostics));
            }

            std::thread::sleep(POLL_INTERVAL);
        };

        let diagnostics = read_diagnostics(&stdout_path, &stderr_path);
        if status.success() {
            Ok(diagnostics)
        } else {
            Err((
                FailureReason::ExitCode {
                    code: status.code(),
                },
                diagnostics,
            ))
        }
    }
}

impl Engine for LatexEngine {
    fn name(&self) -> &str {
        self.command.first().map(String::as_str).unwrap_or("latex")
    }

    fn compile(&self, job: &CompileJob<'_>) -> CompileOutcome {
        let deadline = job.timeout.map(|t| Instant::now() + t);
        let mut diagnostics = String::new();

        for pass in 1..=self.passes {
            info!(engine = self.name(), pass, passes = self.passes, "running engine pass");
            match self.run_pass(job, pass, deadline) {
                Ok(output) => diagnostics = output,
                Err((reason, output)) => {
                    return CompileOutcome::Failed {
                        reason,
                        diagnostics: output,
                    };
                }
            }
        }

        let stem = job
            .source_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let output_path = job
            .working_dir
            .join(format!("{stem}.{}", self.output_extension()));

        if output_path.is_file() {
            CompileOutcome::Succeeded {
                output_path,
                diagnostics,
            }
        } else {
            CompileOutcome::Failed {
                reason: FailureReason::MissingOutput,
                diagnostics,
            }
        }
    }
}

/// Engine stdout followed by stderr, verbatim (lossy UTF-8).
fn read_diagnostics(stdout_path: &Path, stderr_path: &Path) -> String {
    let mut text = String::new();
    for path in [stdout_path, stderr_path] {
        if let Ok(bytes) = std::fs::read(path)
            && !bytes.is_empty()
        {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&String::from_utf8_lossy(&bytes));
        }
    }
    text
}
