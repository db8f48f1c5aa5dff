//! Drives `LatexEngine` with small shell scripts standing in for a TeX
//! binary. The scripts receive the same arguments pdflatex would.
#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use qbank_core::models::render::FailureReason;
use qbank_export::engine::{
    CancelToken, CompileJob, CompileOutcome, Engine, LatexEngine, SecurityFlags,
};

struct Workspace {
    _dir: tempfile::TempDir,
    work: PathBuf,
    source: PathBuf,
    script: PathBuf,
}

fn workspace(script: &str) -> Workspace {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("work")).unwrap();
    let work = dir.path().join("work").canonicalize().unwrap();
    let source = work.join("quiz.tex");
    fs::write(&source, "\\documentclass{article}\n").unwrap();
    let script_path = dir.path().join("engine.sh");
    fs::write(&script_path, script).unwrap();
    Workspace {
        _dir: dir,
        work,
        source,
        script: script_path,
    }
}

fn engine(ws: &Workspace, passes: u32) -> LatexEngine {
    LatexEngine::new(
        vec!["sh".to_string(), ws.script.display().to_string()],
        passes,
    )
}

fn compile(
    engine: &LatexEngine,
    ws: &Workspace,
    timeout: Option<Duration>,
    cancel: &CancelToken,
) -> CompileOutcome {
    engine.compile(&CompileJob {
        source_path: &ws.source,
        working_dir: &ws.work,
        security: SecurityFlags::LOCKED_DOWN,
        timeout,
        cancel,
    })
}

fn count_lines(path: &Path) -> usize {
    fs::read_to_string(path).map(|s| s.lines().count()).unwrap_or(0)
}

const PRODUCES_PDF: &str = r#"
for last; do :; done
echo "args: $@"
echo "openout_any=$openout_any"
echo "openin_any=$openin_any"
echo "source=$last"
echo pass >> passes.log
printf '%%PDF-1.5' > "${last%.tex}.pdf"
"#;

#[test]
fn successful_run_produces_output_after_all_passes() {
    let ws = workspace(PRODUCES_PDF);
    let engine = engine(&ws, 2);

    let timeout = Some(Duration::from_secs(30));
    let outcome = compile(&engine, &ws, timeout, &CancelToken::new());

    let CompileOutcome::Succeeded {
        output_path,
        diagnostics,
    } = outcome
    else {
        panic!("expected success, got {outcome:?}");
    };
    assert_eq!(output_path, ws.work.join("quiz.pdf"));
    assert!(output_path.is_file());
    assert_eq!(count_lines(&ws.work.join("passes.log")), 2);
    assert!(diagnostics.contains("-no-shell-escape"));
    assert!(diagnostics.contains("-interaction=nonstopmode"));
    assert!(diagnostics.contains("openout_any=p"));
    assert!(diagnostics.contains("openin_any=p"));
    assert!(diagnostics.contains("source=quiz.tex"));
}

#[test]
fn non_zero_exit_is_a_failure_with_log() {
    let ws = workspace("echo '! LaTeX Error: File `missing.sty'\\'' not found.'\nexit 1\n");
    let engine = engine(&ws, 2);

    let outcome = compile(&engine, &ws, None, &CancelToken::new());

    let CompileOutcome::Failed {
        reason,
        diagnostics,
    } = outcome
    else {
        panic!("expected failure, got {outcome:?}");
    };
    assert_eq!(reason, FailureReason::ExitCode { code: Some(1) });
    assert!(diagnostics.contains("missing.sty"));
}

#[test]
fn clean_exit_without_output_is_missing_output() {
    let ws = workspace("echo 'No pages of output.'\n");
    let engine = engine(&ws, 1);

    let outcome = compile(&engine, &ws, None, &CancelToken::new());

    assert!(matches!(
        outcome,
        CompileOutcome::Failed {
            reason: FailureReason::MissingOutput,
            ..
        }
    ));
}

#[test]
fn hung_engine_is_killed_at_the_deadline() {
    let ws = workspace("exec sleep 30\n");
    let engine = engine(&ws, 2);

    let started = std::time::Instant::now();
    let timeout = Some(Duration::from_millis(300));
    let outcome = compile(&engine, &ws, timeout, &CancelToken::new());

    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(matches!(
        outcome,
        CompileOutcome::Failed {
            reason: FailureReason::TimedOut { .. },
            ..
        }
    ));
}

#[test]
fn cancelled_token_stops_the_engine() {
    let ws = workspace("exec sleep 30\n");
    let engine = engine(&ws, 1);
    let cancel = CancelToken::new();
    cancel.cancel();

    let outcome = compile(&engine, &ws, None, &cancel);

    assert!(matches!(
        outcome,
        CompileOutcome::Failed {
            reason: FailureReason::Cancelled,
            ..
        }
    ));
}

#[test]
fn missing_binary_is_engine_unavailable_with_hint() {
    let ws = workspace("");
    let engine = LatexEngine::new(vec!["qbank-no-such-tex-binary".to_string()], 2);

    let outcome = compile(&engine, &ws, None, &CancelToken::new());

    let CompileOutcome::Failed {
        reason,
        diagnostics,
    } = outcome
    else {
        panic!("expected failure, got {outcome:?}");
    };
    assert_eq!(reason, FailureReason::EngineUnavailable);
    assert!(diagnostics.contains("TeX"));
}
