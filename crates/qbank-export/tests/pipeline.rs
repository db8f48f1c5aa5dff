mod common;

use std::fs;
use std::sync::Arc;

use qbank_core::models::export::{ExportConfiguration, ExportFlow};
use qbank_core::models::list::ListId;
use qbank_core::models::render::{FailureReason, RenderResult};
use qbank_core::models::report::{ExportStatus, ExportWarning};
use qbank_export::engine::CancelToken;
use qbank_export::render::WORK_DIR;
use qbank_export::{ExportError, Exporter, ExporterSettings, export_in_background};
use qbank_store::MemoryStore;

use common::{
    FakeBehaviour, FakeEngine, SharedEngine, free_response, list, single_select, with_image,
};

struct Harness {
    _dir: tempfile::TempDir,
    export_dir: std::path::PathBuf,
    engine: Arc<FakeEngine>,
    exporter: Exporter,
}

fn harness(behaviour: FakeBehaviour) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let export_dir = dir.path().join("out");
    let image_root = dir.path().join("images");
    fs::create_dir_all(&image_root).unwrap();
    fs::write(image_root.join("chart.png"), b"png").unwrap();

    let store = MemoryStore::new()
        .with_list(list("L1", "Unit 3 Quiz", &["Q1", "Q2", "Q3"]))
        .with_list(list("L2", "Partial", &["Q1", "DELETED", "Q3"]))
        .with_list(list("L3", "Multiple Choice", &["Q1", "Q2", "Q4"]))
        .with_list(list("L4", "Charts", &["Q5"]))
        .with_question(single_select("Q1", "First question", 'A'))
        .with_question(single_select("Q2", "Second question", 'C'))
        .with_question(free_response("Q3", "Third question"))
        .with_question(single_select("Q4", "Fourth question", 'B'))
        .with_question(with_image(free_response("Q5", "Read the chart"), "chart.png"));

    let engine = Arc::new(FakeEngine::new(behaviour));
    let settings = ExporterSettings::new(&export_dir, &image_root);
    let exporter = Exporter::new(store, SharedEngine(engine.clone()), settings).unwrap();

    Harness {
        _dir: dir,
        export_dir,
        engine,
        exporter,
    }
}

fn manual() -> ExportConfiguration {
    ExportConfiguration {
        flow: ExportFlow::Manual,
        ..ExportConfiguration::default()
    }
}

#[test]
fn manual_flow_writes_source_without_running_engine() {
    let h = harness(FakeBehaviour::Produce);

    let report = h.exporter.export(&ListId::new("L1"), &manual()).unwrap();

    let RenderResult::SourceWritten { source_path } = &report.outcome else {
        panic!("expected source written, got {:?}", report.outcome);
    };
    assert_eq!(source_path, &h.export_dir.join("Unit_3_Quiz_default.tex"));
    assert_eq!(h.engine.call_count(), 0);
    assert_eq!(report.status(), ExportStatus::Succeeded);
    assert_eq!(report.question_count, 3);

    let source = fs::read_to_string(source_path).unwrap();
    let (body, key) = source.split_once(r"\section*{Answer Key}").unwrap();
    assert_eq!(body.matches(r"\item{} ").count(), 3);
    assert_eq!(key.matches(r"\item{} ").count(), 3);
    assert!(key.contains(r"\item{} A"));
    assert!(key.contains(r"\item{} C"));
    assert!(key.contains(r"\item{} See solutions"));
    assert!(source.contains(r"\textbf{Unit 3 Quiz}"));
    assert!(source.trim_end().ends_with(r"\end{document}"));
}

#[test]
fn answer_key_lists_each_correct_label_in_order() {
    let h = harness(FakeBehaviour::Produce);

    let report = h.exporter.export(&ListId::new("L3"), &manual()).unwrap();

    assert_eq!(report.question_count, 3);
    assert!(report.warnings.is_empty());
    let source = fs::read_to_string(report.outcome.path()).unwrap();
    let (body, rest) = source.split_once(r"\section*{Answer Key}").unwrap();
    let (key, _) = rest.split_once(r"\end{enumerate}").unwrap();

    assert_eq!(body.matches(r"\item[A)]").count(), 3);
    let key_lines: Vec<&str> = key
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with(r"\item"))
        .collect();
    assert_eq!(key_lines, [r"\item{} A", r"\item{} C", r"\item{} B"]);
    assert!(!key.contains("See solutions"));
}

#[test]
fn direct_flow_stages_images_beside_the_source() {
    let h = harness(FakeBehaviour::Fail {
        code: 1,
        log: "stopped".to_string(),
    });

    let report = h
        .exporter
        .export(&ListId::new("L4"), &ExportConfiguration::default())
        .unwrap();

    let RenderResult::Failed { source_path, .. } = &report.outcome else {
        panic!("expected failure, got {:?}", report.outcome);
    };
    let working_dir = source_path.parent().unwrap();
    assert_eq!(fs::read(working_dir.join("assets/img001.png")).unwrap(), b"png");

    let source = fs::read_to_string(source_path).unwrap();
    assert!(source.contains("{assets/img001.png}"));
    assert!(!source.contains("chart.png"));
}

#[test]
fn direct_flow_publishes_artifact_and_cleans_up() {
    let h = harness(FakeBehaviour::Produce);
    let config = ExportConfiguration {
        base_filename: Some("quiz-v1".to_string()),
        ..ExportConfiguration::default()
    };

    let report = h.exporter.export(&ListId::new("L1"), &config).unwrap();

    let expected = h.export_dir.join("quiz-v1.pdf");
    assert_eq!(
        report.outcome,
        RenderResult::Compiled {
            output_path: expected.clone()
        }
    );
    assert!(expected.is_file());
    assert_eq!(h.engine.call_count(), 1);

    let leftovers: Vec<_> = fs::read_dir(h.export_dir.join(WORK_DIR))
        .unwrap()
        .collect();
    assert!(leftovers.is_empty(), "working directory should be removed");
}

#[test]
fn failed_compile_keeps_source_and_reports_diagnostics() {
    let h = harness(FakeBehaviour::Fail {
        code: 1,
        log: "! Undefined control sequence.\nl.12 \\foo".to_string(),
    });

    let report = h
        .exporter
        .export(&ListId::new("L1"), &ExportConfiguration::default())
        .unwrap();

    assert_eq!(report.status(), ExportStatus::Failed);
    let RenderResult::Failed {
        reason,
        diagnostics,
        source_path,
    } = &report.outcome
    else {
        panic!("expected failure, got {:?}", report.outcome);
    };
    assert_eq!(reason, &FailureReason::ExitCode { code: Some(1) });
    assert!(diagnostics.contains("Undefined control sequence"));
    assert!(source_path.is_file());
    assert!(!h.export_dir.join("Unit_3_Quiz_default.pdf").exists());
}

#[test]
fn empty_engine_log_still_gives_diagnostics() {
    let h = harness(FakeBehaviour::Fail {
        code: 2,
        log: String::new(),
    });

    let report = h
        .exporter
        .export(&ListId::new("L1"), &ExportConfiguration::default())
        .unwrap();

    let RenderResult::Failed { diagnostics, .. } = &report.outcome else {
        panic!("expected failure");
    };
    assert!(!diagnostics.trim().is_empty());
}

#[test]
fn dangling_questions_are_reported_not_fatal() {
    let h = harness(FakeBehaviour::Produce);

    let report = h.exporter.export(&ListId::new("L2"), &manual()).unwrap();

    assert_eq!(report.question_count, 2);
    assert_eq!(report.omitted_questions.len(), 1);
    assert_eq!(report.status(), ExportStatus::SucceededWithOmissions);
    assert!(report.warnings.iter().any(|w| matches!(
        w,
        ExportWarning::QuestionMissing { question_id } if question_id.as_str() == "DELETED"
    )));
}

#[test]
fn unknown_template_fails_before_writing_anything() {
    let h = harness(FakeBehaviour::Produce);
    let config = ExportConfiguration {
        template: "nonexistent".to_string(),
        ..manual()
    };

    let err = h.exporter.export(&ListId::new("L1"), &config).unwrap_err();

    assert!(matches!(err, ExportError::TemplateNotFound(id) if id == "nonexistent"));
    assert!(!h.export_dir.exists());
}

#[test]
fn invalid_configuration_is_rejected() {
    let h = harness(FakeBehaviour::Produce);
    let config = ExportConfiguration {
        columns: 3,
        ..ExportConfiguration::default()
    };

    let err = h.exporter.export(&ListId::new("L1"), &config).unwrap_err();
    assert!(matches!(err, ExportError::Invalid(_)));
    assert_eq!(h.engine.call_count(), 0);
}

#[test]
fn traversal_in_base_filename_is_rejected() {
    let h = harness(FakeBehaviour::Produce);
    let config = ExportConfiguration {
        base_filename: Some("../escape".to_string()),
        ..manual()
    };

    assert!(h.exporter.export(&ListId::new("L1"), &config).is_err());
    assert!(!h.export_dir.exists());
}

#[test]
fn missing_list_is_an_error() {
    let h = harness(FakeBehaviour::Produce);

    let err = h
        .exporter
        .export(&ListId::new("nope"), &manual())
        .unwrap_err();
    assert!(matches!(err, ExportError::ListNotFound(id) if id == "nope"));
}

#[test]
fn seeded_exports_are_reproducible() {
    let h = harness(FakeBehaviour::Produce);
    let config = ExportConfiguration {
        randomize: true,
        seed: Some(2024),
        ..manual()
    };

    let first = h.exporter.export(&ListId::new("L1"), &config).unwrap();
    let source_a = fs::read_to_string(first.outcome.path()).unwrap();
    let second = h.exporter.export(&ListId::new("L1"), &config).unwrap();
    let source_b = fs::read_to_string(second.outcome.path()).unwrap();

    assert_eq!(first.seed, Some(2024));
    assert_eq!(source_a, source_b);
}

#[tokio::test]
async fn background_export_completes() {
    let h = harness(FakeBehaviour::Produce);
    let exporter = Arc::new(h.exporter);

    let report = export_in_background(
        exporter,
        ListId::new("L1"),
        manual(),
        CancelToken::new(),
    )
    .await
    .unwrap();

    assert!(matches!(report.outcome, RenderResult::SourceWritten { .. }));
}
