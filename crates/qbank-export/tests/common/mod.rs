#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Mutex;

use qbank_core::models::list::{ListDocument, ListId};
use qbank_core::models::question::{
    AnswerFormat, ImageRef, OptionContent, OptionRecord, QuestionId, QuestionRecord,
};
use qbank_core::models::render::FailureReason;
use qbank_export::engine::{CompileJob, CompileOutcome, Engine};

pub fn text_option(label: char, text: &str, correct: bool) -> OptionRecord {
    OptionRecord {
        label,
        content: OptionContent::Text {
            markup: text.to_string(),
        },
        correct,
    }
}

pub fn single_select(id: &str, statement: &str, correct: char) -> QuestionRecord {
    QuestionRecord {
        id: QuestionId::new(id),
        statement: statement.to_string(),
        statement_image: None,
        answer: AnswerFormat::SingleSelect {
            options: ['A', 'B', 'C', 'D']
                .into_iter()
                .map(|l| text_option(l, &format!("option {l}"), l == correct))
                .collect(),
        },
        solution: None,
        notes: None,
    }
}

pub fn free_response(id: &str, statement: &str) -> QuestionRecord {
    QuestionRecord {
        id: QuestionId::new(id),
        statement: statement.to_string(),
        statement_image: None,
        answer: AnswerFormat::FreeResponse {
            reference_answer: None,
        },
        solution: None,
        notes: None,
    }
}

pub fn with_image(mut question: QuestionRecord, path: &str) -> QuestionRecord {
    question.statement_image = Some(ImageRef {
        path: path.to_string(),
        scale: None,
    });
    question
}

pub fn with_option_image(option: OptionRecord, path: &str) -> OptionRecord {
    let image = ImageRef {
        path: path.to_string(),
        scale: None,
    };
    let content = match option.content {
        OptionContent::Text { markup } | OptionContent::TextAndImage { markup, .. } => {
            OptionContent::TextAndImage { markup, image }
        }
        OptionContent::Image { .. } => OptionContent::Image { image },
    };
    OptionRecord { content, ..option }
}

pub fn list(id: &str, title: &str, question_ids: &[&str]) -> ListDocument {
    ListDocument {
        id: ListId::new(id),
        title: title.to_string(),
        header: None,
        instructions: None,
        question_ids: question_ids.iter().map(|q| QuestionId::new(*q)).collect(),
    }
}

/// What a [`FakeEngine`] does when asked to compile.
#[derive(Debug, Clone)]
pub enum FakeBehaviour {
    /// Write `<stem>.pdf` next to the source and succeed.
    Produce,
    /// Fail with the given exit code and log text.
    Fail { code: i32, log: String },
}

/// Engine double that records every source path it was asked to compile.
#[derive(Debug)]
pub struct FakeEngine {
    behaviour: FakeBehaviour,
    pub calls: Mutex<Vec<PathBuf>>,
}

impl FakeEngine {
    pub fn new(behaviour: FakeBehaviour) -> Self {
        Self {
            behaviour,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Engine for FakeEngine {
    fn name(&self) -> &str {
        "fake"
    }

    fn compile(&self, job: &CompileJob<'_>) -> CompileOutcome {
        assert!(!job.security.shell_escape, "engine must never get shell escape");
        self.calls.lock().unwrap().push(job.source_path.to_path_buf());

        match &self.behaviour {
            FakeBehaviour::Produce => {
                let stem = job.source_path.file_stem().unwrap().to_string_lossy();
                let output_path = job.working_dir.join(format!("{stem}.pdf"));
                std::fs::write(&output_path, b"%PDF-1.5 fake").unwrap();
                CompileOutcome::Succeeded {
                    output_path,
                    diagnostics: "Output written".to_string(),
                }
            }
            FakeBehaviour::Fail { code, log } => CompileOutcome::Failed {
                reason: FailureReason::ExitCode { code: Some(*code) },
                diagnostics: log.clone(),
            },
        }
    }
}

/// Lets a test keep a handle on a [`FakeEngine`] after handing it to an
/// `Exporter`.
#[derive(Debug, Clone)]
pub struct SharedEngine(pub std::sync::Arc<FakeEngine>);

impl Engine for SharedEngine {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn compile(&self, job: &CompileJob<'_>) -> CompileOutcome {
        self.0.compile(job)
    }
}
