//! Body, answer key and solutions markup for an ordered question sequence.
//!
//! Every user-authored string goes through the [`Sanitizer`] and then
//! [`escape_text`], and every image reference through the [`AssetResolver`],
//! before it is emitted. Problems
//! with individual elements degrade to placeholders and warnings; they never
//! fail the document.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;

use qbank_core::models::export::{ExportConfiguration, ExportFlow};
use qbank_core::models::list::ListDocument;
use qbank_core::models::question::{
    AnswerFormat, ImageRef, OptionRecord, QuestionId, QuestionRecord,
};
use qbank_core::models::report::ExportWarning;
use tracing::warn;

use crate::assets::AssetResolver;
use crate::escape::escape_text;
use crate::sanitize::Sanitizer;

/// Directory, relative to the engine's working directory, that staged
/// images are copied into for the direct flow.
pub const STAGED_ASSET_DIR: &str = "assets";

const IMAGE_PLACEHOLDER: &str = r"\fbox{\textit{[image unavailable]}}";
const NO_SOLUTION: &str = r"\textit{No solution provided.}";
const SEE_SOLUTIONS: &str = "See solutions";
const NO_QUESTIONS: &str = r"\textit{No questions.}";

/// The three independently optional sections of a document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssembledDocument {
    pub body: String,
    /// Present only when `include_answer_key` is set.
    pub answer_key: Option<String>,
    /// Present only when `include_solutions` is set.
    pub solutions: Option<String>,
    pub warnings: Vec<ExportWarning>,
    /// Images referenced by relative path; the direct flow copies these
    /// into the working directory before compiling.
    pub assets: Vec<StagedAsset>,
}

/// A validated image and the file name it is embedded under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedAsset {
    pub source: PathBuf,
    /// File name inside [`STAGED_ASSET_DIR`].
    pub name: String,
}

#[derive(Default)]
struct Notes {
    warnings: Vec<ExportWarning>,
    assets: Vec<StagedAsset>,
}

/// Sanitized list metadata for the template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontMatter {
    pub title: String,
    pub header: String,
    pub instructions: String,
    pub fields: BTreeMap<String, String>,
}

pub struct Assembler<'a> {
    sanitizer: &'a Sanitizer,
    assets: &'a AssetResolver,
}

impl<'a> Assembler<'a> {
    pub fn new(sanitizer: &'a Sanitizer, assets: &'a AssetResolver) -> Self {
        Self { sanitizer, assets }
    }

    pub fn assemble(
        &self,
        questions: &[QuestionRecord],
        config: &ExportConfiguration,
    ) -> AssembledDocument {
        let mut notes = Notes::default();

        for question in questions {
            if let Err(e) = question.validate() {
                warn!(question_id = %question.id, error = %e, "rendering malformed question");
                notes.warnings.push(ExportWarning::MalformedQuestion {
                    question_id: question.id.clone(),
                    reason: e.to_string(),
                });
            }
        }

        let body = self.body(questions, config, &mut notes);
        let answer_key = config
            .include_answer_key
            .then(|| answer_key(questions));
        let solutions = config
            .include_solutions
            .then(|| self.solutions(questions, &mut notes.warnings));

        AssembledDocument {
            body,
            answer_key,
            solutions,
            warnings: notes.warnings,
            assets: notes.assets,
        }
    }

    /// Title, header, instructions and template fields, sanitized.
    pub fn front_matter(
        &self,
        list: &ListDocument,
        config: &ExportConfiguration,
    ) -> (FrontMatter, Vec<ExportWarning>) {
        let mut warnings = Vec::new();
        let mut clean = |markup: &str| self.clean(markup, None, &mut warnings);

        let title = clean(&list.title);
        let header = clean(list.header.as_deref().unwrap_or_default());
        let instructions = clean(list.instructions.as_deref().unwrap_or_default());
        let fields = config
            .template_fields
            .iter()
            .map(|(name, value)| (clean(name), clean(value)))
            .collect();

        let front = FrontMatter {
            title,
            header,
            instructions,
            fields,
        };
        (front, warnings)
    }

    fn body(
        &self,
        questions: &[QuestionRecord],
        config: &ExportConfiguration,
        notes: &mut Notes,
    ) -> String {
        let mut out = String::new();
        let two_columns = config.columns == 2;

        if two_columns {
            out.push_str("\\begin{multicols}{2}\n");
        }

        if questions.is_empty() {
            out.push_str(NO_QUESTIONS);
            out.push('\n');
        } else {
            out.push_str("\\begin{enumerate}[label=\\arabic*.]\n");
            for question in questions {
                self.question(question, config, &mut out, notes);
            }
            out.push_str("\\end{enumerate}\n");
        }

        if two_columns {
            out.push_str("\\end{multicols}\n");
        }
        out
    }

    fn question(
        &self,
        question: &QuestionRecord,
        config: &ExportConfiguration,
        out: &mut String,
        notes: &mut Notes,
    ) {
        let statement = self.clean(&question.statement, Some(&question.id), &mut notes.warnings);
        // `{}` stops a leading "[...]" in the statement being read as the item label.
        out.push_str("\\item{} ");
        out.push_str(statement.trim_end());
        out.push('\n');

        if let Some(image) = &question.statement_image {
            match self.image(image, config, &question.id, notes) {
                Some(embed) => {
                    let _ = writeln!(out, "\\begin{{center}}\n{embed}\n\\end{{center}}");
                }
                None => {
                    out.push_str("% statement image omitted\n");
                    out.push_str(IMAGE_PLACEHOLDER);
                    out.push('\n');
                }
            }
        }

        match &question.answer {
            AnswerFormat::SingleSelect { .. } => {
                let lines: Vec<String> = question
                    .options_in_label_order()
                    .into_iter()
                    .filter_map(|option| self.option(option, config, &question.id, notes))
                    .collect();
                if !lines.is_empty() {
                    out.push_str("\\begin{enumerate}\n");
                    for line in lines {
                        out.push_str(&line);
                        out.push('\n');
                    }
                    out.push_str("\\end{enumerate}\n");
                }
            }
            AnswerFormat::FreeResponse { .. } => {
                if config.space_for_answers {
                    let _ = writeln!(
                        out,
                        "\\vspace*{{{}\\baselineskip}}",
                        config.answer_space_lines
                    );
                }
            }
        }
    }

    fn option(
        &self,
        option: &OptionRecord,
        config: &ExportConfiguration,
        question_id: &QuestionId,
        notes: &mut Notes,
    ) -> Option<String> {
        if !option.label.is_ascii_alphabetic() {
            notes.warnings.push(ExportWarning::MalformedQuestion {
                question_id: question_id.clone(),
                reason: format!("option label {:?} skipped", option.label),
            });
            return None;
        }

        let mut line = format!("  \\item[{})]", option.label.to_ascii_uppercase());

        if let Some(markup) = option.content.markup() {
            let text = self.clean(markup, Some(question_id), &mut notes.warnings);
            line.push(' ');
            line.push_str(text.trim_end());
        }

        if let Some(image) = option.content.image() {
            let embed = self
                .image(image, config, question_id, notes)
                .unwrap_or_else(|| IMAGE_PLACEHOLDER.to_string());
            if option.content.markup().is_some() {
                line.push_str(" \\\\");
            }
            line.push(' ');
            line.push_str(&embed);
        }

        Some(line)
    }

    /// `\includegraphics` for a validated image, or `None` with a warning.
    ///
    /// The manual flow embeds the absolute path. The direct flow embeds a
    /// staged relative path, since the engine may not read outside its
    /// working directory.
    fn image(
        &self,
        image: &ImageRef,
        config: &ExportConfiguration,
        question_id: &QuestionId,
        notes: &mut Notes,
    ) -> Option<String> {
        match self.assets.resolve(image, config.image_scale_default) {
            Ok(resolved) => {
                let path = match config.flow {
                    ExportFlow::Manual => resolved.markup_path,
                    ExportFlow::Direct => stage(&mut notes.assets, resolved.path),
                };
                Some(format!(
                    "\\includegraphics[scale={:.2}]{{{path}}}",
                    resolved.scale
                ))
            }
            Err(rejection) => {
                warn!(
                    question_id = %question_id,
                    image = %image.path,
                    reason = %rejection,
                    "image omitted"
                );
                notes.warnings.push(ExportWarning::ImageOmitted {
                    question_id: question_id.clone(),
                    reason: rejection.to_string(),
                });
                None
            }
        }
    }

    fn solutions(
        &self,
        questions: &[QuestionRecord],
        warnings: &mut Vec<ExportWarning>,
    ) -> String {
        let items = questions
            .iter()
            .map(|question| {
                let mut item = String::new();

                let answer = match &question.answer {
                    AnswerFormat::SingleSelect { .. } => question.correct_label().map(String::from),
                    AnswerFormat::FreeResponse { reference_answer } => reference_answer
                        .as_deref()
                        .filter(|a| !a.trim().is_empty())
                        .map(|a| self.clean(a, Some(&question.id), warnings)),
                };
                if let Some(answer) = answer {
                    let _ = write!(item, "\\textbf{{Answer:}} {}\\par ", answer.trim_end());
                }

                match question.solution.as_deref().filter(|s| !s.trim().is_empty()) {
                    Some(solution) => {
                        let text = self.clean(solution, Some(&question.id), warnings);
                        item.push_str(text.trim_end());
                    }
                    None => item.push_str(NO_SOLUTION),
                }
                item
            })
            .collect::<Vec<_>>();

        section("Solutions", &items)
    }

    fn clean(
        &self,
        markup: &str,
        question_id: Option<&QuestionId>,
        warnings: &mut Vec<ExportWarning>,
    ) -> String {
        let sanitized = self.sanitizer.sanitize_with_report(markup);
        for directive in &sanitized.removed {
            warnings.push(ExportWarning::DirectiveRemoved {
                question_id: question_id.cloned(),
                directive: directive.clone(),
            });
        }
        if sanitized.decoded_escapes {
            warnings.push(ExportWarning::DirectiveRemoved {
                question_id: question_id.cloned(),
                directive: "^^".to_string(),
            });
        }
        if sanitized.residual_blocked && sanitized.removed.is_empty() {
            warnings.push(ExportWarning::DirectiveRemoved {
                question_id: question_id.cloned(),
                directive: "residual".to_string(),
            });
        }
        escape_text(&sanitized.text)
    }
}

/// Relative path for `source` under [`STAGED_ASSET_DIR`], registering it
/// on first use. The same file is staged once however often it appears.
fn stage(assets: &mut Vec<StagedAsset>, source: PathBuf) -> String {
    let index = match assets.iter().position(|asset| asset.source == source) {
        Some(index) => index,
        None => {
            let number = assets.len() + 1;
            let name = match source
                .extension()
                .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
                .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            {
                Some(ext) => format!("img{number:03}.{ext}"),
                None => format!("img{number:03}"),
            };
            assets.push(StagedAsset { source, name });
            assets.len() - 1
        }
    };
    format!("{STAGED_ASSET_DIR}/{}", assets[index].name)
}

/// One line per question: the correct label, or a pointer to the solutions
/// for free-response questions.
fn answer_key(questions: &[QuestionRecord]) -> String {
    let items = questions
        .iter()
        .map(|question| match &question.answer {
            AnswerFormat::SingleSelect { .. } => question
                .correct_label()
                .map(String::from)
                .unwrap_or_else(|| "?".to_string()),
            AnswerFormat::FreeResponse { .. } => SEE_SOLUTIONS.to_string(),
        })
        .collect::<Vec<_>>();

    section("Answer Key", &items)
}

fn section(heading: &str, items: &[String]) -> String {
    let mut out = format!("\\section*{{{heading}}}\n");
    if items.is_empty() {
        out.push_str(NO_QUESTIONS);
        out.push('\n');
        return out;
    }

    out.push_str("\\begin{enumerate}[label=\\arabic*.]\n");
    for item in items {
        let _ = writeln!(out, "\\item{{}} {item}");
    }
    out.push_str("\\end{enumerate}\n");
    out
}
