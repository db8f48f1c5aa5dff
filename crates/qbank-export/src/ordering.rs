//! Final question sequence for one export.

use std::collections::HashSet;

use qbank_core::models::export::ExportConfiguration;
use qbank_core::models::list::ListDocument;
use qbank_core::models::question::{QuestionId, QuestionRecord};
use qbank_core::models::report::Substitution;
use qbank_core::source::{QuestionSource, SourceError, index_by_id};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{info, warn};

/// The sequence to render plus everything needed to reproduce it.
#[derive(Debug, Clone, Default)]
pub struct OrderedQuestions {
    pub questions: Vec<QuestionRecord>,
    /// List entries that did not resolve to a record, in list order.
    pub omitted: Vec<QuestionId>,
    pub substitutions: Vec<Substitution>,
    /// Seed driving shuffle and substitution. `None` when neither ran.
    pub seed: Option<u64>,
}

/// Fetch the list's questions and apply shuffle and version substitution.
///
/// With `randomize` off the stored order is kept exactly, minus dangling
/// ids. With a fixed `seed` the result is deterministic: the same seed and
/// the same store contents always give the same sequence.
pub fn compute_order(
    list: &ListDocument,
    config: &ExportConfiguration,
    source: &dyn QuestionSource,
) -> Result<OrderedQuestions, SourceError> {
    let by_id = index_by_id(source.fetch_questions(&list.question_ids)?);

    let mut questions = Vec::with_capacity(list.question_ids.len());
    let mut omitted = Vec::new();
    for id in &list.question_ids {
        match by_id.get(id).cloned() {
            Some(record) => questions.push(record),
            None => {
                warn!(list_id = %list.id, question_id = %id, "question no longer exists, skipping");
                omitted.push(id.clone());
            }
        }
    }

    let seed = config
        .needs_seed()
        .then(|| config.seed.unwrap_or_else(rand::random));

    let mut substitutions = Vec::new();
    if let Some(seed) = seed {
        let mut rng = StdRng::seed_from_u64(seed);

        if config.randomize {
            questions.shuffle(&mut rng);
            info!(list_id = %list.id, seed, "shuffled question order");
        }

        if config.substitute_versions {
            substitutions = substitute_versions(&mut questions, source, &mut rng);
        }
    }

    Ok(OrderedQuestions {
        questions,
        omitted,
        substitutions,
        seed,
    })
}

/// Replace questions that have linked alternates, position by position.
///
/// Candidates are sorted by id so the draw depends only on the seed.
/// Alternates already in the document are skipped; if every alternate is
/// already used the question stays.
fn substitute_versions(
    questions: &mut [QuestionRecord],
    source: &dyn QuestionSource,
    rng: &mut StdRng,
) -> Vec<Substitution> {
    let mut in_use: HashSet<QuestionId> = questions.iter().map(|q| q.id.clone()).collect();
    let mut substitutions = Vec::new();

    for (position, slot) in questions.iter_mut().enumerate() {
        let alternates = match source.fetch_alternate_versions(&slot.id) {
            Ok(alternates) => alternates,
            Err(e) => {
                warn!(question_id = %slot.id, error = %e, "could not load alternate versions");
                continue;
            }
        };

        let mut candidates: Vec<QuestionRecord> = alternates
            .into_iter()
            .filter(|alt| !in_use.contains(&alt.id))
            .collect();
        candidates.sort_by(|a, b| a.id.cmp(&b.id));
        candidates.dedup_by(|a, b| a.id == b.id);

        let Some(choice) = candidates.choose(rng) else {
            continue;
        };

        let original = std::mem::replace(slot, choice.clone());
        in_use.remove(&original.id);
        in_use.insert(slot.id.clone());

        substitutions.push(Substitution {
            position,
            original: original.id,
            replacement: slot.id.clone(),
        });
    }

    substitutions
}
