//! Integration tests for the question bank fixtures and the quiz engine.
//!
//! These run the controller against the sample bank shipped in `fixtures/`,
//! without any HTTP involved.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use quizbot_core::{
    ChoiceId, InMemorySessionStore, QuestionBank, QuizController, QuizError, SessionKey,
    StartRequest, Submission,
};
use quizbot_server::{validate_bank, ServerConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

fn load_bank() -> Arc<QuestionBank> {
    Arc::new(QuestionBank::load(fixture_path().join("qa_lookup.json")).expect("Failed to load bank"))
}

/// Looks up the answer key of the question with the given prompt.
fn answer_for(bank: &QuestionBank, text: &str) -> Vec<ChoiceId> {
    bank.set_names()
        .into_iter()
        .filter_map(|name| bank.get(name))
        .flat_map(|set| set.questions().iter())
        .find(|question| question.text == text)
        .map(|question| question.answer_key.iter().cloned().collect())
        .expect("Question not found in bank")
}

#[test]
fn test_sample_bank_loads() {
    let bank = load_bank();
    assert_eq!(bank.set_names(), vec!["practice_exam_a", "practice_exam_b"]);
    assert_eq!(bank.question_count(), 5);

    let exam_a = bank.get("practice_exam_a").expect("exam set missing");
    let lambda = exam_a
        .questions()
        .iter()
        .find(|q| q.text.contains("without provisioning servers"))
        .expect("Lambda question missing");
    assert_eq!(lambda.choices.len(), 4);
    assert_eq!(lambda.choices[0].text, "AWS Lambda");
    assert_eq!(lambda.answer_key.iter().next(), Some(&ChoiceId::new("a")));

    let exam_b = bank.get("practice_exam_b").expect("exam set missing");
    let databases = exam_b
        .questions()
        .iter()
        .find(|q| q.is_multi_answer())
        .expect("multi-answer question missing");
    assert_eq!(databases.choices.len(), 4);
    assert_eq!(
        databases.answer_key.iter().cloned().collect::<Vec<_>>(),
        vec![ChoiceId::new("a"), ChoiceId::new("c")]
    );
}

#[test]
fn test_sample_bank_fits_slack_checkboxes() {
    validate_bank(&load_bank()).expect("sample bank should render in Slack");
}

#[test]
fn test_sample_config_loads() {
    let config = ServerConfig::load_from_file(&fixture_path().join("quizbot.json"))
        .expect("Failed to load config");
    assert_eq!(config.bank_path, PathBuf::from("qa_lookup.json"));
    assert_eq!(config.default_question_count, 3);
    assert_eq!(config.max_question_count, 10);
    assert_eq!(config.delivery_timeout_secs, 5);
}

#[test]
fn test_missing_bank_is_fatal() {
    let err = QuestionBank::load(fixture_path().join("missing.json")).unwrap_err();
    assert!(matches!(err, QuizError::BankRead { .. }));
    assert!(err.is_fatal());
}

#[test]
fn test_sampling_is_distinct_and_clamped() {
    let bank = load_bank();
    let mut rng = StdRng::seed_from_u64(99);

    for _ in 0..20 {
        let drawn = bank
            .sample(Some("practice_exam_a"), 10, &mut rng)
            .expect("sample failed");
        assert_eq!(drawn.len(), 3);
        let unique: HashSet<_> = drawn.iter().map(|q| q.text.clone()).collect();
        assert_eq!(unique.len(), 3);
    }

    let drawn = bank.sample(None, 4, &mut rng).expect("sample failed");
    assert_eq!(drawn.len(), 4);
}

#[test]
fn test_every_question_is_eventually_drawn() {
    let bank = load_bank();
    let mut rng = StdRng::seed_from_u64(3);
    let mut seen = HashSet::new();
    for _ in 0..200 {
        for question in bank.sample(None, 1, &mut rng).expect("sample failed") {
            seen.insert(question.text.clone());
        }
    }
    assert_eq!(seen.len(), bank.question_count());
}

/// Three questions, answers right, wrong, right: the final score is 2/3 and
/// the session is gone afterwards.
#[test]
fn test_full_quiz_against_sample_bank() {
    let bank = load_bank();
    let controller = QuizController::with_rng(
        Arc::clone(&bank),
        InMemorySessionStore::new(),
        StdRng::seed_from_u64(11),
    );
    let key = SessionKey::for_user("C123", "U123");

    let mut instruction = controller
        .start(key.clone(), StartRequest::new(3).with_exam_set("practice_exam_a"))
        .expect("start failed");

    for round in 0..3 {
        let text = instruction.question_text().expect("expected a question").to_string();
        let correct = answer_for(&bank, &text);
        let choices = if round == 1 {
            vec![ChoiceId::new("d")]
        } else {
            correct
        };

        instruction = controller
            .answer(Submission {
                key: key.clone(),
                choices,
                checkpoint: instruction.prompt().map(|p| p.checkpoint),
            })
            .expect("answer failed");
        assert_eq!(
            instruction.feedback().map(|f| f.correct),
            Some(round != 1)
        );
    }

    assert!(instruction.is_final());
    assert!(instruction
        .to_plain_text()
        .ends_with("Quiz completed! Your score is 2/3."));
    assert!(controller.progress(&key).is_none());
}

/// Multi-answer questions give no partial credit.
#[test]
fn test_multi_answer_question_needs_exact_selection() {
    let bank = load_bank();
    let controller = QuizController::new(Arc::clone(&bank), InMemorySessionStore::new());
    let key = SessionKey::for_user("C1", "U1");

    for (choices, expected) in [
        (vec!["a"], false),
        (vec!["a", "b", "c"], false),
        (vec!["c", "a"], true),
    ] {
        let mut instruction = controller
            .start(key.clone(), StartRequest::new(2).with_exam_set("practice_exam_b"))
            .expect("start failed");

        // Skip to the multi-answer question if it was not drawn first.
        if !instruction.question_text().is_some_and(|t| t.contains("managed database")) {
            instruction = controller
                .answer(Submission {
                    key: key.clone(),
                    choices: vec![],
                    checkpoint: None,
                })
                .expect("answer failed");
        }
        assert!(instruction
            .question_text()
            .is_some_and(|t| t.contains("managed database")));

        let result = controller
            .answer(Submission {
                key: key.clone(),
                choices: choices.iter().map(ChoiceId::new).collect(),
                checkpoint: None,
            })
            .expect("answer failed");
        let feedback = result.feedback().expect("feedback missing");
        assert_eq!(feedback.correct, expected, "selection {choices:?}");
        assert_eq!(feedback.correct_labels(), "A, C");
    }
}
