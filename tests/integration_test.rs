#[cfg(test)]
mod tests {
    use chat_quiz_bot::admin::parse_bulk_questions;
    use chat_quiz_bot::config::{ScoringRules, ShuffleSettings};
    use chat_quiz_bot::admin::{AdminFlow, FlowKind};
    use chat_quiz_bot::handlers::{delete_selected_text, sweep_pending_names};
    use chat_quiz_bot::keyboard::answer_keyboard;
    use chat_quiz_bot::leaderboard::global_ranking;
    use chat_quiz_bot::quiz::submit_answer;
    use chat_quiz_bot::session::{shuffle_round, ChatQuizSession};
    use chat_quiz_bot::store::{Store, COMPLETION_FILE, PARTICIPANTS_FILE, QUESTIONS_FILE};
    use chat_quiz_bot::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::BTreeSet;
    use std::error::Error;
    use std::time::Duration;
    use teloxide::types::{InlineKeyboardButtonKind, InlineKeyboardMarkup};
    use tempfile::TempDir;
    use tokio::time::Instant;

    // Helper function to create a test question
    fn create_test_question() -> Question {
        Question::new(
            "What is the capital of France?",
            vec!["Paris".into(), "London".into(), "Berlin".into(), "Madrid".into()],
            0,
        )
    }

    // Helper function to open a store in a fresh temporary directory
    async fn create_test_store() -> Result<(TempDir, Store), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let store = Store::open(dir.path()).await?;
        Ok((dir, store))
    }

    #[tokio::test]
    async fn test_store_creates_missing_files() {
        let (dir, store) = create_test_store().await.unwrap();

        assert!(dir.path().join(PARTICIPANTS_FILE).exists());
        assert!(dir.path().join(COMPLETION_FILE).exists());
        assert!(dir.path().join(QUESTIONS_FILE).exists());
        assert!(store.questions().await.is_empty());
        assert!(store.is_quiz_active().await);
    }

    #[tokio::test]
    async fn test_store_recovers_from_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PARTICIPANTS_FILE), "{ not json").unwrap();
        std::fs::write(
            dir.path().join(QUESTIONS_FILE),
            r#"{
                "questions": [
                    {"question": "2+2?", "options": ["3", "4"], "correct_index": 1},
                    {"question": "Broken", "options": ["a", "b"], "correct_index": 7},
                    {"text": "wrong shape"}
                ],
                "question_time": 20
            }"#,
        )
        .unwrap();

        let store = Store::open(dir.path()).await.unwrap();

        let questions = store.questions().await;
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].text, "2+2?");
        assert_eq!(store.question_time().await, Some(20));
        assert!(store.participants().await.is_empty());

        let rewritten = std::fs::read_to_string(dir.path().join(PARTICIPANTS_FILE)).unwrap();
        assert!(serde_json::from_str::<serde_json::Value>(&rewritten).is_ok());
    }

    #[tokio::test]
    async fn test_questions_persist_across_reopen() {
        let (dir, store) = create_test_store().await.unwrap();
        store.add_question(create_test_question()).await.unwrap();
        store.set_question_time(25).await.unwrap();
        assert!(store.set_question_time(3).await.is_err());
        assert!(store.set_question_time(61).await.is_err());
        drop(store);

        let reopened = Store::open(dir.path()).await.unwrap();
        assert_eq!(reopened.questions().await, vec![create_test_question()]);
        assert_eq!(reopened.question_time().await, Some(25));
    }

    #[tokio::test]
    async fn test_invalid_question_is_refused() {
        let (_dir, store) = create_test_store().await.unwrap();
        let bad = Question::new("Only one option", vec!["a".into()], 0);
        assert!(matches!(
            store.add_question(bad).await,
            Err(QuizError::InvalidQuestion(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_selected_questions() {
        let (_dir, store) = create_test_store().await.unwrap();
        for i in 0..5 {
            let q = Question::new(format!("Q{}", i), vec!["x".into(), "y".into()], 0);
            store.add_question(q).await.unwrap();
        }

        let picked: BTreeSet<usize> = [0, 2, 9].into_iter().collect();
        let (deleted, remaining) = store.delete_questions(&picked).await.unwrap();

        assert_eq!((deleted, remaining), (2, 3));
        let texts: Vec<String> = store.questions().await.into_iter().map(|q| q.text).collect();
        assert_eq!(texts, vec!["Q1", "Q3", "Q4"]);
    }

    #[tokio::test]
    async fn test_selected_questions_wait_for_confirmation() {
        let (_dir, store) = create_test_store().await.unwrap();
        for i in 0..3 {
            let q = Question::new(format!("Q{}", i), vec!["x".into(), "y".into()], 0);
            store.add_question(q).await.unwrap();
        }
        let state = BotState::new(Config::default(), store);

        state
            .set_admin_flow(1, AdminFlow::new(FlowKind::DeleteSelection(BTreeSet::new())))
            .await;
        assert_eq!(state.delete_selection(1).await, None);

        let picked: BTreeSet<usize> = [0, 2].into_iter().collect();
        state
            .set_admin_flow(1, AdminFlow::new(FlowKind::DeleteSelection(picked.clone())))
            .await;
        assert_eq!(state.delete_selection(1).await, Some(picked.clone()));
        // Asking for confirmation leaves the selection and the questions alone
        assert_eq!(state.delete_selection(1).await, Some(picked.clone()));
        assert_eq!(state.store.questions().await.len(), 3);

        let prompt = delete_selected_text(&state.store.questions().await, &picked);
        assert!(prompt.contains("Delete 2 selected questions?"));
        assert!(prompt.contains("1. Q0"));
        assert!(prompt.contains("3. Q2"));
        assert!(!prompt.contains("Q1"));
    }

    #[tokio::test]
    async fn test_record_round_averages_accuracy() {
        let (_dir, store) = create_test_store().await.unwrap();
        store.register_participant(7, "Amina", Some(-100)).await.unwrap();

        store.record_round(7, 20, 2, 4).await.unwrap();
        store.record_round(7, 40, 4, 4).await.unwrap();

        let p = store.participant(7).await.unwrap();
        assert_eq!(p.quizzes_completed, 2);
        assert_eq!(p.total_score, 60);
        assert!((p.accuracy - 75.0).abs() < f64::EPSILON);
        assert!(p.has_completed_current_quiz);
        assert!(store.has_completed(7).await);
    }

    #[tokio::test]
    async fn test_new_round_keeps_names_and_chats() {
        let (_dir, store) = create_test_store().await.unwrap();
        store.register_participant(7, "Amina", Some(-100)).await.unwrap();
        store.record_round(7, 30, 3, 3).await.unwrap();

        store.new_round().await.unwrap();

        let p = store.participant(7).await.unwrap();
        assert_eq!(p.name, "Amina");
        assert_eq!(p.chat_ids, vec![-100]);
        assert_eq!(p.total_score, 0);
        assert_eq!(p.quizzes_completed, 0);
        assert!(!p.has_completed_current_quiz);
        assert!(!store.has_completed(7).await);
    }

    #[tokio::test]
    async fn test_toggle_completion_updates_registry() {
        let (_dir, store) = create_test_store().await.unwrap();
        store.register_participant(3, "Bilal", None).await.unwrap();

        assert!(store.toggle_completion(3).await.unwrap());
        assert!(store.has_completed(3).await);
        assert!(!store.toggle_completion(3).await.unwrap());
        assert!(!store.has_completed(3).await);
    }

    #[tokio::test]
    async fn test_unknown_participant_name_falls_back() {
        let (_dir, store) = create_test_store().await.unwrap();
        assert_eq!(store.participant_name(55).await, "User_55");
        assert!(matches!(
            store.set_accuracy(55, 50.0).await,
            Err(QuizError::UnknownParticipant(55))
        ));
    }

    #[tokio::test]
    async fn test_global_ranking_only_lists_completed_chat_members() {
        let (_dir, store) = create_test_store().await.unwrap();
        store.register_participant(1, "Low", Some(-1)).await.unwrap();
        store.register_participant(2, "High", Some(-1)).await.unwrap();
        store.register_participant(3, "Elsewhere", Some(-2)).await.unwrap();
        store.register_participant(4, "Unfinished", Some(-1)).await.unwrap();
        store.record_round(1, 10, 1, 4).await.unwrap();
        store.record_round(2, 40, 4, 4).await.unwrap();
        store.record_round(3, 40, 4, 4).await.unwrap();

        let ranking = global_ranking(&store.participants().await, -1);
        let ids: Vec<u64> = ranking.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_completed_user_cannot_answer() {
        let (_dir, store) = create_test_store().await.unwrap();
        store.mark_completed(9).await.unwrap();
        let state = BotState::new(Config::default(), store);

        let result = submit_answer(&state, -100, 9, "Done", 0, 0).await;
        assert!(matches!(result, Err(QuizError::AlreadyCompleted)));

        let result = submit_answer(&state, -100, 10, "Fresh", 0, 0).await;
        assert!(matches!(result, Err(QuizError::NotRunning)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_name_prompt_belongs_to_its_chat_and_expires() {
        let (_dir, store) = create_test_store().await.unwrap();
        let state = BotState::new(Config::default(), store);

        state.await_name(-1, 7).await;
        assert!(!state.take_pending_name(-2, 7).await);
        assert!(state.take_pending_name(-1, 7).await);
        assert!(!state.take_pending_name(-1, 7).await);

        state.await_name(-1, 8).await;
        assert_eq!(sweep_pending_names(&state).await, 0);
        tokio::time::advance(state.config.admin_flow_ttl + Duration::from_secs(1)).await;
        assert_eq!(sweep_pending_names(&state).await, 1);
        assert!(!state.take_pending_name(-1, 8).await);
    }

    #[tokio::test]
    async fn test_bulk_questions_land_in_store() {
        let (_dir, store) = create_test_store().await.unwrap();
        let pasted = "Which planet is closest to the Sun?
A) Venus
B) Mercury
C) Earth
D) Mars
E) Jupiter
✅ B

This block has too few options
A) yes
B) no
✅ A

Largest ocean?
A) Atlantic
B) Indian
C) Arctic
D) Pacific
E) Southern
✅ D";

        let parsed = parse_bulk_questions(pasted);
        assert_eq!(parsed.len(), 2);
        let (added, total) = store.add_questions(parsed).await.unwrap();
        assert_eq!((added, total), (2, 2));
        assert_eq!(store.question(1).await.unwrap().correct_option(), "Pacific");
    }

    // Test keyboard creation
    #[test]
    fn test_answer_keyboard_round_trip() {
        let question = create_test_question();
        let keyboard = answer_keyboard(4, &question);

        let InlineKeyboardMarkup { inline_keyboard } = keyboard;
        assert_eq!(inline_keyboard.len(), 4);
        for (i, row) in inline_keyboard.iter().enumerate() {
            assert_eq!(row.len(), 1);
            let data = match &row[0].kind {
                InlineKeyboardButtonKind::CallbackData(data) => data.clone(),
                other => panic!("unexpected button {:?}", other),
            };
            assert_eq!(
                data.parse::<CallbackData>().unwrap(),
                CallbackData::Answer { question: 4, option: i }
            );
        }
    }

    #[test]
    fn test_shuffle_keeps_correct_answer() {
        let questions: Vec<Question> = (0..6)
            .map(|i| {
                Question::new(
                    format!("Q{}", i),
                    vec!["w".into(), "x".into(), "y".into(), format!("right{}", i)],
                    3,
                )
            })
            .collect();
        let settings = ShuffleSettings::default();

        for seed in 0..20 {
            let round = shuffle_round(&questions, &settings, &mut StdRng::seed_from_u64(seed));
            assert_eq!(round.len(), questions.len());
            for q in &round {
                assert!(q.correct_option().starts_with("right"));
                assert_eq!(&q.correct_option()[5..], &q.text[1..]);
            }
        }
    }

    #[test]
    fn test_session_score_is_sum_of_answer_points() {
        let questions = vec![
            create_test_question(),
            Question::new("1+1?", vec!["2".into(), "3".into()], 0),
            Question::new("Sky colour?", vec!["green".into(), "blue".into()], 1),
        ];
        let mut session = ChatQuizSession::new(-5, questions, ScoringRules::default());
        let t0 = Instant::now();

        for (q, answers) in [(0, [0, 0]), (1, [1, 0]), (2, [1, 1])] {
            session.advance(t0);
            session.submit(1, "Ann", q, answers[0], t0 + Duration::from_millis(10)).unwrap();
            session.submit(2, "Ben", q, answers[1], t0 + Duration::from_millis(20)).unwrap();
        }

        for entry in session.entries() {
            let sum: u32 = entry.answers.values().map(|a| a.points).sum();
            assert_eq!(entry.score, sum);
        }
        let bonuses = (0..3).filter_map(|q| session.first_correct(q)).count();
        assert_eq!(bonuses, 3);

        let standings = session.final_standings();
        assert_eq!(standings[0].user, 2);
        assert_eq!(standings[0].score, 15 + 10 + 10);
        assert_eq!(standings[1].score, 15 + 15);
    }
}
