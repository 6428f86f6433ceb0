#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chat_quiz_bot::config::ShuffleSettings;
    use chat_quiz_bot::quiz::{start_quiz, submit_answer, ChatGateway};
    use chat_quiz_bot::store::Store;
    use chat_quiz_bot::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use teloxide::types::{ChatId, InlineKeyboardMarkup, MessageId};
    use tempfile::TempDir;
    use tokio::time::{sleep, Instant};

    const CHAT: ChatId = ChatId(-100);

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Sent { id: i32, text: String, keyboard: bool },
        Edited { id: i32, text: String },
        Deleted(i32),
    }

    // Records every call instead of talking to Telegram
    #[derive(Clone, Default)]
    struct RecordingGateway {
        events: Arc<Mutex<Vec<Event>>>,
        next_id: Arc<AtomicI32>,
        edit_delay: Duration,
    }

    impl RecordingGateway {
        fn with_slow_edits(edit_delay: Duration) -> Self {
            Self {
                edit_delay,
                ..Self::default()
            }
        }

        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }

        fn sent_texts(&self) -> Vec<String> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    Event::Sent { text, .. } => Some(text),
                    _ => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl ChatGateway for RecordingGateway {
        async fn send_text(
            &self,
            _chat: ChatId,
            text: &str,
            keyboard: Option<InlineKeyboardMarkup>,
        ) -> Result<MessageId, QuizError> {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            self.events.lock().unwrap().push(Event::Sent {
                id,
                text: text.to_string(),
                keyboard: keyboard.is_some(),
            });
            Ok(MessageId(id))
        }

        async fn edit_text(&self, _chat: ChatId, message: MessageId, text: &str) -> Result<(), QuizError> {
            if !self.edit_delay.is_zero() {
                sleep(self.edit_delay).await;
            }
            self.events.lock().unwrap().push(Event::Edited {
                id: message.0,
                text: text.to_string(),
            });
            Ok(())
        }

        async fn delete(&self, _chat: ChatId, message: MessageId) -> Result<(), QuizError> {
            self.events.lock().unwrap().push(Event::Deleted(message.0));
            Ok(())
        }
    }

    fn two_questions() -> Vec<Question> {
        vec![
            Question::new("2+2?", vec!["3".into(), "4".into(), "5".into()], 1),
            Question::new("Capital of France?", vec!["Paris".into(), "Rome".into()], 0),
        ]
    }

    // Helper function to build a bot state over a temporary store
    async fn create_state(questions: Vec<Question>) -> (TempDir, Arc<BotState>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).await.unwrap();
        for q in questions {
            store.add_question(q).await.unwrap();
        }
        let config = Config {
            question_time: Duration::from_secs(15),
            transition_delay: Duration::from_secs(2),
            shuffle: ShuffleSettings {
                questions: false,
                options: false,
                seed: None,
            },
            ..Config::default()
        };
        (dir, Arc::new(BotState::new(config, store)))
    }

    async fn wait_for_open_question(state: &BotState, index: usize) {
        for _ in 0..10_000 {
            if let Some(handle) = state.session(CHAT.0).await {
                let session = handle.session.lock().await;
                if session.current_index() == Some(index) && session.is_accepting() {
                    return;
                }
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("question {} never opened", index);
    }

    async fn wait_for_finish(state: &BotState) {
        for _ in 0..10_000 {
            if state.session(CHAT.0).await.is_none() {
                return;
            }
            sleep(Duration::from_millis(50)).await;
        }
        panic!("quiz never finished");
    }

    #[tokio::test(start_paused = true)]
    async fn test_question_ends_once_everyone_answered() {
        let (_dir, state) = create_state(two_questions()).await;
        let gateway = RecordingGateway::default();

        start_quiz(&gateway, &state, CHAT, 1, "Ann").await.unwrap();
        wait_for_open_question(&state, 0).await;
        let opened = Instant::now();

        let report = submit_answer(&state, CHAT.0, 1, "Ann", 0, 1).await.unwrap();
        assert!(report.outcome.correct);
        assert!(report.outcome.first_correct);
        assert!(report.outcome.everyone_answered);
        assert_eq!(report.outcome.points, 15);

        wait_for_open_question(&state, 1).await;
        let elapsed = opened.elapsed();
        assert!(elapsed >= Duration::from_secs(2), "transition delay skipped: {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(15), "question did not end early: {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_roster_waits_for_every_member() {
        let (_dir, state) = create_state(two_questions()).await;
        let gateway = RecordingGateway::default();

        start_quiz(&gateway, &state, CHAT, 1, "Ann").await.unwrap();
        wait_for_open_question(&state, 0).await;

        // The starter is not on the roster until they answer
        let ben = submit_answer(&state, CHAT.0, 2, "Ben", 0, 1).await.unwrap();
        assert!(ben.outcome.everyone_answered);
        let again = submit_answer(&state, CHAT.0, 2, "Ben", 0, 0).await;
        assert!(matches!(again, Err(QuizError::AlreadyAnswered) | Err(QuizError::TooLate)));

        wait_for_open_question(&state, 1).await;
        let ann = submit_answer(&state, CHAT.0, 1, "Ann", 1, 0).await.unwrap();
        assert!(!ann.outcome.everyone_answered);
        assert!(ann.outcome.first_correct);
        let ben = submit_answer(&state, CHAT.0, 2, "Ben", 1, 0).await.unwrap();
        assert!(ben.outcome.everyone_answered);
        assert!(!ben.outcome.first_correct);
        assert_eq!(ben.live[0].name, "Ben");
    }

    #[tokio::test(start_paused = true)]
    async fn test_starter_who_never_answers_does_not_hold_questions() {
        let (_dir, state) = create_state(two_questions()).await;
        let gateway = RecordingGateway::default();

        start_quiz(&gateway, &state, CHAT, 1, "Admin").await.unwrap();
        wait_for_open_question(&state, 0).await;
        let opened = Instant::now();

        let report = submit_answer(&state, CHAT.0, 2, "Ben", 0, 1).await.unwrap();
        assert!(report.outcome.everyone_answered);

        wait_for_open_question(&state, 1).await;
        assert!(opened.elapsed() < Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_removed_despite_slow_edits() {
        let (_dir, state) = create_state(two_questions()).await;
        let gateway = RecordingGateway::with_slow_edits(Duration::from_secs(3));

        start_quiz(&gateway, &state, CHAT, 1, "Ann").await.unwrap();
        wait_for_open_question(&state, 0).await;
        // Lands while the first countdown edit is still in flight
        sleep(Duration::from_millis(1500)).await;
        submit_answer(&state, CHAT.0, 1, "Ann", 0, 1).await.unwrap();

        wait_for_finish(&state).await;
        sleep(Duration::from_secs(300)).await;

        let events = gateway.events();
        let countdown_ids: Vec<i32> = events
            .iter()
            .filter_map(|e| match e {
                Event::Sent { id, text, .. } if text.contains("Time remaining") => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(countdown_ids.len(), 2);
        for id in countdown_ids {
            assert!(events.contains(&Event::Deleted(id)), "countdown message {} left behind", id);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_round_posts_results_and_records_stats() {
        let (_dir, state) = create_state(two_questions()).await;
        let gateway = RecordingGateway::default();

        start_quiz(&gateway, &state, CHAT, 1, "Ann").await.unwrap();
        wait_for_open_question(&state, 0).await;
        submit_answer(&state, CHAT.0, 1, "Ann", 0, 1).await.unwrap();
        wait_for_open_question(&state, 1).await;
        let wrong = submit_answer(&state, CHAT.0, 1, "Ann", 1, 1).await.unwrap();
        assert!(!wrong.outcome.correct);
        assert_eq!(wrong.outcome.points, 0);
        wait_for_finish(&state).await;

        let ann = state.store.participant(1).await.unwrap();
        assert_eq!(ann.name, "Ann");
        assert_eq!(ann.chat_ids, vec![CHAT.0]);
        assert_eq!(ann.total_score, 15);
        assert_eq!(ann.quizzes_completed, 1);
        assert!((ann.accuracy - 50.0).abs() < f64::EPSILON);
        assert!(state.store.has_completed(1).await);

        let texts = gateway.sent_texts();
        let final_board = texts
            .iter()
            .find(|t| t.contains("FINAL LEADERBOARD"))
            .expect("final leaderboard posted");
        assert!(final_board.contains("Ann"));

        let events = gateway.events();
        let question_ids: Vec<i32> = events
            .iter()
            .filter_map(|e| match e {
                Event::Sent { id, keyboard: true, .. } => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(question_ids.len(), 2);
        for id in question_ids {
            assert!(events.contains(&Event::Deleted(id)), "question message {} left behind", id);
        }

        let retry = start_quiz(&gateway, &state, CHAT, 1, "Ann").await;
        assert!(matches!(retry, Err(QuizError::AlreadyCompleted)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_round_runs_out_the_clock() {
        let (_dir, state) = create_state(two_questions()).await;
        let gateway = RecordingGateway::default();
        let started = Instant::now();

        start_quiz(&gateway, &state, CHAT, 1, "Ann").await.unwrap();
        wait_for_finish(&state).await;

        assert!(started.elapsed() >= Duration::from_secs(15 + 2 + 15));
        assert!(gateway
            .sent_texts()
            .iter()
            .any(|t| t.contains("No participants completed the quiz.")));
        assert!(gateway
            .events()
            .iter()
            .any(|e| matches!(e, Event::Edited { text, .. } if text.contains("Time remaining"))));
        assert!(!state.store.has_completed(1).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleared_session_posts_nothing() {
        let (_dir, state) = create_state(two_questions()).await;
        let gateway = RecordingGateway::default();

        start_quiz(&gateway, &state, CHAT, 1, "Ann").await.unwrap();
        wait_for_open_question(&state, 0).await;
        submit_answer(&state, CHAT.0, 2, "Ben", 0, 1).await.unwrap();

        assert!(state.clear_session(CHAT.0).await);
        sleep(Duration::from_secs(60)).await;

        assert!(!gateway.sent_texts().iter().any(|t| t.contains("FINAL LEADERBOARD")));
        assert!(!state.store.has_completed(2).await);
        assert!(matches!(
            submit_answer(&state, CHAT.0, 2, "Ben", 0, 0).await,
            Err(QuizError::NotRunning)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_rejections() {
        let gateway = RecordingGateway::default();

        let (_empty_dir, empty) = create_state(Vec::new()).await;
        assert!(matches!(
            start_quiz(&gateway, &empty, CHAT, 1, "Ann").await,
            Err(QuizError::NoQuestions)
        ));

        let (_dir, state) = create_state(two_questions()).await;
        state.store.set_quiz_active(false).await.unwrap();
        assert!(matches!(
            start_quiz(&gateway, &state, CHAT, 1, "Ann").await,
            Err(QuizError::QuizClosed)
        ));

        state.store.set_quiz_active(true).await.unwrap();
        start_quiz(&gateway, &state, CHAT, 1, "Ann").await.unwrap();
        assert!(matches!(
            start_quiz(&gateway, &state, CHAT, 2, "Ben").await,
            Err(QuizError::AlreadyRunning)
        ));
        state.clear_session(CHAT.0).await;
    }
}
