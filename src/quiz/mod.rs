use crate::error::QuizError;
use crate::keyboard::answer_keyboard;
use crate::leaderboard::{self, Standing};
use crate::session::{AnswerOutcome, ChatQuizSession, SessionHandle};
use crate::state::BotState;
use crate::types::{option_letter, Question, UserKey};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use teloxide::types::{ChatId, MessageId};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{sleep, sleep_until, timeout, Instant};

mod gateway;
pub use gateway::*;

const COUNTDOWN_TICK: Duration = Duration::from_millis(100);

/// Opens a round in `chat` started by `user` and spawns its progression loop.
pub async fn start_quiz<G: ChatGateway>(
    gateway: &G,
    state: &Arc<BotState>,
    chat: ChatId,
    user: UserKey,
    name: &str,
) -> Result<Arc<SessionHandle>, QuizError> {
    if state.store.has_completed(user).await {
        return Err(QuizError::AlreadyCompleted);
    }
    if !state.store.is_quiz_active().await {
        return Err(QuizError::QuizClosed);
    }
    if state.session(chat.0).await.is_some() {
        return Err(QuizError::AlreadyRunning);
    }
    let questions = state.store.questions().await;
    if questions.is_empty() {
        return Err(QuizError::NoQuestions);
    }

    let round = state.build_round(&questions).await;
    let count = round.len();
    let handle = SessionHandle::new(ChatQuizSession::new(chat.0, round, state.config.scoring));

    {
        let mut sessions = state.sessions.lock().await;
        if sessions.contains_key(&chat.0) {
            return Err(QuizError::AlreadyRunning);
        }
        sessions.insert(chat.0, handle.clone());
    }
    log::info!(
        "Quiz started in chat {} by {} ({}) with {} questions",
        chat.0,
        name,
        user,
        count
    );

    let question_time = state.question_time().await;
    let text = format!(
        "🎯 <b>Quiz is starting!</b> {} questions coming...\n\
         ⏰ {} seconds per question\n\n\
         ⚡ <b>Instant Mode:</b> Questions advance as soon as everyone has answered!\n\
         🏆 <b>Leaderboard:</b> Final results shown after all questions\n\n\
         ⚠️ <b>Rules:</b>\n\
         • One attempt per question\n\
         • One attempt per quiz, no repeats!\n\
         • The first correct answer earns a bonus",
        count,
        question_time.as_secs()
    );
    if let Err(e) = send_transient(gateway, chat, &text, None, state.config.auto_delete_delay).await {
        log::error!("Failed to announce quiz in chat {}: {}", chat.0, e);
    }

    tokio::spawn(run_quiz(gateway.clone(), state.clone(), chat, handle.clone()));
    Ok(handle)
}

/// Drives a session through every question, then posts the results.
pub async fn run_quiz<G: ChatGateway>(gateway: G, state: Arc<BotState>, chat: ChatId, handle: Arc<SessionHandle>) {
    let question_time = state.question_time().await;
    let transition = state.config.transition_delay;

    loop {
        if handle.is_cancelled() {
            log::info!("Quiz in chat {} was cleared mid-run", chat.0);
            return;
        }
        let (index, total, question) = {
            let mut session = handle.session.lock().await;
            match session.advance(Instant::now()) {
                Some(index) => (index, session.question_count(), session.questions()[index].clone()),
                None => break,
            }
        };

        ask_question(&gateway, &state, chat, &handle, index, total, &question, question_time).await;

        if handle.is_cancelled() {
            log::info!("Quiz in chat {} was cleared mid-run", chat.0);
            return;
        }
        if index + 1 < total {
            sleep(transition).await;
        }
    }

    finish_round(&gateway, &state, chat, &handle).await;
}

#[allow(clippy::too_many_arguments)]
async fn ask_question<G: ChatGateway>(
    gateway: &G,
    state: &BotState,
    chat: ChatId,
    handle: &SessionHandle,
    index: usize,
    total: usize,
    question: &Question,
    question_time: Duration,
) {
    let deadline = Instant::now() + question_time;
    let text = format!("❓ <b>Question {}/{}</b>\n\n{}", index + 1, total, question.text);
    let message = match gateway
        .send_text(chat, &text, Some(answer_keyboard(index, question)))
        .await
    {
        Ok(message) => Some(message),
        Err(e) => {
            log::error!("Failed to send question {} in chat {}: {}", index + 1, chat.0, e);
            None
        }
    };
    let countdown = Countdown::start(gateway.clone(), chat, question_time);

    loop {
        tokio::select! {
            _ = sleep_until(deadline) => break,
            _ = handle.advanced() => {
                if handle.is_cancelled() {
                    break;
                }
                let session = handle.session.lock().await;
                if session.current_index() == Some(index) && session.everyone_answered() {
                    log::debug!("Everyone answered question {} in chat {}", index + 1, chat.0);
                    break;
                }
            }
        }
    }

    handle.session.lock().await.close_question();
    countdown.stop(gateway, chat, state.config.auto_delete_delay).await;
    if let Some(message) = message {
        if let Err(e) = gateway.delete(chat, message).await {
            log::debug!("Failed to delete question message in chat {}: {}", chat.0, e);
        }
    }
}

async fn finish_round<G: ChatGateway>(gateway: &G, state: &BotState, chat: ChatId, handle: &Arc<SessionHandle>) {
    let (standings, total) = {
        let mut session = handle.session.lock().await;
        session.stop();
        (session.final_standings(), session.question_count())
    };

    for standing in &standings {
        if let Err(e) = state
            .store
            .record_round(standing.user, standing.score, standing.correct_answers, total)
            .await
        {
            log::error!("Failed to record round for user {}: {}", standing.user, e);
        }
    }

    let text = leaderboard::format_final(&standings, total);
    if let Err(e) = send_transient(gateway, chat, &text, None, state.config.auto_delete_delay).await {
        log::error!("Failed to post final leaderboard in chat {}: {}", chat.0, e);
    }
    log::info!("Quiz finished in chat {} with {} ranked participants", chat.0, standings.len());

    state.finish_session(chat.0, handle).await;
}

/// An accepted answer plus what the chat should be shown about it.
#[derive(Debug, Clone)]
pub struct AnswerReport {
    pub outcome: AnswerOutcome,
    pub name: String,
    pub live: Vec<Standing>,
}

impl AnswerReport {
    pub fn feedback(&self) -> String {
        if self.outcome.correct {
            let bonus = if self.outcome.first_correct {
                " + 🚀 First Correct Bonus!"
            } else {
                ""
            };
            format!(
                "✅ <b>CORRECT!</b> {}\n🏆 Points: +{}{}\n⏱ Time: {:.2}s",
                self.name,
                self.outcome.points,
                bonus,
                self.outcome.latency.as_secs_f64()
            )
        } else {
            format!(
                "❌ <b>WRONG!</b> {} - Correct answer was {}",
                self.name,
                option_letter(self.outcome.correct_index)
            )
        }
    }

    /// Short text for the callback query popup.
    pub fn toast(&self) -> String {
        if self.outcome.correct {
            format!("✅ Correct! +{} points", self.outcome.points)
        } else {
            format!("❌ Wrong! Correct answer was {}", option_letter(self.outcome.correct_index))
        }
    }
}

/// Records an answer from `user` to question `question` in `chat_id`.
///
/// Unregistered users are registered under `fallback_name` and linked to the
/// chat once the answer is accepted.
pub async fn submit_answer(
    state: &BotState,
    chat_id: i64,
    user: UserKey,
    fallback_name: &str,
    question: usize,
    option: usize,
) -> Result<AnswerReport, QuizError> {
    let received = Instant::now();
    if state.store.has_completed(user).await {
        return Err(QuizError::AlreadyCompleted);
    }
    let handle = state.session(chat_id).await.ok_or(QuizError::NotRunning)?;
    let name = state
        .store
        .participant(user)
        .await
        .map(|p| p.name)
        .unwrap_or_else(|| fallback_name.to_string());

    let (outcome, live) = {
        let mut session = handle.session.lock().await;
        let outcome = session.submit(user, &name, question, option, received)?;
        (outcome, session.live_points())
    };
    if outcome.everyone_answered {
        handle.signal_advance();
    }

    if let Err(e) = state.store.ensure_participant(user, &name, chat_id).await {
        log::error!("Failed to register answering user {}: {}", user, e);
    }

    Ok(AnswerReport { outcome, name, live })
}

/// Posts the feedback and live points for an accepted answer.
pub async fn announce_answer<G: ChatGateway>(gateway: &G, state: &BotState, chat: ChatId, report: &AnswerReport) {
    let delay = state.config.auto_delete_delay;
    for text in [report.feedback(), leaderboard::format_live(&report.live)] {
        if let Err(e) = send_transient(gateway, chat, &text, None, delay).await {
            log::error!("Failed to post answer feedback in chat {}: {}", chat.0, e);
        }
    }
}

/// The "time remaining" message of the open question.
struct Countdown {
    stop: Arc<AtomicBool>,
    task: JoinHandle<Option<MessageId>>,
}

impl Countdown {
    fn start<G: ChatGateway>(gateway: G, chat: ChatId, duration: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let task = tokio::spawn(async move {
            let mut remaining = duration.as_secs();
            let message = match gateway
                .send_text(chat, &format!("⏰ Time remaining: <b>{}s</b>", remaining), None)
                .await
            {
                Ok(message) => message,
                Err(e) => {
                    log::debug!("Failed to send countdown in chat {}: {}", chat.0, e);
                    return None;
                }
            };

            let mut ticks = 0u32;
            while remaining > 0 && !flag.load(Ordering::SeqCst) {
                sleep(COUNTDOWN_TICK).await;
                ticks += 1;
                if ticks % 10 != 0 || flag.load(Ordering::SeqCst) {
                    continue;
                }
                remaining -= 1;
                let text = if remaining > 0 {
                    format!("⏰ Time remaining: <b>{}s</b>", remaining)
                } else {
                    "⏰ <b>Time's up!</b>".to_string()
                };
                if let Err(e) = gateway.edit_text(chat, message, &text).await {
                    log::debug!("Countdown edit failed in chat {}: {}", chat.0, e);
                    break;
                }
            }
            Some(message)
        });
        Self { stop, task }
    }

    /// Stops the ticking and removes the message. A countdown stuck in a
    /// slow request is left to finish in the background and cleaned up then.
    async fn stop<G: ChatGateway>(self, gateway: &G, chat: ChatId, fallback_delay: Duration) {
        self.stop.store(true, Ordering::SeqCst);
        let mut task = self.task;
        match timeout(Duration::from_secs(1), &mut task).await {
            Ok(joined) => remove_countdown(gateway, chat, joined, fallback_delay).await,
            Err(_) => {
                log::warn!("Countdown in chat {} did not stop in time", chat.0);
                let gateway = gateway.clone();
                tokio::spawn(async move {
                    let joined = task.await;
                    remove_countdown(&gateway, chat, joined, fallback_delay).await;
                });
            }
        }
    }
}

async fn remove_countdown<G: ChatGateway>(
    gateway: &G,
    chat: ChatId,
    joined: Result<Option<MessageId>, JoinError>,
    fallback_delay: Duration,
) {
    match joined {
        Ok(Some(message)) => {
            if let Err(e) = gateway.delete(chat, message).await {
                log::debug!("Failed to delete countdown in chat {}: {}", chat.0, e);
                schedule_delete(gateway, chat, message, fallback_delay);
            }
        }
        Ok(None) => {}
        Err(e) => log::error!("Countdown task in chat {} failed: {}", chat.0, e),
    }
}
