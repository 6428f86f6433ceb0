use crate::store::ParticipantMap;
use crate::types::{Participant, UserKey};
use std::cmp::Ordering;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    pub user: UserKey,
    pub name: String,
    pub score: u32,
    pub total_latency: Duration,
    pub correct_answers: u32,
    pub answered: usize,
}

/// Ranks everyone who answered at least once: score descending, then
/// cumulative latency ascending. Ties keep their input order.
pub fn rank_final(standings: Vec<Standing>) -> Vec<Standing> {
    let mut ranked: Vec<Standing> = standings.into_iter().filter(|s| s.answered > 0).collect();
    ranked.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.total_latency.cmp(&b.total_latency))
    });
    ranked
}

/// Participants of `chat_id` who finished the current round, best accuracy
/// first and total score second.
pub fn global_ranking(participants: &ParticipantMap, chat_id: i64) -> Vec<(UserKey, Participant)> {
    let mut ranked: Vec<(UserKey, Participant)> = participants
        .iter()
        .filter(|(_, p)| p.has_completed_current_quiz && p.chat_ids.contains(&chat_id))
        .map(|(id, p)| (*id, p.clone()))
        .collect();
    ranked.sort_by(|(_, a), (_, b)| {
        b.accuracy
            .partial_cmp(&a.accuracy)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.total_score.cmp(&a.total_score))
    });
    ranked
}

pub fn rank_emoji(rank: usize) -> &'static str {
    match rank {
        1 => "🥇",
        2 => "🥈",
        3 => "🥉",
        4..=10 => "🔸",
        _ => "🔹",
    }
}

pub fn format_final(standings: &[Standing], question_count: usize) -> String {
    if standings.is_empty() {
        return "🏆 <b>Final Leaderboard</b> 🏆\n\nNo participants completed the quiz.".to_string();
    }

    let mut text = String::from("🏆 <b>QUIZ COMPLETED - FINAL LEADERBOARD</b> 🏆\n\n");
    for (i, s) in standings.iter().enumerate() {
        let rank = i + 1;
        let accuracy = if question_count > 0 {
            f64::from(s.correct_answers) / question_count as f64 * 100.0
        } else {
            0.0
        };
        text.push_str(&format!("{} <b>{}.</b> {}\n", rank_emoji(rank), rank, s.name));
        text.push_str(&format!(
            "   ⭐ Score: <b>{}</b> | 📊 Accuracy: <b>{:.1}%</b>\n",
            s.score, accuracy
        ));
        text.push_str(&format!(
            "   ⏱ Total Time: <b>{:.2}s</b>\n",
            s.total_latency.as_secs_f64()
        ));
        text.push_str(&format!(
            "   ✅ Correct: <b>{}/{}</b>\n\n",
            s.correct_answers, question_count
        ));
    }
    text
}

pub fn format_global(ranking: &[(UserKey, Participant)]) -> String {
    if ranking.is_empty() {
        return "🏆 <b>Global Leaderboard</b> 🏆\n\nNo participants have completed the current quiz yet!"
            .to_string();
    }

    let mut text = String::from("🏆 <b>Global Leaderboard</b> 🏆\n\n<i>Sorted by Accuracy (Highest to Lowest)</i>\n\n");
    for (i, (_, p)) in ranking.iter().enumerate() {
        let rank = i + 1;
        text.push_str(&format!("{} <b>{}.</b> {}\n", rank_emoji(rank), rank, p.name));
        text.push_str(&format!(
            "   📊 {:.1}% | ⭐ {} | 🎯 {} quizzes\n\n",
            p.accuracy, p.total_score, p.quizzes_completed
        ));
    }
    text
}

pub fn format_live(standings: &[Standing]) -> String {
    let mut text = String::from("🏅 <b>Live Points</b>\n");
    for (i, s) in standings.iter().enumerate() {
        text.push_str(&format!("{}. {}: <b>{}</b> pts\n", i + 1, s.name, s.score));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standing(user: UserKey, score: u32, millis: u64, answered: usize) -> Standing {
        Standing {
            user,
            name: format!("user{}", user),
            score,
            total_latency: Duration::from_millis(millis),
            correct_answers: score / 10,
            answered,
        }
    }

    #[test]
    fn score_then_latency() {
        let ranked = rank_final(vec![
            standing(1, 20, 900, 2),
            standing(2, 25, 5000, 2),
            standing(3, 20, 400, 2),
        ]);
        let order: Vec<UserKey> = ranked.iter().map(|s| s.user).collect();
        assert_eq!(order, vec![2, 3, 1]);
    }

    #[test]
    fn full_ties_keep_join_order() {
        let ranked = rank_final(vec![standing(7, 10, 100, 1), standing(3, 10, 100, 1)]);
        assert_eq!(ranked[0].user, 7);
        assert_eq!(ranked[1].user, 3);
    }

    #[test]
    fn silent_participants_are_not_ranked() {
        let ranked = rank_final(vec![standing(1, 0, 0, 0), standing(2, 0, 10, 1)]);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].user, 2);
    }

    #[test]
    fn badges() {
        assert_eq!(rank_emoji(1), "🥇");
        assert_eq!(rank_emoji(10), "🔸");
        assert_eq!(rank_emoji(11), "🔹");
    }
}
