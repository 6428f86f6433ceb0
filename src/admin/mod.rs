use crate::types::{option_letter, Question, UserField, UserKey};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tokio::time::Instant;

/// Options every admin-entered question carries (A to E).
pub const OPTION_COUNT: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub enum FlowKind {
    AddQuestion {
        text: Option<String>,
        options: Vec<String>,
    },
    EditQuestion(QuestionDraft),
    BulkAdd,
    SetTime,
    EditUser {
        user: UserKey,
        field: UserField,
    },
    DeleteSelection(BTreeSet<usize>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftStep {
    Menu,
    Text,
    Option(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestionDraft {
    pub index: usize,
    pub question: Question,
    pub step: DraftStep,
}

impl QuestionDraft {
    pub fn new(index: usize, question: Question) -> Self {
        Self {
            index,
            question,
            step: DraftStep::Menu,
        }
    }

    pub fn render(&self, heading: &str) -> String {
        let mut text = format!(
            "{}\n\n<b>Question {}:</b>\n{}\n\n<b>Options:</b>\n",
            heading,
            self.index + 1,
            self.question.text
        );
        for (i, opt) in self.question.options.iter().enumerate() {
            let mark = if i == self.question.correct_index { " ✅" } else { "" };
            text.push_str(&format!("{}. {}{}\n", option_letter(i), opt, mark));
        }
        text
    }
}

/// What the admin's last message resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowStep {
    /// Keep the flow and ask for the next input.
    Prompt(String),
    /// All options collected; offer correct-answer buttons.
    ChooseCorrect(Vec<String>),
    /// Show the edit menu for the current draft.
    ShowDraft(String),
    /// Flow finished; carry out the command.
    Apply(AdminCommand),
    /// Flow finished with bad input.
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdminCommand {
    BulkAdd(Vec<Question>),
    SetQuestionTime(u64),
    SetName(UserKey, String),
    SetScore(UserKey, i64),
    SetAccuracy(UserKey, f64),
    SetQuizzes(UserKey, u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdminFlow {
    pub kind: FlowKind,
    pub last_activity: Instant,
}

impl AdminFlow {
    pub fn new(kind: FlowKind) -> Self {
        Self {
            kind,
            last_activity: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn mode(&self) -> &'static str {
        match self.kind {
            FlowKind::AddQuestion { .. } => "add_question",
            FlowKind::EditQuestion(_) => "edit_question",
            FlowKind::BulkAdd => "bulk_add_questions",
            FlowKind::SetTime => "set_time",
            FlowKind::EditUser { .. } => "edit_user",
            FlowKind::DeleteSelection(_) => "delete_selection",
        }
    }

    /// True when the flow is waiting for a typed message.
    pub fn expects_text(&self) -> bool {
        match &self.kind {
            FlowKind::AddQuestion { options, .. } => options.len() < OPTION_COUNT,
            FlowKind::EditQuestion(draft) => draft.step != DraftStep::Menu,
            FlowKind::DeleteSelection(_) => false,
            _ => true,
        }
    }

    pub fn apply_text(&mut self, input: &str) -> FlowStep {
        self.touch();
        let input = input.trim();

        match &mut self.kind {
            FlowKind::AddQuestion { text, options } => {
                if text.is_none() {
                    *text = Some(input.to_string());
                    return FlowStep::Prompt(format!(
                        "📝 <b>Question saved!</b>\n\nNow enter <b>Option {}</b>:",
                        option_letter(0)
                    ));
                }
                if options.len() >= OPTION_COUNT {
                    return FlowStep::Prompt("Select the <b>correct answer</b> with the buttons above.".to_string());
                }
                options.push(input.to_string());
                if options.len() < OPTION_COUNT {
                    FlowStep::Prompt(format!(
                        "✅ Option saved! Now enter <b>Option {}</b>:",
                        option_letter(options.len())
                    ))
                } else {
                    FlowStep::ChooseCorrect(options.clone())
                }
            }
            FlowKind::EditQuestion(draft) => match draft.step {
                DraftStep::Text => {
                    draft.question.text = input.to_string();
                    draft.step = DraftStep::Menu;
                    FlowStep::ShowDraft(draft.render("✅ <b>Question Text Updated</b>"))
                }
                DraftStep::Option(i) => {
                    if let Some(slot) = draft.question.options.get_mut(i) {
                        *slot = input.to_string();
                    }
                    let next = i + 1;
                    if next < draft.question.options.len() {
                        draft.step = DraftStep::Option(next);
                        FlowStep::Prompt(format!(
                            "✅ <b>Option {} updated!</b>\n\nNow send the new text for <b>Option {}</b>:",
                            option_letter(i),
                            option_letter(next)
                        ))
                    } else {
                        draft.step = DraftStep::Menu;
                        FlowStep::ShowDraft(draft.render("✅ <b>All Options Updated</b>"))
                    }
                }
                DraftStep::Menu => FlowStep::ShowDraft(draft.render("✏️ <b>Editing Question</b>")),
            },
            FlowKind::BulkAdd => {
                let parsed = parse_bulk_questions(input);
                if parsed.is_empty() {
                    FlowStep::Invalid(
                        "❌ Failed to parse any questions. Please follow the format and try again."
                            .to_string(),
                    )
                } else {
                    FlowStep::Apply(AdminCommand::BulkAdd(parsed))
                }
            }
            FlowKind::SetTime => match input.parse::<u64>() {
                Ok(secs) => FlowStep::Apply(AdminCommand::SetQuestionTime(secs)),
                Err(_) => FlowStep::Invalid("❌ Please enter a valid number.".to_string()),
            },
            FlowKind::EditUser { user, field } => edit_user_step(*user, *field, input),
            FlowKind::DeleteSelection(_) => {
                FlowStep::Prompt("Use the buttons to pick questions to delete.".to_string())
            }
        }
    }
}

fn edit_user_step(user: UserKey, field: UserField, input: &str) -> FlowStep {
    match field {
        UserField::Name if !input.is_empty() => FlowStep::Apply(AdminCommand::SetName(user, input.to_string())),
        UserField::Name => FlowStep::Invalid("❌ Name cannot be empty.".to_string()),
        UserField::Score => match input.parse() {
            Ok(score) => FlowStep::Apply(AdminCommand::SetScore(user, score)),
            Err(_) => FlowStep::Invalid("❌ Please enter a valid number for score.".to_string()),
        },
        UserField::Accuracy => match input.parse::<f64>() {
            Ok(acc) if (0.0..=100.0).contains(&acc) => FlowStep::Apply(AdminCommand::SetAccuracy(user, acc)),
            Ok(_) => FlowStep::Invalid("❌ Please enter a number between 0 and 100.".to_string()),
            Err(_) => FlowStep::Invalid("❌ Please enter a valid number for accuracy.".to_string()),
        },
        UserField::Quizzes => match input.parse() {
            Ok(n) => FlowStep::Apply(AdminCommand::SetQuizzes(user, n)),
            Err(_) => FlowStep::Invalid("❌ Please enter a valid number for quizzes completed.".to_string()),
        },
        UserField::ToggleCompletion | UserField::Reset => {
            FlowStep::Invalid("❌ That action does not take text input.".to_string())
        }
    }
}

/// Drops flows idle for longer than `ttl`. Returns how many were removed.
pub fn expire_idle(flows: &mut HashMap<UserKey, AdminFlow>, now: Instant, ttl: Duration) -> usize {
    let before = flows.len();
    flows.retain(|user, flow| {
        let keep = now.saturating_duration_since(flow.last_activity) <= ttl;
        if !keep {
            log::info!("Cleared expired admin flow for user {}", user);
        }
        keep
    });
    before - flows.len()
}

fn option_line(line: &str) -> Option<&str> {
    let mut chars = line.chars();
    let letter = chars.next()?;
    if !('A'..='E').contains(&letter) || chars.next()? != ')' {
        return None;
    }
    Some(line[2..].trim())
}

fn correct_marker(line: &str) -> Option<usize> {
    let rest = line.strip_prefix('✅')?.trim();
    let mut chars = rest.chars();
    let letter = chars.next()?;
    if chars.next().is_some() || !('A'..='E').contains(&letter) {
        return None;
    }
    Some((letter as u8 - b'A') as usize)
}

/// Parses pasted blocks of a question line, five `A)`..`E)` option lines and
/// a `✅ <letter>` line. Blocks that do not fit are skipped.
pub fn parse_bulk_questions(text: &str) -> Vec<Question> {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let mut questions = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if lines[i].is_empty() {
            i += 1;
            continue;
        }

        let question_text = lines[i];
        let mut options = Vec::new();
        let mut correct = None;
        let mut j = i + 1;

        while j < lines.len() && options.len() < OPTION_COUNT {
            let line = lines[j];
            if let Some(opt) = option_line(line) {
                options.push(opt.to_string());
            } else if let Some(c) = correct_marker(line) {
                correct = Some(c);
            } else if !line.is_empty() {
                break;
            }
            j += 1;
        }

        if correct.is_none() {
            let mut k = j;
            while k < lines.len() && lines[k].is_empty() {
                k += 1;
            }
            if let Some(c) = lines.get(k).and_then(|l| correct_marker(l)) {
                correct = Some(c);
                j = k + 1;
            }
        }

        match correct {
            Some(c) if options.len() == OPTION_COUNT && c < OPTION_COUNT => {
                questions.push(Question::new(question_text, options, c));
                i = j;
            }
            _ => i += 1,
        }
    }

    questions
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "What is 2+2?
A) 1
B) 2
C) 3
D) 4
E) 5
✅ D

Largest planet?
A) Mars
B) Jupiter
C) Venus
D) Earth
E) Saturn
✅ B
";

    #[test]
    fn parses_well_formed_blocks() {
        let parsed = parse_bulk_questions(SAMPLE);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].text, "What is 2+2?");
        assert_eq!(parsed[0].correct_option(), "4");
        assert_eq!(parsed[1].correct_option(), "Jupiter");
    }

    #[test]
    fn skips_blocks_with_missing_options_or_marker() {
        let text = "Broken?\nA) x\nB) y\n✅ A\n\nNo marker?\nA) 1\nB) 2\nC) 3\nD) 4\nE) 5\n";
        assert!(parse_bulk_questions(text).is_empty());
    }

    #[test]
    fn add_question_flow_collects_five_options() {
        let mut flow = AdminFlow::new(FlowKind::AddQuestion {
            text: None,
            options: Vec::new(),
        });
        assert!(matches!(flow.apply_text("Sky colour?"), FlowStep::Prompt(_)));
        for opt in ["Red", "Blue", "Green", "Black"] {
            assert!(matches!(flow.apply_text(opt), FlowStep::Prompt(_)));
        }
        match flow.apply_text("White") {
            FlowStep::ChooseCorrect(options) => assert_eq!(options.len(), OPTION_COUNT),
            other => panic!("unexpected step {:?}", other),
        }
        assert!(!flow.expects_text());
    }

    #[test]
    fn edit_options_walks_every_option() {
        let q = Question::new("Q", vec!["a".into(), "b".into()], 0);
        let mut draft = QuestionDraft::new(0, q);
        draft.step = DraftStep::Option(0);
        let mut flow = AdminFlow::new(FlowKind::EditQuestion(draft));
        assert!(matches!(flow.apply_text("alpha"), FlowStep::Prompt(_)));
        assert!(matches!(flow.apply_text("beta"), FlowStep::ShowDraft(_)));
        match &flow.kind {
            FlowKind::EditQuestion(d) => {
                assert_eq!(d.question.options, vec!["alpha".to_string(), "beta".to_string()]);
                assert_eq!(d.step, DraftStep::Menu);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn accuracy_input_is_bounded() {
        let mut flow = AdminFlow::new(FlowKind::EditUser {
            user: 9,
            field: UserField::Accuracy,
        });
        assert!(matches!(flow.apply_text("140"), FlowStep::Invalid(_)));
        assert_eq!(
            flow.apply_text("87.5"),
            FlowStep::Apply(AdminCommand::SetAccuracy(9, 87.5))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn idle_flows_expire() {
        let mut flows = HashMap::new();
        flows.insert(1, AdminFlow::new(FlowKind::SetTime));
        tokio::time::advance(Duration::from_secs(3601)).await;
        flows.insert(2, AdminFlow::new(FlowKind::BulkAdd));
        let removed = expire_idle(&mut flows, Instant::now(), Duration::from_secs(3600));
        assert_eq!(removed, 1);
        assert!(flows.contains_key(&2));
    }
}
