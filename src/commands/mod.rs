use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "snake_case", description = "Available commands:")]
pub enum Command {
    #[command(description = "Register or see the leaderboard")]
    Start,
    #[command(description = "Start a quiz in this chat")]
    StartQuiz,
    #[command(description = "Show the leaderboard")]
    Leaderboard,
    #[command(rename = "myinfo", description = "Show your statistics")]
    MyInfo,
    #[command(description = "Show help message")]
    Help,
    #[command(description = "Open the admin panel")]
    Admin,
    #[command(description = "Clear the quiz state of this chat (admin)")]
    ClearState,
    #[command(description = "Show active quiz states (admin)")]
    StateInfo,
    #[command(description = "Start a new round from scratch (admin)")]
    ResetAllData,
    #[command(description = "Reopen the quiz (admin)")]
    ReopenQuiz,
}
