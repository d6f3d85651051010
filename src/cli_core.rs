use crate::agent::{ChatHistory, ChatRequest, Pipeline};
use crate::commands::{Command, CommandParser, Input, generate_help_text};
use crate::config::Config;
use crate::prompt::ChatPrompt;
use nu_ansi_term::{Color, Style};
use std::io;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Read line error: {0}")]
    ReadLine(#[from] io::Error),
}

/// Outcome of a chat command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    Exit(String),
    Output(String),
}

/// One conversation: the pipeline plus the history and display toggle the
/// front end carries between questions
pub struct ChatSession {
    pipeline: Pipeline,
    history: ChatHistory,
    show_query: bool,
}

impl ChatSession {
    pub fn new(pipeline: Pipeline, show_query: bool) -> Self {
        let history = ChatHistory::with_limit(pipeline.settings().history_limit);
        Self {
            pipeline,
            history,
            show_query,
        }
    }

    pub fn show_query(&self) -> bool {
        self.show_query
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    /// Ask the pipeline a question and keep the updated history
    pub async fn ask(&mut self, question: &str) -> String {
        let request = ChatRequest::new(question)
            .show_query(self.show_query)
            .history(std::mem::take(&mut self.history));

        let state = self.pipeline.run(request).await;
        if let Some(ref error) = state.error {
            debug!("Turn ended with error: {}", error);
        }

        self.history = state.chat_history;
        state.response
    }

    pub fn execute(&mut self, command: Command) -> CommandResult {
        let acknowledgement = command.acknowledgement().unwrap_or_default().to_string();
        match command {
            Command::HideQuery => {
                self.show_query = false;
                CommandResult::Output(acknowledgement)
            }
            Command::ShowQuery => {
                self.show_query = true;
                CommandResult::Output(acknowledgement)
            }
            Command::ClearHistory => {
                self.history.clear();
                CommandResult::Output(acknowledgement)
            }
            Command::ShowSchema => CommandResult::Output(format!(
                "\n{}\n{}",
                acknowledgement,
                self.pipeline.schema_prompt()
            )),
            Command::Help => CommandResult::Output(generate_help_text()),
            Command::Quit => CommandResult::Exit(acknowledgement),
        }
    }
}

fn print_banner() {
    let rule = "=".repeat(60);
    let banner = format!(
        "{rule}\nHey there! I'm your AI database agent.\n\
         You can ask me questions in plain English, and I'll get the data for you.\n{rule}"
    );
    println!("{}", Color::Cyan.bold().paint(banner));
    println!("Type your questions or use one of these commands:");
    println!("- 'hide query' to hide SQL queries in responses");
    println!("- 'show query' to show SQL queries in responses");
    println!("- 'clear history' to clear conversation history");
    println!("- 'show schema' to display database schema");
    println!("- 'quit', 'exit', or 'q' to exit");
    println!("{rule}");
}

fn print_processing() {
    println!(
        "{}",
        Style::new()
            .dimmed()
            .paint("Processing your question, one moment please...")
    );
}

/// Run the interactive chat loop until the user quits or sends EOF
pub async fn run_interactive(pipeline: Pipeline, show_query: bool) -> Result<(), CliError> {
    use reedline::{DefaultHinter, FileBackedHistory, Reedline, Signal};

    print_banner();

    let mut session = ChatSession::new(pipeline, show_query);
    let prompt = ChatPrompt::new();

    let history = Config::get_config_directory()
        .map(|dir| dir.join("history"))
        .and_then(|path| FileBackedHistory::with_file(200, path).ok())
        .unwrap_or_default();

    let mut line_editor = Reedline::create()
        .use_bracketed_paste(true)
        .with_hinter(Box::new(
            DefaultHinter::default().with_style(Style::new().italic().fg(Color::LightGray)),
        ))
        .with_history(Box::new(history));

    loop {
        println!();
        let signal = line_editor.read_line(&prompt)?;

        match signal {
            Signal::Success(buffer) => match CommandParser::parse(&buffer) {
                Input::Empty => continue,
                Input::Command(command) => match session.execute(command) {
                    CommandResult::Exit(message) => {
                        println!("{message}");
                        break;
                    }
                    CommandResult::Output(message) => println!("{message}"),
                },
                Input::Question(question) => {
                    print_processing();
                    let response = session.ask(&question).await;
                    println!("\n{response}");
                }
            },
            Signal::CtrlC => continue,
            Signal::CtrlD => {
                if let Some(message) = Command::Quit.acknowledgement() {
                    println!("{message}");
                }
                break;
            }
        }
    }

    Ok(())
}

/// Answer each question in order within one conversation, then return
pub async fn run_questions(pipeline: Pipeline, show_query: bool, questions: &[String]) {
    let mut session = ChatSession::new(pipeline, show_query);

    for (index, question) in questions.iter().enumerate() {
        if index > 0 {
            println!();
        }
        let response = session.ask(question).await;
        println!("{response}");
    }
}
