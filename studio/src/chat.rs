//! Line-oriented chat loop for `studio chat`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::app::{Studio, load_image, render_message, render_task};
use crate::core::types::{AgentOptions, Target};
use crate::error::ValidationFailure;
use crate::router::SubmitRequest;

const HELP: &str = "\
commands:
  /undo /redo          step through the active file's history
  /open NAME           make a saved file active
  /close               deselect the active file
  /files               list saved files
  /target NAME         team | architect | developer | qa
  /search /think       toggle web search or extended reasoning
  /image PATH          attach an image to the next request
  /save                write files now
  /quit                leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Say(String),
    Undo,
    Redo,
    Open(String),
    Close,
    Files,
    Target(Target),
    ToggleSearch,
    ToggleThinking,
    Image(PathBuf),
    Save,
    Help,
    Quit,
    Invalid(String),
}

impl ChatCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return Self::Say(line.to_string());
        };
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        match (name, arg.is_empty()) {
            ("undo", true) => Self::Undo,
            ("redo", true) => Self::Redo,
            ("close", true) => Self::Close,
            ("files", true) => Self::Files,
            ("search", true) => Self::ToggleSearch,
            ("think", true) => Self::ToggleThinking,
            ("save", true) => Self::Save,
            ("help", true) => Self::Help,
            ("quit" | "exit", true) => Self::Quit,
            ("open", false) => Self::Open(arg.to_string()),
            ("image", false) => Self::Image(PathBuf::from(arg)),
            ("target", false) => match arg.parse() {
                Ok(target) => Self::Target(target),
                Err(err) => Self::Invalid(err),
            },
            _ => Self::Invalid(format!("unknown command: /{name} (try /help)")),
        }
    }
}

/// Settings that persist between chat lines. The image is used once.
#[derive(Debug, Clone, Default)]
pub struct ChatState {
    pub target: Target,
    pub options: AgentOptions,
}

impl ChatState {
    pub fn new(target: Target, options: AgentOptions) -> Self {
        Self { target, options }
    }

    /// Build the next submission, consuming any attached image.
    pub fn take_request(&mut self, text: String) -> SubmitRequest {
        let options = AgentOptions {
            use_search: self.options.use_search,
            use_thinking: self.options.use_thinking,
            image: self.options.image.take(),
        };
        SubmitRequest::new(text, self.target).with_options(options)
    }
}

pub async fn run_chat(studio: &Studio, mut state: ChatState) -> Result<()> {
    let _autosave = studio.spawn_autosave();
    let store = studio.store();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("studio chat ({}), /help for commands", state.target);

    while let Some(line) = lines.next_line().await.context("read stdin")? {
        match ChatCommand::parse(&line) {
            ChatCommand::Say(text) => {
                let seen = store.messages().len();
                let tasks_seen = store.tasks().len();
                match studio.router().submit(state.take_request(text)).await {
                    Ok(outcome) => debug!(?outcome, "run finished"),
                    Err(ValidationFailure::EmptyRequest) => continue,
                    Err(err) => {
                        println!("! {err}");
                        continue;
                    }
                }
                for message in store.messages().iter().skip(seen + 1) {
                    println!("{}", render_message(message));
                }
                for task in store.tasks().iter().skip(tasks_seen) {
                    println!("{}", render_task(task));
                }
            }
            ChatCommand::Undo => match store.undo() {
                Some(artifact) => println!("undo -> {} ({})", artifact.name, position(studio)),
                None => println!("nothing to undo"),
            },
            ChatCommand::Redo => match store.redo() {
                Some(artifact) => println!("redo -> {} ({})", artifact.name, position(studio)),
                None => println!("nothing to redo"),
            },
            ChatCommand::Open(name) => match studio.open_file(&name) {
                Ok(artifact) => println!("opened {}", artifact.name),
                Err(err) => println!("! {err:#}"),
            },
            ChatCommand::Close => {
                store.close_artifact();
                println!("closed");
            }
            ChatCommand::Files => {
                for path in store.files().file_paths() {
                    println!("{path}");
                }
            }
            ChatCommand::Target(target) => {
                state.target = target;
                println!("target: {target}");
            }
            ChatCommand::ToggleSearch => {
                state.options.use_search = !state.options.use_search;
                println!("search: {}", on_off(state.options.use_search));
            }
            ChatCommand::ToggleThinking => {
                state.options.use_thinking = !state.options.use_thinking;
                println!("thinking: {}", on_off(state.options.use_thinking));
            }
            ChatCommand::Image(path) => match load_image(&path) {
                Ok(image) => {
                    state.options.image = Some(image);
                    println!("image attached: {}", path.display());
                }
                Err(err) => println!("! {err:#}"),
            },
            ChatCommand::Save => match studio.save() {
                Ok(()) => println!("saved"),
                Err(err) => println!("! {err:#}"),
            },
            ChatCommand::Help => println!("{HELP}"),
            ChatCommand::Quit => break,
            ChatCommand::Invalid(message) => println!("! {message}"),
        }
    }

    studio.save_if_dirty()
}

fn position(studio: &Studio) -> String {
    let history = studio.store().history_position();
    format!("{}/{}", history.index + 1, history.len)
}

fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}
