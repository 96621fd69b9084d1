//! `studio`: drive the architect/developer/qa pipeline from a terminal.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use studio::app::{Studio, load_image, render_message, render_task};
use studio::chat::{ChatState, run_chat};
use studio::core::tasks::TaskStatus;
use studio::core::types::{AgentOptions, Target};
use studio::exit_codes;
use studio::io::config::{InitOptions, init_studio, store_dir};
use studio::io::persistence::{FileStore, load_files};
use studio::router::{RunOutcome, SubmitRequest};

#[derive(Parser)]
#[command(
    name = "studio",
    version,
    about = "Multi-stage agent pipeline for generated UI components"
)]
struct Cli {
    /// Project directory holding `.studio/`.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write `.studio/config.toml` with default settings.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Run one request through the pipeline and print the conversation.
    Ask {
        /// What to build or change.
        text: String,
        #[command(flatten)]
        request: RequestArgs,
        /// Make this saved file active before the request (enables edits).
        #[arg(long)]
        open: Option<String>,
    },
    /// Interactive session; type /help for commands.
    Chat {
        #[command(flatten)]
        request: RequestArgs,
    },
    /// List saved files.
    Files,
}

#[derive(Args)]
struct RequestArgs {
    /// Stage(s) to address: team, architect, developer or qa.
    #[arg(long, default_value_t = Target::Team)]
    target: Target,
    /// Let the architect use web search.
    #[arg(long)]
    search: bool,
    /// Use the advanced model with extended reasoning.
    #[arg(long)]
    thinking: bool,
    /// Attach an image for the architect to analyse.
    #[arg(long)]
    image: Option<PathBuf>,
}

impl RequestArgs {
    fn options(&self) -> Result<AgentOptions> {
        Ok(AgentOptions {
            use_search: self.search,
            use_thinking: self.thinking,
            image: self.image.as_deref().map(load_image).transpose()?,
        })
    }
}

#[tokio::main]
async fn main() {
    studio::logging::init();
    let cli = Cli::parse();
    let code = match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Init { force } => cmd_init(&cli.root, force),
        Command::Ask {
            text,
            request,
            open,
        } => cmd_ask(&cli.root, text, &request, open.as_deref()).await,
        Command::Chat { request } => cmd_chat(&cli.root, &request).await,
        Command::Files => cmd_files(&cli.root),
    }
}

fn cmd_init(root: &Path, force: bool) -> Result<i32> {
    let path = init_studio(root, &InitOptions { force })?;
    println!("wrote {}", path.display());
    Ok(exit_codes::OK)
}

async fn cmd_ask(root: &Path, text: String, args: &RequestArgs, open: Option<&str>) -> Result<i32> {
    let studio = Studio::open(root)?;
    if let Some(name) = open {
        studio.open_file(name)?;
    }
    let request = SubmitRequest::new(text, args.target).with_options(args.options()?);
    let outcome = match studio.router().submit(request).await {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("request rejected: {err}");
            return Ok(exit_codes::REJECTED);
        }
    };
    studio.save_if_dirty()?;

    let store = studio.store();
    for message in store.messages() {
        println!("{}\n", render_message(&message));
    }
    let tasks = store.tasks();
    for task in &tasks {
        println!("{}", render_task(task));
    }
    if let Some(artifact) = store.active_artifact() {
        println!("\nactive file: {}", artifact.name);
    }

    let failed = tasks.iter().any(|task| task.status == TaskStatus::Failed);
    Ok(match outcome {
        RunOutcome::Settled { .. } if !failed => exit_codes::OK,
        _ => exit_codes::INVALID,
    })
}

async fn cmd_chat(root: &Path, args: &RequestArgs) -> Result<i32> {
    let studio = Studio::open(root)?;
    run_chat(&studio, ChatState::new(args.target, args.options()?)).await?;
    Ok(exit_codes::OK)
}

fn cmd_files(root: &Path) -> Result<i32> {
    let kv = FileStore::new(store_dir(root));
    for path in load_files(&kv).file_paths() {
        println!("{path}");
    }
    Ok(exit_codes::OK)
}
