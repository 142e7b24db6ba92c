use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kisan_api::{Backends, ServerConfig};
use kisan_assistant::VoiceAssistant;
use kisan_core::{Language, LocaleTag, QueryKind, Rulebook};
use kisan_llm::RemoteBackend;
use kisan_observability::{init_tracing, AppMetrics};
use serde::Serialize;

#[derive(Debug, Parser)]
#[command(name = "kisan")]
#[command(about = "Kisan voice assistant CLI")]
struct Cli {
    /// JSON rulebook to use instead of the builtin one.
    #[arg(long, global = true, env = "KISAN_RULEBOOK_PATH")]
    rulebook: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the feature route a transcript navigates to.
    Route { transcript: Vec<String> },
    /// Answer a transcript, falling back to the local table.
    Answer {
        transcript: Vec<String>,
        #[command(flatten)]
        remote: RemoteArgs,
        #[arg(long = "type", default_value = "chat")]
        kind: QueryKind,
    },
    /// Interactive loop: route and answer each line.
    Chat {
        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Show how a language code resolves for speech.
    Locale { code: String },
    /// Dump the active rulebook as JSON.
    Rules,
    /// Run the HTTP API.
    Serve {
        #[arg(long)]
        bind: Option<String>,
    },
}

#[derive(Debug, clap::Args)]
struct RemoteArgs {
    #[arg(long, default_value = "en")]
    language: String,
    /// Skip the remote call and answer from the local table.
    #[arg(long)]
    offline: bool,
    #[arg(long, env = "KISAN_CHAT_ENDPOINT")]
    endpoint: Option<String>,
}

impl RemoteArgs {
    fn language(&self) -> Language {
        Language::from_optional_str(Some(&self.language))
    }

    fn backend(&self) -> Result<RemoteBackend> {
        if self.offline {
            return Ok(RemoteBackend::Offline);
        }
        let mut config = ServerConfig::from_env();
        if self.endpoint.is_some() {
            config.chat_endpoint = self.endpoint.clone();
        }
        Ok(Backends::from_config(&config)?.remote)
    }
}

#[derive(Debug, Serialize)]
struct LocaleOutput<'a> {
    code: &'a str,
    language: Language,
    language_name: &'static str,
    locale_tag: LocaleTag,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("kisan_cli");
    let cli = Cli::parse();

    match cli.command {
        Command::Route { transcript } => {
            let rulebook = load_rulebook(cli.rulebook.as_deref())?;
            let route = rulebook.router().resolve_route(&transcript.join(" ")).cloned();
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "route": route }))?);
        }
        Command::Answer {
            transcript,
            remote,
            kind,
        } => {
            let assistant = build_assistant(cli.rulebook.as_deref(), remote.backend()?)?;
            let turn = assistant
                .handle_as(kind, &transcript.join(" "), remote.language())
                .await;
            println!("{}", serde_json::to_string_pretty(&turn)?);
        }
        Command::Chat { remote } => {
            let assistant = build_assistant(cli.rulebook.as_deref(), remote.backend()?)?;
            run_chat(&assistant, remote.language()).await?;
        }
        Command::Locale { code } => {
            let language = Language::from_optional_str(Some(&code));
            let output = LocaleOutput {
                code: &code,
                language,
                language_name: language.display_name(),
                locale_tag: LocaleTag::resolve(&code),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Rules => {
            let rulebook = load_rulebook(cli.rulebook.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&rulebook)?);
        }
        Command::Serve { bind } => {
            let mut config = ServerConfig::from_env();
            if let Some(bind) = bind {
                config.bind = bind;
            }
            if cli.rulebook.is_some() {
                config.rulebook_path = cli.rulebook;
            }
            kisan_api::serve(config).await?;
        }
    }

    Ok(())
}

async fn run_chat(assistant: &VoiceAssistant<RemoteBackend>, language: Language) -> Result<()> {
    println!(
        "Kisan assistant ({}, {} backend). type 'exit' to quit.",
        language.display_name(),
        assistant.resolver().remote().name()
    );

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }

        let message = line.trim();
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }

        let turn = assistant.handle(message, language).await;
        if let Some(route) = &turn.route {
            println!("[open {route}]");
        }
        println!("\n{}\n", turn.answer.text());
    }

    Ok(())
}

fn load_rulebook(path: Option<&Path>) -> Result<Rulebook> {
    Rulebook::load(path).context("failed to load rulebook")
}

fn build_assistant(
    rulebook: Option<&Path>,
    remote: RemoteBackend,
) -> Result<VoiceAssistant<RemoteBackend>> {
    let rulebook = load_rulebook(rulebook)?;
    Ok(VoiceAssistant::new(&rulebook, remote, AppMetrics::shared()))
}
