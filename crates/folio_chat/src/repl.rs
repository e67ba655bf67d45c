use std::io::{BufRead, IsTerminal, Write};

use folio_chat::diagnostics::Diagnostics;
use folio_chat::{ChatController, ChatMessage, ChatService, Role, SessionStorage, SubmitOutcome};

use crate::prelude::*;

const HELP: &str = "Commands:
  /history  show the recent conversation
  /reset    start over from the greeting
  /debug    print a diagnostic report
  /help     show this help
  /quit     leave (Ctrl-D works too)
Ctrl-C while a reply streams cancels it.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    History,
    Reset,
    Debug,
    Help,
    Quit,
    Unknown(String),
}

impl Command {
    /// Parses a `/command` line. Anything else is a chat message.
    pub fn parse(line: &str) -> Option<Self> {
        let name = line.trim().strip_prefix('/')?;

        Some(match name.split_whitespace().next().unwrap_or_default() {
            "history" => Command::History,
            "reset" | "clear" => Command::Reset,
            "debug" => Command::Debug,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => Command::Unknown(other.to_string()),
        })
    }
}

/// Spinner shown until the first fragment arrives.
struct Progress {
    spinner: Option<spinners::Spinner>,
}

impl Progress {
    fn start(enabled: bool) -> Self {
        let spinner = enabled.then(|| {
            spinners::Spinner::new(spinners::Spinners::OrangeBluePulse, "Thinking...".into())
        });

        Self { spinner }
    }

    fn stop(&mut self) -> std::io::Result<()> {
        if let Some(mut spinner) = self.spinner.take() {
            spinner.stop();
            crossterm::execute!(
                std::io::stdout(),
                crossterm::cursor::MoveToColumn(0),
                crossterm::terminal::Clear(crossterm::terminal::ClearType::CurrentLine)
            )?;
        }

        Ok(())
    }
}

fn show_chunk(progress: &mut Progress, chunk: &str) -> std::io::Result<()> {
    progress.stop()?;

    let mut stdout = std::io::stdout();
    write!(stdout, "{chunk}")?;
    stdout.flush()
}

/// Sends one turn, printing the reply as it streams in. Ctrl-C cancels.
pub async fn stream_turn<C, S>(
    controller: &ChatController<C, S>,
    input: &str,
    quiet: bool,
) -> Result<SubmitOutcome>
where
    C: ChatService,
    S: SessionStorage,
{
    let mut progress = Progress::start(!quiet && std::io::stdout().is_terminal());
    let mut printed = false;
    let mut write_error = None;

    // The reply keeps streaming after a failed write; the first error is
    // returned once it settles.
    let mut render = |chunk: &str| {
        if let Err(e) = show_chunk(&mut progress, chunk) {
            log::debug!("failed to write a reply chunk: {e}");
            write_error.get_or_insert(e);
        }
        printed = true;
    };

    let outcome = {
        let submit = controller.submit_with(input, &mut render);
        tokio::pin!(submit);

        tokio::select! {
            outcome = &mut submit => outcome,
            _ = tokio::signal::ctrl_c() => {
                log::info!("interrupted, cancelling the reply");
                controller.cancel();
                submit.await
            }
        }
    };

    progress.stop()?;
    if let Some(e) = write_error {
        return Err(e.into());
    }

    match &outcome {
        SubmitOutcome::Completed(text) if !printed => println!("{text}"),
        SubmitOutcome::Completed(_) => println!(),
        SubmitOutcome::Cancelled if printed => println!(),
        _ => {}
    }
    std::io::stdout().flush()?;

    Ok(outcome)
}

/// Sends a single prompt and exits.
pub async fn one_shot<C, S>(
    controller: &ChatController<C, S>,
    prompt: &str,
    quiet: bool,
) -> Result<()>
where
    C: ChatService,
    S: SessionStorage,
{
    match stream_turn(controller, prompt, quiet).await? {
        SubmitOutcome::Completed(_) => Ok(()),
        SubmitOutcome::Failed(message) => Err(Error::Reply(message)),
        SubmitOutcome::Cancelled => Err(Error::Cancelled),
        SubmitOutcome::Ignored => Err(Error::EmptyPrompt),
    }
}

/// Reads prompts from `stdin` until `/quit` or end of input.
pub async fn interactive<C, S>(controller: &ChatController<C, S>, quiet: bool) -> Result<()>
where
    C: ChatService,
    S: SessionStorage,
{
    print_messages(&controller.visible_messages());
    println!("Type /help for commands.");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            break;
        }

        match Command::parse(&line) {
            Some(Command::Quit) => break,
            Some(Command::Help) => println!("{HELP}"),
            Some(Command::History) => print_messages(&controller.visible_messages()),
            Some(Command::Reset) => {
                controller.reset();
                print_messages(&controller.visible_messages());
            }
            Some(Command::Debug) => {
                let report = Diagnostics::attach(controller).detach();
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            Some(Command::Unknown(name)) => eprintln!("unknown command `/{name}`, try /help"),
            None => {
                let outcome = stream_turn(controller, &line, quiet).await?;
                if let SubmitOutcome::Failed(message) = outcome {
                    eprintln!("error: {message}");
                    controller.dismiss_error();
                }
            }
        }
    }

    Ok(())
}

pub fn print_messages(messages: &[ChatMessage]) {
    for message in messages {
        let speaker = match message.role {
            Role::User => "you",
            Role::Assistant => "assistant",
            Role::System => continue,
        };
        println!("{speaker}: {}", message.content);
    }
}
