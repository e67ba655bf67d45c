mod args;
mod config;
mod error;
mod prelude;
mod repl;
mod session;

use std::time::Duration;

use folio_chat::{ChatClient, ChatController, MessageStore};

use crate::prelude::*;
use crate::session::{new_session_id, Sessions};

fn build_client(args: &Args) -> Result<ChatClient> {
    let client = ChatClient::new(args.endpoint.clone());
    if client.endpoint().is_none() {
        log::warn!("no chat endpoint configured");
    }

    Ok(match args.timeout {
        Some(seconds) => client.with_timeout(Duration::from_secs(seconds))?,
        None => client,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let mut args = build_args()?;
    let sessions = Sessions::new(&args.config_dir);

    if args.list {
        return sessions.print_list();
    }

    let session = match args.session.take() {
        Some(session) => session,
        None => {
            let session = new_session_id();
            if args.prompt.is_none() && !args.show && !args.end_session {
                eprintln!(
                    "session {session} (set FOLIO_CHAT_SESSION={session} to continue it later)"
                );
            }
            session
        }
    };
    log::info!("session: {}", session);

    if args.end_session {
        return sessions.end(&session);
    }

    let store = MessageStore::new(
        sessions.storage(&session, args.quota)?,
        args.storage_key
            .clone()
            .unwrap_or_else(|| DEFAULT_STORAGE_KEY.to_string()),
    )
    .with_system_message(args.system.clone())
    .with_greeting(args.greeting.clone());

    if args.show {
        repl::print_messages(&store.initialize());
        return Ok(());
    }

    let controller = ChatController::new(build_client(&args)?, store);
    let quiet = args.quiet.unwrap_or(false);

    match args.prompt.take() {
        Some(prompt) => repl::one_shot(&controller, &prompt, quiet).await,
        None => repl::interactive(&controller, quiet).await,
    }
}
