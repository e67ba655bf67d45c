use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Default, Clone, Debug, Parser, PartialEq, Serialize, Deserialize)]
#[command(name = "folio-chat", version = "0.1.0")]
#[command(about = "Chat with the portfolio assistant from the terminal")]
#[command(
    long_about = "Sends prompts to the portfolio chat endpoint and prints the assistant reply as
it streams in. Without a prompt an interactive session starts.

The conversation is kept for the duration of a session: set FOLIO_CHAT_SESSION (or
--session) to the same id to continue it across invocations, and --end-session to
discard it."
)]
pub struct Args {
    /// The user message. When absent and `stdin` is piped, `stdin` is used instead;
    /// otherwise an interactive session starts.
    #[serde(skip_serializing)]
    pub prompt: Option<String>,

    /// Chat endpoint URL.
    #[clap(long, env = "FOLIO_CHAT_ENDPOINT")]
    pub endpoint: Option<String>,

    /// System directive placed ahead of the conversation.
    #[clap(long)]
    pub system: Option<String>,

    /// Assistant greeting a new session starts with.
    #[clap(long)]
    pub greeting: Option<String>,

    /// Storage key the history is persisted under.
    #[clap(long)]
    pub storage_key: Option<String>,

    /// Session id. A new one is generated when absent.
    #[clap(long, env = "FOLIO_CHAT_SESSION")]
    pub session: Option<String>,

    /// Maximum size in bytes of the persisted history.
    #[clap(long)]
    pub quota: Option<usize>,

    /// Request timeout in seconds.
    #[clap(long)]
    pub timeout: Option<u64>,

    /// Don't run the spinner
    #[clap(long)]
    #[serde(skip_serializing)]
    pub quiet: Option<bool>,

    /// Config dir where the configuration and the session histories are stored.
    #[clap(long, default_value = "~/.config/folio-chat")]
    #[serde(skip_serializing)]
    pub config_dir: String,

    /// Config file. If undefined, it will be set as `config_dir/config.toml`.
    #[clap(long)]
    #[serde(skip_serializing)]
    pub config_file: Option<String>,

    /// Print the session history and exit.
    #[clap(long)]
    #[serde(skip_serializing, default)]
    pub show: bool,

    /// Print the list of stored sessions and exit.
    #[clap(long)]
    #[serde(skip_serializing, default)]
    pub list: bool,

    /// Delete the stored history of the session and exit.
    #[clap(long)]
    #[serde(skip_serializing, default)]
    pub end_session: bool,
}
