use anyhow::Result;
use folio_chat::{ChatClient, ChatMessage, ChatService, RequestOptions};
use std::io::Write;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let client = ChatClient::from_env();

    let messages = vec![
        ChatMessage::system("You answer questions about my research."),
        ChatMessage::user("Which venues have you published in?"),
    ];

    let mut print = |chunk: &str| {
        print!("{chunk}");
        let _ = std::io::stdout().flush();
    };

    client
        .send_chat_request(
            &messages,
            RequestOptions {
                on_chunk: Some(&mut print),
                ..Default::default()
            },
        )
        .await?;

    println!();

    Ok(())
}
