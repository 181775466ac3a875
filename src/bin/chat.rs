//! Terminal chat client. Talks to a running flirtina server and keeps its
//! conversations in the local SQLite database.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use flirtina::client::ProxyClient;
use flirtina::models::{Conversation, Message, Role};
use flirtina::services::{
    ChatSession, ConversationStore, PatternClassifier, SendOutcome, SessionConfig, SqliteStore,
};
use flirtina::telemetry::{init_tracing, TracingConfig};

const DEFAULT_SERVER_URL: &str = "http://localhost:8888";

const HELP: &str = "Commands:
  /image <prompt>  generate an image
  /new             start a new conversation
  /list            list conversations
  /open <n>        switch to conversation n from /list
  /delete          delete the current conversation
  /clear           delete every conversation
  /help            show this list
  /quit            exit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(&TracingConfig::default());

    let server_url =
        std::env::var("FLIRTINA_SERVER_URL").unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
    let client = Arc::new(ProxyClient::new(&server_url)?);

    let backend = match std::env::var("FLIRTINA_DB") {
        Ok(path) if !path.is_empty() => SqliteStore::new(path)?,
        _ => SqliteStore::open_default()?,
    };
    let store = ConversationStore::load(Arc::new(backend)).await?;

    let session = ChatSession::new(
        store,
        client.clone(),
        client,
        Arc::new(PatternClassifier::new()),
        SessionConfig::default(),
    );

    println!("Connected to {}. Type /help for commands.", server_url);
    if let Some(conversation) = session.active_conversation().await {
        print_conversation(&conversation);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, argument) = match line.split_once(' ') {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        match command {
            "" => continue,
            "/quit" | "/exit" => break,
            "/help" => println!("{}", HELP),
            "/new" => {
                session.new_conversation().await;
                println!("Started a new conversation.");
            }
            "/list" => {
                for (i, conversation) in session.conversations().await.iter().enumerate() {
                    println!(
                        "{:>3}. {} ({} messages)",
                        i + 1,
                        conversation.title,
                        conversation.messages.len()
                    );
                }
            }
            "/open" => {
                let conversations = session.conversations().await;
                let picked = argument
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| conversations.get(i));
                match picked {
                    Some(conversation) => {
                        session.select_conversation(&conversation.id).await;
                        print_conversation(conversation);
                    }
                    None => println!("No such conversation."),
                }
            }
            "/delete" => {
                if let Some(conversation) = session.active_conversation().await {
                    session.delete_conversation(&conversation.id).await;
                    println!("Deleted \"{}\".", conversation.title);
                }
            }
            "/clear" => {
                session.clear_all().await;
                println!("All conversations deleted.");
            }
            "/image" => {
                let outcome = session.send_image_prompt(argument).await;
                print_outcome(&session, outcome).await;
            }
            _ => {
                let outcome = session.send_message(line).await;
                print_outcome(&session, outcome).await;
            }
        }
    }

    Ok(())
}

async fn print_outcome(session: &ChatSession, outcome: SendOutcome) {
    if outcome == SendOutcome::Ignored {
        return;
    }
    let Some(conversation) = session.active_conversation().await else {
        return;
    };
    let replies = conversation
        .messages
        .iter()
        .rev()
        .take_while(|m| m.role == Role::Assistant)
        .collect::<Vec<_>>();
    for message in replies.into_iter().rev() {
        print_message(message);
    }
}

fn print_conversation(conversation: &Conversation) {
    println!("== {} ==", conversation.title);
    for message in &conversation.messages {
        print_message(message);
    }
}

fn print_message(message: &Message) {
    let speaker = match message.role {
        Role::User => "you",
        Role::Assistant => "flirtina",
    };
    if message.is_image() {
        let size = message.image_data.as_ref().map(|d| d.len()).unwrap_or(0);
        println!(
            "{}: [image \"{}\" from {}, {} bytes base64]",
            speaker,
            message.prompt.as_deref().unwrap_or_default(),
            message.model.as_deref().unwrap_or("unknown model"),
            size
        );
    } else if message.is_error {
        println!("{} (error): {}", speaker, message.content);
    } else {
        println!("{}: {}", speaker, message.content);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_help_lists_every_command() {
        for command in ["/image", "/new", "/list", "/open", "/delete", "/clear", "/help", "/quit"] {
            assert!(HELP.contains(command), "{} missing from help", command);
        }
    }
}
