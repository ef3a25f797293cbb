use anyhow::Result;
use colored::Colorize;
use futures::{Stream, StreamExt};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::Write;

use caichat_chat::{ChatOrchestrator, Directory, RelayResult, SessionManager, StreamPacing};
use caichat_types::{CharacterCard, EndReason, Identity, StreamEvent};

use crate::app::create_character::run_character_wizard;
use crate::signal::{interrupted, interruptible};

/// Listings are cut to this many entries (except the account's own)
const LIST_LIMIT: usize = 15;

/// Source of user input lines
pub trait LineInput {
    /// Read one line; `None` on end of input or interrupt
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;
}

impl LineInput for DefaultEditor {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        match self.readline(prompt) {
            Ok(line) => {
                let _ = self.add_history_entry(line.as_str());
                Ok(Some(line))
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

enum Selection {
    Character(String),
    Back,
    Exit,
}

/// Run the interactive terminal client
pub async fn run_repl_mode(session: &SessionManager, pacing: StreamPacing) -> Result<()> {
    let identity = session.identity()?;
    let orchestrator = ChatOrchestrator::new(session, pacing)?;
    let directory = Directory::new(session)?;

    println!("{}", format!("Authenticated as @{}", identity.username).bright_cyan().bold());

    let mut rl = DefaultEditor::new()?;

    loop {
        match select_character(&mut rl, &directory).await? {
            Selection::Character(character_id) => {
                chat_with_character(&mut rl, &orchestrator, &identity, &character_id).await?;
                println!("\n{}", "Returned to menu.".bright_black());
            }
            Selection::Back => continue,
            Selection::Exit => break,
        }
    }

    println!("{}", "Goodbye!".bright_cyan());
    Ok(())
}

async fn select_character(rl: &mut DefaultEditor, directory: &Directory) -> Result<Selection> {
    println!("\n{}", "=== Character Selection ===".bright_cyan().bold());
    println!("1. Recent Chats");
    println!("2. My Characters");
    println!("3. Search Characters");
    println!("4. Create New Character");
    println!("5. Enter Character ID Manually");
    println!("6. Exit");

    let Some(choice) = rl.read_line("\nSelect an option: ")? else {
        return Ok(Selection::Exit);
    };

    match choice.trim() {
        "1" => {
            let Some(cards) = fetch_cards(directory.recent()).await else {
                return Ok(Selection::Back);
            };
            pick_from_list(rl, "Recent Chats", cards, Some(LIST_LIMIT), false)
        }
        "2" => {
            let Some(cards) = fetch_cards(directory.mine()).await else {
                return Ok(Selection::Back);
            };
            pick_from_list(rl, "My Characters", cards, None, false)
        }
        "3" => {
            let query = rl.read_line("Search for character: ")?.unwrap_or_default();
            let query = query.trim();
            if query.is_empty() {
                return Ok(Selection::Back);
            }
            let Some(cards) = fetch_cards(directory.search(query)).await else {
                return Ok(Selection::Back);
            };
            let heading = format!("Search Results for '{}'", query);
            pick_from_list(rl, &heading, cards, Some(LIST_LIMIT), true)
        }
        "4" => Ok(match run_character_wizard(rl, directory).await? {
            Some(created) => Selection::Character(created.character_id),
            None => Selection::Back,
        }),
        "5" => {
            let id = rl.read_line("Enter Character ID: ")?.unwrap_or_default();
            let id = id.trim();
            Ok(if id.is_empty() {
                Selection::Back
            } else {
                Selection::Character(id.to_string())
            })
        }
        "6" => Ok(Selection::Exit),
        _ => {
            println!("{}", "Invalid option. Please try again.".yellow());
            Ok(Selection::Back)
        }
    }
}

/// Listing request that Ctrl-C abandons
async fn fetch_cards(
    request: impl std::future::Future<Output = RelayResult<Vec<CharacterCard>>>,
) -> Option<RelayResult<Vec<CharacterCard>>> {
    let cards = interruptible(request, interrupted()).await;
    if cards.is_none() {
        println!("\n{}", "Interrupted.".bright_yellow());
    }
    cards
}

fn pick_from_list(
    rl: &mut impl LineInput,
    heading: &str,
    cards: RelayResult<Vec<CharacterCard>>,
    limit: Option<usize>,
    show_author: bool,
) -> Result<Selection> {
    let cards = match cards {
        Ok(cards) => cards,
        Err(e) => {
            eprintln!("{} {}", "Failed to fetch characters:".bright_red(), e);
            return Ok(Selection::Back);
        }
    };
    if cards.is_empty() {
        println!("{}", "No characters found.".yellow());
        return Ok(Selection::Back);
    }

    let shown = &cards[..limit.unwrap_or(cards.len()).min(cards.len())];
    println!("\n--- {} ---", heading);
    for (i, card) in shown.iter().enumerate() {
        println!("{}", format_card_line(i + 1, card, show_author));
    }

    let Some(answer) = rl.read_line("\nSelect character number (or 'b' to go back): ")? else {
        return Ok(Selection::Back);
    };
    Ok(parse_selection(&answer, shown))
}

fn format_card_line(number: usize, card: &CharacterCard, show_author: bool) -> String {
    if !show_author {
        return format!("{}. {}", number, card.name);
    }
    format!(
        "{}. {} (@{}) - {}",
        number,
        card.name,
        card.author_username.as_deref().unwrap_or("unknown"),
        card.title.as_deref().unwrap_or("")
    )
}

fn parse_selection(answer: &str, shown: &[CharacterCard]) -> Selection {
    let answer = answer.trim();
    if answer.eq_ignore_ascii_case("b") {
        return Selection::Back;
    }
    match answer.parse::<usize>() {
        Ok(n) if n >= 1 && n <= shown.len() => Selection::Character(shown[n - 1].character_id.clone()),
        _ => {
            println!("{}", "Invalid selection.".yellow());
            Selection::Back
        }
    }
}

async fn chat_with_character(
    rl: &mut DefaultEditor,
    orchestrator: &ChatOrchestrator,
    identity: &Identity,
    character_id: &str,
) -> Result<()> {
    let started = interruptible(orchestrator.start_conversation(character_id), interrupted()).await;
    let (conversation, greeting) = match started {
        Some(Ok(started)) => started,
        Some(Err(e)) => {
            eprintln!("{} {}", "Could not start chat:".bright_red(), e);
            return Ok(());
        }
        None => {
            println!("\n{}", "Interrupted.".bright_yellow());
            return Ok(());
        }
    };

    println!(
        "\n{}",
        format!("--- Chatting with {} ---", greeting.author_name).bright_cyan()
    );
    println!("{} {}", format!("[{}]:", greeting.author_name).bright_magenta(), greeting.text);

    let me = if identity.display_name.is_empty() {
        identity.username.as_str()
    } else {
        identity.display_name.as_str()
    };
    let prompt = format!("{} ", format!("[{}]:", me).bright_green().bold());

    loop {
        let Some(line) = rl.read_line(&prompt)? else {
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if is_leave_command(message) {
            break;
        }

        let mut reply = orchestrator.send_and_stream(&conversation, message);
        print!("{} ", format!("[{}]:", conversation.character_name).bright_magenta());
        let mut stdout = std::io::stdout();
        let end = interruptible(print_reply(&mut reply, &mut stdout), interrupted()).await;
        drop(reply);
        println!("\n");

        match end.transpose()? {
            None => println!("{}", "^C - reply interrupted".bright_yellow()),
            Some(EndReason::Complete) => {}
            Some(EndReason::SessionClosed) => {
                println!("{}", "Session closed.".bright_red());
                break;
            }
            Some(EndReason::Failed(message)) => {
                eprintln!("{} {}", "Reply failed:".bright_red(), message);
            }
        }
    }

    Ok(())
}

/// Write reply chunks to `out` as they arrive; returns how the reply ended
async fn print_reply<S>(reply: &mut S, out: &mut impl Write) -> Result<EndReason>
where
    S: Stream<Item = StreamEvent> + Unpin,
{
    let mut end = EndReason::Complete;
    while let Some(event) = reply.next().await {
        match event {
            StreamEvent::Chunk(chunk) => {
                write!(out, "{}", chunk.text)?;
                out.flush()?;
            }
            StreamEvent::End(reason) => end = reason,
        }
    }
    Ok(end)
}

fn is_leave_command(message: &str) -> bool {
    matches!(message.to_lowercase().as_str(), "exit" | "quit" | "/back")
}
