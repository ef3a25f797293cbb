use anyhow::Result;
use colored::Colorize;
use rustyline::DefaultEditor;

use caichat_chat::{Directory, SessionManager};
use caichat_types::{
    CharacterSummary, NewCharacter, Visibility, DEFINITION_MAX_CHARS, DESCRIPTION_MAX_CHARS,
    GREETING_CHARS, NAME_CHARS, TITLE_CHARS,
};

use crate::app::repl::LineInput;

const PREVIEW_CHARS: usize = 80;

/// `create-character` subcommand: run the wizard once and exit
pub async fn run_create_character(session: &SessionManager) -> Result<()> {
    let identity = session.identity()?;
    println!("{}", format!("Authenticated as @{}", identity.username).bright_cyan());

    let directory = Directory::new(session)?;
    let mut rl = DefaultEditor::new()?;

    if let Some(created) = run_character_wizard(&mut rl, &directory).await? {
        println!(
            "\nYou can now chat with this character using ID: {}",
            created.character_id.bright_green()
        );
    }
    Ok(())
}

/// Collect details, confirm and create. `None` when cancelled or rejected.
pub async fn run_character_wizard(
    input: &mut impl LineInput,
    directory: &Directory,
) -> Result<Option<CharacterSummary>> {
    let Some(character) = collect_character_details(input)? else {
        println!("Cancelled.");
        return Ok(None);
    };

    println!("\n{}", render_summary(&character));
    let confirmed = prompt_yes_no(input, "Proceed with character creation?", false)?;
    if !confirmed {
        println!("Cancelled.");
        return Ok(None);
    }

    println!("Creating character...");
    match directory.create_character(&character).await {
        Ok(created) => {
            println!("\n{}", "Character created successfully!".bright_green().bold());
            println!("  Name:         {}", created.name);
            println!("  Character ID: {}", created.character_id);
            Ok(Some(created))
        }
        Err(e) => {
            eprintln!("\n{} {}", "Failed to create character:".bright_red(), e);
            Ok(None)
        }
    }
}

/// Prompt for every field. `None` if input ends part way.
pub fn collect_character_details(input: &mut impl LineInput) -> Result<Option<NewCharacter>> {
    println!("\n{}", "=== Create a New Character ===".bright_cyan().bold());

    let Some(name) = prompt_required(input, "Character name", NAME_CHARS)? else {
        return Ok(None);
    };
    let Some(greeting) = prompt_required(input, "Greeting message", GREETING_CHARS)? else {
        return Ok(None);
    };
    let title = prompt_optional(input, "Title", TITLE_CHARS.1, TITLE_CHARS.0)?;
    let description = prompt_optional(input, "Description", DESCRIPTION_MAX_CHARS, 0)?;
    let definition = prompt_optional(input, "Definition / personality", DEFINITION_MAX_CHARS, 0)?;
    let visibility = prompt_visibility(input)?;
    let copyable = prompt_yes_no(input, "Allow others to copy this character?", false)?;

    Ok(Some(NewCharacter {
        name,
        greeting,
        title,
        description,
        definition,
        visibility,
        copyable,
    }))
}

fn prompt_required(
    input: &mut impl LineInput,
    label: &str,
    (min, max): (usize, usize),
) -> Result<Option<String>> {
    loop {
        let Some(value) = input.read_line(&format!("{} ({}-{} chars): ", label, min, max))? else {
            return Ok(None);
        };
        let value = value.trim();
        let len = value.chars().count();
        if len < min || len > max {
            println!(
                "  {} Must be between {} and {} characters. Try again.",
                "!".yellow(),
                min,
                max
            );
            continue;
        }
        return Ok(Some(value.to_string()));
    }
}

/// Empty input skips the field; out-of-range input is dropped with a warning
fn prompt_optional(
    input: &mut impl LineInput,
    label: &str,
    max: usize,
    min: usize,
) -> Result<String> {
    let prompt = format!("{} (optional, max {} chars, Enter to skip): ", label, max);
    let value = input.read_line(&prompt)?.unwrap_or_default();
    let value = value.trim();
    let len = value.chars().count();

    if value.is_empty() {
        return Ok(String::new());
    }
    if min > 0 && len < min {
        println!("  {} Must be at least {} characters. Skipping.", "!".yellow(), min);
        return Ok(String::new());
    }
    if len > max {
        println!("  {} Exceeds {} characters. Skipping.", "!".yellow(), max);
        return Ok(String::new());
    }
    Ok(value.to_string())
}

fn prompt_visibility(input: &mut impl LineInput) -> Result<Visibility> {
    loop {
        let Some(value) =
            input.read_line("Visibility [private/unlisted/public] (default: private): ")?
        else {
            return Ok(Visibility::default());
        };
        if value.trim().is_empty() {
            return Ok(Visibility::default());
        }
        match value.parse::<Visibility>() {
            Ok(visibility) => return Ok(visibility),
            Err(_) => println!(
                "  {} Must be one of: private, unlisted, public. Try again.",
                "!".yellow()
            ),
        }
    }
}

fn prompt_yes_no(input: &mut impl LineInput, label: &str, default: bool) -> Result<bool> {
    let hint = if default { "Y/n" } else { "y/N" };
    let value = input
        .read_line(&format!("{} [{}]: ", label, hint))?
        .unwrap_or_default()
        .trim()
        .to_lowercase();

    if value.is_empty() {
        return Ok(default);
    }
    Ok(value == "y" || value == "yes")
}

fn preview(text: &str) -> String {
    if text.chars().count() > PREVIEW_CHARS {
        let head: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

pub fn render_summary(character: &NewCharacter) -> String {
    let mut lines = vec![
        "-- Character Summary ------------------".to_string(),
        format!("  Name:        {}", character.name),
        format!("  Greeting:    {}", preview(&character.greeting)),
    ];
    if !character.title.is_empty() {
        lines.push(format!("  Title:       {}", character.title));
    }
    if !character.description.is_empty() {
        lines.push(format!("  Description: {}", preview(&character.description)));
    }
    if !character.definition.is_empty() {
        lines.push(format!("  Definition:  {}", preview(&character.definition)));
    }
    lines.push(format!("  Visibility:  {}", character.visibility.as_str()));
    lines.push(format!(
        "  Copyable:    {}",
        if character.copyable { "Yes" } else { "No" }
    ));
    lines.push("---------------------------------------".to_string());
    lines.join("\n")
}
