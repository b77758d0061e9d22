//! Chat command - the interactive loop.

use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::terminal::{Clear, ClearType};
use llamachat_core::{paths, ChatConfig, ChatSession};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{debug, error, warn};

use crate::backend::Backend;

const PROMPT: &str = ">>> ";

/// What a line typed at the prompt asks for.
#[derive(Debug, PartialEq)]
enum Entry<'a> {
    Exit,
    NewChat,
    Empty,
    Prompt(&'a str),
}

fn classify<'a>(line: &'a str, config: &ChatConfig) -> Entry<'a> {
    let input = line.trim();
    if input.is_empty() {
        Entry::Empty
    } else if input == config.exit_entry {
        Entry::Exit
    } else if input == config.new_entry {
        Entry::NewChat
    } else {
        Entry::Prompt(input)
    }
}

fn clear_screen() {
    let mut stdout = std::io::stdout();
    if let Err(e) = execute!(stdout, Clear(ClearType::All), MoveTo(0, 0)) {
        debug!("Failed to clear screen: {}", e);
    }
}

pub(crate) async fn run(config: ChatConfig, prompt: Option<&str>) -> miette::Result<()> {
    let backend = Backend::connect(&config).await?;
    let mut session = ChatSession::new(config.system_message.as_str());

    let mut editor =
        DefaultEditor::new().map_err(|e| miette::miette!("Failed to start line editor: {}", e))?;
    let history_path = paths::history_file();
    if let Some(dir) = history_path.parent() {
        std::fs::create_dir_all(dir).ok();
    }
    if let Err(e) = editor.load_history(&history_path) {
        debug!("No history loaded from {:?}: {}", history_path, e);
    }

    println!("\n{} loaded!", backend.name);
    println!("(To start a new chat, enter '{}')", config.new_entry);
    println!("(To exit, enter '{}')", config.exit_entry);
    println!("(To stop a reply, press Ctrl+Q or Esc)\n");

    let mut pending = prompt
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string);

    loop {
        let line = match pending.take() {
            Some(default_entry) => {
                println!("{}{}", PROMPT, default_entry);
                default_entry
            }
            None => match editor.readline(PROMPT) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(e) => {
                    error!("Readline error: {:?}", e);
                    eprintln!("Input error: {}", e);
                    break;
                }
            },
        };

        let entry = classify(&line, &config);
        if entry != Entry::Empty {
            if let Err(e) = editor.add_history_entry(line.trim()) {
                warn!("Failed to add line to history: {}", e);
            }
        }

        match entry {
            Entry::Empty => continue,
            Entry::Exit => break,
            Entry::NewChat => {
                clear_screen();
                session.reset();
                println!("New chat started!");
            }
            Entry::Prompt(text) => {
                session.push_user(text);
                match backend.generate(&session, &config).await {
                    Ok(reply) => {
                        if !session.record_reply(reply.text) {
                            debug!("Empty reply, dropped the prompt from history");
                        }
                    }
                    Err(e) => {
                        println!();
                        error!("Generation failed: {}", e);
                        eprintln!("Error: {}", e);
                        session.pop_last_user();
                    }
                }
            }
        }
    }

    if let Err(e) = editor.save_history(&history_path) {
        warn!("Failed to save history to {:?}: {}", history_path, e);
    }

    println!("\n{} closed!", backend.name);
    Ok(())
}
