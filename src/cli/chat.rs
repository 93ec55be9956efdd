use std::io::Write;

use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;

use crate::chat::{
    CURSOR, Conversation, OpenAiProvider, TurnEvent, format_block, init_state, preset, presets,
    process_user_turn, render,
};
use crate::core::{AppConfig, logging};
use crate::scrape::ContextLoader;

// Erases the cursor printed after the last fragment
const ERASE_CURSOR: &str = "\u{8} \u{8}";

fn print_presets(conversation: &Conversation) {
    let presets = presets(conversation);
    if presets.is_empty() {
        return;
    }
    println!("Example prompts:");
    for (idx, prompt) in presets.iter().enumerate() {
        println!("  /{}  {}", idx + 1, prompt);
    }
}

fn print_transcript(conversation: &Conversation) {
    for block in render(conversation, None) {
        println!("{}", format_block(&block));
    }
}

/// Print the response as it is typed out with the cursor trailing
/// the text until the turn is finished.
async fn print_events(mut rx: mpsc::UnboundedReceiver<TurnEvent>) {
    let mut stdout = std::io::stdout();
    let mut cursor_shown = false;

    while let Some(event) = rx.recv().await {
        if cursor_shown {
            print!("{}", ERASE_CURSOR);
            cursor_shown = false;
        }
        match event {
            TurnEvent::Delta { fragment, .. } => {
                print!("{}{}", fragment, CURSOR);
                cursor_shown = true;
            }
            TurnEvent::Done { .. } => println!(),
            TurnEvent::Error { message, partial } => {
                if !partial.is_empty() {
                    println!();
                }
                println!("[{}]", message);
            }
        }
        let _ = stdout.flush();
    }
}

pub async fn run(config: AppConfig) -> Result<()> {
    logging::init(&format!("{}=warn", env!("CARGO_CRATE_NAME")));

    let mut rl = DefaultEditor::new()?;

    let loader = ContextLoader::new(config.context_urls.clone())?;
    let context = loader.load().await;
    let mut conversation = init_state(&config.system_message, context)?;

    let provider = OpenAiProvider::from_config(&config);
    let options = config.completion_options();

    print_presets(&conversation);

    loop {
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                if line == "/history" {
                    print_transcript(&conversation);
                    continue;
                }

                // `/1`, `/2`, ... pick a preset prompt
                let input = match line.strip_prefix('/').and_then(|n| n.parse::<usize>().ok()) {
                    Some(choice) => match preset(&conversation, choice) {
                        Some(prompt) => {
                            println!("{}", prompt);
                            prompt.to_string()
                        }
                        None => {
                            println!("No preset prompt /{}", choice);
                            continue;
                        }
                    },
                    None => line.to_string(),
                };

                let (tx, rx) = mpsc::unbounded_channel();
                let printer = tokio::spawn(print_events(rx));
                process_user_turn(&mut conversation, &input, &provider, &options, &tx).await;

                // Closing the channel lets the printer finish
                drop(tx);
                printer.await?;
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}
