// src/cli/chat.rs — Interactive REPL

use std::io::Write;

use crate::cli::build_runtime;
use crate::infra::config::Config;

/// Run the interactive chat loop on stdin/stdout. Intended for manual testing
/// against a live provider; the production surface is the HTTP API.
pub async fn run_chat(config: &Config, session: Option<&str>) -> anyhow::Result<()> {
    let runtime = build_runtime(config)?;
    let session_id = session
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    eprintln!(
        "regista v{} | {} | session {}\n",
        env!("CARGO_PKG_VERSION"),
        config.provider.model,
        session_id,
    );
    eprintln!("Type a message, or 'quit' to exit. '/clear' resets the session.\n");

    while let Some(input) = read_input()? {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == "quit" || trimmed == "exit" || trimmed == "/quit" {
            break;
        }
        if trimmed == "/clear" {
            runtime.orchestrator.sessions().clear(&session_id);
            eprintln!("session cleared\n");
            continue;
        }

        match runtime.orchestrator.advance(&session_id, trimmed).await {
            Ok(reply) => println!("{reply}\n"),
            Err(e) => eprintln!("error: {e}\n"),
        }
    }

    Ok(())
}

fn read_input() -> anyhow::Result<Option<String>> {
    eprint!("> ");
    std::io::stderr().flush()?;
    let mut line = String::new();
    let read = std::io::stdin().read_line(&mut line)?;
    if read == 0 {
        return Ok(None); // EOF
    }
    Ok(Some(line))
}
