//! `finanbot chat`: Interactive or single-message advisory session.

use crate::bootstrap;
use finanbot_agent::{BufferSink, TurnOutcome, WELCOME_MESSAGE, retrieval_status};
use finanbot_config::AppConfig;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

const EXIT_COMMANDS: [&str; 3] = ["exit", "quit", ":q"];

fn is_exit_command(line: &str) -> bool {
    EXIT_COMMANDS.contains(&line.trim().to_lowercase().as_str())
}

fn print_reply(text: &str) {
    println!();
    for line in text.lines() {
        println!("  FinanBot > {line}");
    }
    println!();
}

pub async fn run(config: AppConfig, message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let documents_dir = config.retrieval.documents_dir.display().to_string();
    let provider_name = config.default_provider.clone();
    let runtime = bootstrap::build(config).await?;
    let service = &runtime.service;
    let session = service.start_session().await;

    if let Some(msg) = message {
        // Single message mode
        let mut sink = BufferSink::new();
        eprint!("  Pensando...");
        let outcome = service.run_turn_with(&session, &msg, &mut sink).await;
        eprint!("\r              \r");
        println!("{}", sink.text());
        if let TurnOutcome::Failed { .. } = outcome {
            return Err("generation failed (details in the log)".into());
        }
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        FinanBot — Asesor Financiero Perú     ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:  {provider_name}");
    println!("  Model:     {}", runtime.model);
    println!(
        "  Datos:     {}",
        if runtime.economy.is_some() { "BCRP activo" } else { "BCRP desactivado" }
    );
    println!();
    println!("{}", retrieval_status(runtime.index.is_some(), &documents_dir));
    println!();
    println!("{WELCOME_MESSAGE}");
    println!();
    println!("  Escribe 'exit' o Ctrl+D para salir.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("  Tú > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if is_exit_command(line) {
            break;
        }

        eprint!("  ...");
        let mut sink = BufferSink::new();
        service.run_turn_with(&session, line, &mut sink).await;
        eprint!("\r     \r");
        print_reply(sink.text());
    }

    service.end_session(session.id.as_str()).await;

    println!();
    println!("  ¡Hasta pronto! 👋");
    println!();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_commands() {
        assert!(is_exit_command("exit"));
        assert!(is_exit_command("  QUIT "));
        assert!(is_exit_command(":q"));
        assert!(!is_exit_command("salir del banco"));
        assert!(!is_exit_command("quit smoking budget"));
    }
}
