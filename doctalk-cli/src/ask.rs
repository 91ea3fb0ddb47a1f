use std::io::{self, BufRead, Write};

use anyhow::{Context, Result, bail};
use doctalk_rag::{Answer, RagAgent, RagConfig};

use crate::cli::AskArgs;
use crate::settings::Settings;

/// Longest excerpt printed in full.
const DISPLAY_EXCERPT_CHARS: usize = 150;

pub async fn run(settings: &Settings, args: AskArgs) -> Result<()> {
    let config = RagConfig::builder()
        .top_k(args.top_k)
        .num_candidates(args.num_candidates)
        .build()?;

    let question = match args.question {
        Some(question) => question,
        None => prompt_question()?,
    };
    let question = question.trim();
    if question.is_empty() {
        bail!("question must not be empty");
    }

    let agent = RagAgent::builder()
        .config(config)
        .embedding_provider(settings.embedding_provider()?)
        .vector_store(settings.vector_store().await?)
        .generator(settings.generator()?)
        .build()?;

    let answer = agent.ask(question).await?;
    print!("{}", render_answer(&answer));
    Ok(())
}

fn prompt_question() -> Result<String> {
    eprint!("Enter your question: ");
    io::stderr().flush().ok();

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).context("failed to read question from stdin")?;
    Ok(line)
}

fn render_answer(answer: &Answer) -> String {
    let mut out = format!("\nAnswer:\n{}\n", answer.text);
    if answer.citations.is_empty() {
        return out;
    }

    out.push_str("\nCitations:\n");
    for (i, citation) in answer.citations.iter().enumerate() {
        out.push_str(&format!(
            "\n[{}] {}\n    Chunk ID: {}\n    Excerpt: {}\n",
            i + 1,
            citation.document_name,
            citation.chunk_id,
            display_excerpt(&citation.text_excerpt)
        ));
    }
    out
}

/// Shorten text longer than [`DISPLAY_EXCERPT_CHARS`] to fit, ending in `...`.
fn display_excerpt(text: &str) -> String {
    if text.chars().count() <= DISPLAY_EXCERPT_CHARS {
        return text.to_string();
    }
    let kept: String = text.chars().take(DISPLAY_EXCERPT_CHARS - 3).collect();
    format!("{kept}...")
}
