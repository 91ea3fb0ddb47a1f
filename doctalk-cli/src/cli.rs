use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Upload documents and ask questions about them, with citations.
#[derive(Debug, Parser)]
#[command(name = "doctalk", version, about)]
pub struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Ingest files or directories into the vector store.
    Upload(UploadArgs),
    /// Answer a question from the ingested documents.
    Ask(AskArgs),
}

#[derive(Debug, Args)]
pub struct UploadArgs {
    /// Files or directories to ingest (.pdf, .txt, .md, .docx).
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Delete every stored chunk before ingesting.
    #[arg(long)]
    pub clear: bool,

    /// Create the Atlas vector search index before ingesting.
    #[arg(long)]
    pub create_index: bool,

    /// Maximum chunk length in characters.
    #[arg(long, default_value_t = 1000)]
    pub chunk_size: usize,

    /// Characters shared between consecutive chunks.
    #[arg(long, default_value_t = 200)]
    pub chunk_overlap: usize,
}

#[derive(Debug, Args)]
pub struct AskArgs {
    /// The question. Read from stdin when omitted.
    pub question: Option<String>,

    /// Number of chunks to retrieve.
    #[arg(long, default_value_t = 5)]
    pub top_k: usize,

    /// Candidate pool examined by the approximate search.
    #[arg(long, default_value_t = 50)]
    pub num_candidates: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_upload_flags() {
        let cli = Cli::parse_from([
            "doctalk",
            "upload",
            "--clear",
            "--chunk-size",
            "500",
            "docs",
            "notes.md",
        ]);
        match cli.command {
            Command::Upload(args) => {
                assert!(args.clear);
                assert!(!args.create_index);
                assert_eq!(args.chunk_size, 500);
                assert_eq!(args.chunk_overlap, 200);
                assert_eq!(args.paths, vec![PathBuf::from("docs"), PathBuf::from("notes.md")]);
            }
            other => panic!("expected upload, got {other:?}"),
        }
    }

    #[test]
    fn upload_requires_a_path() {
        assert!(Cli::try_parse_from(["doctalk", "upload"]).is_err());
    }

    #[test]
    fn ask_question_is_optional() {
        let cli = Cli::parse_from(["doctalk", "-v", "ask", "--top-k", "3"]);
        assert!(cli.verbose);
        match cli.command {
            Command::Ask(args) => {
                assert!(args.question.is_none());
                assert_eq!(args.top_k, 3);
                assert_eq!(args.num_candidates, 50);
            }
            other => panic!("expected ask, got {other:?}"),
        }
    }
}
