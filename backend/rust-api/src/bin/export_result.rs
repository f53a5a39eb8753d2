use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::fmt::init;

use smartquiz_api::{
    config::Config,
    services::{
        export_service::{self, ExportFormat},
        quiz_storage::build_quiz_store,
    },
};

#[derive(Parser, Debug)]
#[command(
    name = "export-result",
    about = "Write a stored quiz result to a text or PDF report"
)]
struct Cli {
    /// Id of the stored result.
    #[arg(value_name = "RESULT_ID")]
    result_id: String,

    /// Report format: txt or pdf.
    #[arg(long, short, default_value = "txt")]
    format: ExportFormat,

    /// Output file. Defaults to `quiz-results-YYYY-MM-DD.<ext>` in the working directory.
    #[arg(long, short, value_name = "FILE")]
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();

    let cli = Cli::parse();
    let config = Config::load().context("Failed to load configuration")?;
    let store = build_quiz_store(&config.storage).await?;

    let stored = store
        .get_result(&cli.result_id)
        .await?
        .with_context(|| format!("Result {} not found", cli.result_id))?;

    let body = export_service::render(&stored.record.to_quiz_result(), cli.format);
    let path = cli.out.unwrap_or_else(|| {
        PathBuf::from(export_service::file_name(
            cli.format,
            stored.record.completed_at.date_naive(),
        ))
    });

    tokio::fs::write(&path, body)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!("Exported result {} to {}", cli.result_id, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_to_text_without_output_path() {
        let cli = Cli::try_parse_from(["export-result", "abc-123"]).unwrap();
        assert_eq!(cli.result_id, "abc-123");
        assert_eq!(cli.format, ExportFormat::Txt);
        assert!(cli.out.is_none());
    }

    #[test]
    fn parses_format_and_output() {
        let cli =
            Cli::try_parse_from(["export-result", "abc-123", "-f", "pdf", "--out", "r.pdf"])
                .unwrap();
        assert_eq!(cli.format, ExportFormat::Pdf);
        assert_eq!(cli.out, Some(PathBuf::from("r.pdf")));
    }

    #[test]
    fn rejects_unknown_format_and_missing_id() {
        assert!(Cli::try_parse_from(["export-result", "abc-123", "--format", "docx"]).is_err());
        assert!(Cli::try_parse_from(["export-result"]).is_err());
    }
}
