//! Playlists command - list the local playlist library

use anyhow::Result;
use clap::Args;

use crate::library::FileLibrary;
use crate::output::get_formatter;
use crate::CliContext;

#[derive(Debug, Args)]
pub struct PlaylistsCommand {}

impl PlaylistsCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let fmt = get_formatter(ctx.format);
        let library = FileLibrary::new(ctx.library_dir.clone());

        let summaries = library.list().await?;

        if ctx.format.is_json() {
            fmt.print_json(&serde_json::to_value(&summaries)?);
            return Ok(());
        }

        if summaries.is_empty() {
            fmt.info(&format!(
                "No playlists in {}. Add one as <name>.json.",
                library.dir().display()
            ));
            return Ok(());
        }

        for summary in &summaries {
            let card = match &summary.card_id {
                Some(card_id) => format!("card {card_id}"),
                None => "unpublished".to_string(),
            };
            println!(
                "{}  ({} tracks, {})  {}",
                summary.name, summary.tracks, card, summary.id
            );
        }
        Ok(())
    }
}
