//! CLI subcommand: `scenegpt execute`

use anyhow::Result;

use super::open_session;
use crate::config::Config;

pub async fn run(config: Config) -> Result<()> {
    let (mut session, _lock) = open_session(&config)?;

    if !session.has_pending_batch() {
        println!("No generated commands to execute. Run `scenegpt generate` first.");
        return Ok(());
    }

    let batch = session.execute();
    println!("{}", batch.report());
    session.save()?;

    if !batch.is_success() {
        anyhow::bail!("{} of {} command(s) failed", batch.failed, batch.total());
    }
    Ok(())
}
