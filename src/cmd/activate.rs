use clap::Args;
use colored::Colorize;

use chatblocks::config::Config;
use chatblocks::document::FileDocument;
use chatblocks::output;

use crate::args::BlockArgs;
use crate::cmd;

#[derive(Args)]
pub struct ActivateArgs {
    #[command(flatten)]
    block: BlockArgs,

    /// Thread to mark active again
    url: String,
}

/// Undo a done mark.
pub fn run(args: ActivateArgs, config: &Config) -> Result<(), String> {
    let mut session = cmd::open_session(&args.block, FileDocument::new(&args.block.file), config)?;

    session.select(&args.url);
    let flipped = session.mark_active();
    cmd::print_notices(&session.take_notices(), config);

    if !flipped {
        return Err(format!(
            "not a done {} thread in this block: {}",
            session.platform().label(),
            args.url
        ));
    }
    println!("{} {}", "Active:".green(), output::style_url(&args.url));
    Ok(())
}
