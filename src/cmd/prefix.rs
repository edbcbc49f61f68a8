use clap::Args;

use chatblocks::config::Config;
use chatblocks::document::{Document, FileDocument, MemoryDocument};

use crate::args::BlockArgs;
use crate::cmd;

#[derive(Args)]
pub struct PrefixArgs {
    #[command(flatten)]
    block: BlockArgs,

    /// Print the upgraded file instead of writing it
    #[arg(long)]
    dry_run: bool,
}

/// Upgrade bare links in a block to `chat-active::` lines.
pub fn run(args: PrefixArgs, config: &Config) -> Result<(), String> {
    let before = cmd::read_input(&args.block.file)?;

    let after = if args.dry_run {
        let mut session =
            cmd::open_session(&args.block, MemoryDocument::new(before.clone()), config)?;
        cmd::print_notices(&session.take_notices(), config);
        let (document, _) = session.into_parts();
        document.text().to_string()
    } else {
        let mut session =
            cmd::open_session(&args.block, FileDocument::new(&args.block.file), config)?;
        cmd::print_notices(&session.take_notices(), config);
        let (document, _) = session.into_parts();
        document.read().map_err(|e| e.to_string())?
    };

    let upgraded = before
        .split('\n')
        .zip(after.split('\n'))
        .filter(|(a, b)| a != b)
        .count();

    if args.dry_run {
        print!("{}", after);
        if !after.ends_with('\n') {
            println!();
        }
        return Ok(());
    }

    if upgraded == 0 {
        println!("Nothing to upgrade in {}", args.block.file.display());
    } else {
        println!(
            "Upgraded {} line{} in {}",
            upgraded,
            if upgraded == 1 { "" } else { "s" },
            args.block.file.display()
        );
    }
    Ok(())
}
