use clap::Args;
use colored::Colorize;
use serde::Serialize;

use chatblocks::config::Config;
use chatblocks::document::FileDocument;
use chatblocks::output::{self, OutputFormat};

use crate::args::{BlockArgs, FormatArgs};
use crate::cmd;

#[derive(Args)]
pub struct DoneArgs {
    #[command(flatten)]
    block: BlockArgs,

    /// Thread to mark done (default: the first active thread of the block)
    url: Option<String>,

    #[command(flatten)]
    format: FormatArgs,
}

#[derive(Serialize)]
struct DoneReport {
    done: String,
    next: String,
}

pub fn run(args: DoneArgs, config: &Config) -> Result<(), String> {
    let format = args.format.resolve();
    let mut session = cmd::open_session(&args.block, FileDocument::new(&args.block.file), config)?;

    if let Some(url) = &args.url {
        session.select(url);
    }
    let target = session.current_url().to_string();

    let next = session.mark_done();
    cmd::print_notices(&session.take_notices(), config);
    let next = next.ok_or_else(|| {
        format!(
            "not an active {} thread in this block: {}",
            session.platform().label(),
            target
        )
    })?;

    let report = DoneReport { done: target, next };
    match format {
        OutputFormat::Pretty => {
            println!("{} {}", "Done:".green(), output::style_url(&report.done));
            println!("{} {}", "Next:".bold(), output::style_url(&report.next));
        }
        OutputFormat::Plain => {
            println!("Done: {}", report.done);
            println!("Next: {}", report.next);
        }
        OutputFormat::Json | OutputFormat::Yaml => output::print_structured(&report, format)?,
    }
    Ok(())
}
