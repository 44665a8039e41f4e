use clap::Parser;
use training::util::{run_eval, EvalArgs};

fn main() -> anyhow::Result<()> {
    cli_support::init_logging()?;
    let args = EvalArgs::parse();
    run_eval(args)?;
    Ok(())
}
