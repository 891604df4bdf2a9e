// Smoke suite exercising the driver's abort policy end to end

use clap::Parser;
use expecta_harness::{exit_on_abort, logging, HarnessConfig, Suite};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "expecta-smoke")]
#[command(about = "Run a small suite whose second case times out", long_about = None)]
struct Cli {
    /// Harness config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Keep running cases after a failure instead of aborting the suite
    #[arg(long)]
    continue_after_failure: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = HarnessConfig::load(cli.config.as_deref())?;
    if cli.continue_after_failure {
        config.case.continue_after_failure = true;
    }
    logging::init(&config.log_filter)?;

    let mut suite = Suite::with_defaults("smoke", config.case.clone());
    suite.test("callback fires", |ctx| {
        println!("Test Case 'callback fires' started");
        let fired = ctx.expectation("callback invoked");
        let handle = fired.clone();
        std::thread::spawn(move || handle.fulfill());
        ctx.wait(&[fired], Duration::from_secs(5))?;
        Ok(())
    });
    suite.test("callback never fires", |ctx| {
        println!("Test Case 'callback never fires' started");
        let never = ctx.expectation("callback invoked");
        ctx.wait(&[never], Duration::from_millis(50))?;
        Ok(())
    });
    suite.test("runs last", |_| {
        println!("Test Case 'runs last' started");
        Ok(())
    });

    let runs = exit_on_abort(suite.run());
    for run in &runs {
        let verdict = if run.has_succeeded() { "passed" } else { "failed" };
        println!(
            "Test Case '{}' {verdict} ({:.3} seconds)",
            run.name(),
            run.total_duration().as_secs_f64()
        );
    }

    let failed = runs.iter().filter(|run| !run.has_succeeded()).count();
    if failed > 0 {
        anyhow::bail!("{failed} test case(s) failed");
    }
    Ok(())
}
