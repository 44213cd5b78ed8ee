use clap::Parser;
use colored::Colorize;
use qtrace_core::cli::{self, Cli};
use qtrace_core::exit::QtraceExit;
use qtrace_core::logging;

fn main() -> QtraceExit {
    logging::init_tracing();
    let cli = Cli::parse();

    let result = if let Some(cmd) = cli.command {
        cli::dispatch::execute(cmd, cli.config.as_deref())
    } else {
        use clap::CommandFactory;
        let _ = Cli::command().print_help();
        Ok(QtraceExit::Success)
    };

    match result {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red());
            QtraceExit::Error
        }
    }
}
