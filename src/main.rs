//! shell-batch binary entry point.

use std::io::{Read, Write};
use std::process::ExitCode;

use shell_batch::cli::{self, Args};
use shell_batch::config::Config;
use shell_batch::{logging, Session, SessionOptions, ShellBatchError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

const EXIT_FAILURE: u8 = 1;
const EXIT_TIMEOUT: u8 = 124;
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Try 'shell-batch --help' for more information.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }

    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    logging::try_init_with(config.log_filter()).ok();
    debug!("shell-batch v{}", env!("CARGO_PKG_VERSION"));

    match run(&args, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

async fn run(args: &Args, config: &Config) -> shell_batch::Result<()> {
    let defaults = config
        .to_defaults()
        .map_err(|e| ShellBatchError::Config(e.to_string()))?;

    let commands = if args.reads_stdin() {
        let mut script = String::new();
        std::io::stdin()
            .read_to_string(&mut script)
            .map_err(ShellBatchError::Read)?;
        vec![script]
    } else {
        args.commands.clone()
    };

    let cancel = CancellationToken::new();
    let options = SessionOptions::new()
        .cancel_token(cancel.clone())
        .output(|_num, line| {
            let mut out = std::io::stdout().lock();
            let _ = out.write_all(line);
            let _ = out.write_all(b"\n");
        });

    let session = Session::create_with_defaults(options, &defaults)?;
    info!("Session {}: {}", session.id(), session.command_line());

    let interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling");
            interrupt.cancel();
        }
    });

    let result = session.run(commands).await;
    watcher.abort();

    if let Some(dir) = session.last_work_dir() {
        info!("Session {}: finished in {}", session.id(), dir);
    }
    result
}

fn exit_code(err: &ShellBatchError) -> u8 {
    if err.is_deadline_exceeded() {
        return EXIT_TIMEOUT;
    }
    if err.is_cancelled() {
        return EXIT_INTERRUPTED;
    }
    match err.root() {
        ShellBatchError::ExitStatus {
            code: Some(code), ..
        } => u8::try_from(*code)
            .ok()
            .filter(|c| *c != 0)
            .unwrap_or(EXIT_FAILURE),
        _ => EXIT_FAILURE,
    }
}
