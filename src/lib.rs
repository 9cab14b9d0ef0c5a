//! The `permck` CLI (§4.9): a thin `structopt` wrapper around `permck-interp`'s checker,
//! with `tracing` logging configured from the `CHECKER_LOG` environment variable (falling
//! back to `--log`), matching how the rest of this workspace wires up diagnostics.

use permck_util::Fallible;
use structopt::StructOpt;

mod check;

#[derive(Debug, StructOpt)]
pub struct Options {
    #[structopt(flatten)]
    global: GlobalOptions,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
pub struct GlobalOptions {
    /// Log filter used when `CHECKER_LOG` is unset, in `tracing_subscriber::EnvFilter`
    /// syntax (e.g. `permck_interp=debug`).
    #[structopt(long, default_value = "info")]
    log: String,
}

#[derive(Debug, StructOpt)]
pub enum Command {
    /// Run the permission checker over one or more fixtures.
    Check {
        #[structopt(flatten)]
        options: check::Options,
    },
}

impl Options {
    pub fn main(self) -> Fallible<()> {
        init_logging(&self.global.log);
        match self.command {
            Command::Check { options } => options.main(),
        }
    }
}

fn init_logging(default_filter: &str) {
    let filter = match std::env::var("CHECKER_LOG") {
        Ok(env) => tracing_subscriber::EnvFilter::new(env),
        Err(_) => tracing_subscriber::EnvFilter::new(default_filter.to_string()),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
