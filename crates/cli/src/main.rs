use std::process::ExitCode;

fn main() -> ExitCode {
    hearsay_cli::run()
}
