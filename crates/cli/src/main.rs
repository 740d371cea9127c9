use std::process::ExitCode;

fn main() -> ExitCode {
    haulrate_cli::run()
}
