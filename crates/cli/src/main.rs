use std::process::ExitCode;

fn main() -> ExitCode {
    tourlead_cli::run()
}
