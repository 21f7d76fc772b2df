use std::process::ExitCode;

fn main() -> ExitCode {
    homeserve_cli::run()
}
