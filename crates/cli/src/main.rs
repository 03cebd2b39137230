use std::process::ExitCode;

fn main() -> ExitCode {
    leadcall_cli::run()
}
