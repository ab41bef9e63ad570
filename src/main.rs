use std::process::ExitCode;

fn main() -> ExitCode {
    match driverfetch::run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::from(driverfetch::pipeline::EXIT_FAILURE)
        }
    }
}
