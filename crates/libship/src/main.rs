use std::process::ExitCode;

fn main() -> ExitCode {
    match libship::run() {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(2)
        }
    }
}
