use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match clinica_lib::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("clinica: {e}");
            ExitCode::FAILURE
        }
    }
}
