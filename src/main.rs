use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match medtrack_lib::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("medtrack: {e}");
            ExitCode::FAILURE
        }
    }
}
