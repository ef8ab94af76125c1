use walkin::app;

#[tokio::main]
async fn main() {
    let exit_code = app::startup::startup().await;
    // stdin is read on a blocking thread that would hold up runtime shutdown
    std::process::exit(exit_code);
}
