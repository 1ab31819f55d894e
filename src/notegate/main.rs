mod cli;

#[tokio::main]
async fn main() {
    cli::setup::init_logging();
    if let Err(e) = cli::commands::run().await {
        eprint!("{}", cli::render::render_error(&e));
        std::process::exit(1);
    }
}
