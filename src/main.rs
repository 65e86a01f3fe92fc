//! worktrack main entrypoint.

use worktrack::run;
use worktrack::ui::messages;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        messages::error(format!("Error: {}", e));
        std::process::exit(1);
    }
}
