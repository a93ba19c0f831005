#[tokio::main]
async fn main() {
    if let Err(e) = avi_ingest_lib::run().await {
        eprintln!("avi-ingest: {e}");
        std::process::exit(1);
    }
}
