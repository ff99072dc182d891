#[tokio::main]
async fn main() {
    etag_hash_demo::main().await
}
