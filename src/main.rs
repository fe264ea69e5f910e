#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tuition_center_api::run().await
}
