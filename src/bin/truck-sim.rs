use truck_sim::simulation::runner;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    runner::run().await
}
