// Usage: run-planner [LOCATION]
// Falls back to PLANNER_LOCATION when no location is given.

#[tokio::main]
async fn main() {
  let location = std::env::args().nth(1);

  if let Err(e) = run_planner_lib::run(location).await {
    eprintln!("run-planner: {}", e);
    std::process::exit(1);
  }
}
