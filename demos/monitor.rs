use intelliclima::IntelliclimaClient;
use std::env;
use std::time::Duration;

#[tokio::main]
async fn main() -> intelliclima::Result<()> {
    tracing_subscriber::fmt::init();

    let username = env::var("INTELLICLIMA_USERNAME").expect("INTELLICLIMA_USERNAME not set");
    let password = env::var("INTELLICLIMA_PASSWORD").expect("INTELLICLIMA_PASSWORD not set");
    let interval = env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(60);

    let mut client = IntelliclimaClient::builder(username, password).build()?;
    client.validate_credentials().await?;
    println!(
        "Logged in. House {:?}, polling every {interval}s...",
        client.session().house_id()
    );

    loop {
        match client.get_states().await {
            Ok(states) => {
                for (id, device) in &states {
                    let name = device.name.as_deref().unwrap_or("?");
                    if device.is_ventilation() {
                        println!(
                            "[{id}] {name} | level: {:?} | preset: {:?} | {:?}\u{00b0}C {:?}%",
                            device.fan_level,
                            device.ventilation_preset,
                            device.current_temperature,
                            device.humidity,
                        );
                    } else {
                        println!(
                            "[{id}] {name} | {:?}\u{00b0}C -> {:?}\u{00b0}C | mode: {}",
                            device.current_temperature, device.target_temperature, device.hvac_mode,
                        );
                    }
                }
            }
            Err(e) => eprintln!("Poll error ({:?}): {e}", e.kind()),
        }
        tokio::time::sleep(Duration::from_secs(interval)).await;
    }
}
