// Basic connection example
//
// This example connects to a running Logic 2 (started with --automation), prints
// the application info and lists the attached devices.

use logic2_automation::{Manager, ManagerConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (optional)
    env_logger::init();

    println!("Logic2 Connection Example");
    println!("=========================\n");

    // LOGIC2_AUTOMATION_PORT and friends override the defaults
    let config = ManagerConfig::from_env()?;
    println!("1. Connecting to {}:{}...", config.address, config.port);
    let manager = Manager::connect(&config)?;

    let info = manager.get_app_info()?;
    println!("Connected to Logic2 {} (API {}, pid {})\n", info.app_version, info.api_version, info.app_pid);

    println!("2. Attached devices:");
    let devices = manager.get_devices(true)?;
    if devices.is_empty() {
        println!("No devices found. Please connect a device and try again.");
    }
    for (i, device) in devices.iter().enumerate() {
        let simulated = if device.is_simulation { " (simulation)" } else { "" };
        println!("  {}. {} {}{}", i + 1, device.device_type.as_str(), device.device_id, simulated);
    }

    manager.close();
    println!("\n3. Connection closed");

    Ok(())
}
