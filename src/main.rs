use std::env;
use std::process;

use serial_channel::device::serial::SerialDevice;
use serial_channel::{Channel, ChannelConfig};

const USAGE: &str = "usage: serial-send <channel> [baud] [text]";

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(channel_id) = args.first().and_then(|a| a.parse::<u32>().ok()) else {
        eprintln!("{USAGE}");
        process::exit(2);
    };
    let baud_rate = match args.get(1).map(|a| a.parse::<u32>()) {
        Some(Ok(baud)) => baud,
        Some(Err(_)) => {
            eprintln!("{USAGE}");
            process::exit(2);
        }
        None => serial_channel::config::DEFAULT_BAUD_RATE,
    };
    let text = args.get(2).map(String::as_str).unwrap_or("abc");

    let config = ChannelConfig::new(channel_id).with_baud_rate(baud_rate);
    let mut channel = Channel::new(SerialDevice::new(), config);

    match channel.open(config) {
        Ok(status) if !status.is_empty() => println!("Opened with adjustments: {status:?}"),
        Ok(_) => println!("Opened channel {channel_id} at {baud_rate} baud."),
        Err(e) => {
            eprintln!("Failed to open: {e}");
            eprintln!();
            eprintln!("Troubleshooting:");
            eprintln!("  1. Check that the port exists and is not held by another program");
            eprintln!("  2. Check that your user may open serial devices");
            process::exit(1);
        }
    }

    if let Err(e) = channel.send(text.as_bytes()) {
        eprintln!("Send failed: {e}");
        drop(channel);
        process::exit(1);
    }
    println!("Sent {} byte(s).", text.len());

    if let Err(e) = channel.close() {
        eprintln!("Close reported: {e}");
    }
}
