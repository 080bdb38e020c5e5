// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Attached device listing.

use crate::{error::CliError, session::Session, utils};
use clap::Args as ClapArgs;
use serde::Serialize;
use std::time::Duration;
use uvcholder::{config::HolderConfig, driver::DeviceInfo};

#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Seconds to wait for attach events before listing
    #[arg(short, long, default_value = "1")]
    wait: u64,
}

#[derive(Debug, Serialize)]
struct DevicesOutput {
    devices: Vec<DeviceEntry>,
    total_devices: usize,
    simulated: bool,
}

#[derive(Debug, Serialize)]
struct DeviceEntry {
    id: i32,
    state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    usb: Option<UsbInfo>,
}

#[derive(Debug, Serialize)]
struct UsbInfo {
    vendor_id: String,
    product_id: String,
    bcd_usb: String,
    class: u8,
    name: String,
    manufacturer: String,
    product: String,
    serial: String,
}

impl From<DeviceInfo> for UsbInfo {
    fn from(info: DeviceInfo) -> Self {
        UsbInfo {
            vendor_id: format!("{:04x}", info.vendor_id),
            product_id: format!("{:04x}", info.product_id),
            bcd_usb: format!("{:x}.{:02x}", info.bcd_usb >> 8, info.bcd_usb & 0xff),
            class: info.device_class,
            name: info.name,
            manufacturer: info.manufacturer,
            product: info.product,
            serial: info.serial,
        }
    }
}

pub fn execute(args: Args, simulate: bool, json: bool) -> Result<(), CliError> {
    log::debug!("Executing devices command: {:?}", args);

    let session = Session::open(simulate, HolderConfig::default())?;
    let registry = session.registry();
    let ids = session.wait_for_devices(Duration::from_secs(args.wait));

    let devices: Vec<DeviceEntry> = ids
        .into_iter()
        .map(|id| DeviceEntry {
            id,
            state: registry.device_state(id).to_string(),
            usb: match registry.device_info(id) {
                Ok(info) => Some(info.into()),
                Err(err) => {
                    log::debug!("device {} info unavailable: {}", id, err);
                    None
                }
            },
        })
        .collect();

    let output = DevicesOutput {
        total_devices: devices.len(),
        simulated: session.is_simulated(),
        devices,
    };

    if json {
        return utils::print_json(&output);
    }

    if output.devices.is_empty() {
        println!("No UVC devices attached");
        return Ok(());
    }

    println!("UVC devices ({}):", output.total_devices);
    for device in &output.devices {
        match &device.usb {
            Some(usb) => println!(
                "  [{}] {}:{} {} {} ({}) - {}",
                device.id,
                usb.vendor_id,
                usb.product_id,
                usb.manufacturer,
                usb.product,
                usb.name,
                device.state
            ),
            None => println!("  [{}] {}", device.id, device.state),
        }
    }
    Ok(())
}
