//! Random EV charging-session events.
//!
//! Each event describes one finished charging session at a random station:
//! it started 5 to 90 minutes ago and ends now, with a plausible charge rate,
//! battery capacity and starting battery level.

use core::time::Duration;
use eventgen_core::{Message, Value};
use rand::Rng;
use std::time::SystemTime;

const AVG_CHARGE_RATE_KW: [f32; 5] = [20.0, 72.0, 100.0, 120.0, 250.0];
const BATTERY_CAPACITY_KWH: [f32; 10] = [
    40.0, 50.0, 58.0, 62.0, 75.0, 77.0, 82.0, 100.0, 129.0, 131.0,
];

/// Produces charging-session events for one location.
#[derive(Debug, Clone)]
pub struct ChargingEventFactory {
    location: String,
}

impl ChargingEventFactory {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }

    pub fn event(&self) -> Message {
        let mut rng = rand::rng();
        let now = SystemTime::now();
        let started_ago = Duration::from_secs(60 * rng.random_range(5..=90));

        let mut event = Message::new();
        event.insert("session_id".into(), session_id(&mut rng).into());
        event.insert("station_id".into(), rng.random_range(0..=100_i32).into());
        event.insert("location".into(), self.location.as_str().into());
        event.insert(
            "session_start_time".into(),
            Value::timestamp(now - started_ago),
        );
        event.insert("session_end_time".into(), Value::timestamp(now));
        event.insert(
            "avg_charge_rate_kw".into(),
            avg_charge_rate_kw(&mut rng).into(),
        );
        event.insert(
            "battery_capacity_kwh".into(),
            BATTERY_CAPACITY_KWH[rng.random_range(0..BATTERY_CAPACITY_KWH.len())].into(),
        );
        event.insert(
            "battery_level_start".into(),
            (rng.random_range(5..=80_u8) as f32 / 100.0).into(),
        );
        event
    }
}

/// One of the common charger ratings, jittered by up to 1 kW either way.
fn avg_charge_rate_kw(rng: &mut impl Rng) -> f32 {
    let rating = AVG_CHARGE_RATE_KW[rng.random_range(0..AVG_CHARGE_RATE_KW.len())];
    rating + rng.random::<f32>() * 2.0 - 1.0
}

/// A random (version 4) UUID in its hyphenated form.
fn session_id(rng: &mut impl Rng) -> String {
    let mut bytes: [u8; 16] = rng.random();
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..]
    )
}
