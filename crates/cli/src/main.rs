//! `turnero` -- live slot availability watcher.
//!
//! Fetches a day's bookable slots, connects to the appointment hub,
//! joins the day, and prints the slot list every time a push event
//! changes it. Exists to exercise the whole client stack end to end;
//! booking itself is driven by front-ends embedding `turnero-booking`.
//!
//! # Environment variables
//!
//! | Variable              | Required | Default | Description                                  |
//! |-----------------------|----------|---------|----------------------------------------------|
//! | `TURNERO_API_URL`     | yes      | --      | REST base URL, e.g. `https://host/api`       |
//! | `TURNERO_HUB_URL`     | yes      | --      | Hub WebSocket URL, e.g. `wss://host/hubs/appointments` |
//! | `TURNERO_TOKEN`       | yes      | --      | Bearer credential for both surfaces          |
//! | `APPOINTMENT_TYPE_ID` | no       | `4`     | Appointment type to list slots for           |
//! | `DATE`                | no       | today   | Calendar day to watch, `YYYY-MM-DD`          |

use std::sync::Arc;

use chrono::NaiveDate;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use turnero_booking::BookingFlow;
use turnero_core::display::twelve_hour;
use turnero_core::model::SlotRecord;
use turnero_core::ports::SlotChannel;
use turnero_core::types::DbId;
use turnero_hub::{HubClient, HubConnection};
use turnero_rest::{AvailabilityApi, RelatedPersonApi};

/// Appointment type used when none is configured.
const DEFAULT_APPOINTMENT_TYPE_ID: DbId = 4;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "turnero=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let api_url = require_env("TURNERO_API_URL");
    let hub_url = require_env("TURNERO_HUB_URL");
    let token = require_env("TURNERO_TOKEN");

    let appointment_type_id: DbId = std::env::var("APPOINTMENT_TYPE_ID")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_APPOINTMENT_TYPE_ID);

    let date: NaiveDate = match std::env::var("DATE") {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::error!(%raw, "DATE must be formatted YYYY-MM-DD");
            std::process::exit(1);
        }),
        Err(_) => chrono::Local::now().date_naive(),
    };

    tracing::info!(appointment_type_id, %date, "Watching availability");

    let hub = Arc::new(HubConnection::new(HubClient::new(hub_url)));
    let flow = BookingFlow::new(
        Arc::clone(&hub) as Arc<dyn SlotChannel>,
        Arc::new(AvailabilityApi::new(api_url.clone())),
        Arc::new(RelatedPersonApi::new(api_url, token.clone())),
    );

    let mut slots = flow.slots();
    let mut notices = flow.notices();

    flow.activate(&token, appointment_type_id, date).await?;
    render(&slots.borrow_and_update());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = slots.changed() => {
                if changed.is_err() {
                    break;
                }
                render(&slots.borrow_and_update());
            }
            notice = notices.recv() => {
                if let Ok(notice) = notice {
                    println!("! {notice}");
                }
            }
        }
    }

    tracing::info!("Shutting down");
    flow.shutdown().await;
    hub.disconnect().await;
    Ok(())
}

/// Read a required environment variable or exit with an error.
fn require_env(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| {
        tracing::error!("{name} environment variable is required");
        std::process::exit(1);
    })
}

/// Print the current slot list, one line per block.
fn render(slots: &[SlotRecord]) {
    println!("--- {} slots ---", slots.len());
    for slot in slots {
        let state = if slot.booked_appointment_id.is_some() {
            "booked"
        } else if slot.locked_by_user_id.is_some() {
            "held"
        } else if slot.is_available {
            "available"
        } else {
            "unavailable"
        };
        println!("{:>8}  {}", twelve_hour(&slot.time_block), state);
    }
}
