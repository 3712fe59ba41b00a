//! Administrative tool for the gatekeeper store.
//!
//! Manages the state the verification core reads but never administers
//! itself: the current event record and the blacklist/revocation sets.
//!
//! Usage:
//!   gatekeeper-admin set-event --event-id E1 --name "Launch" \
//!       --max-capacity 100 --max-entries 2 --starts-at <ts> --ends-at <ts>
//!   gatekeeper-admin show-event
//!   gatekeeper-admin delete-event
//!   gatekeeper-admin blacklist <ticket-id>
//!   gatekeeper-admin unblacklist <ticket-id>
//!   gatekeeper-admin revoke <ticket-id>

use clap::{Parser, Subcommand};
use gatekeeper::{Event, EventRegistry, RedisStore, TicketLedger};
use std::sync::Arc;

/// Administrative tool for gatekeeper's shared store.
#[derive(Parser, Debug)]
#[command(name = "gatekeeper-admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Cache store connection URL.
    #[arg(long, env = "GATE_STORE_URL", default_value = "redis://127.0.0.1:6379")]
    store_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or replace the current event record.
    SetEvent {
        /// Unique event identifier.
        #[arg(long)]
        event_id: String,
        /// Human-readable event name.
        #[arg(long)]
        name: String,
        /// Maximum number of attendees admitted at once.
        #[arg(long)]
        max_capacity: u32,
        /// Maximum admissions per ticket.
        #[arg(long)]
        max_entries: u32,
        /// Event validity window start (seconds since epoch).
        #[arg(long)]
        starts_at: i64,
        /// Event validity window end (seconds since epoch).
        #[arg(long)]
        ends_at: i64,
    },
    /// Print the current event record.
    ShowEvent,
    /// Delete the current event record.
    DeleteEvent,
    /// Add a ticket to the blacklist set.
    Blacklist {
        /// Ticket identifier.
        ticket_id: String,
    },
    /// Remove a ticket from the blacklist set.
    Unblacklist {
        /// Ticket identifier.
        ticket_id: String,
    },
    /// Add a ticket to the revocation set.
    Revoke {
        /// Ticket identifier.
        ticket_id: String,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let store = Arc::new(RedisStore::connect(&cli.store_url).await?);
    let registry = EventRegistry::new(store.clone());
    let ledger = TicketLedger::new(store);

    match cli.command {
        Command::SetEvent {
            event_id,
            name,
            max_capacity,
            max_entries,
            starts_at,
            ends_at,
        } => {
            let event = Event {
                event_id,
                name,
                max_capacity,
                max_entries,
                starts_at,
                ends_at,
            };
            registry.set(&event).await?;
            println!("Current event set: {} ({})", event.name, event.event_id);
        }
        Command::ShowEvent => match registry.current().await {
            Ok(event) => {
                println!("Event:        {} ({})", event.name, event.event_id);
                println!("Capacity:     {}", event.max_capacity);
                println!("Max entries:  {}", event.max_entries);
                println!("Valid:        {} .. {}", event.starts_at, event.ends_at);
            }
            Err(gatekeeper::Error::NoActiveEvent) => println!("No active event configured."),
            Err(e) => return Err(e.into()),
        },
        Command::DeleteEvent => {
            registry.delete().await?;
            println!("Current event deleted.");
        }
        Command::Blacklist { ticket_id } => {
            ledger.blacklist(&ticket_id).await?;
            println!("Ticket {ticket_id} blacklisted.");
        }
        Command::Unblacklist { ticket_id } => {
            ledger.unblacklist(&ticket_id).await?;
            println!("Ticket {ticket_id} removed from blacklist.");
        }
        Command::Revoke { ticket_id } => {
            ledger.revoke(&ticket_id).await?;
            println!("Ticket {ticket_id} revoked.");
        }
    }

    Ok(())
}
