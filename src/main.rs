// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use chordpad::chord_controller::ChordController;
use chordpad::command::Value;
use chordpad::config::{init_controller, Mapping};
use chordpad::instrument::Instrument;
use chordpad::midi;
use clap::{crate_version, Parser, Subcommand};
use std::collections::BTreeSet;
use std::error::Error;
use std::path::PathBuf;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A chord player for game controllers."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available MIDI output devices.
    MidiDevices {},
    /// Prints a controller mapping and the actions it registers.
    Mapping {
        /// The path to the mapping. The built in mapping is printed if omitted.
        path: Option<PathBuf>,
    },
    /// Start will start the chord player, reading controller events from the keyboard.
    Start {
        /// The path to the player config.
        #[arg[short, long]]
        player_config: Option<PathBuf>,
        /// The path to the controller mapping. Overrides the player config.
        #[arg[short, long]]
        mapping: Option<PathBuf>,
        /// The MIDI device name to play through. Overrides the player config.
        #[arg[short = 'd', long]]
        midi_device: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::MidiDevices {} => {
            let devices = midi::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Mapping { path } => {
            let mapping = match path {
                Some(path) => Mapping::deserialize(&path)?,
                None => Mapping::defaults()?,
            };
            // Building the controller checks every action against the instrument.
            ChordController::new(&mapping, Instrument::default())?;

            print!("{}", mapping.to_yaml()?);

            let attributes: BTreeSet<String> = mapping
                .actions()
                .iter()
                .filter(|action| action.name() == "set")
                .filter_map(|action| action.args().first().and_then(Value::as_str))
                .map(str::to_string)
                .collect();
            println!("\nActions (count: {}):", mapping.actions().len());
            for action in mapping.actions() {
                println!("- {}", action);
            }
            println!("\nHeld attributes (count: {}):", attributes.len());
            for attribute in attributes {
                println!("- {}", attribute);
            }
        }
        Commands::Start {
            player_config,
            mapping,
            midi_device,
        } => {
            init_controller(player_config, mapping, midi_device)?
                .join()
                .await?;
        }
    }

    Ok(())
}
