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
use std::collections::BTreeSet;
use std::error::Error;
use std::io;
use std::sync::Arc;
use midly::num::{u4, u7};
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{error, info, span, Level};

use crate::chord_controller::ChordController;
use crate::input::Event;
use crate::midi::{self, NoteChanges};

pub mod keyboard;

/// Messages from a driver to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A batch of input events, handled in order.
    Events(Vec<Event>),

    /// Releases every control and silences the instrument.
    Reset,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Message>) -> JoinHandle<Result<(), io::Error>>;
}

/// Where and how notes are sent.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    channel: u4,
    velocity: u7,
}

impl Output {
    pub fn new(channel: u4, velocity: u7) -> Output {
        Output { channel, velocity }
    }
}

/// Plays a chord controller through a MIDI device.
pub struct Controller {
    handle: JoinHandle<()>,
}

impl Controller {
    /// Creates a new controller with the given driver.
    pub fn new(
        chord_controller: ChordController,
        driver: Arc<dyn Driver>,
        midi_device: Arc<dyn midi::Device>,
        output: Output,
    ) -> Result<Controller, Box<dyn Error>> {
        Ok(Controller {
            handle: tokio::spawn(async move {
                Controller::trigger_events(chord_controller, driver, midi_device, output).await
            }),
        })
    }

    /// Join will block until the controller finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    /// Feeds messages from the driver to the chord controller until the driver
    /// closes its channel.
    async fn trigger_events(
        mut chord_controller: ChordController,
        driver: Arc<dyn Driver>,
        midi_device: Arc<dyn midi::Device>,
        output: Output,
    ) {
        let (events_tx, mut events_rx) = mpsc::channel(1);
        let join_handle = driver.monitor_events(events_tx);

        info!(device = %midi_device, "Controller started.");

        loop {
            if let Some(message) = events_rx.recv().await {
                Controller::process(&mut chord_controller, midi_device.as_ref(), output, message);
            } else {
                info!("Controller closing.");
                Controller::silence(&chord_controller, midi_device.as_ref(), output);
                if let Err(e) = join_handle.await {
                    error!("Error waiting for event monitor to stop: {}", e);
                }
                return;
            }
        }
    }

    /// Applies a message and sends whatever notes changed.
    fn process(
        chord_controller: &mut ChordController,
        midi_device: &dyn midi::Device,
        output: Output,
        message: Message,
    ) {
        let span = span!(Level::INFO, "controller");
        let _enter = span.enter();

        info!(message = format!("{:?}", message), "Received message.");

        let before = chord_controller.playing_notes().clone();
        if let Err(e) = match message {
            Message::Events(events) => chord_controller.update(&events),
            Message::Reset => chord_controller.reset(),
        } {
            error!("Error updating chord controller: {}", e);
        }

        let changes = NoteChanges::between(&before, chord_controller.playing_notes());
        if changes.is_empty() {
            return;
        }
        info!(off = ?changes.off(), on = ?changes.on(), "Notes changed.");
        if let Err(e) = midi_device.emit(&changes.to_midi_events(output.channel, output.velocity)) {
            error!("Error emitting MIDI events: {}", e);
        }
    }

    /// Stops every sounding note.
    fn silence(chord_controller: &ChordController, midi_device: &dyn midi::Device, output: Output) {
        let changes = NoteChanges::between(chord_controller.playing_notes(), &BTreeSet::new());
        let mut events = changes.to_midi_events(output.channel, output.velocity);
        events.push(midi::all_notes_off(output.channel));
        if let Err(e) = midi_device.emit(&events) {
            error!("Error silencing MIDI device: {}", e);
        }
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, io, sync::Arc};

    use midly::num::{u4, u7};
    use tokio::{sync::mpsc::Sender, task::JoinHandle};

    use crate::{
        chord_controller::ChordController,
        config::Mapping,
        input::{Direction, Event},
        instrument::Instrument,
        midi,
    };

    use super::{Driver, Message, Output};

    /// Sends a fixed list of messages, then closes.
    struct TestDriver {
        messages: Vec<Message>,
    }

    impl Driver for TestDriver {
        fn monitor_events(&self, events_tx: Sender<Message>) -> JoinHandle<Result<(), io::Error>> {
            let messages = self.messages.clone();
            tokio::task::spawn_blocking(move || {
                for message in messages {
                    events_tx
                        .blocking_send(message)
                        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
                }
                Ok(())
            })
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_controller() -> Result<(), Box<dyn Error>> {
        let driver = Arc::new(TestDriver {
            messages: vec![
                // Inconsistent, logged and skipped.
                Message::Events(vec![Event::release(5)]),
                Message::Events(vec![Event::hat(Direction::Up)]),
                Message::Events(vec![Event::press(0)]),
                Message::Reset,
                Message::Events(vec![Event::hat(Direction::Down)]),
            ],
        });
        let device = Arc::new(midi::test::Device::get("mock-device"));
        let chord_controller = ChordController::new(&Mapping::defaults()?, Instrument::new(5))?;
        let mut controller = super::Controller::new(
            chord_controller,
            driver,
            device.clone(),
            Output::new(u4::from(0), u7::from(100)),
        )?;

        assert!(
            controller.join().await.is_ok(),
            "Error waiting for controller",
        );

        assert_eq!(
            vec![
                // Up plays C major.
                vec![0x90, 60, 100],
                vec![0x90, 64, 100],
                vec![0x90, 67, 100],
                // Button 0 swaps it to minor.
                vec![0x80, 64, 0],
                vec![0x90, 63, 100],
                // Reset silences everything.
                vec![0x80, 60, 0],
                vec![0x80, 63, 0],
                vec![0x80, 67, 0],
                // Down plays C major again.
                vec![0x90, 60, 100],
                vec![0x90, 64, 100],
                vec![0x90, 67, 100],
                // Closing.
                vec![0x80, 60, 0],
                vec![0x80, 64, 0],
                vec![0x80, 67, 0],
                vec![0xB0, 123, 0],
            ],
            device.get_emitted_events()
        );

        Ok(())
    }
}
