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
use std::io;

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::Message;
use crate::input::{Direction, Event};

const PRESS: &str = "press";
const RELEASE: &str = "release";
const TAP: &str = "tap";
const HAT: &str = "hat";
const RESET: &str = "reset";
const QUIT: &str = "quit";

/// A driver that reads joystick events typed on the keyboard, one command per
/// line.
pub struct Driver {}

fn button(word: &str) -> Option<u32> {
    word.parse::<u32>().ok()
}

/// What a line of input asks for.
#[derive(Debug, PartialEq)]
enum Input {
    Send(Message),
    Quit,
    Unrecognized,
}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    fn parse(line: &str) -> Input {
        let words: Vec<&str> = line.split_whitespace().collect();

        let message = match words.as_slice() {
            [PRESS, id] => button(id).map(|id| Message::Events(vec![Event::press(id)])),
            [RELEASE, id] => button(id).map(|id| Message::Events(vec![Event::release(id)])),
            [TAP, id] => {
                button(id).map(|id| Message::Events(vec![Event::press(id), Event::release(id)]))
            }
            [HAT, direction] => direction
                .parse::<Direction>()
                .ok()
                .map(|direction| Message::Events(vec![Event::hat(direction)])),
            [HAT, direction, hat] => match (direction.parse::<Direction>(), button(hat)) {
                (Ok(direction), Some(hat)) => Some(Message::Events(vec![Event::Hat {
                    joystick: 0,
                    hat,
                    direction,
                }])),
                _ => None,
            },
            [RESET] => Some(Message::Reset),
            [QUIT] => return Input::Quit,
            _ => None,
        };

        match message {
            Some(message) => Input::Send(message),
            None => Input::Unrecognized,
        }
    }

    /// Reads one command. Returns false once the input is exhausted or the user
    /// quits.
    fn monitor_io<R, W>(
        events_tx: &Sender<Message>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command ({} N, {} N, {} N, {} DIRECTION [HAT], {}, {}): ",
            PRESS, RELEASE, TAP, HAT, RESET, QUIT,
        )?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }

        match Driver::parse(&input.trim().to_lowercase()) {
            Input::Send(message) => events_tx
                .blocking_send(message)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?,
            Input::Quit => return Ok(false),
            Input::Unrecognized => warn!(input = input.trim(), "Unrecognized input"),
        }
        Ok(true)
    }
}

impl Default for Driver {
    fn default() -> Self {
        Driver::new()
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Message>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}

            info!("Keyboard driver stopped.");
            Ok(())
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, BufReader, BufWriter};

    use tokio::sync::mpsc;

    use crate::{
        controller::Message,
        input::{Direction, Event},
    };

    use super::Driver;

    fn get_message(input: &str) -> Result<(bool, Option<Message>), io::Error> {
        let (sender, mut receiver) = mpsc::channel::<Message>(1);

        let reader = BufReader::new(input.as_bytes());

        let writer_bytes: Vec<u8> = vec![0; 255];
        let writer = BufWriter::new(writer_bytes);
        let more = Driver::monitor_io(&sender, reader, writer)?;

        // Force the sender to close.
        drop(sender);
        Ok((more, receiver.blocking_recv()))
    }

    #[test]
    fn test_keyboard_events() -> Result<(), io::Error> {
        assert_eq!(
            (true, Some(Message::Events(vec![Event::press(3)]))),
            get_message("press 3\n")?
        );
        assert_eq!(
            (true, Some(Message::Events(vec![Event::release(3)]))),
            get_message("RELEASE 3")?
        );
        assert_eq!(
            (
                true,
                Some(Message::Events(vec![Event::press(7), Event::release(7)]))
            ),
            get_message("tap 7")?
        );
        assert_eq!(
            (true, Some(Message::Events(vec![Event::hat(Direction::UpLeft)]))),
            get_message("hat up_left")?
        );
        assert_eq!(
            (
                true,
                Some(Message::Events(vec![Event::Hat {
                    joystick: 0,
                    hat: 1,
                    direction: Direction::Down,
                }]))
            ),
            get_message("hat down 1")?
        );
        assert_eq!((true, Some(Message::Reset)), get_message("reset")?);
        Ok(())
    }

    #[test]
    fn test_unrecognized_and_quit() -> Result<(), io::Error> {
        assert_eq!((true, None), get_message("press")?);
        assert_eq!((true, None), get_message("press x")?);
        assert_eq!((true, None), get_message("hat sideways")?);
        assert_eq!((true, None), get_message("strum")?);
        assert_eq!((false, None), get_message("quit")?);
        assert_eq!((false, None), get_message("")?);
        Ok(())
    }
}
