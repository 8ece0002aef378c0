//! Terminal rendering of session events.

use std::io::{self, Write};
use tether_core::{DeviceClass, Progress, SessionEvent};

pub struct Reporter<W: Write> {
    progress: Progress,
    out: W,
    console_active: bool,
}

impl<W: Write> Reporter<W> {
    /// `stages` is the number of device classes the mode walks through.
    pub fn new(stages: usize, out: W) -> Self {
        Self {
            progress: Progress::new(stages),
            out,
            console_active: false,
        }
    }

    pub fn console_active(&self) -> bool {
        self.console_active
    }

    pub fn handle(&mut self, event: &SessionEvent) -> io::Result<()> {
        match event {
            SessionEvent::Connected(class) => {
                // The boot ROM is the first stage, so a fresh start.
                if *class == DeviceClass::Rom {
                    self.progress.restart();
                }
                writeln!(self.out, "Connected: {}", class)?;
            }
            SessionEvent::Disconnected(class) => {
                self.console_active = false;
                writeln!(self.out, "Disconnected: {}", class)?;
            }
            SessionEvent::Milestone { description, .. } => {
                let report = self.progress.advance(description.as_str());
                writeln!(self.out, "[{:6.2}%] {}", report.complete, report.description)?;
            }
            SessionEvent::Error { class, message } => {
                tracing::error!(class = ?class, "{}", message);
                match class {
                    Some(class) => writeln!(self.out, "Error ({}): {}", class, message)?,
                    None => writeln!(self.out, "Error: {}", message)?,
                }
            }
            SessionEvent::ConsoleStarted(class) => {
                self.console_active = true;
                writeln!(self.out, "Netconsole started on {}; input is sent to the device", class)?;
            }
            SessionEvent::ConsoleOutput(bytes) => {
                self.out.write_all(bytes)?;
            }
        }
        self.out.flush()
    }
}
