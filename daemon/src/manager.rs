//! Turns attach/detach events into running sessions.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tether_boot::{BootConfig, BootStorage, DeviceSession, run_session};
use tether_bridge::{BridgeSettings, Translator, establish, host_info, open_lan, run_bridge};
use tether_core::{DeviceClass, DeviceLink, EventSender, SessionCommand, SessionEvent};
use tether_usb::{BusKey, UsbDevice, open_link};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const COMMAND_DEPTH: usize = 16;

/// What attached devices are served with.
#[derive(Clone)]
pub enum Mode {
    Boot {
        config: Arc<BootConfig>,
        storage: Arc<dyn BootStorage>,
    },
    Bridge {
        settings: BridgeSettings,
    },
}

impl Mode {
    pub fn serves(&self, class: DeviceClass) -> bool {
        match self {
            Mode::Boot { .. } => class.is_bootloader(),
            Mode::Bridge { .. } => class == DeviceClass::LinuxComposite,
        }
    }

    /// Device classes a full run walks through, for progress scaling.
    pub fn stages(&self) -> usize {
        match self {
            Mode::Boot { .. } => 2,
            Mode::Bridge { .. } => 1,
        }
    }
}

struct RunningSession {
    class: DeviceClass,
    task: JoinHandle<()>,
    commands: mpsc::Sender<SessionCommand>,
}

pub struct SessionManager {
    mode: Mode,
    events: EventSender,
    sessions: HashMap<BusKey, RunningSession>,
}

impl SessionManager {
    pub fn new(mode: Mode, events: EventSender) -> Self {
        Self {
            mode,
            events,
            sessions: HashMap::new(),
        }
    }

    pub fn active(&self) -> usize {
        self.sessions.values().filter(|s| !s.task.is_finished()).count()
    }

    /// Start serving a newly attached USB device.
    pub fn attach(&mut self, device: UsbDevice) {
        let class = device.class;
        let key = device.key();
        self.spawn(key, class, async move {
            tokio::time::sleep(class.settle_delay()).await;
            match tokio::task::spawn_blocking(move || open_link(&device)).await {
                Ok(Ok(link)) => Ok(link),
                Ok(Err(e)) => Err(format!("can't claim interface: {}", e)),
                Err(e) => Err(format!("can't open device: {}", e)),
            }
        });
    }

    /// Start serving a device whose link is already open.
    pub fn attach_link(&mut self, key: BusKey, link: DeviceLink) {
        let class = link.class;
        self.spawn(key, class, async move { Ok(link) });
    }

    fn spawn<F>(&mut self, key: BusKey, class: DeviceClass, open: F)
    where
        F: Future<Output = Result<DeviceLink, String>> + Send + 'static,
    {
        let _ = self.events.send(SessionEvent::Connected(class));
        if !self.mode.serves(class) {
            tracing::info!(%class, "Device not served in this mode");
            return;
        }
        if let Some(previous) = self.sessions.remove(&key) {
            previous.task.abort();
        }

        let (commands_tx, commands) = mpsc::channel(COMMAND_DEPTH);
        let mode = self.mode.clone();
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            let _ = events.send(SessionEvent::milestone(class, format!("{} ->", class)));
            let link = match open.await {
                Ok(link) => link,
                Err(message) => {
                    tracing::warn!(%class, error = %message, "Device open failed");
                    let _ = events.send(SessionEvent::error(class, message));
                    return;
                }
            };
            serve(mode, link, &events, commands).await;
        });

        self.sessions.insert(
            key,
            RunningSession {
                class,
                task,
                commands: commands_tx,
            },
        );
    }

    /// Tear down the session for a detached device.
    pub async fn detach(&mut self, key: BusKey, class: DeviceClass) {
        if let Some(session) = self.sessions.remove(&key) {
            session.task.abort();
            let _ = session.task.await;
            tracing::debug!(class = %session.class, "Session ended");
        }
        let _ = self.events.send(SessionEvent::Disconnected(class));
    }

    /// Send console text to every live session.
    pub async fn console(&self, text: &str) {
        for session in self.sessions.values() {
            if session.task.is_finished() {
                continue;
            }
            let command = SessionCommand::Console(text.to_string());
            if session.commands.send(command).await.is_err() {
                tracing::debug!(class = %session.class, "Session no longer takes commands");
            }
        }
    }

    pub async fn shutdown(&mut self) {
        for (_, session) in self.sessions.drain() {
            session.task.abort();
            let _ = session.task.await;
        }
    }
}

async fn serve(
    mode: Mode,
    link: DeviceLink,
    events: &EventSender,
    commands: mpsc::Receiver<SessionCommand>,
) {
    let class = link.class;
    match mode {
        Mode::Boot { config, storage } => {
            let session = match DeviceSession::new(class, config) {
                Ok(session) => session,
                Err(e) => {
                    let _ = events.send(SessionEvent::error(class, e.to_string()));
                    return;
                }
            };
            match run_session(session, link, storage.as_ref(), events, commands).await {
                Ok(state) => tracing::info!(%class, state = ?state, "Boot session finished"),
                Err(e) => tracing::warn!(%class, error = %e, "Boot session ended"),
            }
        }
        Mode::Bridge { settings } => {
            if let Err(e) = bridge(settings, link, events).await {
                tracing::warn!(%class, error = %e, "Bridge ended");
                let _ = events.send(SessionEvent::error(class, e.to_string()));
            }
        }
    }
}

async fn bridge(
    settings: BridgeSettings,
    link: DeviceLink,
    events: &EventSender,
) -> Result<(), tether_bridge::BridgeError> {
    let host = host_info(settings.interface.as_deref())?;
    let mut lan = open_lan(&host.interface)?;
    let (config, neighbors) = establish(&mut lan, host, &settings).await?;
    let translator = Translator::new(config, neighbors, link.class.framing());
    run_bridge(translator, link, lan, events).await
}
