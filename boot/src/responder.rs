//! Drives a [`DeviceSession`] over a [`DeviceLink`].

use tether_core::{DeviceLink, EventSender, SessionCommand, SessionEvent};
use tokio::sync::mpsc;

use crate::classify::{Request, classify};
use crate::error::SessionError;
use crate::session::{Action, DeviceSession, SessionState, Started};
use crate::storage::BootStorage;

/// Serve one attached bootloader until its transfer ends.
///
/// Malformed and unrecognised frames are reported and skipped. A missing file
/// or a client-side TFTP error ends the session as `Failed`; link failures
/// are returned as errors. Polling is stopped on every exit.
pub async fn run_session(
    mut session: DeviceSession,
    mut link: DeviceLink,
    storage: &dyn BootStorage,
    events: &EventSender,
    mut commands: mpsc::Receiver<SessionCommand>,
) -> Result<SessionState, SessionError> {
    let class = session.class();
    session.start();
    let _ = events.send(SessionEvent::milestone(class, "interface claimed"));

    let result = serve(&mut session, &mut link, storage, events, &mut commands).await;
    link.stop_polling();

    if let Err(e) = &result {
        let _ = events.send(SessionEvent::error(class, e.to_string()));
    }
    result
}

async fn serve(
    session: &mut DeviceSession,
    link: &mut DeviceLink,
    storage: &dyn BootStorage,
    events: &EventSender,
    commands: &mut mpsc::Receiver<SessionCommand>,
) -> Result<SessionState, SessionError> {
    let class = session.class();
    let mut commands_open = true;

    loop {
        let frame = tokio::select! {
            frame = link.recv() => frame?,
            command = commands.recv(), if commands_open => {
                match command {
                    Some(SessionCommand::Console(text)) => {
                        send_console(session, link, events, &text).await?
                    }
                    None => commands_open = false,
                }
                continue;
            }
        };

        let request = match classify(&frame, session.framing()) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(%class, error = %e, len = frame.len(), "Dropping malformed frame");
                let _ = events.send(SessionEvent::error(class, format!("malformed frame: {}", e)));
                continue;
            }
        };

        tracing::trace!(%class, kind = request.kind(), "Request");
        let is_bootp = matches!(request, Request::Bootp { .. });
        match &request {
            Request::Bootp { .. } => {
                let _ = events.send(SessionEvent::milestone(class, "BOOTP request received"));
            }
            Request::TftpRead { .. } => {
                let _ = events.send(SessionEvent::milestone(class, "TFTP request received"));
            }
            _ => {}
        }

        match session.handle(request) {
            Ok(Action::Reply(reply)) => {
                link.send(reply).await?;
                if is_bootp {
                    let _ = events.send(SessionEvent::milestone(class, "BOOTP reply done"));
                }
            }
            Ok(Action::Fetch(filename)) => {
                let contents = storage.read(&filename).await;
                match session.begin_transfer(contents)? {
                    Started::Sending(first) => {
                        let _ = events.send(SessionEvent::milestone(
                            class,
                            format!("{} transfer starts", filename),
                        ));
                        link.send(first).await?;
                    }
                    Started::Refused { frame, error } => {
                        tracing::warn!(
                            %class,
                            file = %filename,
                            error = %error,
                            "TFTP read refused"
                        );
                        link.send(frame).await?;
                        let _ = events.send(SessionEvent::error(class, error.to_string()));
                        return Ok(SessionState::Failed);
                    }
                }
            }
            Ok(Action::Console { bytes, started }) => {
                if started {
                    let _ = events.send(SessionEvent::ConsoleStarted(class));
                }
                let _ = events.send(SessionEvent::ConsoleOutput(bytes));
            }
            Ok(Action::Complete) => {
                let _ = events.send(SessionEvent::milestone(
                    class,
                    format!("{} TFTP transfer complete", class),
                ));
                return Ok(SessionState::Done);
            }
            Ok(Action::Ignore) => {}
            Ok(Action::Unidentified(what)) => {
                tracing::debug!(%class, what = %what, "Unidentified frame");
                let _ = events.send(SessionEvent::error(
                    class,
                    format!("unidentified frame ({})", what),
                ));
            }
            Err(SessionError::Aborted { code, message }) => {
                let _ = events.send(SessionEvent::error(
                    class,
                    format!("device aborted transfer: error {} ({})", code, message),
                ));
                return Ok(SessionState::Failed);
            }
            Err(e) => return Err(e),
        }
    }
}

async fn send_console(
    session: &DeviceSession,
    link: &DeviceLink,
    events: &EventSender,
    text: &str,
) -> Result<(), SessionError> {
    match session.console_frames(text) {
        Ok(frames) => {
            for frame in frames {
                link.send(frame).await?;
            }
            Ok(())
        }
        Err(e @ SessionError::PeerUnresolved) => {
            let _ = events.send(SessionEvent::error(session.class(), e.to_string()));
            Ok(())
        }
        Err(e) => Err(e),
    }
}
