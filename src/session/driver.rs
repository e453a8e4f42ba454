use log::{debug, error, info};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::api::central::CentralTransport;
use crate::api::central_event::CentralEvent;
use crate::api::characteristic::CharacteristicWriteType;
use crate::api::handle::{AttributeHandle, CharacteristicHandle, DescriptorHandle};
use crate::session::connection::{ConnectionSession, SessionStatus};
use crate::session::dispatch::{PendingWrite, WriteRequest};
use crate::Result;

#[derive(Debug)]
pub enum SessionCommand {
    Connect {
        responder: oneshot::Sender<Result<bool>>,
    },
    Disconnect {
        responder: oneshot::Sender<Result<bool>>,
    },
    Read {
        attribute: AttributeHandle,
        responder: oneshot::Sender<Result<()>>,
    },
    RequestWrite {
        characteristic: CharacteristicHandle,
        responder: oneshot::Sender<Result<PendingWrite>>,
    },
    SendWrite {
        request: WriteRequest,
        responder: oneshot::Sender<Result<CharacteristicWriteType>>,
    },
    CancelWrite {
        responder: oneshot::Sender<Result<bool>>,
    },
    ToggleNotify {
        characteristic: CharacteristicHandle,
        responder: oneshot::Sender<Result<bool>>,
    },
    WriteDescriptor {
        descriptor: DescriptorHandle,
        data: Vec<u8>,
        responder: oneshot::Sender<Result<()>>,
    },
    Shutdown,
}

/// Cloneable front end of a session running on its own task.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    command_tx: mpsc::Sender<SessionCommand>,
    status_rx: watch::Receiver<SessionStatus>,
}

impl SessionHandle {
    async fn request<R>(
        &self,
        command: impl FnOnce(oneshot::Sender<Result<R>>) -> SessionCommand,
    ) -> Result<R> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.command_tx.send(command(resp_tx)).await?;
        resp_rx.await?
    }

    pub async fn connect(&self) -> Result<bool> {
        self.request(|responder| SessionCommand::Connect { responder })
            .await
    }

    pub async fn disconnect(&self) -> Result<bool> {
        self.request(|responder| SessionCommand::Disconnect { responder })
            .await
    }

    pub async fn read(&self, attribute: impl Into<AttributeHandle>) -> Result<()> {
        let attribute = attribute.into();
        self.request(|responder| SessionCommand::Read {
            attribute,
            responder,
        })
        .await
    }

    pub async fn request_write(&self, characteristic: CharacteristicHandle) -> Result<PendingWrite> {
        self.request(|responder| SessionCommand::RequestWrite {
            characteristic,
            responder,
        })
        .await
    }

    pub async fn send_write(&self, request: WriteRequest) -> Result<CharacteristicWriteType> {
        self.request(|responder| SessionCommand::SendWrite { request, responder })
            .await
    }

    pub async fn cancel_write(&self) -> Result<bool> {
        self.request(|responder| SessionCommand::CancelWrite { responder })
            .await
    }

    pub async fn toggle_notify(&self, characteristic: CharacteristicHandle) -> Result<bool> {
        self.request(|responder| SessionCommand::ToggleNotify {
            characteristic,
            responder,
        })
        .await
    }

    pub async fn write_descriptor(&self, descriptor: DescriptorHandle, data: Vec<u8>) -> Result<()> {
        self.request(|responder| SessionCommand::WriteDescriptor {
            descriptor,
            data,
            responder,
        })
        .await
    }

    pub fn status(&self) -> SessionStatus {
        self.status_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status_rx.clone()
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.command_tx.send(SessionCommand::Shutdown).await?;
        Ok(())
    }
}

/// Runs `session` on a tokio task, feeding it transport events from `events`
/// and commands from the returned handle.
///
/// The task ends with `Ok` on [`SessionHandle::shutdown`] or once both
/// channels are closed, and with the error when an event breaks a session
/// invariant.
pub fn spawn_session<T>(
    session: ConnectionSession<T>,
    events: mpsc::Receiver<CentralEvent>,
) -> (SessionHandle, JoinHandle<Result<()>>)
where
    T: CentralTransport + 'static,
{
    let (command_tx, command_rx) = mpsc::channel(session.config().command_buffer.max(1));
    let handle = SessionHandle {
        command_tx,
        status_rx: session.subscribe(),
    };
    let task = tokio::spawn(run_session(session, events, command_rx));
    (handle, task)
}

async fn run_session<T: CentralTransport>(
    mut session: ConnectionSession<T>,
    mut events: mpsc::Receiver<CentralEvent>,
    mut commands: mpsc::Receiver<SessionCommand>,
) -> Result<()> {
    info!("{}: session started", session.peripheral());
    let mut events_open = true;
    let mut commands_open = true;
    while events_open || commands_open {
        tokio::select! {
            event = events.recv(), if events_open => match event {
                Some(event) => {
                    if let Err(err) = session.handle_event(event).await {
                        if err.is_invariant_violation() {
                            error!("{}: stopping session: {err}", session.peripheral());
                            return Err(err);
                        }
                    }
                }
                None => {
                    debug!("{}: event channel closed", session.peripheral());
                    events_open = false;
                }
            },
            command = commands.recv(), if commands_open => match command {
                Some(SessionCommand::Shutdown) => break,
                Some(command) => handle_command(&mut session, command).await,
                None => {
                    debug!("{}: command channel closed", session.peripheral());
                    commands_open = false;
                }
            },
        }
    }
    info!("{}: session stopped", session.peripheral());
    Ok(())
}

async fn handle_command<T: CentralTransport>(
    session: &mut ConnectionSession<T>,
    command: SessionCommand,
) {
    match command {
        SessionCommand::Connect { responder } => {
            let _ = responder.send(session.connect().await);
        }
        SessionCommand::Disconnect { responder } => {
            let _ = responder.send(session.disconnect().await);
        }
        SessionCommand::Read {
            attribute,
            responder,
        } => {
            let _ = responder.send(session.read(attribute).await);
        }
        SessionCommand::RequestWrite {
            characteristic,
            responder,
        } => {
            let _ = responder.send(session.request_write(characteristic));
        }
        SessionCommand::SendWrite { request, responder } => {
            let _ = responder.send(session.send_write(request).await);
        }
        SessionCommand::CancelWrite { responder } => {
            let _ = responder.send(Ok(session.cancel_write()));
        }
        SessionCommand::ToggleNotify {
            characteristic,
            responder,
        } => {
            let _ = responder.send(session.toggle_notify(characteristic).await);
        }
        SessionCommand::WriteDescriptor {
            descriptor,
            data,
            responder,
        } => {
            let _ = responder.send(session.write_descriptor(descriptor, &data).await);
        }
        // Stops the loop in run_session before reaching here.
        SessionCommand::Shutdown => {}
    }
}
