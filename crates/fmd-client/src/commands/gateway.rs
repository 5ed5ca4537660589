use std::sync::Arc;
use tracing::{error, info, warn};
use zeroize::Zeroizing;

use super::interlock::{InterlockStatus, SafetyInterlock};
use super::kinds::{Camera, CommandKind, RingerMode};
use super::pin::validate_pin;
use super::Ack;
use crate::config::GatewayConfig;
use crate::error::{ClientError, Result};
use crate::location::LocationSource;
use crate::session::Session;

/// Issues device commands. Nothing sent through here is ever retried.
pub struct CommandGateway {
    session: Arc<Session>,
    interlock: Arc<SafetyInterlock>,
}

impl CommandGateway {
    pub fn new(session: Arc<Session>, config: &GatewayConfig) -> Self {
        Self {
            session,
            interlock: SafetyInterlock::new(config.wipe_arm_timeout()),
        }
    }

    /// Send a command once. A failure is reported, not replayed.
    pub async fn send(&self, kind: CommandKind) -> Result<Ack> {
        let command = kind.to_command_string();
        info!(fmd_id = %self.session.fmd_id(), command = kind.name(), "Sending command");
        self.session.send_command(&command).await.map_err(|e| {
            warn!(command = kind.name(), error = %e, "Command failed, not retrying");
            e
        })
    }

    pub async fn ring(&self) -> Result<Ack> {
        self.send(CommandKind::Ring).await
    }

    pub async fn lock(&self, message: Option<&str>) -> Result<Ack> {
        self.send(CommandKind::Lock {
            message: message.map(str::to_string),
        })
        .await
    }

    pub async fn locate(&self, source: LocationSource) -> Result<Ack> {
        self.send(CommandKind::Locate(source)).await
    }

    pub async fn camera(&self, camera: Camera) -> Result<Ack> {
        self.send(CommandKind::Camera(camera)).await
    }

    pub async fn bluetooth(&self, on: bool) -> Result<Ack> {
        self.send(CommandKind::Bluetooth(on)).await
    }

    pub async fn do_not_disturb(&self, on: bool) -> Result<Ack> {
        self.send(CommandKind::DoNotDisturb(on)).await
    }

    pub async fn ringer_mode(&self, mode: RingerMode) -> Result<Ack> {
        self.send(CommandKind::RingerMode(mode)).await
    }

    /// First factor of the wipe interlock. Stays armed for the configured timeout.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn arm_wipe(&self) -> InterlockStatus {
        self.interlock.arm()
    }

    pub fn disarm_wipe(&self) -> bool {
        self.interlock.disarm()
    }

    pub fn wipe_status(&self) -> InterlockStatus {
        self.interlock.status()
    }

    /// Factory-reset the device.
    ///
    /// Requires a live arm and a valid PIN; either failing means no request
    /// is made. A rejected PIN leaves the arm in place. Once both checks pass
    /// the arm is consumed before dispatch, so one arm allows one attempt
    /// whatever the server says.
    pub async fn execute_wipe(&self, pin: &str) -> Result<Ack> {
        if !self.interlock.is_armed() {
            error!(fmd_id = %self.session.fmd_id(), "Wipe refused: interlock not armed");
            return Err(ClientError::NotArmed);
        }
        if let Err(e) = validate_pin(pin) {
            error!(fmd_id = %self.session.fmd_id(), error = %e, "Wipe refused: invalid PIN");
            return Err(e);
        }
        if let Err(e) = self.interlock.consume() {
            error!(fmd_id = %self.session.fmd_id(), "Wipe refused: interlock expired");
            return Err(e);
        }

        error!(
            fmd_id = %self.session.fmd_id(),
            pin_len = pin.len(),
            "Dispatching device WIPE"
        );
        let command = Zeroizing::new(format!("delete {pin}"));
        match self.session.send_command(&command).await {
            Ok(ack) => {
                error!(fmd_id = %self.session.fmd_id(), "Wipe command accepted by server");
                Ok(ack)
            }
            Err(e) => {
                error!(
                    fmd_id = %self.session.fmd_id(),
                    error = %e,
                    "Wipe command FAILED; not retried, re-arm to try again"
                );
                Err(e)
            }
        }
    }
}
