/*!
 * Non-destructive device commands
 */

use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::*;
use fmd_client::{Ack, ArtifactStore, Camera, ClientConfig, CommandKind, RingerMode};

use super::connect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CameraArg {
    Front,
    Back,
}

impl From<CameraArg> for Camera {
    fn from(arg: CameraArg) -> Self {
        match arg {
            CameraArg::Front => Camera::Front,
            CameraArg::Back => Camera::Back,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    fn is_on(self) -> bool {
        self == Toggle::On
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RingerArg {
    Normal,
    Vibrate,
    Silent,
}

impl From<RingerArg> for RingerMode {
    fn from(arg: RingerArg) -> Self {
        match arg {
            RingerArg::Normal => RingerMode::Normal,
            RingerArg::Vibrate => RingerMode::Vibrate,
            RingerArg::Silent => RingerMode::Silent,
        }
    }
}

async fn send(store: &ArtifactStore, config: ClientConfig, kind: CommandKind) -> Result<()> {
    let client = connect(store, config).await?;
    let name = kind.name();
    let ack = client
        .send_command(kind)
        .await
        .with_context(|| format!("Failed to send '{name}'"))?;
    print_ack(&ack);
    Ok(())
}

pub(crate) fn print_ack(ack: &Ack) {
    println!(
        "{} '{}' queued by the server at {}",
        "✓".green(),
        ack.command,
        ack.accepted_at.format("%H:%M:%S UTC")
    );
    println!(
        "{}",
        "  The device runs it the next time it checks in.".dimmed()
    );
}

pub async fn ring(store: &ArtifactStore, config: ClientConfig) -> Result<()> {
    send(store, config, CommandKind::Ring).await
}

pub async fn lock(store: &ArtifactStore, config: ClientConfig, message: Option<&str>) -> Result<()> {
    let kind = CommandKind::Lock {
        message: message.map(str::to_string),
    };
    send(store, config, kind).await
}

pub async fn camera(store: &ArtifactStore, config: ClientConfig, side: CameraArg) -> Result<()> {
    send(store, config, CommandKind::Camera(side.into())).await
}

pub async fn bluetooth(store: &ArtifactStore, config: ClientConfig, state: Toggle) -> Result<()> {
    send(store, config, CommandKind::Bluetooth(state.is_on())).await
}

pub async fn do_not_disturb(
    store: &ArtifactStore,
    config: ClientConfig,
    state: Toggle,
) -> Result<()> {
    send(store, config, CommandKind::DoNotDisturb(state.is_on())).await
}

pub async fn ringer(store: &ArtifactStore, config: ClientConfig, mode: RingerArg) -> Result<()> {
    send(store, config, CommandKind::RingerMode(mode.into())).await
}
