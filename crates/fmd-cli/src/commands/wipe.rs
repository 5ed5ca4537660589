/*!
 * Device wipe
 *
 * The interlock is armed first, then the operator must type the device ID
 * and the wipe PIN before the command is sent. Nothing is retried.
 */

use anyhow::Result;
use chrono::Local;
use colored::*;
use fmd_client::{ArtifactStore, ClientConfig, ClientError};

use super::connect;
use super::device::print_ack;
use crate::prompt::{confirm_phrase, prompt_secret};

pub async fn wipe(store: &ArtifactStore, config: ClientConfig) -> Result<()> {
    let client = connect(store, config).await?;
    let fmd_id = client.session().fmd_id().to_string();

    println!("{}", "=== FACTORY RESET ===".red().bold());
    println!(
        "{}",
        "This erases everything on the device. It can no longer be located afterwards."
            .red()
    );

    let status = client.arm_wipe();
    if let Some(deadline) = status.auto_disarm_at {
        println!(
            "{}",
            format!(
                "Wipe armed until {}.",
                deadline.with_timezone(&Local).format("%H:%M:%S")
            )
            .yellow()
        );
    }

    if !confirm_phrase(&format!("Type the device ID ({fmd_id}) to continue: "), &fmd_id)? {
        client.disarm_wipe();
        println!("Aborted. Nothing was sent.");
        return Ok(());
    }
    let pin = prompt_secret("Wipe PIN (as set in the FMD app): ")?;

    match client.execute_wipe(pin.as_str()).await {
        Ok(ack) => {
            print_ack(&ack);
            Ok(())
        }
        Err(ClientError::InvalidPin(reason)) => {
            client.disarm_wipe();
            println!("{} {}", "PIN rejected:".red(), reason);
            println!("Nothing was sent.");
            Ok(())
        }
        Err(ClientError::NotArmed) => {
            println!(
                "{}",
                "Confirmation took too long and the wipe disarmed itself. Nothing was sent."
                    .yellow()
            );
            Ok(())
        }
        Err(e) => {
            println!(
                "{}",
                "Wipe request FAILED and was not retried. Run 'fmd wipe' again if needed."
                    .red()
                    .bold()
            );
            Err(e.into())
        }
    }
}
