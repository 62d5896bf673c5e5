//! Volume up/down with bound guards

use crate::command::SystemActions;
use anyhow::Result;

/// Percentage points per volume command
pub const VOLUME_STEP: u8 = 10;

pub async fn handle_volume_up(actions: &dyn SystemActions) -> Result<String> {
    let current = actions.volume().await?;
    if current >= 100 {
        return Ok("Volume already at 100%".into());
    }

    actions
        .set_volume(current.saturating_add(VOLUME_STEP).min(100))
        .await?;
    Ok("Volume increased".into())
}

pub async fn handle_volume_down(actions: &dyn SystemActions) -> Result<String> {
    let current = actions.volume().await?;
    if current == 0 {
        return Ok("Volume already at 0%".into());
    }

    actions.set_volume(current.saturating_sub(VOLUME_STEP)).await?;
    Ok("Volume decreased".into())
}
