//! Simulated key presses and mouse wheel

use crate::command::SystemActions;
use anyhow::Result;

/// One wheel notch
const SCROLL_NOTCH: i32 = 120;

pub async fn handle_alt_tab(actions: &dyn SystemActions) -> Result<String> {
    actions.alt_tab().await?;
    Ok("Alt+Tab sent".into())
}

pub async fn handle_play_pause(actions: &dyn SystemActions) -> Result<String> {
    actions.play_pause().await?;
    Ok("Media play/pause triggered".into())
}

pub async fn handle_screenshot(actions: &dyn SystemActions) -> Result<String> {
    actions.screenshot().await?;
    Ok("Screenshot key (Print Screen) sent".into())
}

pub async fn handle_scroll(actions: &dyn SystemActions, up: bool) -> Result<String> {
    if up {
        actions.scroll(SCROLL_NOTCH).await?;
        Ok("Mouse scrolled up".into())
    } else {
        actions.scroll(-SCROLL_NOTCH).await?;
        Ok("Mouse scrolled down".into())
    }
}
