//! Application launch

use crate::command::{App, SystemActions};
use anyhow::Result;

pub async fn handle_launch(actions: &dyn SystemActions, app: App) -> Result<String> {
    actions.launch(app).await?;
    Ok(format!("{} opened", app))
}
