//! Recording fake of the action capability for tests

use super::{App, SystemActions};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

/// Records every side effect instead of performing it
#[derive(Default)]
pub(crate) struct RecordingActions {
    pub volume: Mutex<u8>,
    pub calls: Mutex<Vec<String>>,
    pub running: Mutex<HashSet<App>>,
    pub fail_launch: bool,
    pub fail_volume: bool,
}

impl RecordingActions {
    pub fn with_volume(volume: u8) -> Self {
        Self {
            volume: Mutex::new(volume),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl SystemActions for RecordingActions {
    async fn volume(&self) -> Result<u8> {
        if self.fail_volume {
            bail!("no mixer");
        }
        Ok(*self.volume.lock().unwrap())
    }

    async fn set_volume(&self, percent: u8) -> Result<()> {
        self.record(format!("set_volume {}", percent));
        *self.volume.lock().unwrap() = percent;
        Ok(())
    }

    async fn alt_tab(&self) -> Result<()> {
        self.record("alt_tab".into());
        Ok(())
    }

    async fn play_pause(&self) -> Result<()> {
        self.record("play_pause".into());
        Ok(())
    }

    async fn screenshot(&self) -> Result<()> {
        self.record("screenshot".into());
        Ok(())
    }

    async fn scroll(&self, amount: i32) -> Result<()> {
        self.record(format!("scroll {}", amount));
        Ok(())
    }

    async fn launch(&self, app: App) -> Result<()> {
        if self.fail_launch {
            bail!("no display");
        }
        self.record(format!("launch {}", app));
        self.running.lock().unwrap().insert(app);
        Ok(())
    }

    async fn is_running(&self, app: App) -> Result<bool> {
        Ok(self.running.lock().unwrap().contains(&app))
    }
}
