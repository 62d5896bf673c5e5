//! OS-level action primitives behind the executor
//!
//! Every command ends in exactly one of these calls. [`DesktopActions`]
//! drives the real desktop through platform tools; [`DryRunActions`] keeps
//! everything in memory and only logs.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use gesture_bridge_shared::Command;
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use tokio::process::Command as Process;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// How long Alt stays held so the window switcher is visible
pub const ALT_TAB_HOLD: Duration = Duration::from_millis(2500);

/// Pause after spawning an application so it can open its window
pub const LAUNCH_SETTLE: Duration = Duration::from_secs(3);

/// Singleton desktop applications the executor can launch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum App {
    Calculator,
    TaskManager,
}

impl App {
    /// Application a launch command opens, if any
    pub fn for_command(command: Command) -> Option<App> {
        match command {
            Command::OpenCalculator => Some(App::Calculator),
            Command::TaskManager => Some(App::TaskManager),
            _ => None,
        }
    }
}

impl fmt::Display for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            App::Calculator => write!(f, "Calculator"),
            App::TaskManager => write!(f, "Task Manager"),
        }
    }
}

/// Capability interface over the host's side effects
#[async_trait]
pub trait SystemActions: Send + Sync + 'static {
    /// Master volume in percent
    async fn volume(&self) -> Result<u8>;

    async fn set_volume(&self, percent: u8) -> Result<()>;

    async fn alt_tab(&self) -> Result<()>;

    async fn play_pause(&self) -> Result<()>;

    async fn screenshot(&self) -> Result<()>;

    /// Scroll the wheel; positive is up, 120 units per notch
    async fn scroll(&self, amount: i32) -> Result<()>;

    async fn launch(&self, app: App) -> Result<()>;

    async fn is_running(&self, app: App) -> Result<bool>;
}

/// Real desktop side effects
#[derive(Debug, Default)]
pub struct DesktopActions;

impl DesktopActions {
    pub fn new() -> Self {
        Self
    }
}

/// Run a tool to completion and return its stdout
#[cfg(not(windows))]
async fn run_tool(program: &str, args: &[&str]) -> Result<String> {
    debug!("Running {} {:?}", program, args);
    let output = Process::new(program)
        .args(args)
        .output()
        .await
        .with_context(|| format!("failed to run {}", program))?;

    if !output.status.success() {
        bail!(
            "{} exited with {}: {}",
            program,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Spawn a GUI application without waiting for it
fn spawn_detached(program: &str) -> Result<()> {
    Process::new(program)
        .spawn()
        .with_context(|| format!("failed to launch {}", program))?;
    Ok(())
}

#[cfg(not(windows))]
mod platform {
    use super::*;

    const SINK: &str = "@DEFAULT_SINK@";

    /// Longest process name the kernel keeps in `/proc/<pid>/comm`
    const COMM_LEN: usize = 15;

    pub fn program(app: App) -> &'static str {
        match app {
            App::Calculator => "gnome-calculator",
            App::TaskManager => "gnome-system-monitor",
        }
    }

    /// Name `pgrep -x` can match for `program`
    pub fn comm_name(program: &str) -> &str {
        program.get(..COMM_LEN).unwrap_or(program)
    }

    pub async fn volume() -> Result<u8> {
        let out = run_tool("pactl", &["get-sink-volume", SINK]).await?;
        parse_pactl_volume(&out).context("unexpected pactl output")
    }

    pub async fn set_volume(percent: u8) -> Result<()> {
        let level = format!("{}%", percent);
        run_tool("pactl", &["set-sink-volume", SINK, &level]).await?;
        Ok(())
    }

    pub async fn key(name: &str) -> Result<()> {
        run_tool("xdotool", &["key", name]).await?;
        Ok(())
    }

    pub async fn alt_tab() -> Result<()> {
        run_tool("xdotool", &["keydown", "alt", "key", "Tab"]).await?;
        tokio::time::sleep(ALT_TAB_HOLD).await;
        run_tool("xdotool", &["keyup", "alt"]).await?;
        Ok(())
    }

    pub async fn play_pause() -> Result<()> {
        key("XF86AudioPlay").await
    }

    pub async fn screenshot() -> Result<()> {
        key("Print").await
    }

    pub async fn scroll(amount: i32) -> Result<()> {
        // X11 wheel buttons: 4 scrolls up, 5 scrolls down
        let button = if amount >= 0 { "4" } else { "5" };
        let notches = (amount.unsigned_abs() / 120).max(1).to_string();
        run_tool("xdotool", &["click", "--repeat", &notches, button]).await?;
        Ok(())
    }

    pub async fn is_running(app: App) -> Result<bool> {
        let status = Process::new("pgrep")
            .args(["-x", comm_name(program(app))])
            .output()
            .await
            .context("failed to run pgrep")?
            .status;
        Ok(status.success())
    }

    /// First `NN%` in `pactl get-sink-volume` output
    pub fn parse_pactl_volume(out: &str) -> Option<u8> {
        out.split_whitespace()
            .find_map(|word| word.strip_suffix('%')?.parse::<u16>().ok())
            .map(|v| v.min(100) as u8)
    }
}

/// PowerShell snippets driving user32 input and the Core Audio endpoint
#[cfg(any(windows, test))]
mod win {
    use std::time::Duration;

    const VK_TAB: u8 = 0x09;
    const VK_MENU: u8 = 0x12;
    pub const VK_SNAPSHOT: u8 = 0x2C;
    pub const VK_MEDIA_PLAY_PAUSE: u8 = 0xB3;
    const KEYEVENTF_KEYUP: u32 = 0x2;
    const MOUSEEVENTF_WHEEL: u32 = 0x0800;

    const USER32: &str = concat!(
        "Add-Type -Namespace GestureBridge -Name Input -MemberDefinition '",
        "[DllImport(\"user32.dll\")] public static extern void keybd_event(",
        "byte vk, byte scan, uint flags, System.UIntPtr extra); ",
        "[DllImport(\"user32.dll\")] public static extern void mouse_event(",
        "uint flags, int dx, int dy, int data, System.UIntPtr extra);'",
    );

    const AUDIO: &str = concat!(
        "Add-Type -TypeDefinition '",
        "using System.Runtime.InteropServices; namespace GestureBridge { ",
        "[Guid(\"5CDF2C82-841E-4546-9722-0CF74078229A\"), InterfaceType(ComInterfaceType.InterfaceIsIUnknown)] ",
        "interface IAudioEndpointVolume { int f(); int g(); int h(); int i(); ",
        "int SetMasterVolumeLevelScalar(float level, System.Guid ctx); int j(); ",
        "int GetMasterVolumeLevelScalar(out float level); } ",
        "[Guid(\"D666063F-1587-4E43-81F1-B948E807363F\"), InterfaceType(ComInterfaceType.InterfaceIsIUnknown)] ",
        "interface IMMDevice { int Activate(ref System.Guid id, int ctx, int p, out IAudioEndpointVolume v); } ",
        "[Guid(\"A95664D2-9614-4F35-A746-DE8DB63617E6\"), InterfaceType(ComInterfaceType.InterfaceIsIUnknown)] ",
        "interface IMMDeviceEnumerator { int f(); int GetDefaultAudioEndpoint(int flow, int role, out IMMDevice d); } ",
        "[ComImport, Guid(\"BCDE0395-E52F-467C-8E3D-C4579291692E\")] class MMDeviceEnumerator { } ",
        "public static class Audio { ",
        "static IAudioEndpointVolume Endpoint() { ",
        "var e = new MMDeviceEnumerator() as IMMDeviceEnumerator; IMMDevice d; ",
        "Marshal.ThrowExceptionForHR(e.GetDefaultAudioEndpoint(0, 1, out d)); ",
        "var id = typeof(IAudioEndpointVolume).GUID; IAudioEndpointVolume v; ",
        "Marshal.ThrowExceptionForHR(d.Activate(ref id, 23, 0, out v)); return v; } ",
        "public static float Volume { ",
        "get { float l; Marshal.ThrowExceptionForHR(Endpoint().GetMasterVolumeLevelScalar(out l)); return l; } ",
        "set { Marshal.ThrowExceptionForHR(Endpoint().SetMasterVolumeLevelScalar(value, System.Guid.Empty)); } } } }'",
    );

    fn key_event(vk: u8, flags: u32) -> String {
        format!(
            "[GestureBridge.Input]::keybd_event({}, 0, {}, [System.UIntPtr]::Zero)",
            vk, flags
        )
    }

    /// Press and release one virtual key
    pub fn key_tap(vk: u8) -> String {
        format!(
            "{}; {}; {}",
            USER32,
            key_event(vk, 0),
            key_event(vk, KEYEVENTF_KEYUP)
        )
    }

    /// Tap Tab while Alt stays down for `hold`
    pub fn alt_tab(hold: Duration) -> String {
        format!(
            "{}; {}; {}; {}; Start-Sleep -Milliseconds {}; {}",
            USER32,
            key_event(VK_MENU, 0),
            key_event(VK_TAB, 0),
            key_event(VK_TAB, KEYEVENTF_KEYUP),
            hold.as_millis(),
            key_event(VK_MENU, KEYEVENTF_KEYUP)
        )
    }

    /// Turn the mouse wheel; 120 units per notch, positive is up
    pub fn wheel(amount: i32) -> String {
        format!(
            "{}; [GestureBridge.Input]::mouse_event({}, 0, 0, {}, [System.UIntPtr]::Zero)",
            USER32, MOUSEEVENTF_WHEEL, amount
        )
    }

    /// Prints the master volume as a whole percentage
    pub fn get_volume() -> String {
        format!(
            "{}; [int][Math]::Round([GestureBridge.Audio]::Volume * 100)",
            AUDIO
        )
    }

    pub fn set_volume(percent: u8) -> String {
        format!(
            "{}; [GestureBridge.Audio]::Volume = {}",
            AUDIO,
            f32::from(percent.min(100)) / 100.0
        )
    }

    /// Whether `tasklist /FO CSV /NH` output lists any of `images`
    pub fn tasklist_has(out: &str, images: &[&str]) -> bool {
        out.lines()
            .filter_map(|line| line.split(',').next())
            .map(|name| name.trim().trim_matches('"'))
            .any(|name| images.iter().any(|image| name.eq_ignore_ascii_case(image)))
    }
}

#[cfg(windows)]
mod platform {
    use super::*;
    use std::process::Stdio;
    use tokio::io::AsyncWriteExt;

    pub fn program(app: App) -> &'static str {
        match app {
            App::Calculator => "calc.exe",
            App::TaskManager => "taskmgr.exe",
        }
    }

    fn image_names(app: App) -> &'static [&'static str] {
        match app {
            App::Calculator => &["calculator.exe", "calc.exe", "calculatorapp.exe"],
            App::TaskManager => &["taskmgr.exe"],
        }
    }

    /// Feed a one-line script to PowerShell on stdin, returning its stdout
    async fn run_script(script: &str) -> Result<String> {
        debug!("Running PowerShell script ({} bytes)", script.len());
        let mut child = Process::new("powershell")
            .args(["-NoProfile", "-NonInteractive", "-Command", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("failed to run powershell")?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(b"$ErrorActionPreference = 'Stop'; ").await?;
            stdin.write_all(script.as_bytes()).await?;
            stdin.write_all(b"\r\n").await?;
        }

        let output = child.wait_with_output().await?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() || !stderr.trim().is_empty() {
            bail!("powershell exited with {}: {}", output.status, stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    pub async fn volume() -> Result<u8> {
        let out = run_script(&win::get_volume()).await?;
        let level: u16 = out
            .trim()
            .parse()
            .with_context(|| format!("unexpected volume output {:?}", out.trim()))?;
        Ok(level.min(100) as u8)
    }

    pub async fn set_volume(percent: u8) -> Result<()> {
        run_script(&win::set_volume(percent)).await?;
        Ok(())
    }

    pub async fn alt_tab() -> Result<()> {
        run_script(&win::alt_tab(ALT_TAB_HOLD)).await?;
        Ok(())
    }

    pub async fn play_pause() -> Result<()> {
        run_script(&win::key_tap(win::VK_MEDIA_PLAY_PAUSE)).await?;
        Ok(())
    }

    pub async fn screenshot() -> Result<()> {
        run_script(&win::key_tap(win::VK_SNAPSHOT)).await?;
        Ok(())
    }

    pub async fn scroll(amount: i32) -> Result<()> {
        run_script(&win::wheel(amount)).await?;
        Ok(())
    }

    pub async fn is_running(app: App) -> Result<bool> {
        let output = Process::new("tasklist")
            .args(["/FO", "CSV", "/NH"])
            .output()
            .await
            .context("failed to run tasklist")?;
        if !output.status.success() {
            bail!("tasklist exited with {}", output.status);
        }
        Ok(win::tasklist_has(
            &String::from_utf8_lossy(&output.stdout),
            image_names(app),
        ))
    }
}

#[async_trait]
impl SystemActions for DesktopActions {
    async fn volume(&self) -> Result<u8> {
        platform::volume().await
    }

    async fn set_volume(&self, percent: u8) -> Result<()> {
        platform::set_volume(percent.min(100)).await
    }

    async fn alt_tab(&self) -> Result<()> {
        platform::alt_tab().await
    }

    async fn play_pause(&self) -> Result<()> {
        platform::play_pause().await
    }

    async fn screenshot(&self) -> Result<()> {
        platform::screenshot().await
    }

    async fn scroll(&self, amount: i32) -> Result<()> {
        platform::scroll(amount).await
    }

    async fn launch(&self, app: App) -> Result<()> {
        spawn_detached(platform::program(app))?;
        tokio::time::sleep(LAUNCH_SETTLE).await;
        Ok(())
    }

    async fn is_running(&self, app: App) -> Result<bool> {
        platform::is_running(app).await
    }
}

#[derive(Debug)]
struct DryRunState {
    volume: u8,
    running: HashSet<App>,
}

/// In-memory stand-in for hosts without a desktop
///
/// Launched apps count as running for the life of the process.
#[derive(Debug)]
pub struct DryRunActions {
    state: Mutex<DryRunState>,
}

impl DryRunActions {
    pub fn new(volume: u8) -> Self {
        Self {
            state: Mutex::new(DryRunState {
                volume: volume.min(100),
                running: HashSet::new(),
            }),
        }
    }
}

impl Default for DryRunActions {
    fn default() -> Self {
        Self::new(50)
    }
}

#[async_trait]
impl SystemActions for DryRunActions {
    async fn volume(&self) -> Result<u8> {
        Ok(self.state.lock().await.volume)
    }

    async fn set_volume(&self, percent: u8) -> Result<()> {
        let percent = percent.min(100);
        info!("[dry-run] volume -> {}%", percent);
        self.state.lock().await.volume = percent;
        Ok(())
    }

    async fn alt_tab(&self) -> Result<()> {
        info!("[dry-run] alt+tab");
        Ok(())
    }

    async fn play_pause(&self) -> Result<()> {
        info!("[dry-run] media play/pause");
        Ok(())
    }

    async fn screenshot(&self) -> Result<()> {
        info!("[dry-run] print screen");
        Ok(())
    }

    async fn scroll(&self, amount: i32) -> Result<()> {
        info!("[dry-run] scroll {}", amount);
        Ok(())
    }

    async fn launch(&self, app: App) -> Result<()> {
        info!("[dry-run] launch {}", app);
        self.state.lock().await.running.insert(app);
        Ok(())
    }

    async fn is_running(&self, app: App) -> Result<bool> {
        Ok(self.state.lock().await.running.contains(&app))
    }
}
