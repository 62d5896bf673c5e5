//! Process-wide bridge context
//!
//! Owns the shared pieces (command queue, liveness flag, mapping, last
//! gesture) and the two background tasks: the transport session and the
//! recognition loop. The configurator side talks to the bridge only
//! through this type.

use crate::config::ClientConfig;
use crate::connection::{HealthReport, LivenessFlag, SessionEvent, StopReason, TransportSession};
use crate::gesture::{GestureDispatcher, LastGesture, Mapping, MappingStore, SharedMapping};
use crate::queue::{command_queue, CommandQueue};
use crate::recognizer::{run_recognition, RecognitionSource};
use crate::transport::TcpConnector;
use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{info, warn};

pub struct BridgeContext {
    config: ClientConfig,
    queue: CommandQueue,
    liveness: LivenessFlag,
    mapping: SharedMapping,
    store: MappingStore,
    last_gesture: LastGesture,
    recognition: Option<JoinHandle<()>>,
    transport: Option<JoinHandle<StopReason>>,
    terminate: watch::Sender<bool>,
}

impl BridgeContext {
    /// Open the mapping store, apply the startup profile and spawn the
    /// transport session
    pub async fn start(
        config: ClientConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SessionEvent>)> {
        let store = MappingStore::open(&config.mapping_dir)
            .await
            .with_context(|| format!("opening mapping store {}", config.mapping_dir.display()))?;
        info!("Mapping profiles in {}", store.dir().display());

        let initial = match &config.mapping_profile {
            Some(name) => {
                let mapping = store
                    .load(name)
                    .await
                    .with_context(|| format!("loading mapping profile {}", name))?;
                info!("Loaded mapping profile '{}' ({} entries)", name, mapping.len());
                mapping
            }
            None => Mapping::new(),
        };

        let (queue, consumer) = command_queue();
        let liveness = LivenessFlag::new();
        let (terminate, terminate_rx) = watch::channel(false);

        let connector = TcpConnector::new(config.executor_addr.clone(), config.connect_timeout);
        let (session, events) = TransportSession::new(
            connector,
            config.session_config(),
            consumer,
            liveness.clone(),
            terminate_rx,
        );
        let transport = session.spawn();

        let context = Self {
            config,
            queue,
            liveness,
            mapping: SharedMapping::new(initial),
            store,
            last_gesture: LastGesture::new(),
            recognition: None,
            transport: Some(transport),
            terminate,
        };

        Ok((context, events))
    }

    /// Start the recognition loop; returns `false` if one is already running
    pub fn start_recognition<S: RecognitionSource>(&mut self, source: S) -> bool {
        if self.is_recognizing() {
            warn!("Gesture recognition already running");
            return false;
        }

        let dispatcher = GestureDispatcher::new(
            self.mapping.clone(),
            self.queue.clone(),
            self.last_gesture.clone(),
            self.config.sample_every,
        );
        self.recognition = Some(tokio::spawn(run_recognition(source, dispatcher)));
        true
    }

    pub fn stop_recognition(&mut self) {
        if let Some(handle) = self.recognition.take() {
            handle.abort();
            info!("Gesture recognition stopped");
        }
    }

    pub fn is_recognizing(&self) -> bool {
        self.recognition
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Wait for the recognition source to run dry; immediate if none is running
    pub async fn wait_recognition(&mut self) {
        if let Some(handle) = self.recognition.as_mut() {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!("Recognition task failed: {}", e);
                }
            }
            self.recognition = None;
        }
    }

    pub fn health(&self) -> HealthReport {
        self.liveness.report()
    }

    pub fn mapping(&self) -> &SharedMapping {
        &self.mapping
    }

    pub fn store(&self) -> &MappingStore {
        &self.store
    }

    /// Producer handle for commands that bypass recognition
    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    pub fn last_gesture(&self) -> watch::Receiver<Option<String>> {
        self.last_gesture.subscribe()
    }

    /// Replace the live mapping with a stored snapshot
    pub async fn apply_profile(&self, name: &str) -> Result<()> {
        let mapping = self.store.load(name).await?;
        info!("Applied mapping profile '{}'", name);
        self.mapping.replace(mapping).await;
        Ok(())
    }

    /// Store the live mapping under `name`
    pub async fn save_profile(&self, name: &str) -> Result<()> {
        let mapping = self.mapping.snapshot().await;
        self.store.save(name, &mapping).await?;
        info!("Saved mapping profile '{}'", name);
        Ok(())
    }

    /// Remove a stored snapshot; the live mapping is untouched
    pub async fn delete_profile(&self, name: &str) -> Result<()> {
        self.store.delete(name).await?;
        info!("Deleted mapping profile '{}'", name);
        Ok(())
    }

    /// Stop recognition, then let the transport drain up to the close
    /// sentinel. If it is still running after the grace period it is told
    /// to terminate.
    pub async fn shutdown(&mut self) -> Option<StopReason> {
        self.stop_recognition();
        self.queue.close();

        let mut handle = self.transport.take()?;

        let joined = match timeout(self.config.shutdown_grace, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                info!("Transport still busy after grace period, terminating");
                self.terminate.send_replace(true);
                handle.await
            }
        };

        match joined {
            Ok(reason) => {
                info!("Transport stopped: {}", reason);
                Some(reason)
            }
            Err(e) => {
                warn!("Transport task failed: {}", e);
                None
            }
        }
    }
}

impl Drop for BridgeContext {
    fn drop(&mut self) {
        self.stop_recognition();
        self.terminate.send_replace(true);
    }
}
