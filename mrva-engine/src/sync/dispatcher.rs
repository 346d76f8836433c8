//! Inbound message dispatcher
//!
//! Every `InboundMessage` variant has exactly one arm in [`MessageDispatcher::dispatch`].
//! The match has no wildcard, so adding a message kind without a handler
//! fails to compile.

use crate::error::{EngineError, EngineResult};
use crate::modeling::session::ModelEditor;
use crate::sync::broadcaster::StateBroadcaster;
use crate::types::Workbench;
use mrva_common::protocol::{parse_inbound, InboundMessage};
use std::sync::Arc;
use tracing::{debug, warn};

/// Routes user intent from the presentation surface into the engine
pub struct MessageDispatcher {
    editor: Arc<ModelEditor>,
    workbench: Arc<dyn Workbench>,
    broadcaster: StateBroadcaster,
}

impl MessageDispatcher {
    pub fn new(editor: Arc<ModelEditor>, workbench: Arc<dyn Workbench>, broadcaster: StateBroadcaster) -> Self {
        Self {
            editor,
            workbench,
            broadcaster,
        }
    }

    /// Parse and dispatch one raw envelope
    ///
    /// A rejected message fails alone; the session keeps running.
    pub async fn dispatch_raw(&self, raw: &str) -> EngineResult<()> {
        let message = parse_inbound(raw).map_err(|e| {
            warn!(error = %e, "Rejected inbound message");
            EngineError::from(e)
        })?;
        self.dispatch(message).await
    }

    pub async fn dispatch(&self, message: InboundMessage) -> EngineResult<()> {
        let kind = message.kind();
        debug!(kind, "Dispatching inbound message");

        let result = match message {
            InboundMessage::Refresh => {
                self.editor.publish_all().await;
                self.broadcaster.republish_run();
                Ok(())
            }
            InboundMessage::Save { signatures, methods } => {
                self.editor.save(signatures, methods).await.map(|_| ())
            }
            InboundMessage::SetModeledMethods { methods } => {
                self.editor.set_modeled_methods(methods).await;
                Ok(())
            }
            InboundMessage::Generate { package } => self.editor.generate(&package).await.map(|_| ()),
            InboundMessage::StopGenerate { package } => {
                self.editor.stop_generate(&package).await;
                Ok(())
            }
            InboundMessage::SwitchMode { mode } => {
                self.editor.switch_mode(mode).await;
                Ok(())
            }
            InboundMessage::ToggleHideModeled => {
                self.editor.toggle_hide_modeled().await;
                Ok(())
            }
            InboundMessage::OpenDatabase => self.workbench.open_database().await.map_err(EngineError::from),
            InboundMessage::OpenExtensionPack => self
                .workbench
                .open_extension_pack()
                .await
                .map_err(EngineError::from),
        };

        if let Err(e) = &result {
            warn!(kind, error = %e, "Inbound message failed");
        }
        result
    }
}
