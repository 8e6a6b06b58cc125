use std::sync::Arc;

use log::{debug, info};
use tokio_util::sync::CancellationToken;

use crate::backends::{Backend, BackendSelector, LocalMailClient};
use crate::models::ItemId;
use crate::results::Operation;
use crate::search::SearchOrchestrator;

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("{0} needs the desktop mail client, which is not available")]
    LocalUnavailable(&'static str),
    #[error("the desktop mail client refused {0}")]
    Refused(&'static str),
    #[error("no online mailbox is configured")]
    NoRemote,
    #[error("sign-in did not complete")]
    SignInFailed,
    #[error("failed to open {target}: {source}")]
    Launch {
        target: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Opens URIs outside the process (browser, mail handler)
pub trait Launcher: Send + Sync {
    fn launch(&self, target: &str) -> std::io::Result<()>;
}

/// Hands URIs to the operating system
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn launch(&self, target: &str) -> std::io::Result<()> {
        open::that(target)
    }
}

/// Executes [`Operation`]s against the same backends a
/// [`SearchOrchestrator`] searches
pub struct ActionHandler {
    orchestrator: SearchOrchestrator,
    launcher: Arc<dyn Launcher>,
}

impl ActionHandler {
    pub fn new(orchestrator: SearchOrchestrator, launcher: Arc<dyn Launcher>) -> Self {
        Self {
            orchestrator,
            launcher,
        }
    }

    pub fn with_system_launcher(orchestrator: SearchOrchestrator) -> Self {
        Self::new(orchestrator, Arc::new(SystemLauncher))
    }

    pub async fn invoke(
        &self,
        operation: &Operation,
        cancel: &CancellationToken,
    ) -> Result<(), ActionError> {
        debug!("Invoking {}", operation.name());
        match operation {
            Operation::OpenItem { id } => {
                let local = self.mutation_backend(operation)?;
                local.open_item(id)?;
                Ok(())
            }
            Operation::Reply { id } => self.mutate(operation, id, |l, id| l.reply(id)),
            Operation::ReplyAll { id } => self.mutate(operation, id, |l, id| l.reply_all(id)),
            Operation::Forward { id } => self.mutate(operation, id, |l, id| l.forward(id)),
            Operation::OpenLink { url } | Operation::JoinMeeting { url } => self.launch(url),
            Operation::RunQuickAction { uri, .. } => self.launch(uri),
            Operation::SignIn => {
                let remote = self.orchestrator.remote().ok_or(ActionError::NoRemote)?;
                if remote.try_auth(cancel).await {
                    info!("Signed in to online mailbox");
                    Ok(())
                } else {
                    Err(ActionError::SignInFailed)
                }
            }
            Operation::SignOut => {
                let remote = self.orchestrator.remote().ok_or(ActionError::NoRemote)?;
                remote.sign_out().await?;
                info!("Signed out of online mailbox");
                Ok(())
            }
        }
    }

    /// The local client, if selection allows it to run mutations
    fn mutation_backend(&self, operation: &Operation) -> Result<&dyn LocalMailClient, ActionError> {
        let selection = BackendSelector::select(self.orchestrator.availability(), false);
        match (selection.for_mutation(), self.orchestrator.local()) {
            (Some(Backend::Local), Some(local)) => Ok(local.as_ref()),
            _ => Err(ActionError::LocalUnavailable(operation.name())),
        }
    }

    fn mutate(
        &self,
        operation: &Operation,
        id: &ItemId,
        call: impl FnOnce(&dyn LocalMailClient, &ItemId) -> anyhow::Result<bool>,
    ) -> Result<(), ActionError> {
        let local = self.mutation_backend(operation)?;
        if call(local, id)? {
            Ok(())
        } else {
            Err(ActionError::Refused(operation.name()))
        }
    }

    fn launch(&self, target: &str) -> Result<(), ActionError> {
        self.launcher
            .launch(target)
            .map_err(|source| ActionError::Launch {
                target: target.to_string(),
                source,
            })
    }
}
