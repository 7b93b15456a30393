use std::sync::Arc;

use tracing::{debug, info, warn};

use super::backoff::SettleBackoff;
use crate::remote::{
    FolderHandle, Reauthenticator, RemoteError, RemoteNode, RemoteStorage, navigate,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionTier {
    Immediate,
    Reconnect,
    /// One-based attempt of the settle schedule that found the folder.
    Retry(u32),
}

/// A folder that was confirmed listable, plus the session that confirmed it.
/// Work inside the folder must go through `client`.
pub struct ResolvedFolder<R> {
    pub folder: FolderHandle,
    pub client: Arc<R>,
    pub tier: ResolutionTier,
}

pub enum ResolutionOutcome<R> {
    Resolved(ResolvedFolder<R>),
    Unresolvable,
}

impl<R> ResolutionOutcome<R> {
    pub fn tier(&self) -> Option<ResolutionTier> {
        match self {
            ResolutionOutcome::Resolved(resolved) => Some(resolved.tier),
            ResolutionOutcome::Unresolvable => None,
        }
    }
}

/// Creates a remote folder and waits until it is actually usable, escalating
/// from a direct lookup to a fresh session to a slow retry schedule.
pub struct FolderResolver<R: RemoteStorage> {
    reauth: Option<Arc<dyn Reauthenticator<R>>>,
    settle: SettleBackoff,
}

impl<R: RemoteStorage> FolderResolver<R> {
    pub fn new(settle: SettleBackoff) -> Self {
        Self {
            reauth: None,
            settle,
        }
    }

    pub fn with_reauthenticator(mut self, reauth: Arc<dyn Reauthenticator<R>>) -> Self {
        self.reauth = Some(reauth);
        self
    }

    pub async fn resolve(
        &self,
        client: &Arc<R>,
        parent: &FolderHandle,
        name: &str,
    ) -> ResolutionOutcome<R> {
        let target = parent.child(name);
        match client.create_folder(parent, name).await {
            Ok(()) => debug!(folder = %target, "created remote folder"),
            Err(err) if err.is_already_exists() => {
                info!(folder = %target, "remote folder already exists")
            }
            Err(err) => {
                warn!(folder = %target, error = %err, "failed to create remote folder");
                return ResolutionOutcome::Unresolvable;
            }
        }

        match usable_child(client.as_ref(), parent, name).await {
            Ok(folder) => {
                return resolved(folder, Arc::clone(client), ResolutionTier::Immediate);
            }
            Err(err) => info!(folder = %target, error = %err, "folder not visible yet"),
        }

        let mut session = Arc::clone(client);
        let mut session_parent = parent.clone();
        if let Some(reauth) = &self.reauth {
            match reauth.reconnect().await {
                Ok(fresh) => match navigate(fresh.as_ref(), parent.segments()).await {
                    Ok(fresh_parent) => {
                        match usable_child(fresh.as_ref(), &fresh_parent, name).await {
                            Ok(folder) => {
                                return resolved(folder, fresh, ResolutionTier::Reconnect);
                            }
                            Err(err) => info!(
                                folder = %target,
                                error = %err,
                                "folder not visible after reconnect"
                            ),
                        }
                        session = fresh;
                        session_parent = fresh_parent;
                    }
                    Err(err) => warn!(
                        folder = %parent,
                        error = %err,
                        "new session cannot reach parent folder"
                    ),
                },
                Err(err) => warn!(error = %err, "reconnect failed"),
            }
        }

        for (attempt, delay) in (1..).zip(self.settle.delays()) {
            debug!(
                folder = %target,
                attempt,
                delay_secs = delay.as_secs_f64(),
                "waiting for folder to settle"
            );
            tokio::time::sleep(delay).await;
            if let Err(err) = session.list(&session_parent).await {
                warn!(folder = %session_parent, attempt, error = %err, "parent listing failed");
                continue;
            }
            match usable_child(session.as_ref(), &session_parent, name).await {
                Ok(folder) => return resolved(folder, session, ResolutionTier::Retry(attempt)),
                Err(err) => debug!(folder = %target, attempt, error = %err, "still not usable"),
            }
        }

        warn!(folder = %target, "folder could not be made usable");
        ResolutionOutcome::Unresolvable
    }
}

fn resolved<R>(folder: FolderHandle, client: Arc<R>, tier: ResolutionTier) -> ResolutionOutcome<R> {
    info!(folder = %folder, ?tier, "remote folder ready");
    ResolutionOutcome::Resolved(ResolvedFolder {
        folder,
        client,
        tier,
    })
}

/// Looks `name` up under `parent` and proves it is a folder that can be listed.
pub(crate) async fn usable_child<R: RemoteStorage + ?Sized>(
    client: &R,
    parent: &FolderHandle,
    name: &str,
) -> Result<FolderHandle, RemoteError> {
    match client.child(parent, name).await? {
        RemoteNode::Folder(folder) => {
            client.list(&folder).await?;
            Ok(folder)
        }
        RemoteNode::File(file) => Err(RemoteError::Failed(format!(
            "{}/{} is a file",
            file.folder, file.name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::upload::test_support::{Fault, MemoryReauth, MemoryRemote};

    fn resolver(remote: &MemoryRemote) -> (FolderResolver<MemoryRemote>, Arc<MemoryReauth>) {
        let reauth = Arc::new(MemoryReauth::new(remote));
        let resolver = FolderResolver::new(SettleBackoff::default())
            .with_reauthenticator(Arc::clone(&reauth) as Arc<dyn Reauthenticator<MemoryRemote>>);
        (resolver, reauth)
    }

    #[tokio::test(start_paused = true)]
    async fn visible_folder_resolves_immediately() {
        let remote = MemoryRemote::new();
        let (resolver, reauth) = resolver(&remote);
        let client = Arc::new(remote.clone());

        let outcome = resolver.resolve(&client, &FolderHandle::root(), "docs").await;

        assert_eq!(outcome.tier(), Some(ResolutionTier::Immediate));
        assert!(remote.folder_exists(&FolderHandle::root().child("docs")));
        assert_eq!(reauth.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn already_existing_folder_is_not_an_error() {
        let remote = MemoryRemote::new();
        remote.seed_folder(&FolderHandle::root(), "docs");
        let (resolver, _) = resolver(&remote);

        let outcome = resolver
            .resolve(&Arc::new(remote.clone()), &FolderHandle::root(), "docs")
            .await;

        assert_eq!(outcome.tier(), Some(ResolutionTier::Immediate));
    }

    #[tokio::test(start_paused = true)]
    async fn create_reporting_existing_still_resolves() {
        let remote = MemoryRemote::new();
        remote.inject("docs", Fault::CreateReportsExisting);
        let (resolver, _) = resolver(&remote);

        let outcome = resolver
            .resolve(&Arc::new(remote.clone()), &FolderHandle::root(), "docs")
            .await;

        assert_eq!(outcome.tier(), Some(ResolutionTier::Immediate));
    }

    #[tokio::test(start_paused = true)]
    async fn hard_create_failure_is_unresolvable_without_lookups() {
        let remote = MemoryRemote::new();
        remote.inject("docs", Fault::CreateFails);
        let (resolver, reauth) = resolver(&remote);

        let outcome = resolver
            .resolve(&Arc::new(remote.clone()), &FolderHandle::root(), "docs")
            .await;

        assert!(matches!(outcome, ResolutionOutcome::Unresolvable));
        assert_eq!(remote.stats().lookups, 0);
        assert_eq!(reauth.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn folder_hidden_from_creator_resolves_through_new_session() {
        let remote = MemoryRemote::new();
        remote.inject("docs", Fault::HiddenFromCreator);
        let (resolver, reauth) = resolver(&remote);
        let client = Arc::new(remote.clone());

        let ResolutionOutcome::Resolved(resolved) =
            resolver.resolve(&client, &FolderHandle::root(), "docs").await
        else {
            panic!("expected folder to resolve");
        };

        assert_eq!(resolved.tier, ResolutionTier::Reconnect);
        assert_eq!(resolved.folder, FolderHandle::root().child("docs"));
        assert_ne!(resolved.client.session(), client.session());
        assert_eq!(reauth.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_folder_resolves_on_second_retry_after_waiting() {
        let remote = MemoryRemote::new();
        // immediate, reconnect and the first retry each burn one lookup
        remote.inject("docs", Fault::HiddenFor(3));
        let (resolver, _) = resolver(&remote);
        let started = tokio::time::Instant::now();

        let outcome = resolver
            .resolve(&Arc::new(remote.clone()), &FolderHandle::root(), "docs")
            .await;

        assert_eq!(outcome.tier(), Some(ResolutionTier::Retry(2)));
        // the handle is only returned after a listing of it went through
        assert_eq!(remote.successful_lists(&FolderHandle::root().child("docs")), 1);
        assert_eq!(remote.successful_lists(&FolderHandle::root()), 2);
        assert!(started.elapsed() >= Duration::from_secs(3 + 5));
        assert!(started.elapsed() < Duration::from_secs(3 + 5 + 7));
    }

    #[tokio::test(start_paused = true)]
    async fn without_reauthenticator_creator_blind_folder_is_unresolvable() {
        let remote = MemoryRemote::new();
        remote.inject("docs", Fault::HiddenFromCreator);
        let resolver = FolderResolver::new(SettleBackoff::immediate(2));

        let outcome = resolver
            .resolve(&Arc::new(remote.clone()), &FolderHandle::root(), "docs")
            .await;

        assert!(matches!(outcome, ResolutionOutcome::Unresolvable));
        assert!(remote.folder_exists(&FolderHandle::root().child("docs")));
        assert_eq!(remote.stats().lookups, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn never_visible_folder_exhausts_every_tier() {
        let remote = MemoryRemote::new();
        remote.inject("docs", Fault::NeverVisible);
        let (resolver, reauth) = resolver(&remote);
        let started = tokio::time::Instant::now();

        let outcome = resolver
            .resolve(&Arc::new(remote.clone()), &FolderHandle::root(), "docs")
            .await;

        assert!(matches!(outcome, ResolutionOutcome::Unresolvable));
        assert_eq!(reauth.calls(), 1);
        assert!(started.elapsed() >= Duration::from_secs(3 + 5 + 7));
        // immediate + reconnect + three retries
        assert_eq!(remote.stats().lookups, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_reconnect_falls_through_to_retries() {
        let remote = MemoryRemote::new();
        remote.inject("docs", Fault::HiddenFor(2));
        let reauth = Arc::new(MemoryReauth::failing(&remote));
        let resolver = FolderResolver::new(SettleBackoff::default())
            .with_reauthenticator(Arc::clone(&reauth) as Arc<dyn Reauthenticator<MemoryRemote>>);

        let outcome = resolver
            .resolve(&Arc::new(remote.clone()), &FolderHandle::root(), "docs")
            .await;

        assert_eq!(outcome.tier(), Some(ResolutionTier::Retry(2)));
        assert_eq!(reauth.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unlistable_folder_is_not_usable() {
        let remote = MemoryRemote::new();
        remote.inject("docs", Fault::ListFails);
        let resolver = FolderResolver::new(SettleBackoff::immediate(2));

        let outcome = resolver
            .resolve(&Arc::new(remote.clone()), &FolderHandle::root(), "docs")
            .await;

        assert!(matches!(outcome, ResolutionOutcome::Unresolvable));
    }
}
