use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;

use crate::remote::{
    ByteStream, EntryKind, FileHandle, FolderHandle, Reauthenticator, RemoteEntry, RemoteError,
    RemoteNode, RemoteStorage,
};

/// Misbehaviour attached to a name; applies wherever that name appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    CreateFails,
    /// Create succeeds but reports "already exists".
    CreateReportsExisting,
    /// The folder stays invisible to the session that created it.
    HiddenFromCreator,
    /// The first `n` lookups of the folder report it missing.
    HiddenFor(u32),
    NeverVisible,
    ListFails,
    DeleteFails,
    UploadFails,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub lookups: usize,
    pub lists: usize,
    pub creates: usize,
    pub uploads: usize,
    pub deletes: usize,
}

#[derive(Default)]
struct State {
    folders: BTreeSet<Vec<String>>,
    files: BTreeMap<(Vec<String>, String), Vec<u8>>,
    created_by: HashMap<Vec<String>, usize>,
    hidden_lookups: HashMap<Vec<String>, u32>,
    faults: HashMap<String, Fault>,
    delete_counts: HashMap<(Vec<String>, String), usize>,
    listed: HashMap<Vec<String>, usize>,
    root_unlistable: bool,
    stats: Stats,
}

impl State {
    fn fault(&self, name: &str) -> Option<Fault> {
        self.faults.get(name).copied()
    }

    fn folder_visible(&self, path: &[String], session: usize) -> bool {
        if path.is_empty() {
            return true;
        }
        if !self.folders.contains(path) {
            return false;
        }
        let name = &path[path.len() - 1];
        match self.fault(name) {
            Some(Fault::NeverVisible) => false,
            Some(Fault::HiddenFromCreator) => self.created_by.get(path) != Some(&session),
            Some(Fault::HiddenFor(_)) => self.hidden_lookups.get(path).copied().unwrap_or(0) == 0,
            _ => true,
        }
    }
}

/// In-memory remote disk shared by every session created from it.
#[derive(Clone)]
pub struct MemoryRemote {
    state: Arc<Mutex<State>>,
    session: usize,
}

impl MemoryRemote {
    pub fn new() -> Self {
        let mut state = State::default();
        state.folders.insert(Vec::new());
        Self {
            state: Arc::new(Mutex::new(state)),
            session: 0,
        }
    }

    pub fn session(&self) -> usize {
        self.session
    }

    pub fn inject(&self, name: &str, fault: Fault) {
        self.state
            .lock()
            .unwrap()
            .faults
            .insert(name.to_string(), fault);
    }

    pub fn set_root_unlistable(&self) {
        self.state.lock().unwrap().root_unlistable = true;
    }

    pub fn seed_folder(&self, parent: &FolderHandle, name: &str) -> FolderHandle {
        let folder = parent.child(name);
        self.state
            .lock()
            .unwrap()
            .folders
            .insert(folder.segments().to_vec());
        folder
    }

    pub fn seed_file(&self, folder: &FolderHandle, name: &str, bytes: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .files
            .insert((folder.segments().to_vec(), name.to_string()), bytes.to_vec());
    }

    pub fn folder_exists(&self, folder: &FolderHandle) -> bool {
        self.state.lock().unwrap().folders.contains(folder.segments())
    }

    pub fn file_contents(&self, folder: &FolderHandle, name: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .files
            .get(&(folder.segments().to_vec(), name.to_string()))
            .cloned()
    }

    pub fn file_names(&self, folder: &FolderHandle) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .files
            .keys()
            .filter(|(path, _)| path.as_slice() == folder.segments())
            .map(|(_, name)| name.clone())
            .collect()
    }

    pub fn file_count(&self) -> usize {
        self.state.lock().unwrap().files.len()
    }

    pub fn max_deletes_per_file(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .delete_counts
            .values()
            .copied()
            .max()
            .unwrap_or(0)
    }

    /// Listings of `folder` that returned entries.
    pub fn successful_lists(&self, folder: &FolderHandle) -> usize {
        self.state
            .lock()
            .unwrap()
            .listed
            .get(folder.segments())
            .copied()
            .unwrap_or(0)
    }

    pub fn stats(&self) -> Stats {
        self.state.lock().unwrap().stats
    }

    pub fn reset_stats(&self) {
        let mut state = self.state.lock().unwrap();
        state.stats = Stats::default();
        state.delete_counts.clear();
        state.listed.clear();
    }
}

#[async_trait]
impl RemoteStorage for MemoryRemote {
    async fn list(&self, folder: &FolderHandle) -> Result<Vec<RemoteEntry>, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.stats.lists += 1;
        let path = folder.segments();
        if path.is_empty() && state.root_unlistable {
            return Err(RemoteError::Transient("root listing refused".into()));
        }
        if let Some(name) = folder.name()
            && state.fault(name) == Some(Fault::ListFails)
        {
            return Err(RemoteError::Transient(format!("{folder} cannot be listed")));
        }
        if !state.folder_visible(path, self.session) {
            return Err(RemoteError::NotFound(folder.to_string()));
        }
        let mut entries: Vec<RemoteEntry> = state
            .folders
            .iter()
            .filter(|candidate| {
                candidate.len() == path.len() + 1
                    && candidate.starts_with(path)
                    && state.folder_visible(candidate, self.session)
            })
            .map(|candidate| RemoteEntry {
                name: candidate[path.len()].clone(),
                kind: EntryKind::Folder,
            })
            .collect();
        entries.extend(
            state
                .files
                .keys()
                .filter(|(parent, _)| parent.as_slice() == path)
                .map(|(_, name)| RemoteEntry {
                    name: name.clone(),
                    kind: EntryKind::File,
                }),
        );
        *state.listed.entry(path.to_vec()).or_default() += 1;
        Ok(entries)
    }

    async fn create_folder(&self, parent: &FolderHandle, name: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.stats.creates += 1;
        let path = parent.child(name).segments().to_vec();
        match state.fault(name) {
            Some(Fault::CreateFails) => {
                return Err(RemoteError::Failed(format!("create {name} rejected")));
            }
            Some(Fault::HiddenFor(n)) => {
                state.hidden_lookups.insert(path.clone(), n);
            }
            _ => {}
        }
        if !state.folders.contains(parent.segments()) {
            return Err(RemoteError::NotFound(parent.to_string()));
        }
        if !state.folders.insert(path.clone()) {
            return Err(RemoteError::AlreadyExists(name.to_string()));
        }
        state.created_by.insert(path, self.session);
        if state.fault(name) == Some(Fault::CreateReportsExisting) {
            return Err(RemoteError::AlreadyExists(name.to_string()));
        }
        Ok(())
    }

    async fn child(&self, parent: &FolderHandle, name: &str) -> Result<RemoteNode, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.stats.lookups += 1;
        let key = (parent.segments().to_vec(), name.to_string());
        if let Some(bytes) = state.files.get(&key) {
            return Ok(RemoteNode::File(FileHandle {
                folder: parent.clone(),
                name: name.to_string(),
                size: Some(bytes.len() as u64),
            }));
        }
        let folder = parent.child(name);
        if let Some(remaining) = state.hidden_lookups.get_mut(folder.segments())
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(RemoteError::NotFound(folder.to_string()));
        }
        if state.folder_visible(folder.segments(), self.session) {
            Ok(RemoteNode::Folder(folder))
        } else {
            Err(RemoteError::NotFound(folder.to_string()))
        }
    }

    async fn upload_file(
        &self,
        folder: &FolderHandle,
        name: &str,
        mut body: ByteStream,
        _size: u64,
    ) -> Result<(), RemoteError> {
        self.state.lock().unwrap().stats.uploads += 1;
        let mut bytes = Vec::new();
        body.read_to_end(&mut bytes).await?;
        let mut state = self.state.lock().unwrap();
        if state.fault(name) == Some(Fault::UploadFails) {
            return Err(RemoteError::Transient(format!("upload of {name} dropped")));
        }
        if !state.folders.contains(folder.segments()) {
            return Err(RemoteError::NotFound(folder.to_string()));
        }
        let key = (folder.segments().to_vec(), name.to_string());
        if state.files.contains_key(&key) {
            return Err(RemoteError::AlreadyExists(name.to_string()));
        }
        state.files.insert(key, bytes);
        Ok(())
    }

    async fn delete_file(&self, file: &FileHandle) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.stats.deletes += 1;
        if state.fault(&file.name) == Some(Fault::DeleteFails) {
            return Err(RemoteError::Failed(format!("delete of {} refused", file.name)));
        }
        let key = (file.folder.segments().to_vec(), file.name.clone());
        *state.delete_counts.entry(key.clone()).or_default() += 1;
        match state.files.remove(&key) {
            Some(_) => Ok(()),
            None => Err(RemoteError::NotFound(file.name.clone())),
        }
    }
}

/// Hands out new sessions over the same [`MemoryRemote`] state.
pub struct MemoryReauth {
    base: MemoryRemote,
    fails: bool,
    calls: AtomicUsize,
}

impl MemoryReauth {
    pub fn new(base: &MemoryRemote) -> Self {
        Self {
            base: base.clone(),
            fails: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(base: &MemoryRemote) -> Self {
        Self {
            fails: true,
            ..Self::new(base)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Reauthenticator<MemoryRemote> for MemoryReauth {
    async fn reconnect(&self) -> Result<Arc<MemoryRemote>, RemoteError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fails {
            return Err(RemoteError::Unauthorized("credentials rejected".into()));
        }
        Ok(Arc::new(MemoryRemote {
            state: Arc::clone(&self.base.state),
            session: self.base.session + call + 1,
        }))
    }
}
