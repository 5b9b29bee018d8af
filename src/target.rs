//! A mounted export.
//!
//! Paths given to a [`Target`] are slash separated and relative to the root
//! of the export; a leading slash, empty components and `.` are ignored.
//! Every path is resolved one LOOKUP per component, since NFSv3 servers do
//! not parse paths.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};
use tracing_attributes::instrument;

use crate::config::ClientConfig;
use crate::dir::{DirPager, EntryPlus};
use crate::file::{FileReader, FileWriter};
use crate::handle::FileHandle;
use crate::protocol::nfs::v3;
use crate::protocol::rpc::{Auth, RpcClient};
use crate::protocol::xdr::nfs3::{
    dir::MKDIR3args, diropargs3, fattr3, file::createhow3, file::CREATE3args, fs::fsinfo3, ftype3,
    mode3, sattr3,
};
use crate::{Error, ErrorKind, Result};

/// Transfer size used when the server reports a preferred size of zero.
const DEFAULT_TRANSFER_SIZE: u32 = 32 * 1024;

/// Largest transfer that still fits a UDP reply together with its headers.
const MAX_DATAGRAM_TRANSFER_SIZE: u32 = 32 * 1024;

pub(crate) struct TargetInner {
    pub(crate) client: Arc<RpcClient>,
    pub(crate) auth: Auth,
    root: FileHandle,
    owns_connection: bool,
    closed: AtomicBool,
    pub(crate) read_size: u32,
    pub(crate) write_size: u32,
    pub(crate) dircount: u32,
    pub(crate) maxcount: u32,
}

/// A root file handle bound to a connection and a credential.
///
/// `Target` is cheap to clone; clones, streams and directory pagers all
/// share one closed flag, so closing the target stops every one of them.
#[derive(Clone)]
pub struct Target {
    pub(crate) inner: Arc<TargetInner>,
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Target")
            .field("peer", &self.inner.client.peer_addr())
            .field("root", &self.inner.root)
            .field("read_size", &self.inner.read_size)
            .field("write_size", &self.inner.write_size)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Target {
    /// Binds `root` to a connection the caller keeps ownership of.
    /// [`Target::close`] leaves the connection open.
    pub async fn with_connection(
        client: Arc<RpcClient>,
        root: FileHandle,
        auth: Auth,
        config: &ClientConfig,
    ) -> Result<Target> {
        Self::establish(client, root, auth, config, false).await
    }

    /// Queries FSINFO on `root` to size transfers and builds the target.
    pub(crate) async fn establish(
        client: Arc<RpcClient>,
        root: FileHandle,
        auth: Auth,
        config: &ClientConfig,
        owns_connection: bool,
    ) -> Result<Target> {
        let info = v3::nfsproc3_fsinfo(&client, &auth, &root.to_nfs()).await?;
        let datagram = client.is_datagram();
        let read_size = transfer_size(config.read_size, info.rtpref, info.rtmax, datagram);
        let write_size = transfer_size(config.write_size, info.wtpref, info.wtmax, datagram);
        info!(peer = %client.peer_addr(), read_size, write_size, "target ready");

        Ok(Target {
            inner: Arc::new(TargetInner {
                client,
                auth,
                root,
                owns_connection,
                closed: AtomicBool::new(false),
                read_size,
                write_size,
                dircount: config.readdir_dircount,
                maxcount: config.readdir_maxcount,
            }),
        })
    }

    pub fn root(&self) -> &FileHandle {
        &self.inner.root
    }

    pub fn auth(&self) -> &Auth {
        &self.inner.auth
    }

    /// Bytes requested per READ.
    pub fn read_size(&self) -> u32 {
        self.inner.read_size
    }

    /// Bytes sent per WRITE.
    pub fn write_size(&self) -> u32 {
        self.inner.write_size
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::TargetClosed);
        }
        Ok(())
    }

    pub(crate) fn client(&self) -> &RpcClient {
        &self.inner.client
    }

    /// Resolves `path` to a handle and the attributes of the object.
    #[instrument(skip(self))]
    pub async fn lookup(&self, path: &str) -> Result<(FileHandle, fattr3)> {
        self.ensure_open()?;
        let mut handle = self.inner.root.clone();
        let mut attrs = None;
        for name in components(path) {
            let (next, next_attrs) = self.lookup_in(&handle, name.as_bytes()).await?;
            handle = next;
            attrs = next_attrs;
        }
        let attrs = match attrs {
            Some(attrs) => attrs,
            None => self.getattr(&handle).await?,
        };
        Ok((handle, attrs))
    }

    /// Fetches the attributes of `handle`.
    pub async fn getattr(&self, handle: &FileHandle) -> Result<fattr3> {
        self.ensure_open()?;
        v3::nfsproc3_getattr(self.client(), self.auth(), &handle.to_nfs()).await
    }

    /// Re-reads the file system's static information.
    pub async fn fsinfo(&self) -> Result<fsinfo3> {
        self.ensure_open()?;
        v3::nfsproc3_fsinfo(self.client(), self.auth(), &self.inner.root.to_nfs()).await
    }

    /// Looks up one entry of `dir` by its raw name. Names listed by
    /// [`Target::read_dir_plus`] can be passed back here as
    /// [`EntryPlus::raw_name`] whether or not they are UTF-8.
    pub async fn lookup_name(&self, dir: &FileHandle, name: &[u8]) -> Result<FileHandle> {
        Ok(self.lookup_in(dir, name).await?.0)
    }

    /// Opens an existing file for reading.
    pub async fn open(&self, path: &str) -> Result<FileReader> {
        let (handle, attrs) = self.lookup(path).await?;
        debug!(path, ?handle, size = attrs.size, "opened for reading");
        Ok(FileReader::new(self.clone(), handle))
    }

    /// Opens a file already resolved to a handle, such as
    /// [`EntryPlus::handle`].
    pub fn open_handle(&self, handle: FileHandle) -> Result<FileReader> {
        self.ensure_open()?;
        Ok(FileReader::new(self.clone(), handle))
    }

    /// Opens `path` for writing, creating it with `mode` when it does not
    /// exist. An existing file is not truncated; writing starts at offset 0
    /// and overwrites in place.
    #[instrument(skip(self))]
    pub async fn open_file(&self, path: &str, mode: mode3) -> Result<FileWriter> {
        let (dir, name) = self.resolve_parent(path).await?;
        let handle = match self.lookup_in(&dir, name.as_bytes()).await {
            Ok((handle, _)) => handle,
            Err(e) if e.kind() == ErrorKind::NotFound => self.create_in(&dir, name, mode).await?,
            Err(e) => return Err(e),
        };
        Ok(FileWriter::new(self.clone(), handle))
    }

    /// Removes a file.
    #[instrument(skip(self))]
    pub async fn remove(&self, path: &str) -> Result<()> {
        let (dir, name) = self.resolve_parent(path).await?;
        self.remove_name(&dir, name.as_bytes()).await
    }

    /// Removes the file called `name` in `dir`, with the name given as the
    /// raw bytes the server listed.
    pub async fn remove_name(&self, dir: &FileHandle, name: &[u8]) -> Result<()> {
        self.ensure_open()?;
        let args = diropargs3 { dir: dir.to_nfs(), name: name.into() };
        v3::nfsproc3_remove(self.client(), self.auth(), &args).await?;
        Ok(())
    }

    /// Creates a directory and returns its handle.
    pub async fn mkdir(&self, path: &str, mode: mode3) -> Result<FileHandle> {
        let (dir, name) = self.resolve_parent(path).await?;
        let args = MKDIR3args {
            dirops: diropargs3 { dir: dir.to_nfs(), name: name.into() },
            attributes: sattr3 { mode: Some(mode), ..Default::default() },
        };
        let res = v3::nfsproc3_mkdir(self.client(), self.auth(), &args).await?;
        match res.obj {
            Some(fh) => Ok(FileHandle::from(&fh)),
            None => Ok(self.lookup_in(&dir, name.as_bytes()).await?.0),
        }
    }

    /// Removes an empty directory.
    pub async fn rmdir(&self, path: &str) -> Result<()> {
        let (dir, name) = self.resolve_parent(path).await?;
        let args = diropargs3 { dir: dir.to_nfs(), name: name.into() };
        v3::nfsproc3_rmdir(self.client(), self.auth(), &args).await?;
        Ok(())
    }

    /// Lists a whole directory, following cookies until the server marks
    /// the last page.
    #[instrument(skip(self))]
    pub async fn read_dir_plus(&self, path: &str) -> Result<Vec<EntryPlus>> {
        let mut pager = self.dir_pager(path).await?;
        let mut entries = Vec::new();
        while let Some(page) = pager.next_page().await? {
            entries.extend(page);
        }
        debug!(path, entries = entries.len(), pages = pager.pages_fetched(), "listed");
        Ok(entries)
    }

    /// A lazy listing of `path`, fetched one READDIRPLUS page at a time.
    pub async fn dir_pager(&self, path: &str) -> Result<DirPager> {
        let (handle, attrs) = self.lookup(path).await?;
        if attrs.ftype != ftype3::NF3DIR {
            return Err(Error::NotADirectory(path.to_string()));
        }
        Ok(DirPager::new(self.clone(), handle))
    }

    /// Detaches from the export. Streams and pagers of this target fail with
    /// [`Error::TargetClosed`] afterwards. The connection is closed only if
    /// the target was created by a mount; a shared connection stays open.
    pub async fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!(peer = %self.inner.client.peer_addr(), "closing target");
        if self.inner.owns_connection {
            self.inner.client.close().await?;
        }
        Ok(())
    }

    async fn lookup_in(
        &self,
        dir: &FileHandle,
        name: &[u8],
    ) -> Result<(FileHandle, Option<fattr3>)> {
        self.ensure_open()?;
        let args = diropargs3 { dir: dir.to_nfs(), name: name.into() };
        let res = v3::nfsproc3_lookup(self.client(), self.auth(), &args).await?;
        Ok((FileHandle::from(&res.object), res.obj_attributes))
    }

    async fn create_in(&self, dir: &FileHandle, name: &str, mode: mode3) -> Result<FileHandle> {
        let args = CREATE3args {
            dirops: diropargs3 { dir: dir.to_nfs(), name: name.into() },
            how: createhow3::UNCHECKED(sattr3 { mode: Some(mode), ..Default::default() }),
        };
        let res = v3::nfsproc3_create(self.client(), self.auth(), &args).await?;
        debug!(name, "created");
        match res.obj {
            Some(fh) => Ok(FileHandle::from(&fh)),
            // The server may omit the handle; ask for it.
            None => Ok(self.lookup_in(dir, name.as_bytes()).await?.0),
        }
    }

    /// Resolves everything but the last component of `path`.
    async fn resolve_parent<'p>(&self, path: &'p str) -> Result<(FileHandle, &'p str)> {
        self.ensure_open()?;
        let parts: Vec<&str> = components(path).collect();
        let Some((name, parents)) = parts.split_last() else {
            return Err(Error::InvalidArgument(format!("{path:?} does not name an entry")));
        };
        let mut dir = self.inner.root.clone();
        for component in parents {
            dir = self.lookup_in(&dir, component.as_bytes()).await?.0;
        }
        Ok((dir, *name))
    }
}

fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty() && *c != ".")
}

fn transfer_size(configured: Option<u32>, preferred: u32, max: u32, datagram: bool) -> u32 {
    let mut size = configured.unwrap_or(preferred);
    if size == 0 {
        size = DEFAULT_TRANSFER_SIZE;
    }
    if max > 0 {
        size = size.min(max);
    }
    if datagram {
        size = size.min(MAX_DATAGRAM_TRANSFER_SIZE);
    }
    size
}
