//! Directory listings over READDIRPLUS.

use std::fmt;

use futures::stream::{self, Stream, TryStreamExt};
use tracing::{debug, trace};

use crate::handle::FileHandle;
use crate::protocol::nfs::v3;
use crate::protocol::xdr::nfs3::{
    cookie3, cookieverf3, dir::entryplus3, dir::READDIRPLUS3args, fattr3, ftype3,
};
use crate::target::Target;
use crate::{Error, Result};

/// One directory entry with whatever attributes and handle the server sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryPlus {
    pub file_id: u64,
    /// The name for display; bytes that are not UTF-8 are replaced.
    pub name: String,
    /// The name exactly as the server sent it, for passing back to
    /// [`Target::lookup_name`] or [`Target::remove_name`].
    pub raw_name: Vec<u8>,
    /// Continuation point just past this entry.
    pub cookie: cookie3,
    pub attrs: Option<fattr3>,
    pub handle: Option<FileHandle>,
}

impl EntryPlus {
    pub fn size(&self) -> Option<u64> {
        self.attrs.map(|a| a.size)
    }

    pub fn is_dir(&self) -> bool {
        self.attrs.is_some_and(|a| a.ftype == ftype3::NF3DIR)
    }
}

impl From<entryplus3> for EntryPlus {
    fn from(entry: entryplus3) -> Self {
        EntryPlus {
            file_id: entry.fileid,
            name: entry.name.to_string(),
            raw_name: entry.name.0,
            cookie: entry.cookie,
            attrs: entry.name_attributes,
            handle: entry.name_handle.as_ref().map(FileHandle::from),
        }
    }
}

impl fmt::Display for EntryPlus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.attrs {
            Some(a) => write!(
                f,
                "{}\t{:?}\t{:o}\t{}:{}\t{}",
                self.name, a.ftype, a.mode, a.uid, a.gid, a.size
            ),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A directory listing fetched lazily, one READDIRPLUS page per call.
///
/// The pager echoes the last cookie and the cookie verifier of each page into
/// the next request and stops only when a page carries the EOF flag. A short
/// or empty page without that flag does not end the listing.
pub struct DirPager {
    target: Target,
    dir: FileHandle,
    cookie: cookie3,
    cookieverf: cookieverf3,
    done: bool,
    pages: usize,
}

impl DirPager {
    pub(crate) fn new(target: Target, dir: FileHandle) -> DirPager {
        DirPager {
            target,
            dir,
            cookie: 0,
            cookieverf: cookieverf3::default(),
            done: false,
            pages: 0,
        }
    }

    /// Fetches the next page, or `None` once the last page has been returned.
    /// A pager whose target was closed fails with [`Error::TargetClosed`]
    /// even when the listing was complete.
    ///
    /// A failed fetch leaves the position unchanged, so the same page can be
    /// asked for again.
    pub async fn next_page(&mut self) -> Result<Option<Vec<EntryPlus>>> {
        self.target.ensure_open()?;
        if self.done {
            return Ok(None);
        }
        let args = READDIRPLUS3args {
            dir: self.dir.to_nfs(),
            cookie: self.cookie,
            cookieverf: self.cookieverf,
            dircount: self.target.inner.dircount,
            maxcount: self.target.inner.maxcount,
        };
        let res =
            v3::nfsproc3_readdirplus(self.target.client(), self.target.auth(), &args).await?;
        self.pages += 1;
        self.cookieverf = res.cookieverf;
        self.done = res.reply.eof;

        let entries = res.reply.entries.0;
        match entries.last() {
            Some(last) => self.cookie = last.cookie,
            None if !self.done => {
                debug!(cookie = self.cookie, "empty page before end of directory")
            }
            None => {}
        }
        trace!(page = self.pages, entries = entries.len(), eof = self.done, "directory page");
        Ok(Some(entries.into_iter().map(EntryPlus::from).collect()))
    }

    /// Starts the listing over from the first entry.
    pub fn restart(&mut self) {
        self.cookie = 0;
        self.cookieverf = cookieverf3::default();
        self.done = false;
    }

    /// True once the page carrying the EOF flag has been returned.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Number of READDIRPLUS calls that succeeded so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages
    }

    pub fn dir(&self) -> &FileHandle {
        &self.dir
    }

    /// Flattens the remaining pages into a stream of entries.
    pub fn into_stream(self) -> impl Stream<Item = Result<EntryPlus>> {
        stream::try_unfold(self, |mut pager| async move {
            let page = pager.next_page().await?;
            Ok::<_, Error>(page.map(|page| {
                (stream::iter(page.into_iter().map(Ok::<EntryPlus, Error>)), pager)
            }))
        })
        .try_flatten()
    }
}
