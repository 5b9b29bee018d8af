//! In-process fake server speaking PORTMAP, MOUNT and NFSv3 on one loopback
//! TCP listener (and optionally a UDP socket on the same port), backed by an
//! in-memory tree.
#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::task::JoinHandle;

use nfs_mamont_client::protocol::rpc::{read_record, write_fragment};
use nfs_mamont_client::xdr::mount::{exportnode, mountres3, mountres3_ok, mountstat3};
use nfs_mamont_client::xdr::nfs3::dir::{
    diropres3ok, dirlistplus3, entryplus3, LOOKUP3resok, READDIRPLUS3resok,
};
use nfs_mamont_client::xdr::nfs3::file::{
    createhow3, stable_how, COMMIT3resok, READ3resok, WRITE3resok,
};
use nfs_mamont_client::xdr::nfs3::fs::{fsinfo3, FSF_CANSETTIME, FSF_HOMOGENEOUS};
use nfs_mamont_client::xdr::nfs3::{
    diropargs3, fattr3, ftype3, nfs_fh3, nfsstat3, nfstime3, wcc_data, Res3,
};
use nfs_mamont_client::xdr::portmap::{mapping, IPPROTO_TCP, IPPROTO_UDP};
use nfs_mamont_client::xdr::rpc::{
    accept_body, auth_stat, call_body, mismatch_info, rejected_reply, rpc_body, rpc_msg,
};
use nfs_mamont_client::xdr::{self, mount, nfs3, portmap, List, Serialize};
use nfs_mamont_client::{Auth, ClientConfig};

pub const EXPORT: &str = "/export";
pub const PRIVATE_EXPORT: &str = "/private";

/// Program used to drive the RPC layer into its corner cases.
pub const TEST_PROG: u32 = 0x2000_4d4d;
pub const TEST_VERS: u32 = 1;
/// Replies after [`SLOW_DELAY`].
pub const PROC_SLOW: u32 = 1;
/// Never replies.
pub const PROC_SILENT: u32 = 2;
/// Denies with AUTH_BADCRED.
pub const PROC_DENY: u32 = 3;
/// Succeeds with a body too short for a u32.
pub const PROC_TRUNCATED: u32 = 4;
/// Returns its u32 argument.
pub const PROC_ECHO: u32 = 5;
/// Succeeds with the u32 9, which no `stable_how` arm matches.
pub const PROC_BAD_ENUM: u32 = 6;
pub const SLOW_DELAY: Duration = Duration::from_millis(300);

pub const WRITE_VERF: [u8; 8] = *b"mamontvf";
pub const COOKIE_VERF: [u8; 8] = *b"cookieok";
const ROOT_ID: u64 = 1;
const FH_PREFIX: &[u8] = b"mamont";

#[derive(Clone, Debug)]
pub struct ServerOptions {
    /// Entries per READDIRPLUS page.
    pub page_capacity: usize,
    /// Flavors advertised by MNT.
    pub auth_flavors: Vec<u32>,
    /// Largest WRITE accepted in one call; the rest is cut short.
    pub write_limit: Option<usize>,
    /// Stability reported by WRITE; `None` echoes the request.
    pub committed: Option<stable_how>,
    /// CREATE and MKDIR leave out the new handle.
    pub omit_new_handles: bool,
    /// Empty, non-final READDIRPLUS pages served before real ones.
    pub empty_pages: usize,
    pub rtpref: u32,
    pub wtpref: u32,
    /// Also answer datagrams on the listener's port, and say so in GETPORT.
    pub serve_udp: bool,
    /// Each TCP connection waits this long before reading anything.
    pub read_delay: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            page_capacity: 4,
            auth_flavors: vec![0, 1],
            write_limit: None,
            committed: None,
            omit_new_handles: false,
            empty_pages: 0,
            rtpref: 256,
            wtpref: 256,
            serve_udp: false,
            read_delay: Duration::ZERO,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Stats {
    pub xids: Vec<u32>,
    pub mounts: Vec<String>,
    pub unmounts: Vec<String>,
    pub getport_calls: usize,
    pub readdirplus_calls: usize,
    pub read_calls: usize,
    pub write_calls: usize,
    pub commit_calls: usize,
    pub write_stability: Vec<stable_how>,
}

#[derive(Clone, Debug)]
enum Node {
    File { data: Vec<u8>, mode: u32 },
    Dir { entries: Vec<(Vec<u8>, u64)>, mode: u32 },
}

struct Fs {
    nodes: HashMap<u64, Node>,
    next_id: u64,
}

impl Fs {
    fn new() -> Fs {
        let mut nodes = HashMap::new();
        nodes.insert(ROOT_ID, Node::Dir { entries: Vec::new(), mode: 0o755 });
        Fs { nodes, next_id: ROOT_ID + 1 }
    }

    fn attr(&self, id: u64) -> Option<fattr3> {
        let (ftype, mode, size) = match self.nodes.get(&id)? {
            Node::File { data, mode } => (ftype3::NF3REG, *mode, data.len() as u64),
            Node::Dir { entries, mode } => (ftype3::NF3DIR, *mode, entries.len() as u64 * 32),
        };
        Some(fattr3 {
            ftype,
            mode,
            nlink: 1,
            uid: 1000,
            gid: 1000,
            size,
            used: size,
            fsid: 1,
            fileid: id,
            ..Default::default()
        })
    }

    fn child(&self, dir: u64, name: &[u8]) -> Result<u64, nfsstat3> {
        match self.nodes.get(&dir) {
            None => Err(nfsstat3::NFS3ERR_STALE),
            Some(Node::File { .. }) => Err(nfsstat3::NFS3ERR_NOTDIR),
            Some(Node::Dir { entries, .. }) => entries
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, id)| *id)
                .ok_or(nfsstat3::NFS3ERR_NOENT),
        }
    }

    fn insert(&mut self, dir: u64, name: &[u8], node: Node) -> Result<u64, nfsstat3> {
        let id = self.next_id;
        match self.nodes.get_mut(&dir) {
            Some(Node::Dir { entries, .. }) => {
                if entries.iter().any(|(n, _)| n == name) {
                    return Err(nfsstat3::NFS3ERR_EXIST);
                }
                entries.push((name.to_vec(), id));
            }
            Some(Node::File { .. }) => return Err(nfsstat3::NFS3ERR_NOTDIR),
            None => return Err(nfsstat3::NFS3ERR_STALE),
        }
        self.next_id += 1;
        self.nodes.insert(id, node);
        Ok(id)
    }

    fn unlink(&mut self, dir: u64, name: &[u8]) {
        if let Some(Node::Dir { entries, .. }) = self.nodes.get_mut(&dir) {
            if let Some(pos) = entries.iter().position(|(n, _)| n == name) {
                let (_, id) = entries.remove(pos);
                self.nodes.remove(&id);
            }
        }
    }

    fn resolve(&self, path: &str) -> Option<u64> {
        let mut id = ROOT_ID;
        for name in path.split('/').filter(|c| !c.is_empty()) {
            id = self.child(id, name.as_bytes()).ok()?;
        }
        Some(id)
    }

    fn resolve_parent<'p>(&self, path: &'p str) -> Option<(u64, &'p str)> {
        let trimmed = path.trim_end_matches('/');
        let (parent, name) = trimmed.rsplit_once('/').unwrap_or(("", trimmed));
        Some((self.resolve(parent)?, name))
    }
}

pub fn fh(id: u64) -> nfs_fh3 {
    nfs_fh3 { data: [FH_PREFIX, &id.to_be_bytes()].concat() }
}

enum Reply {
    Success(Vec<u8>),
    Delayed(Vec<u8>, Duration),
    Accept(accept_body),
    Deny(rejected_reply),
    Silent,
}

fn ok<T: Serialize + ?Sized>(value: &T) -> Reply {
    Reply::Success(xdr::to_bytes(value).expect("encode reply"))
}

macro_rules! args {
    ($src:expr) => {
        match xdr::deserialize($src) {
            Ok(args) => args,
            Err(_) => return Reply::Accept(accept_body::GARBAGE_ARGS),
        }
    };
}

struct State {
    fs: Fs,
    stats: Stats,
    options: ServerOptions,
    port: u16,
    empty_pages_left: usize,
}

impl State {
    fn id(&self, fh: &nfs_fh3) -> Result<u64, nfsstat3> {
        let Some(raw) = fh.data.strip_prefix(FH_PREFIX) else {
            return Err(nfsstat3::NFS3ERR_BADHANDLE);
        };
        let bytes: [u8; 8] = raw.try_into().map_err(|_| nfsstat3::NFS3ERR_BADHANDLE)?;
        let id = u64::from_be_bytes(bytes);
        if self.fs.nodes.contains_key(&id) {
            Ok(id)
        } else {
            Err(nfsstat3::NFS3ERR_STALE)
        }
    }

    fn wcc(&self, dir: u64) -> wcc_data {
        wcc_data { before: None, after: self.fs.attr(dir) }
    }

    fn dispatch(&mut self, call: &call_body, src: &mut Cursor<&[u8]>) -> Reply {
        match call.prog {
            portmap::PROGRAM => self.portmap(call, src),
            mount::PROGRAM => self.mount(call, src),
            nfs3::PROGRAM => self.nfs(call, src),
            TEST_PROG => self.test_prog(call, src),
            _ => Reply::Accept(accept_body::PROG_UNAVAIL),
        }
    }

    fn portmap(&mut self, call: &call_body, src: &mut Cursor<&[u8]>) -> Reply {
        if call.vers != portmap::VERSION {
            return Reply::Accept(accept_body::PROG_MISMATCH(mismatch_info { low: 2, high: 2 }));
        }
        match call.proc {
            0 => ok(&()),
            3 => {
                self.stats.getport_calls += 1;
                let m: mapping = args!(src);
                let known = m.prog == mount::PROGRAM || m.prog == nfs3::PROGRAM;
                let served =
                    m.prot == IPPROTO_TCP || (m.prot == IPPROTO_UDP && self.options.serve_udp);
                let port = if known && served { self.port as u32 } else { 0 };
                ok(&port)
            }
            _ => Reply::Accept(accept_body::PROC_UNAVAIL),
        }
    }

    fn mount(&mut self, call: &call_body, src: &mut Cursor<&[u8]>) -> Reply {
        if call.vers != mount::VERSION {
            return Reply::Accept(accept_body::PROG_MISMATCH(mismatch_info { low: 3, high: 3 }));
        }
        match call.proc {
            0 => ok(&()),
            1 => {
                let path: Vec<u8> = args!(src);
                let path = String::from_utf8_lossy(&path).into_owned();
                self.stats.mounts.push(path.clone());
                let res = match path.as_str() {
                    EXPORT => mountres3::Ok(mountres3_ok {
                        fhandle: fh(ROOT_ID).data,
                        auth_flavors: self.options.auth_flavors.clone(),
                    }),
                    PRIVATE_EXPORT => mountres3::Err(mountstat3::MNT3ERR_ACCES),
                    _ => mountres3::Err(mountstat3::MNT3ERR_NOENT),
                };
                ok(&res)
            }
            3 => {
                let path: Vec<u8> = args!(src);
                self.stats.unmounts.push(String::from_utf8_lossy(&path).into_owned());
                ok(&())
            }
            5 => {
                let exports = List(vec![
                    exportnode { ex_dir: EXPORT.as_bytes().to_vec(), ex_groups: List(vec![]) },
                    exportnode {
                        ex_dir: PRIVATE_EXPORT.as_bytes().to_vec(),
                        ex_groups: List(vec![b"trusted".to_vec(), b"10.0.0.0/8".to_vec()]),
                    },
                ]);
                ok(&exports)
            }
            _ => Reply::Accept(accept_body::PROC_UNAVAIL),
        }
    }

    fn nfs(&mut self, call: &call_body, src: &mut Cursor<&[u8]>) -> Reply {
        if call.vers != nfs3::VERSION {
            return Reply::Accept(accept_body::PROG_MISMATCH(mismatch_info { low: 3, high: 3 }));
        }
        match call.proc {
            0 => ok(&()),
            1 => {
                let handle: nfs_fh3 = args!(src);
                let res: nfs3::GETATTR3res = match self.id(&handle) {
                    Ok(id) => Res3::Ok(self.fs.attr(id).unwrap_or_default()),
                    Err(stat) => Res3::Fail(stat, ()),
                };
                ok(&res)
            }
            3 => {
                let args: diropargs3 = args!(src);
                ok(&self.lookup(&args))
            }
            6 => {
                let args: nfs3::file::READ3args = args!(src);
                ok(&self.read(&args))
            }
            7 => {
                let args: nfs3::file::WRITE3args = args!(src);
                ok(&self.write(&args))
            }
            8 => {
                let args: nfs3::file::CREATE3args = args!(src);
                ok(&self.create(&args))
            }
            9 => {
                let args: nfs3::dir::MKDIR3args = args!(src);
                ok(&self.mkdir(&args))
            }
            12 => {
                let args: diropargs3 = args!(src);
                ok(&self.remove(&args, false))
            }
            13 => {
                let args: diropargs3 = args!(src);
                ok(&self.remove(&args, true))
            }
            17 => {
                let args: nfs3::dir::READDIRPLUS3args = args!(src);
                ok(&self.readdirplus(&args))
            }
            19 => {
                let handle: nfs_fh3 = args!(src);
                ok(&self.fsinfo(&handle))
            }
            21 => {
                let args: nfs3::file::COMMIT3args = args!(src);
                self.stats.commit_calls += 1;
                let res: nfs3::file::COMMIT3res = match self.id(&args.file) {
                    Ok(id) => Res3::Ok(COMMIT3resok { file_wcc: self.wcc(id), verf: WRITE_VERF }),
                    Err(stat) => Res3::Fail(stat, wcc_data::default()),
                };
                ok(&res)
            }
            _ => Reply::Accept(accept_body::PROC_UNAVAIL),
        }
    }

    fn test_prog(&mut self, call: &call_body, src: &mut Cursor<&[u8]>) -> Reply {
        match call.proc {
            0 => ok(&()),
            PROC_SLOW => Reply::Delayed(Vec::new(), SLOW_DELAY),
            PROC_SILENT => Reply::Silent,
            PROC_DENY => Reply::Deny(rejected_reply::AUTH_ERROR(auth_stat::AUTH_BADCRED)),
            PROC_TRUNCATED => Reply::Success(vec![0, 0]),
            PROC_ECHO => {
                let value: u32 = args!(src);
                ok(&value)
            }
            PROC_BAD_ENUM => ok(&9_u32),
            _ => Reply::Accept(accept_body::PROC_UNAVAIL),
        }
    }

    fn lookup(&self, args: &diropargs3) -> nfs3::dir::LOOKUP3res {
        let dir = match self.id(&args.dir) {
            Ok(id) => id,
            Err(stat) => return Res3::Fail(stat, None),
        };
        match self.fs.child(dir, &args.name) {
            Ok(id) => Res3::Ok(LOOKUP3resok {
                object: fh(id),
                obj_attributes: self.fs.attr(id),
                dir_attributes: self.fs.attr(dir),
            }),
            Err(stat) => Res3::Fail(stat, self.fs.attr(dir)),
        }
    }

    fn read(&mut self, args: &nfs3::file::READ3args) -> nfs3::file::READ3res {
        self.stats.read_calls += 1;
        let id = match self.id(&args.file) {
            Ok(id) => id,
            Err(stat) => return Res3::Fail(stat, None),
        };
        match self.fs.nodes.get(&id) {
            Some(Node::File { data, .. }) => {
                let start = (args.offset as usize).min(data.len());
                let end = start.saturating_add(args.count as usize).min(data.len());
                Res3::Ok(READ3resok {
                    file_attributes: self.fs.attr(id),
                    count: (end - start) as u32,
                    eof: end == data.len(),
                    data: data[start..end].to_vec(),
                })
            }
            _ => Res3::Fail(nfsstat3::NFS3ERR_ISDIR, self.fs.attr(id)),
        }
    }

    fn write(&mut self, args: &nfs3::file::WRITE3args) -> nfs3::file::WRITE3res {
        self.stats.write_calls += 1;
        self.stats.write_stability.push(args.stable);
        let id = match self.id(&args.file) {
            Ok(id) => id,
            Err(stat) => return Res3::Fail(stat, wcc_data::default()),
        };
        let accepted = match self.options.write_limit {
            Some(limit) => args.data.len().min(limit),
            None => args.data.len(),
        };
        match self.fs.nodes.get_mut(&id) {
            Some(Node::File { data, .. }) => {
                let start = args.offset as usize;
                let end = start + accepted;
                if data.len() < end {
                    data.resize(end, 0);
                }
                data[start..end].copy_from_slice(&args.data[..accepted]);
            }
            _ => return Res3::Fail(nfsstat3::NFS3ERR_ISDIR, wcc_data::default()),
        }
        Res3::Ok(WRITE3resok {
            file_wcc: self.wcc(id),
            count: accepted as u32,
            committed: self.options.committed.unwrap_or(args.stable),
            verf: WRITE_VERF,
        })
    }

    fn create(&mut self, args: &nfs3::file::CREATE3args) -> nfs3::file::CREATE3res {
        let dir = match self.id(&args.dirops.dir) {
            Ok(id) => id,
            Err(stat) => return Res3::Fail(stat, wcc_data::default()),
        };
        let name = args.dirops.name.0.clone();
        let (mode, guarded) = match &args.how {
            createhow3::UNCHECKED(attr) => (attr.mode, false),
            createhow3::GUARDED(attr) => (attr.mode, true),
            createhow3::EXCLUSIVE(_) => (None, true),
        };
        match self.fs.child(dir, &name) {
            Ok(id) if !guarded => return Res3::Ok(self.new_object(id, dir)),
            Ok(_) => return Res3::Fail(nfsstat3::NFS3ERR_EXIST, self.wcc(dir)),
            Err(nfsstat3::NFS3ERR_NOENT) => {}
            Err(stat) => return Res3::Fail(stat, self.wcc(dir)),
        }
        let node = Node::File { data: Vec::new(), mode: mode.unwrap_or(0o644) };
        match self.fs.insert(dir, &name, node) {
            Ok(id) => Res3::Ok(self.new_object(id, dir)),
            Err(stat) => Res3::Fail(stat, self.wcc(dir)),
        }
    }

    fn mkdir(&mut self, args: &nfs3::dir::MKDIR3args) -> nfs3::dir::MKDIR3res {
        let dir = match self.id(&args.dirops.dir) {
            Ok(id) => id,
            Err(stat) => return Res3::Fail(stat, wcc_data::default()),
        };
        let node = Node::Dir { entries: Vec::new(), mode: args.attributes.mode.unwrap_or(0o755) };
        match self.fs.insert(dir, &args.dirops.name, node) {
            Ok(id) => Res3::Ok(self.new_object(id, dir)),
            Err(stat) => Res3::Fail(stat, self.wcc(dir)),
        }
    }

    fn new_object(&self, id: u64, dir: u64) -> diropres3ok {
        diropres3ok {
            obj: if self.options.omit_new_handles { None } else { Some(fh(id)) },
            obj_attributes: self.fs.attr(id),
            dir_wcc: self.wcc(dir),
        }
    }

    fn remove(&mut self, args: &diropargs3, dir_only: bool) -> Res3<wcc_data, wcc_data> {
        let dir = match self.id(&args.dir) {
            Ok(id) => id,
            Err(stat) => return Res3::Fail(stat, wcc_data::default()),
        };
        let name = args.name.0.clone();
        let id = match self.fs.child(dir, &name) {
            Ok(id) => id,
            Err(stat) => return Res3::Fail(stat, self.wcc(dir)),
        };
        let refusal = match (self.fs.nodes.get(&id), dir_only) {
            (Some(Node::Dir { .. }), false) => Some(nfsstat3::NFS3ERR_ISDIR),
            (Some(Node::File { .. }), true) => Some(nfsstat3::NFS3ERR_NOTDIR),
            (Some(Node::Dir { entries, .. }), true) if !entries.is_empty() => {
                Some(nfsstat3::NFS3ERR_NOTEMPTY)
            }
            _ => None,
        };
        if let Some(stat) = refusal {
            return Res3::Fail(stat, self.wcc(dir));
        }
        self.fs.unlink(dir, &name);
        Res3::Ok(self.wcc(dir))
    }

    fn readdirplus(&mut self, args: &nfs3::dir::READDIRPLUS3args) -> nfs3::dir::READDIRPLUS3res {
        self.stats.readdirplus_calls += 1;
        let dir = match self.id(&args.dir) {
            Ok(id) => id,
            Err(stat) => return Res3::Fail(stat, None),
        };
        let entries = match self.fs.nodes.get(&dir) {
            Some(Node::Dir { entries, .. }) => entries.clone(),
            _ => return Res3::Fail(nfsstat3::NFS3ERR_NOTDIR, self.fs.attr(dir)),
        };
        if args.cookie != 0 && args.cookieverf != COOKIE_VERF {
            return Res3::Fail(nfsstat3::NFS3ERR_BAD_COOKIE, self.fs.attr(dir));
        }
        let start = args.cookie as usize;
        if start > entries.len() {
            return Res3::Fail(nfsstat3::NFS3ERR_BAD_COOKIE, self.fs.attr(dir));
        }
        let end = if self.empty_pages_left > 0 {
            self.empty_pages_left -= 1;
            start
        } else {
            (start + self.options.page_capacity).min(entries.len())
        };
        let page = entries[start..end]
            .iter()
            .enumerate()
            .map(|(i, (name, id))| entryplus3 {
                fileid: *id,
                name: name.as_slice().into(),
                cookie: (start + i + 1) as u64,
                name_attributes: self.fs.attr(*id),
                name_handle: Some(fh(*id)),
            })
            .collect();
        Res3::Ok(READDIRPLUS3resok {
            dir_attributes: self.fs.attr(dir),
            cookieverf: COOKIE_VERF,
            reply: dirlistplus3 { entries: List(page), eof: end == entries.len() },
        })
    }

    fn fsinfo(&self, handle: &nfs_fh3) -> nfs3::fs::FSINFO3res {
        match self.id(handle) {
            Ok(id) => Res3::Ok(fsinfo3 {
                obj_attributes: self.fs.attr(id),
                rtmax: 65536,
                rtpref: self.options.rtpref,
                rtmult: 4,
                wtmax: 65536,
                wtpref: self.options.wtpref,
                wtmult: 4,
                dtpref: 8192,
                maxfilesize: u64::MAX,
                time_delta: nfstime3 { seconds: 0, nseconds: 1 },
                properties: FSF_HOMOGENEOUS | FSF_CANSETTIME,
            }),
            Err(stat) => Res3::Fail(stat, None),
        }
    }
}

/// A running fake server. Dropping it stops accepting connections.
pub struct FakeServer {
    addr: SocketAddr,
    state: Arc<Mutex<State>>,
    tasks: Vec<JoinHandle<()>>,
}

impl FakeServer {
    pub async fn start() -> FakeServer {
        Self::start_with(ServerOptions::default()).await
    }

    pub async fn start_with(options: ServerOptions) -> FakeServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fake server");
        let addr = listener.local_addr().expect("local addr");
        let udp = if options.serve_udp {
            Some(UdpSocket::bind(addr).await.expect("bind fake server datagram port"))
        } else {
            None
        };
        let state = Arc::new(Mutex::new(State {
            fs: Fs::new(),
            stats: Stats::default(),
            empty_pages_left: options.empty_pages,
            options,
            port: addr.port(),
        }));
        let mut tasks = vec![tokio::spawn(accept_loop(listener, state.clone()))];
        if let Some(socket) = udp {
            tasks.push(tokio::spawn(serve_datagrams(Arc::new(socket), state.clone())));
        }
        FakeServer { addr, state, tasks }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Client configuration whose portmapper is this server.
    pub fn config(&self) -> ClientConfig {
        ClientConfig { portmap_port: self.port(), timeout_ms: 2000, ..Default::default() }
    }

    pub fn stats(&self) -> Stats {
        self.state.lock().unwrap().stats.clone()
    }

    pub fn add_file(&self, path: &str, data: &[u8]) {
        let mut state = self.state.lock().unwrap();
        let (dir, name) = state.fs.resolve_parent(path).expect("parent exists");
        let node = Node::File { data: data.to_vec(), mode: 0o644 };
        state.fs.insert(dir, name.as_bytes(), node).expect("insert file");
    }

    /// Adds a file to the root under a name that need not be UTF-8.
    pub fn add_file_named(&self, name: &[u8], data: &[u8]) {
        let mut state = self.state.lock().unwrap();
        let node = Node::File { data: data.to_vec(), mode: 0o644 };
        state.fs.insert(ROOT_ID, name, node).expect("insert file");
    }

    pub fn add_dir(&self, path: &str) {
        let mut state = self.state.lock().unwrap();
        let (dir, name) = state.fs.resolve_parent(path).expect("parent exists");
        let node = Node::Dir { entries: Vec::new(), mode: 0o755 };
        state.fs.insert(dir, name.as_bytes(), node).expect("insert dir");
    }

    /// Removes a node behind the client's back.
    pub fn delete(&self, path: &str) {
        let mut state = self.state.lock().unwrap();
        let (dir, name) = state.fs.resolve_parent(path).expect("parent exists");
        state.fs.unlink(dir, name.as_bytes());
    }

    pub fn file_data(&self, path: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().unwrap();
        match state.fs.nodes.get(&state.fs.resolve(path)?)? {
            Node::File { data, .. } => Some(data.clone()),
            Node::Dir { .. } => None,
        }
    }

    pub fn exists(&self, path: &str) -> bool {
        self.state.lock().unwrap().fs.resolve(path).is_some()
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn accept_loop(listener: TcpListener, state: Arc<Mutex<State>>) {
    while let Ok((stream, _)) = listener.accept().await {
        tokio::spawn(serve(stream, state.clone()));
    }
}

async fn serve(stream: TcpStream, state: Arc<Mutex<State>>) {
    let read_delay = state.lock().unwrap().options.read_delay;
    if !read_delay.is_zero() {
        tokio::time::sleep(read_delay).await;
    }
    let (mut reader, writer) = stream.into_split();
    let writer = Arc::new(tokio::sync::Mutex::new(writer));
    while let Ok(record) = read_record(&mut reader).await {
        let Some((reply, delay)) = handle_record(&record, &state) else {
            continue;
        };
        let writer = writer.clone();
        tokio::spawn(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let mut writer = writer.lock().await;
            let _ = write_fragment(&mut *writer, &reply).await;
        });
    }
}

async fn serve_datagrams(socket: Arc<UdpSocket>, state: Arc<Mutex<State>>) {
    let mut buf = vec![0_u8; 65536];
    while let Ok((n, peer)) = socket.recv_from(&mut buf).await {
        let Some((reply, delay)) = handle_record(&buf[..n], &state) else {
            continue;
        };
        let socket = socket.clone();
        tokio::spawn(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let _ = socket.send_to(&reply, peer).await;
        });
    }
}

fn handle_record(record: &[u8], state: &Mutex<State>) -> Option<(Vec<u8>, Option<Duration>)> {
    let mut src = Cursor::new(record);
    let msg: rpc_msg = xdr::deserialize(&mut src).ok()?;
    let rpc_body::CALL(call) = msg.body else {
        return None;
    };
    let reply = {
        let mut state = state.lock().unwrap();
        state.stats.xids.push(msg.xid);
        state.dispatch(&call, &mut src)
    };
    let header = |body: accept_body| {
        xdr::to_bytes(&rpc_msg::accepted(msg.xid, body)).expect("encode header")
    };
    match reply {
        Reply::Success(body) => Some(([header(accept_body::SUCCESS), body].concat(), None)),
        Reply::Delayed(body, delay) => {
            Some(([header(accept_body::SUCCESS), body].concat(), Some(delay)))
        }
        Reply::Accept(stat) => Some((header(stat), None)),
        Reply::Deny(rejection) => {
            Some((xdr::to_bytes(&rpc_msg::denied(msg.xid, rejection)).expect("encode"), None))
        }
        Reply::Silent => None,
    }
}

pub fn test_auth() -> Auth {
    Auth::unix("test-host", 1000, 1000)
}

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}
