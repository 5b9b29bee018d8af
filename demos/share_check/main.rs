//! Mounts an export and checks that a file written to it reads back intact.
//!
//! Usage: share_check <host>:<export> [--readonly] [--timeout <secs>] [--udp]

use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use nfs_mamont_client::{Auth, ClientConfig, MountClient};

const PROBE_SIZE: usize = 1024;

struct Args {
    host: String,
    export: String,
    readonly: bool,
    config: ClientConfig,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut share = None;
    let mut readonly = false;
    let mut config = ClientConfig::default();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--readonly" => readonly = true,
            "--udp" => config.datagram = true,
            "--timeout" => {
                let secs: u64 = args
                    .next()
                    .ok_or_else(|| anyhow!("--timeout needs a value"))?
                    .parse()
                    .context("--timeout expects whole seconds")?;
                config = config.with_timeout(Duration::from_secs(secs));
            }
            "--config" => {
                let path = args.next().ok_or_else(|| anyhow!("--config needs a path"))?;
                config = ClientConfig::load(&path).with_context(|| format!("loading {path}"))?;
            }
            other if share.is_none() => share = Some(other.to_string()),
            other => bail!("unexpected argument {other:?}"),
        }
    }

    let share = share.ok_or_else(|| {
        anyhow!("usage: share_check <host>:<export> [--readonly] [--timeout <secs>] [--udp]")
    })?;
    let (host, export) =
        share.split_once(':').ok_or_else(|| anyhow!("expected <host>:<export>, got {share:?}"))?;
    Ok(Args { host: host.to_string(), export: export.to_string(), readonly, config })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let args = parse_args()?;
    let machine = args.config.machine_name.clone().unwrap_or_else(|| "share-check".to_string());
    let auth = Auth::unix(machine, 0, 0);

    let mounter = MountClient::dial_with_config(&args.host, &args.config).await?;
    for export in mounter.list_exports(&auth).await? {
        info!(dir = %export.dir, groups = ?export.groups, "export");
    }

    let target = mounter.mount_with_config(&args.export, &auth, &args.config).await?;
    info!(read_size = target.read_size(), write_size = target.write_size(), "mounted");

    if !args.readonly {
        let name = format!("share_check_{}", std::process::id());
        let mut data = vec![0_u8; PROBE_SIZE];
        rand::thread_rng().fill_bytes(&mut data);

        let mut writer = target.open_file(&name, 0o644).await?;
        writer.write_all(&data).await?;
        writer.close().await?;

        let mut reader = target.open(&name).await?;
        let mut back = Vec::with_capacity(PROBE_SIZE);
        reader.read_to_end(&mut back).await?;
        reader.close().await?;
        target.remove(&name).await?;

        let (sent, received) = (Sha256::digest(&data), Sha256::digest(&back));
        if sent != received {
            bail!("read back {} bytes that do not match what was written", back.len());
        }
        info!(bytes = PROBE_SIZE, "read back matches");
    }

    for entry in target.read_dir_plus("/").await? {
        println!("{entry}");
    }

    target.close().await?;
    if let Err(e) = mounter.unmount(&args.export, &auth).await {
        warn!(error = %e, "unmount failed");
    }
    mounter.close().await?;
    Ok(())
}
