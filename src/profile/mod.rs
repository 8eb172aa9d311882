use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use sqlx::PgPool;

use crate::descriptor::{ssr, Descriptor, Routing};
use crate::store::ProfileStore;
use crate::telemetry::{self};
use crate::telemetry::ops::profile::Phase as ProfilePhase;

pub mod db;

pub use db::PgProfileStore;

/// A stored proxy profile. Owned by the profile store; the subscription
/// refers to it only through `descriptor.url_group`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Profile {
    pub id: i64,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub descriptor: Descriptor,
}

impl Profile {
    pub fn routing(&self) -> Routing {
        Routing {
            route: self.descriptor.route.clone(),
            remote_dns: self.descriptor.remote_dns.clone(),
            ipv6: self.descriptor.ipv6,
        }
    }
}

/// subsync profile ls/export
#[derive(Args)]
pub struct ProfileCmd {
    #[command(subcommand)]
    pub cmd: ProfileSub,
}

#[derive(Subcommand)]
pub enum ProfileSub {
    /// List the profiles of a group
    Ls {
        #[arg(long)]
        group: String,
    },
    /// Print a group as ssr:// tokens, one per line
    Export {
        #[arg(long)]
        group: String,
    },
}

#[derive(Serialize)]
struct ProfileList {
    group: String,
    profiles: Vec<Profile>,
}

#[derive(Serialize)]
struct ProfileExport {
    group: String,
    tokens: Vec<String>,
}

pub async fn run(pool: &PgPool, args: ProfileCmd) -> Result<()> {
    let log = telemetry::profile();
    let _g = log.root_span().entered();
    let store = PgProfileStore::new(pool.clone());
    match args.cmd {
        ProfileSub::Ls { group } => ls_profiles(&store, group).await?,
        ProfileSub::Export { group } => export_profiles(&store, group).await?,
    }
    Ok(())
}

async fn ls_profiles(store: &PgProfileStore, group: String) -> Result<()> {
    let log = telemetry::profile();
    let _s = log.span_kv(&ProfilePhase::List, [("group", group.clone())]).entered();
    let profiles = store.list_by_group(&group).await?;
    log.info(format!("🗂️ Profiles in {:?}: {}", group, profiles.len()));
    for p in &profiles {
        let d = &p.descriptor;
        log.info(format!("[{}] {} {}:{} {}/{}/{}", p.id, d.name, d.host, d.remote_port, d.protocol, d.method, d.obfs));
    }
    if telemetry::config::json_mode() {
        log.result(&ProfileList { group, profiles })?;
    }
    Ok(())
}

async fn export_profiles(store: &PgProfileStore, group: String) -> Result<()> {
    let log = telemetry::profile();
    let _s = log.span_kv(&ProfilePhase::Export, [("group", group.clone())]).entered();
    let profiles = store.list_by_group(&group).await?;
    let tokens: Vec<String> = profiles.iter().map(|p| ssr::encode(&p.descriptor)).collect();
    if telemetry::config::json_mode() {
        log.result(&ProfileExport { group, tokens })?;
    } else {
        for t in &tokens { println!("{}", t); }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fixtures::descriptor;

    #[test]
    fn routing_comes_from_the_profile() {
        let mut d = descriptor("G", "h");
        d.route = "china-list".into();
        d.ipv6 = true;
        let p = Profile { id: 1, descriptor: d };
        let r = p.routing();
        assert_eq!(r.route, "china-list");
        assert!(r.ipv6);
    }

    #[test]
    fn serializes_flat() {
        let p = Profile { id: 4, descriptor: descriptor("G", "h") };
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["id"], 4);
        assert_eq!(v["url_group"], "G");
        assert!(v.get("descriptor").is_none());
    }
}
