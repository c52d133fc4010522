//! Index rebuild, verification and orphan purge.
//!
//! None of these run as part of normal saves. The schema check runs on
//! every open; the rest are invoked explicitly (see `feedhub-admin`).

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use tracing::{debug, info, warn};

use feedhub_types::{Config, Entry, Feed, Group, Item, Subscription, Transmission, User};

use crate::db::Database;
use crate::entity::{data_bucket, index_bucket, Entity};
use crate::error::StorageError;
use crate::keys::KeyRange;
use crate::schema::{CF_INDEX, SCHEMA_VERSION};
use crate::stores::{
    ConfigStore, EntryStore, GroupStore, ItemStore, SubscriptionStore, TransmissionStore,
};
use crate::tx::Transaction;

/// Operation applied to each persisted type in turn.
pub trait EntityVisitor {
    fn visit<E: Entity>(&mut self, tx: &Transaction<'_>) -> Result<(), StorageError>;
}

/// Run `visitor` over every persisted type.
pub fn for_each_entity<V: EntityVisitor>(
    tx: &Transaction<'_>,
    visitor: &mut V,
) -> Result<(), StorageError> {
    visitor.visit::<Config>(tx)?;
    visitor.visit::<Entry>(tx)?;
    visitor.visit::<Feed>(tx)?;
    visitor.visit::<Group>(tx)?;
    visitor.visit::<Item>(tx)?;
    visitor.visit::<Subscription>(tx)?;
    visitor.visit::<Transmission>(tx)?;
    visitor.visit::<User>(tx)?;
    Ok(())
}

/// Every record of `E` with its primary key.
fn load_all<E: Entity>(tx: &Transaction<'_>) -> Result<Vec<(String, E)>, StorageError> {
    let mut records = Vec::new();
    data_bucket::<E>(tx)?.scan(&KeyRange::all(), false, |key, bytes| {
        let record = E::decode(key, bytes)?;
        records.push((String::from_utf8_lossy(key).into_owned(), record));
        Ok(true)
    })?;
    Ok(records)
}

/// Outcome of [`rebuild_indexes`].
#[derive(Debug, Clone, Default)]
pub struct RebuildProgress {
    /// Records whose index entries were re-derived
    pub records: u64,
    /// Index entries written
    pub index_entries: u64,
    /// Unique keys claimed by more than one record; all but the first skipped
    pub conflicts: u64,
    pub elapsed_ms: u64,
}

struct Rebuilder {
    progress: RebuildProgress,
}

impl EntityVisitor for Rebuilder {
    fn visit<E: Entity>(&mut self, tx: &Transaction<'_>) -> Result<(), StorageError> {
        let schema = E::SCHEMA;

        // drop every entry of every index of E, including unknown leftovers
        let all_indexes = tx.bucket(&[CF_INDEX, schema.name])?;
        let mut stale = Vec::new();
        all_indexes.scan(&KeyRange::all(), false, |key, _| {
            stale.push(key.to_vec());
            Ok(true)
        })?;
        for key in &stale {
            all_indexes.delete(key)?;
        }

        for (id, record) in load_all::<E>(tx)? {
            let keys = record.index_keys();
            for index in schema.indexes {
                let Some(key) = keys.get(index.name) else {
                    continue;
                };
                let bucket = index_bucket::<E>(tx, index.name)?;
                if index.unique && bucket.get(key)?.is_some() {
                    warn!(
                        entity = schema.name,
                        index = index.name,
                        id = %id,
                        "Duplicate unique key skipped during rebuild"
                    );
                    self.progress.conflicts += 1;
                    continue;
                }
                bucket.put(key, id.as_bytes())?;
                self.progress.index_entries += 1;
            }
            self.progress.records += 1;
        }
        debug!(entity = schema.name, removed = stale.len(), "Rebuilt indexes");
        Ok(())
    }
}

/// Drop and re-derive every index entry from the stored records.
pub fn rebuild_indexes(tx: &Transaction<'_>) -> Result<RebuildProgress, StorageError> {
    let start = Instant::now();
    let mut rebuilder = Rebuilder {
        progress: RebuildProgress::default(),
    };
    for_each_entity(tx, &mut rebuilder)?;

    let mut progress = rebuilder.progress;
    progress.elapsed_ms = start.elapsed().as_millis() as u64;
    info!(
        records = progress.records,
        index_entries = progress.index_entries,
        conflicts = progress.conflicts,
        elapsed_ms = progress.elapsed_ms,
        "Index rebuild complete"
    );
    Ok(progress)
}

/// Record the current layout version, rebuilding indexes if the store was
/// written under another one.
pub(crate) fn ensure_schema(db: &Database) -> Result<(), StorageError> {
    db.update(|tx| {
        let mut config = ConfigStore::get(tx)?;
        if config.schema_version == SCHEMA_VERSION {
            return Ok(());
        }
        info!(
            from = config.schema_version,
            to = SCHEMA_VERSION,
            "Index layout changed, rebuilding"
        );
        rebuild_indexes(tx)?;
        // the rebuild does not touch Config, so the loaded copy is current
        config.schema_version = SCHEMA_VERSION;
        ConfigStore::save(tx, &mut config)
    })
}

/// One inconsistency found by [`verify_indexes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexIssue {
    pub entity: &'static str,
    pub index: &'static str,
    pub key: String,
    pub id: String,
}

/// Outcome of [`verify_indexes`].
#[derive(Debug, Clone, Default)]
pub struct VerifyReport {
    pub records: u64,
    pub index_entries: u64,
    /// Records lacking the index entry they should have
    pub missing: Vec<IndexIssue>,
    /// Index entries not backed by a record producing them
    pub stale: Vec<IndexIssue>,
}

impl VerifyReport {
    pub fn is_consistent(&self) -> bool {
        self.missing.is_empty() && self.stale.is_empty()
    }
}

struct Verifier {
    report: VerifyReport,
}

impl EntityVisitor for Verifier {
    fn visit<E: Entity>(&mut self, tx: &Transaction<'_>) -> Result<(), StorageError> {
        let schema = E::SCHEMA;
        let records = load_all::<E>(tx)?;
        self.report.records += records.len() as u64;

        for index in schema.indexes {
            let mut expected: BTreeMap<Vec<u8>, Vec<String>> = BTreeMap::new();
            for (id, record) in &records {
                if let Some(key) = record.index_keys().remove(index.name) {
                    expected.entry(key).or_default().push(id.clone());
                }
            }

            let issue = |key: &[u8], id: &str| IndexIssue {
                entity: schema.name,
                index: index.name,
                key: String::from_utf8_lossy(key).into_owned(),
                id: id.to_string(),
            };

            let mut seen = BTreeSet::new();
            index_bucket::<E>(tx, index.name)?.scan(&KeyRange::all(), false, |key, value| {
                self.report.index_entries += 1;
                let id = String::from_utf8_lossy(value);
                let backed = expected
                    .get(key)
                    .is_some_and(|owners| owners.iter().any(|o| *o == id));
                if backed {
                    seen.insert(key.to_vec());
                } else {
                    self.report.stale.push(issue(key, &*id));
                }
                Ok(true)
            })?;

            for (key, owners) in &expected {
                if !seen.contains(key) {
                    for id in owners {
                        self.report.missing.push(issue(key.as_slice(), id.as_str()));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Compare every index against the records it is derived from.
pub fn verify_indexes(tx: &Transaction<'_>) -> Result<VerifyReport, StorageError> {
    let mut verifier = Verifier {
        report: VerifyReport::default(),
    };
    for_each_entity(tx, &mut verifier)?;
    let report = verifier.report;
    if report.is_consistent() {
        info!(records = report.records, "Indexes consistent");
    } else {
        warn!(
            missing = report.missing.len(),
            stale = report.stale.len(),
            "Index inconsistencies found"
        );
    }
    Ok(report)
}

/// Outcome of [`purge_orphans`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub subscriptions: u64,
    pub groups: u64,
    /// Group ids dropped from subscriptions
    pub group_refs: u64,
    pub items: u64,
    pub entries: u64,
    pub transmissions: u64,
}

impl PurgeReport {
    pub fn total(&self) -> u64 {
        self.subscriptions + self.groups + self.group_refs + self.items + self.entries + self.transmissions
    }
}

fn ids<E: Entity>(tx: &Transaction<'_>) -> Result<BTreeSet<String>, StorageError> {
    Ok(load_all::<E>(tx)?.into_iter().map(|(id, _)| id).collect())
}

/// Remove records whose parents no longer exist.
///
/// Covers subscriptions without user or feed, groups without user, group ids
/// on subscriptions that name no group, items without feed, entries without
/// user, feed or item, and transmissions without feed.
pub fn purge_orphans(tx: &Transaction<'_>) -> Result<PurgeReport, StorageError> {
    let mut report = PurgeReport::default();
    let users = ids::<User>(tx)?;
    let feeds = ids::<Feed>(tx)?;

    for (_, sub) in load_all::<Subscription>(tx)? {
        if !users.contains(&sub.user_id) || !feeds.contains(&sub.feed_id) {
            SubscriptionStore::delete(tx, &sub.user_id, &sub.feed_id)?;
            report.subscriptions += 1;
        }
    }

    for (id, group) in load_all::<Group>(tx)? {
        if !users.contains(&group.user_id) {
            GroupStore::delete(tx, &id)?;
            report.groups += 1;
        }
    }

    let groups = ids::<Group>(tx)?;
    for (_, mut sub) in load_all::<Subscription>(tx)? {
        let before = sub.group_ids.len();
        sub.group_ids.retain(|g| groups.contains(g));
        let dropped = before - sub.group_ids.len();
        if dropped > 0 {
            SubscriptionStore::save(tx, &mut sub)?;
            report.group_refs += dropped as u64;
        }
    }

    for (id, item) in load_all::<Item>(tx)? {
        if !feeds.contains(&item.feed_id) {
            ItemStore::delete(tx, &id)?;
            report.items += 1;
        }
    }

    let items = ids::<Item>(tx)?;
    for (_, entry) in load_all::<Entry>(tx)? {
        if !users.contains(&entry.user_id)
            || !feeds.contains(&entry.feed_id)
            || !items.contains(&entry.item_id)
        {
            EntryStore::delete(tx, &entry.user_id, &entry.item_id)?;
            report.entries += 1;
        }
    }

    for (id, transmission) in load_all::<Transmission>(tx)? {
        if !feeds.contains(&transmission.feed_id) {
            TransmissionStore::delete(tx, &id)?;
            report.transmissions += 1;
        }
    }

    info!(?report, "Orphan purge complete");
    Ok(report)
}
