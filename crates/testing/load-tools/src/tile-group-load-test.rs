// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Hammers a single table from many threads with inserts, deletes, aborts and slot reclamation,
//! then checks that the live tuple count and every surviving row are what the workers recorded.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use clap::Parser;
use clap_derive::Parser;
use eyre::{bail, eyre};
use figment::Figment;
use figment::providers::{Format, Serialized, Yaml};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tilestore_common::tracing::init_tracing;
use tilestore_common::{
    Column, CommitId, ItemPointer, MAX_CID, OidAllocator, Schema, Tuple, TxnId, Value, ValueType,
};
use tilestore_storage::{DataTable, StorageConfig};
use tracing::{debug, info};

#[derive(Clone, Parser, Debug, Serialize, Deserialize)]
struct Args {
    #[arg(long, help = "Number of concurrent worker threads", default_value = "8")]
    threads: usize,

    #[arg(long, help = "Rows each worker inserts", default_value = "10000")]
    rows_per_thread: usize,

    #[arg(
        long,
        help = "Rows inserted up front that every worker races to delete",
        default_value = "100"
    )]
    hot_rows: usize,

    #[arg(
        long,
        help = "Percent of a worker's own rows it deletes again",
        default_value = "20"
    )]
    delete_percent: u32,

    #[arg(
        long,
        help = "Percent of transactions rolled back instead of committed",
        default_value = "5"
    )]
    abort_percent: u32,

    #[arg(long, help = "Slots per tile group (overrides the config file)")]
    tuples_per_tile_group: Option<usize>,

    #[arg(skip)]
    #[serde(default)]
    storage: StorageConfig,

    #[arg(long, help = "YAML config file to use (overrides CLI args)")]
    config_file: Option<PathBuf>,

    #[arg(long, help = "Enable debug logging", default_value = "false")]
    debug: bool,
}

/// Hands out transaction and commit ids the way a transaction manager would.
#[derive(Default)]
struct Clock {
    next_txn: AtomicU64,
    next_cid: AtomicU64,
}

impl Clock {
    fn begin(&self) -> TxnId {
        self.next_txn.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn commit(&self) -> CommitId {
        self.next_cid.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[derive(Debug, Default)]
struct WorkerReport {
    inserted: usize,
    insert_aborts: usize,
    deleted: usize,
    delete_aborts: usize,
    conflicts: usize,
    reclaimed: usize,
    /// Committed rows this worker never deleted, with the ids written into them.
    survivors: Vec<(ItemPointer, i64)>,
}

fn schema() -> Schema {
    Schema::new(vec![
        Column::new("id", ValueType::BigInt),
        Column::new("worker", ValueType::Integer),
        Column::varlen("payload", ValueType::Varchar, 64),
        Column::new("score", ValueType::Double),
        Column::new("created", ValueType::Timestamp),
    ])
}

fn row(id: i64, worker: i32) -> Tuple {
    Tuple::new(vec![
        Value::BigInt(id),
        Value::Integer(worker),
        Value::Varchar(format!("payload-{worker}-{id}")),
        Value::Double(id as f64 / 3.0),
        Value::Timestamp(id),
    ])
}

fn run_worker(
    table: &DataTable,
    clock: &Clock,
    args: &Args,
    worker: usize,
    hot: &[ItemPointer],
) -> Result<WorkerReport, eyre::Error> {
    let mut rng = rand::rng();
    let mut report = WorkerReport::default();
    let mut live = vec![];

    for i in 0..args.rows_per_thread {
        let id = (worker * args.rows_per_thread + i) as i64;
        let txn = clock.begin();
        let pointer = table.insert_tuple(txn, &row(id, worker as i32))?;
        if rng.random_range(0..100) < args.abort_percent {
            table.abort_insert(pointer)?;
            report.insert_aborts += 1;
        } else {
            table.commit_insert(pointer, clock.commit())?;
            report.inserted += 1;
            live.push((pointer, id));
        }

        if !live.is_empty() && rng.random_range(0..100) < args.delete_percent {
            let (pointer, _) = live.swap_remove(rng.random_range(0..live.len()));
            let txn = clock.begin();
            if !table.delete_tuple(txn, pointer)? {
                bail!("worker {worker} lost the delete lock on its own row {pointer}");
            }
            table.commit_delete(pointer, txn, clock.commit())?;
            // Nobody else can see the row, so it goes straight back to the allocator.
            table.reclaim(pointer)?;
            report.deleted += 1;
            report.reclaimed += 1;
        }

        if !hot.is_empty() && i % 16 == 0 {
            let pointer = hot[rng.random_range(0..hot.len())];
            let txn = clock.begin();
            if !table.delete_tuple(txn, pointer)? {
                report.conflicts += 1;
            } else if rng.random_range(0..100) < args.abort_percent {
                table.abort_delete(pointer)?;
                report.delete_aborts += 1;
            } else {
                table.commit_delete(pointer, txn, clock.commit())?;
                report.deleted += 1;
            }
        }
    }

    report.survivors = live;
    debug!(
        worker,
        inserted = report.inserted,
        deleted = report.deleted,
        conflicts = report.conflicts,
        "worker finished"
    );
    Ok(report)
}

fn verify(
    table: &DataTable,
    hot: &[ItemPointer],
    reports: &[WorkerReport],
) -> Result<(), eyre::Error> {
    let hot_deleted = hot
        .iter()
        .map(|pointer| {
            let tile_group = table
                .tile_group_by_id(pointer.block)
                .ok_or_else(|| eyre!("hot row {pointer} lost its tile group"))?;
            Ok(tile_group.header().end_commit_id(pointer.offset) != MAX_CID)
        })
        .collect::<Result<Vec<_>, eyre::Error>>()?
        .into_iter()
        .filter(|deleted| *deleted)
        .count();

    let inserted: usize = reports.iter().map(|r| r.inserted).sum();
    let deleted: usize = reports.iter().map(|r| r.deleted).sum();
    let own_deleted: usize = reports.iter().map(|r| r.reclaimed).sum();
    if deleted - own_deleted != hot_deleted {
        bail!(
            "workers committed {} hot deletes, but {hot_deleted} hot rows are deleted",
            deleted - own_deleted
        );
    }

    let expected = hot.len() + inserted - deleted;
    let active = table.active_tuple_count();
    if active != expected {
        bail!("expected {expected} live tuples, table reports {active}");
    }

    for (worker, report) in reports.iter().enumerate() {
        for (pointer, id) in &report.survivors {
            let found = table.select_tuple(*pointer)?;
            if found.as_ref() != Some(&row(*id, worker as i32)) {
                bail!("row {id} at {pointer} reads back as {found:?}");
            }
        }
    }
    Ok(())
}

fn main() -> Result<(), eyre::Error> {
    color_eyre::install()?;

    let cli_args = Args::parse();
    let config_file = cli_args.config_file.clone();
    let mut args_figment = Figment::new().merge(Serialized::defaults(cli_args.clone()));
    if let Some(config_file) = config_file {
        args_figment = args_figment.merge(Yaml::file(config_file));
    }
    let mut args: Args = args_figment.extract()?;
    if let Some(tuples_per_tile_group) = cli_args.tuples_per_tile_group {
        args.storage.tuples_per_tile_group = tuples_per_tile_group;
    }

    init_tracing(args.debug)?;
    info!(
        threads = args.threads,
        rows_per_thread = args.rows_per_thread,
        hot_rows = args.hot_rows,
        storage = ?args.storage,
        "starting tile group load test"
    );

    let oids = Arc::new(OidAllocator::new());
    let table_id = oids.next_oid();
    let table = Arc::new(DataTable::new(
        0,
        table_id,
        "load_test",
        schema(),
        &args.storage,
        oids,
    )?);
    let clock = Arc::new(Clock::default());

    let setup_txn = clock.begin();
    let mut hot = Vec::with_capacity(args.hot_rows);
    for i in 0..args.hot_rows {
        let pointer = table.insert_tuple(setup_txn, &row(-(i as i64) - 1, -1))?;
        table.commit_insert(pointer, clock.commit())?;
        hot.push(pointer);
    }
    let hot = Arc::new(hot);
    let args = Arc::new(args);

    let start = Instant::now();
    let handles: Vec<_> = (0..args.threads)
        .map(|worker| {
            let table = table.clone();
            let clock = clock.clone();
            let args = args.clone();
            let hot = hot.clone();
            std::thread::Builder::new()
                .name(format!("load-worker-{worker}"))
                .spawn(move || run_worker(&table, &clock, &args, worker, &hot))
        })
        .collect::<Result<_, _>>()?;

    let mut reports = Vec::with_capacity(handles.len());
    for handle in handles {
        let report = handle
            .join()
            .map_err(|_| eyre!("load worker panicked"))??;
        reports.push(report);
    }
    let elapsed = start.elapsed();

    let operations: usize = reports
        .iter()
        .map(|r| r.inserted + r.insert_aborts + r.deleted + r.delete_aborts + r.conflicts)
        .sum();
    info!(
        ?elapsed,
        operations,
        ops_per_sec = operations as f64 / elapsed.as_secs_f64(),
        tile_groups = table.tile_group_count(),
        conflicts = reports.iter().map(|r| r.conflicts).sum::<usize>(),
        reclaimed = reports.iter().map(|r| r.reclaimed).sum::<usize>(),
        "workload complete"
    );

    verify(&table, &hot, &reports)?;
    info!(live_tuples = table.active_tuple_count(), "verification passed");
    Ok(())
}
