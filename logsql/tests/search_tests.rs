use std::sync::{Arc, Mutex};

use logsql::{
    parse_query_at, run_query, Block, BlockResult, Cancellation, Field, MemoryBlockSource,
    TenantId,
};

const NOW: i64 = 1_700_000_000_000_000_000;

fn build_block(tenant: TenantId, columns: &[(&str, &[&str])], labels: &[(&str, &str)]) -> Block {
    let rows = columns.first().map(|(_, v)| v.len()).unwrap_or(0);
    Block::build(
        "mem",
        tenant,
        (0..rows as i64).collect(),
        columns
            .iter()
            .map(|(name, values)| {
                (
                    name.to_string(),
                    values.iter().map(|v| v.to_string()).collect(),
                )
            })
            .collect(),
        labels.iter().map(|(n, v)| Field::new(*n, *v)).collect(),
    )
    .unwrap()
}

fn search(
    query: &str,
    blocks: Vec<Block>,
    workers: usize,
) -> Vec<Vec<(String, String)>> {
    let q = parse_query_at(query, NOW).unwrap();
    let out: Arc<Mutex<Vec<Vec<(String, String)>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&out);
    run_query(
        &[],
        &q,
        MemoryBlockSource::new(blocks),
        workers,
        &Cancellation::new(),
        move |_worker_id, br: &BlockResult| {
            let mut rows = sink.lock().unwrap();
            for i in 0..br.row_count() {
                rows.push(
                    br.columns
                        .iter()
                        .map(|c| (c.name.clone(), c.values[i].clone()))
                        .collect(),
                );
            }
        },
    )
    .unwrap();
    let rows = out.lock().unwrap().clone();
    rows
}

fn row(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(n, v)| (n.to_string(), v.to_string()))
        .collect()
}

#[test]
fn filter_and_project() {
    let block = build_block(
        TenantId::default(),
        &[
            ("_msg", &["error disk full", "all good", "error net down"]),
            ("level", &["error", "info", "error"]),
        ],
        &[],
    );
    let mut rows = search("level:error | fields _msg", vec![block], 1);
    rows.sort();
    assert_eq!(
        rows,
        vec![
            row(&[("_msg", "error disk full")]),
            row(&[("_msg", "error net down")]),
        ]
    );
}

#[test]
fn stats_by_host_over_engine() {
    let block = build_block(
        TenantId::default(),
        &[("host", &["a", "b", "a", "a"])],
        &[],
    );
    let rows = search("* | stats by (host) count(*) as c", vec![block], 2);
    assert_eq!(
        rows,
        vec![row(&[("host", "a"), ("c", "3")]), row(&[("host", "b"), ("c", "1")])]
    );
}

#[test]
fn count_star_without_grouping_counts_all_rows() {
    // no `by` clause and no other pipe needing fields: the projection
    // materializes zero columns, and count(*) must still count every row
    let b1 = build_block(
        TenantId::default(),
        &[("_msg", &["a", "b", "c"]), ("host", &["x", "y", "z"])],
        &[],
    );
    let b2 = build_block(TenantId::default(), &[("_msg", &["d", "e"])], &[]);
    for query in ["* | stats count() total", "* | stats count(*) as total"] {
        let rows = search(query, vec![b1.clone(), b2.clone()], 2);
        assert_eq!(rows, vec![row(&[("total", "5")])], "{query}");
    }

    // with a filter, only the matching rows are counted
    let block = build_block(
        TenantId::default(),
        &[
            ("_msg", &["m1", "m2", "m3"]),
            ("level", &["error", "info", "error"]),
        ],
        &[],
    );
    let rows = search("level:error | stats count(*) as total", vec![block], 1);
    assert_eq!(rows, vec![row(&[("total", "2")])]);
}

#[test]
fn sort_merges_blocks_deterministically() {
    let b1 = build_block(TenantId::default(), &[("_msg", &["d", "b"])], &[]);
    let b2 = build_block(TenantId::default(), &[("_msg", &["c", "a"])], &[]);
    for workers in [1, 2, 4] {
        let rows = search("* | sort by (_msg)", vec![b1.clone(), b2.clone()], workers);
        assert_eq!(
            rows.iter().map(|r| r[0].1.clone()).collect::<Vec<_>>(),
            ["a", "b", "c", "d"],
            "workers={workers}"
        );
    }
}

#[test]
fn uniq_over_multiple_blocks() {
    let b1 = build_block(TenantId::default(), &[("host", &["a", "b"])], &[]);
    let b2 = build_block(TenantId::default(), &[("host", &["b", "c"])], &[]);
    let mut rows = search("* | uniq by (host)", vec![b1, b2], 2);
    rows.sort();
    assert_eq!(
        rows,
        vec![row(&[("host", "a")]), row(&[("host", "b")]), row(&[("host", "c")])]
    );
}

#[test]
fn tenants_are_filtered() {
    let t1 = TenantId {
        account_id: 1,
        project_id: 0,
    };
    let t2 = TenantId {
        account_id: 2,
        project_id: 0,
    };
    let b1 = build_block(t1, &[("_msg", &["from-t1"])], &[]);
    let b2 = build_block(t2, &[("_msg", &["from-t2"])], &[]);

    let q = parse_query_at("*", NOW).unwrap();
    let out: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&out);
    run_query(
        &[t1],
        &q,
        MemoryBlockSource::new(vec![b1, b2]),
        1,
        &Cancellation::new(),
        move |_, br| {
            let mut rows = sink.lock().unwrap();
            for i in 0..br.row_count() {
                rows.push(br.field_value("_msg", i).to_string());
            }
        },
    )
    .unwrap();
    assert_eq!(*out.lock().unwrap(), ["from-t1"]);
}

#[test]
fn cancellation_aborts() {
    let block = build_block(TenantId::default(), &[("_msg", &["x"])], &[]);
    let q = parse_query_at("*", NOW).unwrap();
    let cancel = Cancellation::new();
    cancel.cancel();
    let err = run_query(
        &[],
        &q,
        MemoryBlockSource::new(vec![block]),
        1,
        &cancel,
        |_, _| {},
    )
    .unwrap_err();
    assert!(matches!(err, logsql_result::Error::Cancelled));
}

#[test]
fn limit_stops_block_iteration() {
    let blocks: Vec<Block> = (0..100)
        .map(|i| {
            build_block(
                TenantId::default(),
                &[("_msg", &[format!("msg {i}").as_str()])],
                &[],
            )
        })
        .collect();
    let rows = search("* | limit 3", blocks, 1);
    assert_eq!(rows.len(), 3);
}

#[test]
fn needed_columns_drive_projection() {
    let block = build_block(
        TenantId::default(),
        &[
            ("_msg", &["a", "b"]),
            ("foo", &["1", "2"]),
            ("bar", &["x", "y"]),
        ],
        &[],
    );
    let rows = search("* | fields foo", vec![block.clone()], 1);
    assert_eq!(rows, vec![row(&[("foo", "1")]), row(&[("foo", "2")])]);

    // a deleted column is suppressed even though `*` is needed
    let rows = search("* | delete bar", vec![block], 1);
    assert_eq!(
        rows,
        vec![
            row(&[("_msg", "a"), ("foo", "1")]),
            row(&[("_msg", "b"), ("foo", "2")]),
        ]
    );
}

#[test]
fn synthesized_time_and_stream_columns() {
    let block = build_block(
        TenantId::default(),
        &[("_msg", &["a"])],
        &[("job", "api")],
    );
    let rows = search("_stream:{job=\"api\"} | fields _time, _stream, _msg", vec![block], 1);
    assert_eq!(
        rows,
        vec![row(&[
            ("_time", "1970-01-01T00:00:00.000000000Z"),
            ("_stream", "{job=\"api\"}"),
            ("_msg", "a"),
        ])]
    );
}

#[test]
fn copy_rename_chain_over_engine() {
    let block = build_block(TenantId::default(), &[("a", &["1"]), ("_msg", &["m"])], &[]);
    let rows = search("* | copy a as b | rename b as c | delete a, _msg", vec![block], 1);
    assert_eq!(rows, vec![row(&[("c", "1")])]);
}
