use std::sync::{Arc, Mutex};

use logsql_block::{BlockResult, ResultColumn};
use logsql_parser::parse_query_at;
use logsql_pipe::{build_pipeline, Cancellation};

const NOW: i64 = 1_700_000_000_000_000_000;

fn block(columns: &[(&str, &[&str])]) -> BlockResult {
    let rows = columns.first().map(|(_, v)| v.len()).unwrap_or(0);
    BlockResult {
        timestamps: (0..rows as i64).collect(),
        columns: columns
            .iter()
            .map(|(name, values)| ResultColumn {
                name: name.to_string(),
                values: values.iter().map(|v| v.to_string()).collect(),
            })
            .collect(),
    }
}

/// Run the pipe chain of `query` over the given blocks (each written by
/// its own worker) and collect the flattened output rows.
fn run(query: &str, blocks: &[BlockResult], workers: usize) -> Vec<Vec<(String, String)>> {
    let q = parse_query_at(query, NOW).unwrap();
    let out: Arc<Mutex<Vec<Vec<(String, String)>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink_out = Arc::clone(&out);
    let stop = Cancellation::new();
    let pipeline = build_pipeline(
        &q.pipes,
        workers,
        &stop,
        Box::new(move |_worker_id: usize, br: &BlockResult| {
            let mut rows = sink_out.lock().unwrap();
            for i in 0..br.row_count() {
                rows.push(
                    br.columns
                        .iter()
                        .map(|c| (c.name.clone(), c.values[i].clone()))
                        .collect(),
                );
            }
        }),
    );
    for (i, br) in blocks.iter().enumerate() {
        if stop.is_cancelled() {
            break;
        }
        pipeline.write_block(i % workers.max(1), br).unwrap();
    }
    pipeline.flush().unwrap();
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
fn fields_projection() {
    let input = block(&[("a", &["1", "2"]), ("b", &["x", "y"]), ("c", &["p", "q"])]);
    let rows = run("* | fields b, missing", &[input], 1);
    assert_eq!(
        rows,
        vec![row(&[("b", "x"), ("missing", "")]), row(&[("b", "y"), ("missing", "")])]
    );
}

#[test]
fn copy_overwrites_destination() {
    let input = block(&[("a", &["1"]), ("b", &["x"])]);
    let rows = run("* | copy a as b, a as d", &[input], 1);
    assert_eq!(rows, vec![row(&[("a", "1"), ("b", "1"), ("d", "1")])]);
}

#[test]
fn rename_moves_and_delete_drops() {
    let input = block(&[("a", &["1"]), ("b", &["x"])]);
    let rows = run("* | rename a as c", &[input.clone()], 1);
    assert_eq!(rows, vec![row(&[("b", "x"), ("c", "1")])]);

    let rows = run("* | rename a as b", &[input.clone()], 1);
    assert_eq!(rows, vec![row(&[("b", "1")])]);

    let rows = run("* | delete b", &[input], 1);
    assert_eq!(rows, vec![row(&[("a", "1")])]);
}

#[test]
fn limit_stops_early_across_blocks() {
    let b1 = block(&[("a", &["1", "2", "3"])]);
    let b2 = block(&[("a", &["4", "5", "6"])]);
    let rows = run("* | limit 4", &[b1, b2], 1);
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[3], row(&[("a", "4")]));
}

#[test]
fn offset_skips_rows() {
    let b1 = block(&[("a", &["1", "2", "3"])]);
    let b2 = block(&[("a", &["4", "5"])]);
    let rows = run("* | offset 4", &[b1.clone(), b2.clone()], 1);
    assert_eq!(rows, vec![row(&[("a", "5")])]);

    let rows = run("* | offset 1 | limit 2", &[b1, b2], 1);
    assert_eq!(rows, vec![row(&[("a", "2")]), row(&[("a", "3")])]);
}

#[test]
fn sort_orders_rows() {
    let input = block(&[("a", &["b", "c", "a"]), ("n", &["2", "1", "3"])]);
    let rows = run("* | sort by (a)", &[input.clone()], 1);
    assert_eq!(
        rows.iter().map(|r| r[0].1.clone()).collect::<Vec<_>>(),
        ["a", "b", "c"]
    );

    let rows = run("* | sort by (a) desc", &[input.clone()], 1);
    assert_eq!(
        rows.iter().map(|r| r[0].1.clone()).collect::<Vec<_>>(),
        ["c", "b", "a"]
    );

    let rows = run("* | sort by (a) offset 1 limit 1", &[input.clone()], 1);
    assert_eq!(rows, vec![row(&[("a", "b"), ("n", "2")])]);

    // per-field desc flag
    let input = block(&[("x", &["1", "1", "2"]), ("y", &["a", "b", "a"])]);
    let rows = run("* | sort by (x, y desc)", &[input], 1);
    assert_eq!(
        rows.iter().map(|r| r[1].1.clone()).collect::<Vec<_>>(),
        ["b", "a", "a"]
    );
}

#[test]
fn sort_merges_worker_shards() {
    let b1 = block(&[("a", &["d", "b"])]);
    let b2 = block(&[("a", &["c", "a"])]);
    let rows = run("* | sort by (a)", &[b1, b2], 2);
    assert_eq!(
        rows.iter().map(|r| r[0].1.clone()).collect::<Vec<_>>(),
        ["a", "b", "c", "d"]
    );
}

#[test]
fn uniq_keeps_first_occurrence() {
    let input = block(&[("host", &["a", "b", "a", "a"]), ("x", &["1", "2", "3", "4"])]);
    let rows = run("* | uniq by (host)", &[input.clone()], 1);
    assert_eq!(rows, vec![row(&[("host", "a")]), row(&[("host", "b")])]);

    let rows = run("* | uniq by (host) limit 1", &[input.clone()], 1);
    assert_eq!(rows, vec![row(&[("host", "a")])]);

    // bare uniq dedups whole rows
    let input = block(&[("host", &["a", "a", "b"]), ("x", &["1", "1", "1"])]);
    let rows = run("* | uniq", &[input], 1);
    assert_eq!(
        rows,
        vec![row(&[("host", "a"), ("x", "1")]), row(&[("host", "b"), ("x", "1")])]
    );
}

#[test]
fn stats_count_by_host() {
    let input = block(&[("host", &["a", "b", "a", "a"])]);
    let rows = run("* | stats by (host) count(*) as c", &[input], 1);
    assert_eq!(
        rows,
        vec![row(&[("host", "a"), ("c", "3")]), row(&[("host", "b"), ("c", "1")])]
    );
}

#[test]
fn stats_merge_is_worker_count_independent() {
    let b1 = block(&[("host", &["a", "b"]), ("n", &["1", "10"])]);
    let b2 = block(&[("host", &["a", "a"]), ("n", &["2", "4"])]);
    let query = "* | stats by (host) count(*) as c, sum(n) as s";
    let single = run(query, &[b1.clone(), b2.clone()], 1);
    let multi = run(query, &[b1, b2], 2);
    assert_eq!(single, multi);
    assert_eq!(
        single,
        vec![
            row(&[("host", "a"), ("c", "3"), ("s", "7")]),
            row(&[("host", "b"), ("c", "1"), ("s", "10")]),
        ]
    );
}

#[test]
fn stats_numeric_aggregates() {
    let input = block(&[("n", &["1", "2", "3", "4", "oops"])]);
    let rows = run(
        "* | stats sum(n) s, avg(n) a, min(n) lo, max(n) hi, median(n) med, quantile(0.25, n) q, sum_len(n) len",
        &[input],
        1,
    );
    assert_eq!(
        rows,
        vec![row(&[
            ("s", "10"),
            ("a", "2.5"),
            ("lo", "1"),
            ("hi", "4"),
            ("med", "2"),
            ("q", "1"),
            ("len", "8"),
        ])]
    );
}

#[test]
fn stats_count_variants() {
    let input = block(&[("a", &["x", "", "y", ""]), ("b", &["", "", "z", ""])]);
    let rows = run(
        "* | stats count(a) ca, count(a, b) cab, count_empty(a) ea, count_empty(a, b) eab, count(*) all",
        &[input],
        1,
    );
    // count(*) counts every row, even when all columns are empty
    assert_eq!(
        rows,
        vec![row(&[
            ("ca", "2"),
            ("cab", "2"),
            ("ea", "2"),
            ("eab", "2"),
            ("all", "4"),
        ])]
    );
}

#[test]
fn stats_uniq_and_values() {
    let input = block(&[("v", &["b", "a", "b", "c", ""])]);
    let rows = run(
        "* | stats count_uniq(v) cu, uniq_values(v) uv, values(v) vals, count_uniq(v) limit 2 cl",
        &[input],
        1,
    );
    assert_eq!(
        rows,
        vec![row(&[
            ("cu", "3"),
            ("uv", "[\"a\",\"b\",\"c\"]"),
            ("vals", "[\"b\",\"a\",\"c\"]"),
            ("cl", "2"),
        ])]
    );
}

#[test]
fn stats_time_and_ip_buckets() {
    let ns_per_hour: i64 = 3_600_000_000_000;
    let base = logsql_block::value::try_parse_timestamp_iso8601("2023-06-01T00:00:00.000000000Z").unwrap();
    let input = BlockResult {
        timestamps: vec![base, base + ns_per_hour / 2, base + 25 * ns_per_hour],
        columns: vec![ResultColumn {
            name: "ip".to_string(),
            values: vec!["1.2.3.4".into(), "1.2.3.99".into(), "1.2.4.1".into()],
        }],
    };
    let rows = run("* | stats by (_time:1d) count(*) c", &[input.clone()], 1);
    assert_eq!(
        rows,
        vec![
            row(&[("_time", "2023-06-01T00:00:00.000000000Z"), ("c", "2")]),
            row(&[("_time", "2023-06-02T00:00:00.000000000Z"), ("c", "1")]),
        ]
    );

    let rows = run("* | stats by (ip:/24) count(*) c", &[input], 1);
    assert_eq!(
        rows,
        vec![
            row(&[("ip", "1.2.3.0"), ("c", "2")]),
            row(&[("ip", "1.2.4.0"), ("c", "1")]),
        ]
    );
}

#[test]
fn stats_numeric_buckets() {
    let input = block(&[("size", &["5", "15", "25", "12"])]);
    let rows = run("* | stats by (size:10) count(*) c", &[input], 1);
    assert_eq!(
        rows,
        vec![
            row(&[("size", "0"), ("c", "1")]),
            row(&[("size", "10"), ("c", "2")]),
            row(&[("size", "20"), ("c", "1")]),
        ]
    );
}
