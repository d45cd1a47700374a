//! Benchmarks for the evaluation driver.
//!
//! Run with: cargo bench -p formcell-layout

use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use formcell_layout::dep_graph::{DepGraph, NodeId};
use formcell_layout::rule::Adjacency;
use formcell_layout::{Axis, CellId, CellLayout, CellRules, CoordRef, Edge, LayoutConfig, Rule};
use std::hint::black_box;

/// Root with `rows` rows, each laid out as `cols` adjacent cells whose
/// widths are a share of the row.
fn build_grid(config: LayoutConfig, rows: usize, cols: usize) -> (CellLayout, CellId, Vec<CellId>) {
    let mut layout = CellLayout::with_config(config);
    let root = layout
        .create_cell(None, None, CellRules::fixed(0.0, 0.0, 1920.0, 1080.0))
        .unwrap();
    let share = 100.0 / cols as f32;
    let mut rows_out = Vec::with_capacity(rows);
    for _ in 0..rows {
        let row = layout
            .create_cell(
                Some(root),
                None,
                CellRules::new(
                    Rule::pixels(0.0),
                    Rule::size_of_parent(),
                    Rule::adjacent_to_previous(Adjacency::AlphaToOtherBeta).or(Rule::pixels(0.0)),
                    Rule::side_of_previous(Edge::Beta)
                        .or(Rule::pixels(0.0))
                        .offset_by(Rule::pixels(20.0)),
                ),
            )
            .unwrap();
        for _ in 0..cols {
            layout
                .create_cell(
                    Some(row),
                    None,
                    CellRules::new(
                        Rule::adjacent_to_previous(Adjacency::AlphaToOtherBeta).or(Rule::pixels(0.0)),
                        Rule::adjacent_to_previous(Adjacency::AlphaToOtherBeta)
                            .or(Rule::pixels(0.0))
                            .offset_by(Rule::percent_of_parent(share)),
                        Rule::pixels(0.0),
                        Rule::size_of_parent(),
                    ),
                )
                .unwrap();
        }
        rows_out.push(row);
    }
    layout.evaluate().unwrap();
    (layout, root, rows_out)
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("formcell/evaluate");

    for (rows, cols) in [(10, 10), (30, 30)] {
        let cells = 1 + rows + rows * cols;

        group.bench_with_input(BenchmarkId::new("full", cells), &(rows, cols), |b, &(r, k)| {
            let (mut layout, _, _) = build_grid(LayoutConfig::new().force_full(true), r, k);
            b.iter(|| black_box(layout.evaluate().unwrap().recomputed))
        });

        // Root resize: every row and cell width moves.
        group.bench_with_input(
            BenchmarkId::new("resize_root", cells),
            &(rows, cols),
            |b, &(r, k)| {
                let (mut layout, root, _) = build_grid(LayoutConfig::new(), r, k);
                let mut width = 1920.0;
                b.iter(|| {
                    width = if width > 1000.0 { 800.0 } else { 1920.0 };
                    layout
                        .set_rule(CoordRef::beta(root, Axis::X), Rule::pixels(width))
                        .unwrap();
                    black_box(layout.evaluate().unwrap().recomputed)
                })
            },
        );

        // Root shift: values are unchanged, only tares cascade.
        group.bench_with_input(
            BenchmarkId::new("seed_root", cells),
            &(rows, cols),
            |b, &(r, k)| {
                let (mut layout, root, _) = build_grid(LayoutConfig::new(), r, k);
                let mut x = 0.0;
                b.iter(|| {
                    x += 1.0;
                    layout.seed_root(root, x, 0.0).unwrap();
                    black_box(layout.absolute_value(CoordRef::alpha(root, Axis::X)))
                })
            },
        );

        // One row's height changes: only later rows move.
        group.bench_with_input(
            BenchmarkId::new("single_row", cells),
            &(rows, cols),
            |b, &(r, k)| {
                let (mut layout, _, row_ids) = build_grid(LayoutConfig::new(), r, k);
                let last = row_ids[row_ids.len() - 1];
                let mut gap = 20.0;
                b.iter(|| {
                    gap = if gap > 20.0 { 20.0 } else { 30.0 };
                    let rule = Rule::side_of_previous(Edge::Beta)
                        .or(Rule::pixels(0.0))
                        .offset_by(Rule::pixels(gap));
                    layout.set_rule(CoordRef::beta(last, Axis::Y), rule).unwrap();
                    black_box(layout.evaluate().unwrap().recomputed)
                })
            },
        );
    }

    group.finish();
}

fn bench_structure(c: &mut Criterion) {
    let mut group = c.benchmark_group("formcell/structure");

    group.bench_function("append_and_remove_cell", |b| {
        b.iter_batched(
            || build_grid(LayoutConfig::new(), 10, 10),
            |(mut layout, _, rows)| {
                let cell = layout
                    .create_cell(Some(rows[5]), Some(0), CellRules::fixed(0.0, 0.0, 10.0, 10.0))
                    .unwrap();
                layout.evaluate().unwrap();
                layout.remove_cell(cell).unwrap();
                black_box(layout.evaluate().unwrap().recomputed)
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

fn bench_dep_graph(c: &mut Criterion) {
    let mut group = c.benchmark_group("formcell/dep_graph");

    // Chain of 10K nodes: each reads the previous one.
    let mut chain = DepGraph::with_capacity(10_000);
    for i in 1..10_000u32 {
        chain
            .add_edge(NodeId::from_raw(i), NodeId::from_raw(i - 1))
            .unwrap();
    }

    group.bench_function("propagate_chain_10k", |b| {
        b.iter(|| {
            chain.clean_all();
            chain.mark_dirty(NodeId::from_raw(0));
            black_box(chain.propagate().unwrap().len())
        })
    });

    group.bench_function("propagate_tail_single", |b| {
        b.iter(|| {
            chain.clean_all();
            chain.mark_dirty(NodeId::from_raw(9_999));
            black_box(chain.propagate().unwrap().len())
        })
    });

    group.finish();
}

criterion_group!(benches, bench_evaluate, bench_structure, bench_dep_graph);
criterion_main!(benches);
