//! End-to-end layout scenarios.
//!
//! Each test builds a small tree through the public API, runs the driver
//! and checks resolved values, tare propagation and published events.
//!
//! Run with: `cargo test -p formcell-layout --test e2e_scenarios`

use formcell_layout::rule::Adjacency;
use formcell_layout::{
    Axis, CellId, CellLayout, CellRules, Composite, CoordRef, Edge, LayoutError, LayoutEvent,
    LayoutSnapshot, Rule,
};
use std::cell::RefCell;
use std::rc::Rc;

// ============================================================================
// Helpers
// ============================================================================

fn x_alpha(cell: CellId) -> CoordRef {
    CoordRef::alpha(cell, Axis::X)
}

fn x_beta(cell: CellId) -> CoordRef {
    CoordRef::beta(cell, Axis::X)
}

/// Root spanning `[0, width] x [0, height]`.
fn root(layout: &mut CellLayout, width: f32, height: f32) -> CellId {
    layout
        .create_cell(None, None, CellRules::fixed(0.0, 0.0, width, height))
        .unwrap()
}

/// Child with constant X edges `[alpha, beta]` and a 10-high Y extent.
fn span(layout: &mut CellLayout, parent: CellId, alpha: f32, beta: f32) -> CellId {
    let rules = CellRules::fixed(0.0, 0.0, 0.0, 10.0).with_axis(
        Axis::X,
        Rule::pixels(alpha),
        Rule::pixels(beta),
    );
    layout.create_cell(Some(parent), None, rules).unwrap()
}

fn record(layout: &mut CellLayout) -> Rc<RefCell<Vec<LayoutEvent>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    layout.subscribe(move |event| sink.borrow_mut().push(event.clone()));
    log
}

// ============================================================================
// Reference scenarios
// ============================================================================

#[test]
fn constant_child_under_seeded_root() {
    let mut layout = CellLayout::new();
    let r = root(&mut layout, 800.0, 600.0);
    layout.seed_root(r, 0.0, 0.0).unwrap();
    let child = span(&mut layout, r, 10.0, 60.0);
    layout.evaluate().unwrap();

    assert_eq!(layout.absolute_value(x_alpha(child)), Some(10.0));
    assert_eq!(layout.absolute_value(x_beta(child)), Some(60.0));
}

#[test]
fn adjacent_child_snaps_to_previous_beta() {
    let mut layout = CellLayout::new();
    let r = root(&mut layout, 800.0, 600.0);
    let first = span(&mut layout, r, 10.0, 60.0);
    let second = layout
        .create_cell(
            Some(r),
            None,
            CellRules::fixed(0.0, 0.0, 0.0, 10.0).with_axis(
                Axis::X,
                Rule::adjacent_to_previous(Adjacency::AlphaToOtherBeta),
                Rule::pixels(200.0),
            ),
        )
        .unwrap();
    layout.evaluate().unwrap();

    assert_eq!(
        layout.relative_value(x_alpha(second)),
        layout.relative_value(x_beta(first))
    );
    assert_eq!(layout.relative_value(x_alpha(second)), Some(60.0));
}

#[test]
fn percent_of_parent_calculates_on_demand() {
    let mut layout = CellLayout::new();
    let r = root(&mut layout, 400.0, 100.0);
    layout.evaluate().unwrap();

    let child = layout
        .create_cell(
            Some(r),
            None,
            CellRules::fixed(0.0, 0.0, 0.0, 10.0).with_axis(
                Axis::X,
                Rule::pixels(0.0),
                Rule::percent_of_parent(25.0),
            ),
        )
        .unwrap();
    assert_eq!(layout.calculate(x_beta(child)).unwrap(), Some(100.0));
}

#[test]
fn size_of_children_is_max_child_beta() {
    let mut layout = CellLayout::new();
    let r = layout
        .create_cell(
            None,
            None,
            CellRules::fixed(0.0, 0.0, 0.0, 100.0).with_axis(
                Axis::X,
                Rule::pixels(0.0),
                Rule::size_of_children(),
            ),
        )
        .unwrap();
    let children: Vec<_> = [50.0, 80.0, 65.0]
        .into_iter()
        .map(|beta| span(&mut layout, r, 0.0, beta))
        .collect();
    layout.evaluate().unwrap();
    assert_eq!(layout.relative_value(x_beta(r)), Some(80.0));

    // A wider child grows the parent.
    let wide = span(&mut layout, r, 0.0, 120.0);
    layout.evaluate().unwrap();
    assert_eq!(layout.relative_value(x_beta(r)), Some(120.0));

    // Removing the widest children shrinks it again.
    layout.remove_cell(wide).unwrap();
    layout.remove_cell(children[1]).unwrap();
    layout.evaluate().unwrap();
    assert_eq!(layout.relative_value(x_beta(r)), Some(65.0));
}

#[test]
fn size_of_children_without_children_is_unresolved() {
    let mut layout = CellLayout::new();
    let r = layout
        .create_cell(
            None,
            None,
            CellRules::fixed(0.0, 0.0, 0.0, 0.0).with_axis(
                Axis::X,
                Rule::pixels(0.0),
                Rule::size_of_children().or(Rule::pixels(32.0)),
            ),
        )
        .unwrap();
    layout.evaluate().unwrap();
    assert_eq!(layout.relative_value(x_beta(r)), Some(32.0));

    span(&mut layout, r, 0.0, 48.0);
    layout.evaluate().unwrap();
    assert_eq!(layout.relative_value(x_beta(r)), Some(48.0));
}

#[test]
fn inverted_parent_has_negative_size() {
    let mut layout = CellLayout::new();
    let r = root(&mut layout, 800.0, 600.0);
    let parent = span(&mut layout, r, 100.0, 20.0);
    let rules = CellRules::fixed(0.0, 0.0, 0.0, 10.0);
    let full = layout
        .create_cell(
            Some(parent),
            None,
            rules
                .clone()
                .with_axis(Axis::X, Rule::pixels(0.0), Rule::size_of_parent()),
        )
        .unwrap();
    let quarter = layout
        .create_cell(
            Some(parent),
            None,
            rules.with_axis(Axis::X, Rule::pixels(0.0), Rule::percent_of_parent(25.0)),
        )
        .unwrap();
    layout.evaluate().unwrap();

    assert_eq!(layout.relative_extent(parent, Axis::X), Some(-80.0));
    assert_eq!(layout.relative_value(x_beta(full)), Some(-80.0));
    assert_eq!(layout.relative_value(x_beta(quarter)), Some(-20.0));
    // Tare is the parent's Alpha absolute, 100.
    assert_eq!(layout.absolute_value(x_beta(full)), Some(20.0));
    assert_eq!(layout.relative_extent(full, Axis::X), Some(-80.0));
}

// ============================================================================
// Tares
// ============================================================================

#[test]
fn alpha_move_retares_descendants_only() {
    let mut layout = CellLayout::new();
    let a = root(&mut layout, 500.0, 500.0);
    let b = layout
        .create_cell(Some(a), None, CellRules::fixed(10.0, 20.0, 100.0, 100.0))
        .unwrap();
    let c = layout
        .create_cell(Some(b), None, CellRules::fixed(5.0, 5.0, 10.0, 10.0))
        .unwrap();
    let d = root(&mut layout, 50.0, 50.0);
    let e = span(&mut layout, d, 1.0, 2.0);
    layout.evaluate().unwrap();
    assert_eq!(layout.absolute_value(x_alpha(c)), Some(15.0));

    let log = record(&mut layout);
    layout.set_rule(x_alpha(a), Rule::pixels(100.0)).unwrap();
    layout.evaluate().unwrap();

    assert_eq!(layout.coordinate(x_alpha(b)).unwrap().tare(), Some(100.0));
    assert_eq!(layout.coordinate(x_beta(b)).unwrap().tare(), Some(100.0));
    assert_eq!(layout.absolute_value(x_alpha(b)), Some(110.0));
    assert_eq!(layout.coordinate(x_alpha(c)).unwrap().tare(), Some(110.0));
    assert_eq!(layout.absolute_value(x_alpha(c)), Some(115.0));
    assert_eq!(layout.absolute_value(CoordRef::alpha(c, Axis::Y)), Some(25.0));

    let retared: Vec<CoordRef> = log
        .borrow()
        .iter()
        .filter_map(|event| match event {
            LayoutEvent::TareChanged { coord, .. } => Some(*coord),
            _ => None,
        })
        .collect();
    assert_eq!(
        retared,
        vec![x_alpha(b), x_beta(b), x_alpha(c), x_beta(c)]
    );
    assert!(log.borrow().iter().all(|event| event.cell() != e));
}

#[test]
fn detach_clears_tares_until_seeded() {
    let mut layout = CellLayout::new();
    let a = root(&mut layout, 500.0, 500.0);
    let b = layout
        .create_cell(Some(a), None, CellRules::fixed(10.0, 20.0, 100.0, 100.0))
        .unwrap();
    let c = layout
        .create_cell(Some(b), None, CellRules::fixed(5.0, 5.0, 10.0, 10.0))
        .unwrap();
    layout.evaluate().unwrap();

    layout.detach(b).unwrap();
    assert_eq!(layout.parent(b), None);
    assert!(layout.children(a).is_empty());
    for axis in Axis::ALL {
        for edge in Edge::ALL {
            let coord = layout.coordinate(CoordRef::new(b, axis, edge)).unwrap();
            assert_eq!(coord.tare(), None);
            assert_eq!(coord.absolute_value(), None);
            assert!(coord.relative_value().is_some());
        }
    }
    assert_eq!(layout.absolute_value(x_alpha(c)), None);

    layout.seed_root(b, 0.0, 0.0).unwrap();
    assert_eq!(layout.absolute_value(x_alpha(b)), Some(10.0));
    assert_eq!(layout.absolute_value(x_alpha(c)), Some(15.0));
}

// ============================================================================
// Structure
// ============================================================================

#[test]
fn reparenting_rewires_parent_rules() {
    let mut layout = CellLayout::new();
    let narrow = root(&mut layout, 100.0, 100.0);
    let wide = root(&mut layout, 400.0, 100.0);
    let half = layout
        .create_cell(
            Some(narrow),
            None,
            CellRules::fixed(0.0, 0.0, 0.0, 10.0).with_axis(
                Axis::X,
                Rule::pixels(0.0),
                Rule::percent_of_parent(50.0),
            ),
        )
        .unwrap();
    layout.evaluate().unwrap();
    assert_eq!(layout.relative_value(x_beta(half)), Some(50.0));

    layout.reparent(half, wide, None).unwrap();
    assert!(layout.is_dirty(x_beta(half)));
    layout.evaluate().unwrap();
    assert_eq!(layout.relative_value(x_beta(half)), Some(200.0));
}

#[test]
fn first_child_sibling_rules_are_unresolved_until_reordered() {
    let mut layout = CellLayout::new();
    let r = root(&mut layout, 300.0, 100.0);
    let follower = layout
        .create_cell(
            Some(r),
            None,
            CellRules::fixed(0.0, 0.0, 0.0, 10.0).with_axis(
                Axis::X,
                Rule::side_of_previous(Edge::Beta).offset_by(Rule::pixels(4.0)),
                Rule::pixels(250.0),
            ),
        )
        .unwrap();
    layout.evaluate().unwrap();
    assert_eq!(layout.relative_value(x_alpha(follower)), None);
    assert_eq!(layout.stats().unresolved, 1);

    let leader = span(&mut layout, r, 0.0, 90.0);
    layout.reparent(leader, r, Some(0)).unwrap();
    layout.evaluate().unwrap();
    assert_eq!(layout.previous_sibling(follower), Some(leader));
    assert_eq!(layout.relative_value(x_alpha(follower)), Some(94.0));
}

#[test]
fn composite_folds_in_insertion_order() {
    let mut layout = CellLayout::new();
    let r = root(&mut layout, 200.0, 100.0);
    let rule: Rule = Composite::new(Rule::size_of_parent())
        .add(Rule::pixels(10.0))
        .subtract(Rule::percent_of_parent(25.0))
        .into();
    let child = layout
        .create_cell(
            Some(r),
            None,
            CellRules::fixed(0.0, 0.0, 0.0, 10.0).with_axis(Axis::X, Rule::pixels(0.0), rule),
        )
        .unwrap();
    layout.evaluate().unwrap();
    assert_eq!(layout.relative_value(x_beta(child)), Some(160.0));
}

#[test]
fn remove_cell_drops_whole_subtree() {
    let mut layout = CellLayout::new();
    let r = root(&mut layout, 100.0, 100.0);
    let a = span(&mut layout, r, 0.0, 10.0);
    let a1 = span(&mut layout, a, 0.0, 5.0);
    let a2 = span(&mut layout, a, 5.0, 10.0);
    let b = span(&mut layout, r, 10.0, 20.0);

    let removed = layout.remove_cell(a).unwrap();
    assert_eq!(removed, vec![a, a1, a2]);
    assert_eq!(layout.len(), 2);
    assert_eq!(layout.children(r), &[b]);
    assert_eq!(
        layout.remove_cell(a1),
        Err(LayoutError::UnknownCell { cell: a1 })
    );
}

// ============================================================================
// Cycles
// ============================================================================

#[test]
fn parent_child_cycle_is_rejected_and_rolled_back() {
    let mut layout = CellLayout::new();
    let r = layout
        .create_cell(
            None,
            None,
            CellRules::fixed(0.0, 0.0, 0.0, 100.0).with_axis(
                Axis::X,
                Rule::pixels(0.0),
                Rule::size_of_children(),
            ),
        )
        .unwrap();
    let ok = span(&mut layout, r, 0.0, 40.0);
    layout.evaluate().unwrap();
    let edges = layout.graph().edge_count();

    let err = layout
        .create_cell(
            Some(r),
            None,
            CellRules::fixed(0.0, 0.0, 0.0, 10.0).with_axis(
                Axis::X,
                Rule::pixels(0.0),
                Rule::percent_of_parent(50.0),
            ),
        )
        .unwrap_err();
    assert!(matches!(err, LayoutError::Cycle { .. }));

    assert_eq!(layout.len(), 2);
    assert_eq!(layout.children(r), &[ok]);
    assert_eq!(layout.graph().edge_count(), edges);
    let stats = layout.evaluate().unwrap();
    assert_eq!(stats.total, 0);
    assert_eq!(layout.relative_value(x_beta(r)), Some(40.0));
}

#[test]
fn cyclic_rule_swap_is_rejected() {
    let mut layout = CellLayout::new();
    let r = root(&mut layout, 100.0, 100.0);
    let a = span(&mut layout, r, 0.0, 10.0);
    let b = layout
        .create_cell(
            Some(r),
            None,
            CellRules::fixed(0.0, 0.0, 0.0, 10.0).with_axis(
                Axis::X,
                Rule::side_of_previous(Edge::Beta),
                Rule::pixels(50.0),
            ),
        )
        .unwrap();
    // b.alpha reads a.beta; a.beta reading the parent is fine ...
    layout.set_rule(x_beta(a), Rule::size_of_parent()).unwrap();
    // ... but the parent reading its children closes a loop through a.beta.
    let err = layout.set_rule(x_beta(r), Rule::size_of_children()).unwrap_err();
    assert_eq!(
        err,
        LayoutError::Cycle {
            dependent: x_beta(r),
            prerequisite: x_beta(a),
        }
    );
    layout.evaluate().unwrap();
    assert_eq!(layout.relative_value(x_alpha(b)), Some(100.0));
}

// ============================================================================
// Events and snapshots
// ============================================================================

#[test]
fn attach_and_evaluate_publish_events() {
    let mut layout = CellLayout::new();
    let r = root(&mut layout, 200.0, 100.0);
    let log = record(&mut layout);

    let c = layout
        .create_cell(
            Some(r),
            None,
            CellRules::fixed(0.0, 0.0, 0.0, 10.0).with_axis(
                Axis::X,
                Rule::pixels(0.0),
                Rule::percent_of_parent(50.0),
            ),
        )
        .unwrap();
    {
        let events = log.borrow();
        assert_eq!(
            events[..3],
            [
                LayoutEvent::CellCreated { cell: c },
                LayoutEvent::ParentChanged {
                    cell: c,
                    old: None,
                    new: Some(r),
                },
                LayoutEvent::ChildrenChanged { cell: r },
            ]
        );
        for prerequisite in [x_alpha(r), x_beta(r)] {
            assert!(events.contains(&LayoutEvent::PrerequisiteAdded {
                dependent: x_beta(c),
                prerequisite,
            }));
        }
    }

    log.borrow_mut().clear();
    layout.evaluate().unwrap();
    {
        let events = log.borrow();
        assert!(events.contains(&LayoutEvent::RelativeValueChanged {
            coord: x_beta(c),
            old: None,
            new: Some(100.0),
        }));
        assert!(events.contains(&LayoutEvent::AbsoluteValueChanged {
            coord: x_beta(c),
            old: None,
            new: Some(100.0),
        }));
    }

    log.borrow_mut().clear();
    layout
        .modify_rule(x_beta(r), |rule| *rule = Rule::pixels(300.0))
        .unwrap();
    assert_eq!(
        *log.borrow(),
        vec![LayoutEvent::Invalidated { coord: x_beta(r) }]
    );
}

#[test]
fn unsubscribed_handlers_go_quiet() {
    let mut layout = CellLayout::new();
    let count = Rc::new(RefCell::new(0usize));
    let sink = Rc::clone(&count);
    let id = layout.subscribe(move |_| *sink.borrow_mut() += 1);
    root(&mut layout, 10.0, 10.0);
    let seen = *count.borrow();
    assert!(seen > 0);

    assert!(layout.unsubscribe(id));
    root(&mut layout, 10.0, 10.0);
    layout.evaluate().unwrap();
    assert_eq!(*count.borrow(), seen);
}

#[test]
fn snapshot_serializes_resolved_values() {
    let mut layout = CellLayout::new();
    let r = root(&mut layout, 200.0, 100.0);
    let child = span(&mut layout, r, 20.0, 70.0);
    layout.evaluate().unwrap();

    let snapshot = layout.snapshot();
    let json = serde_json::to_value(&snapshot).unwrap();
    let cells = json["cells"].as_array().unwrap();
    assert_eq!(cells.len(), 2);
    assert_eq!(cells[1]["id"], child.raw());
    assert_eq!(cells[1]["parent"], r.raw());
    assert_eq!(cells[1]["x"]["alpha"]["rule"], "20px");
    assert_eq!(cells[1]["x"]["beta"]["absolute"], 70.0);
    assert!(cells[0]["parent"].is_null());

    let back: LayoutSnapshot = serde_json::from_value(json).unwrap();
    assert_eq!(back, snapshot);
}
